use std::time::Duration;
use thiserror::Error;

/// Possible errors for the package.
#[derive(Error, Debug)]
pub enum RconError {
    /// Returned if the host is down, refuses the connection or cannot be
    /// resolved.
    #[error("host cannot be reached")]
    UnreachableHost(#[source] std::io::Error),
    /// Returned if the tcp handshake did not finish in time.
    #[error("connection timed out after {0:?}")]
    ConnectTimeout(Duration),
    /// Returned if the server stopped sending before we had a full packet
    /// header. Keeps whatever arrived so it can be shown to the user.
    #[error("expected at least 12 bytes from the server, received {}", .received.len())]
    InsufficientData { received: Vec<u8> },
    /// Returned if you can't remember the password.
    #[error("bad password")]
    AuthenticationError,
    /// Returned if the auth reply is neither a rejection nor one of the
    /// recognized success types.
    #[error("unexpected auth response type: {0}")]
    UnexpectedResponseType(i32),
    /// Returned if a frame declares a size no rcon server would send.
    #[error("invalid packet size: {0}")]
    InvalidPacketSize(i32),
    /// Internal error used if the stream was successfully established, but
    /// there was a problem writing to the socket.
    #[error("cannot send message to host")]
    SendError(#[source] std::io::Error),
    /// Internal error used if the stream was successfully established, but
    /// there was a problem reading from the socket.
    #[error("cannot receive response from host")]
    ReceiveError(#[source] std::io::Error),
}

/// Errors raised while assembling a [crate::config::SessionConfig].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}
