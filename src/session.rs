use std::{future::Future, time::Duration};

use log::{debug, info, trace, warn};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};

use crate::{
    config::SessionConfig,
    error::RconError,
    packet::{Packet, PacketBuffer, PacketType, AUTH_FAILED_ID},
};

const AUTH_PACKET_ID: i32 = 0;
const COMMAND_PACKET_ID: i32 = 1;
const AUTH_READ_SIZE: usize = 4096;
const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    AuthSent,
    Authenticating,
    Authenticated,
    CommandSent,
    Done,
    Failed,
}

/// What came back for one request: every byte read, and the packet decoded
/// from them if there were enough.
#[derive(Debug, Clone)]
pub struct Exchange {
    received: Vec<u8>,
    packet: Option<Packet>,
}

impl Exchange {
    pub fn received(&self) -> &[u8] {
        &self.received
    }

    pub fn packet(&self) -> Option<&Packet> {
        self.packet.as_ref()
    }

    /// First 200 characters of the body, for display.
    pub fn body_preview(&self) -> Option<String> {
        self.packet
            .as_ref()
            .map(|packet| packet.body().chars().take(PREVIEW_CHARS).collect())
    }
}

/// Outcome of a [Session]. Nothing fails past `Session::run`; errors end up in
/// here next to whatever was received before they happened.
#[derive(Debug)]
pub struct SessionReport {
    state: SessionState,
    auth: Option<Exchange>,
    command: Option<Exchange>,
    error: Option<RconError>,
}

impl SessionReport {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_success(&self) -> bool {
        self.state == SessionState::Done && self.error.is_none()
    }

    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    pub fn auth(&self) -> Option<&Exchange> {
        self.auth.as_ref()
    }

    pub fn command(&self) -> Option<&Exchange> {
        self.command.as_ref()
    }

    pub fn error(&self) -> Option<&RconError> {
        self.error.as_ref()
    }
}

/// Probes one rcon server: connect, authenticate and optionally run a single
/// command. Each session owns its socket, so any number can run side by side.
///
/// ## Example
/// ```no_run
/// use rcon_probe::{config::SessionConfig, session::Session};
///
/// #[tokio::main]
/// async fn main() {
///     let config = SessionConfig::new("dev.viora.sh", 27016, "<put rcon password here>");
///     let report = Session::new(config).run().await;
///
///     std::process::exit(report.exit_code());
/// }
/// ```
pub struct Session {
    config: SessionConfig,
    state: SessionState,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Session {
            config,
            state: SessionState::Connecting,
        }
    }

    pub async fn run(mut self) -> SessionReport {
        let mut report = SessionReport {
            state: self.state,
            auth: None,
            command: None,
            error: None,
        };

        if let Err(err) = self.drive(&mut report).await {
            debug!("session failed in state {:?}: {}", self.state, err);
            self.transition(SessionState::Failed);
            report.error = Some(err);
        }

        report.state = self.state;
        report
    }

    fn transition(&mut self, next: SessionState) {
        debug!("session state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    async fn drive(&mut self, report: &mut SessionReport) -> Result<(), RconError> {
        let mut stream = self.connect().await?;
        let result = self.exchange(&mut stream, report).await;

        drop(stream);
        info!("connection to {} closed", self.config.address());

        result
    }

    async fn connect(&mut self) -> Result<TcpStream, RconError> {
        let address = self.config.address();
        info!("connecting to {}", address);

        let stream =
            connect_within(self.config.connect_timeout, TcpStream::connect(&address)).await?;

        trace!("opened tcp stream to {}", address);
        Ok(stream)
    }

    async fn exchange(
        &mut self,
        stream: &mut TcpStream,
        report: &mut SessionReport,
    ) -> Result<(), RconError> {
        self.auth(stream, report).await?;
        self.transition(SessionState::Authenticated);
        info!("authenticated");

        let command = match self.config.command.clone() {
            Some(command) => command,
            None => {
                self.transition(SessionState::Done);
                return Ok(());
            }
        };

        let command_packet = Packet::new(COMMAND_PACKET_ID, PacketType::Exec, &command);
        trace!("sending command {:?}", command);
        write_to_stream(stream, &command_packet).await?;
        self.transition(SessionState::CommandSent);

        let buffer = self
            .receive(stream, self.config.reply_buffer_size, |buffer| {
                buffer.has_complete_frame()
            })
            .await?;

        let packet = first_packet(&buffer);
        match packet {
            Some(ref packet) => info!(
                "command reply: {} bytes, id {}, type {}",
                buffer.len(),
                packet.id(),
                packet.packet_type()
            ),
            None => warn!("short command reply: {} bytes", buffer.len()),
        }

        report.command = Some(Exchange {
            received: buffer.as_bytes().to_vec(),
            packet,
        });
        self.transition(SessionState::Done);
        Ok(())
    }

    async fn auth(
        &mut self,
        stream: &mut TcpStream,
        report: &mut SessionReport,
    ) -> Result<(), RconError> {
        let auth_packet = Packet::new(AUTH_PACKET_ID, PacketType::Auth, &self.config.password);

        trace!("sending auth packet to server");
        write_to_stream(stream, &auth_packet).await?;
        self.transition(SessionState::AuthSent);

        self.transition(SessionState::Authenticating);
        let buffer = self.receive(stream, AUTH_READ_SIZE, is_auth_reply).await?;
        let (frames, framing_error) = buffer.peek_packets();
        if let Some(err) = framing_error {
            debug!(
                "auth reply is not cleanly framed after {} frames ({})",
                frames.len(),
                err
            );
        }
        let packet = first_packet(&buffer);

        report.auth = Some(Exchange {
            received: buffer.as_bytes().to_vec(),
            packet: packet.clone(),
        });

        let packet = match packet {
            Some(packet) => packet,
            None => {
                return Err(RconError::InsufficientData {
                    received: buffer.as_bytes().to_vec(),
                })
            }
        };

        trace!(
            "auth reply id {}, type {}, body {:?}",
            packet.id(),
            packet.packet_type(),
            packet.body()
        );

        // a server may send an empty response value ahead of the real auth
        // response, so a rejection anywhere in the reply wins
        if packet.id() == AUTH_FAILED_ID || frames.iter().any(|p| p.id() == AUTH_FAILED_ID) {
            return Err(RconError::AuthenticationError);
        }

        if !self.config.success_types.contains(&packet.packet_type()) {
            warn!("unexpected auth response type {}", packet.packet_type());
            return Err(RconError::UnexpectedResponseType(packet.packet_type()));
        }

        Ok(())
    }

    /// Read until `done` says the buffer holds what we want, the peer closes,
    /// a read times out or we run out of attempts. Only a failing read is an
    /// error; the caller decides whether what arrived is enough.
    async fn receive<F>(
        &self,
        stream: &mut TcpStream,
        read_size: usize,
        done: F,
    ) -> Result<PacketBuffer, RconError>
    where
        F: Fn(&PacketBuffer) -> bool,
    {
        let mut buffer = PacketBuffer::new();
        let mut chunk = vec![0u8; read_size];
        let mut attempts = 0;

        while attempts < self.config.max_read_attempts {
            match timeout(self.config.read_timeout, stream.read(&mut chunk)).await {
                Err(_) => {
                    trace!("read timed out after {} bytes", buffer.len());
                    break;
                }
                Ok(Err(e)) => return Err(RconError::ReceiveError(e)),
                Ok(Ok(0)) => {
                    trace!("peer closed the stream after {} bytes", buffer.len());
                    break;
                }
                Ok(Ok(n)) => {
                    attempts += 1;
                    trace!("chunk {}: {} bytes - {:02x?}", attempts, n, &chunk[..n]);
                    buffer.extend(&chunk[..n]);
                    if done(&buffer) {
                        break;
                    }
                }
            }
        }

        trace!("received {} bytes in total", buffer.len());
        Ok(buffer)
    }
}

/// The auth reply is in once we have a rejection or an auth response. The
/// empty response value some servers send first doesn't count.
fn is_auth_reply(buffer: &PacketBuffer) -> bool {
    let (packets, _) = buffer.peek_packets();
    packets.iter().any(|packet| {
        packet.id() == AUTH_FAILED_ID || packet.packet_type() == PacketType::AuthResponse.value()
    })
}

/// First framed packet if the size field can be trusted, otherwise a lenient
/// decode of everything received.
fn first_packet(buffer: &PacketBuffer) -> Option<Packet> {
    let mut frames = PacketBuffer::new();
    frames.extend(buffer.as_bytes());
    match frames.next_packet() {
        Ok(Some(packet)) => Some(packet),
        _ => Packet::unpack(buffer.as_bytes()),
    }
}

async fn connect_within<T, F>(limit: Duration, connecting: F) -> Result<T, RconError>
where
    F: Future<Output = std::io::Result<T>>,
{
    timeout(limit, connecting)
        .await
        .map_err(|_| RconError::ConnectTimeout(limit))?
        .map_err(RconError::UnreachableHost)
}

async fn write_to_stream(stream: &mut TcpStream, packet: &Packet) -> Result<(), RconError> {
    let bytes = packet.pack();
    trace!("sending packet id {} ({} bytes)", packet.id(), bytes.len());
    stream.write_all(&bytes).await.map_err(RconError::SendError)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_of(packets: &[Packet]) -> PacketBuffer {
        let mut buffer = PacketBuffer::new();
        for packet in packets {
            buffer.extend(&packet.pack());
        }
        buffer
    }

    #[test]
    fn auth_reply_waits_past_response_value() {
        let empty_value = Packet::from_raw(0, 0, "");
        assert!(!is_auth_reply(&buffer_of(&[empty_value.clone()])));
        assert!(!is_auth_reply(&buffer_of(&[Packet::from_raw(0, 7, "")])));
        assert!(is_auth_reply(&buffer_of(&[
            empty_value,
            Packet::from_raw(0, 2, "")
        ])));
        assert!(is_auth_reply(&buffer_of(&[Packet::from_raw(-1, 0, "")])));
    }

    #[test]
    fn auth_reply_seen_before_trailing_garbage() {
        let mut buffer = buffer_of(&[Packet::from_raw(0, 0, ""), Packet::from_raw(-1, 2, "")]);
        buffer.extend(&[0xff, 0xff, 0xff, 0xff]);
        assert!(is_auth_reply(&buffer));
    }

    #[tokio::test]
    async fn connect_timeout_is_reported() {
        let limit = Duration::from_millis(20);
        let result = connect_within(limit, std::future::pending::<std::io::Result<()>>()).await;
        assert!(matches!(result, Err(RconError::ConnectTimeout(d)) if d == limit));
    }

    #[tokio::test]
    async fn connect_failure_is_unreachable_host() {
        let refused = async {
            Err::<(), _>(std::io::Error::from(std::io::ErrorKind::ConnectionRefused))
        };
        let result = connect_within(Duration::from_secs(1), refused).await;
        assert!(matches!(result, Err(RconError::UnreachableHost(_))));
    }

    #[test]
    fn first_packet_prefers_frames() {
        let buffer = buffer_of(&[Packet::from_raw(4, 0, "one"), Packet::from_raw(5, 0, "two")]);
        assert_eq!(first_packet(&buffer).unwrap().body(), "one");

        let mut truncated = PacketBuffer::new();
        truncated.extend(&Packet::from_raw(4, 2, "one").pack()[..14]);
        assert_eq!(first_packet(&truncated).unwrap().id(), 4);
    }

    #[test]
    fn body_preview_is_truncated() {
        let exchange = Exchange {
            received: Vec::new(),
            packet: Some(Packet::from_raw(1, 0, &"ä".repeat(300))),
        };
        assert_eq!(exchange.body_preview().unwrap().chars().count(), 200);
    }

    #[test]
    fn only_done_is_success() {
        let report = SessionReport {
            state: SessionState::Authenticated,
            auth: None,
            command: None,
            error: None,
        };
        assert!(!report.is_success());
        assert_eq!(report.exit_code(), 1);
    }
}
