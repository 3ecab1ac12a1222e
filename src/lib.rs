//! Connectivity and authentication tester for servers speaking the
//! [Source RCON protocol](https://developer.valvesoftware.com/wiki/Source_RCON_Protocol).
//!
//! A [session::Session] connects, authenticates with a password and optionally
//! runs one command, then hands back a [session::SessionReport] describing
//! how far it got and what the server sent at each step.
pub mod config;
pub mod error;
pub mod packet;
pub mod players;
pub mod session;

pub use config::SessionConfig;
pub use error::{ConfigError, RconError};
pub use packet::{Packet, PacketBuffer, PacketType};
pub use session::{Exchange, Session, SessionReport, SessionState};
