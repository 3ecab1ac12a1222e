//! A fake rcon server that follows a fixed script, so sessions can be tested
//! against slow, fragmented or misbehaving peers.
#![allow(dead_code)]

use std::time::Duration;

use rcon_probe::{Packet, SessionConfig};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
    time::timeout,
};

pub enum Step {
    /// Read one framed packet from the client.
    Read,
    Send(Vec<u8>),
    Sleep(Duration),
    /// Hang up without waiting for the client.
    Close,
}

pub struct ScriptedPeer {
    pub port: u16,
    handle: JoinHandle<Vec<Packet>>,
}

impl ScriptedPeer {
    pub async fn start(script: Vec<Step>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();

            for step in script {
                match step {
                    Step::Read => received.push(read_frame(&mut stream).await),
                    Step::Send(bytes) => {
                        // the client may already have given up and hung up
                        if stream.write_all(&bytes).await.is_err() {
                            return received;
                        }
                    }
                    Step::Sleep(duration) => tokio::time::sleep(duration).await,
                    Step::Close => return received,
                }
            }

            // hold the connection open until the client hangs up
            let mut rest = Vec::new();
            let _ = stream.read_to_end(&mut rest).await;
            received
        });

        ScriptedPeer { port, handle }
    }

    pub fn config(&self, password: &str) -> SessionConfig {
        SessionConfig::new("127.0.0.1", self.port, password)
            .with_read_timeout(Duration::from_millis(300))
    }

    /// Packets the client sent. Panics if the client never closed the connection.
    pub async fn finish(self) -> Vec<Packet> {
        timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("client kept the connection open")
            .unwrap()
    }
}

async fn read_frame(stream: &mut TcpStream) -> Packet {
    let mut size = [0u8; 4];
    stream.read_exact(&mut size).await.unwrap();

    let mut frame = size.to_vec();
    frame.resize(4 + i32::from_le_bytes(size) as usize, 0);
    stream.read_exact(&mut frame[4..]).await.unwrap();

    Packet::unpack(&frame).unwrap()
}

/// Encode a frame by hand so tests can put arbitrary bytes in the body.
pub fn frame(id: i32, packet_type: i32, body: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&(body.len() as i32 + 10).to_le_bytes());
    bytes.extend_from_slice(&id.to_le_bytes());
    bytes.extend_from_slice(&packet_type.to_le_bytes());
    bytes.extend_from_slice(body);
    bytes.extend_from_slice(&[0, 0]);
    bytes
}
