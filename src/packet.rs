use crate::error::RconError;

/// Packet roles as the Source rcon protocol names them. Note that the server
/// reuses the value `2` for auth responses, so a raw type read off the wire
/// can't always be mapped back to a single variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    // SERVERDATA_AUTH
    Auth,
    // SERVERDATA_EXECCOMMAND
    Exec,
    // SERVERDATA_AUTH_RESPONSE
    AuthResponse,
    // SERVERDATA_RESPONSE_VALUE
    Response,
}

impl PacketType {
    pub fn value(self) -> i32 {
        match self {
            PacketType::Auth => 3,
            PacketType::Exec => 2,
            PacketType::AuthResponse => 2,
            PacketType::Response => 0,
        }
    }
}

impl From<PacketType> for i32 {
    fn from(packet_type: PacketType) -> Self {
        packet_type.value()
    }
}

/// The id a server echoes back in an auth response when the password was wrong.
pub const AUTH_FAILED_ID: i32 = -1;

/// Size, id and type, each a little endian i32.
pub const HEADER_SIZE: usize = 12;

/// Largest body a Source server accepts, plus the fixed part of the size field.
pub const MAX_PACKET_SIZE: i32 = 4096 + Packet::BASE_PACKET_SIZE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    id: i32,
    packet_type: i32,
    body: String,
}

impl Packet {
    /// id + type + the two terminating null bytes.
    pub const BASE_PACKET_SIZE: i32 = 10;

    pub fn new(id: i32, packet_type: PacketType, body: &str) -> Self {
        Self::from_raw(id, packet_type.value(), body)
    }

    /// Build a packet with a type that isn't necessarily one we know about.
    pub fn from_raw(id: i32, packet_type: i32, body: &str) -> Self {
        Packet {
            id,
            packet_type,
            body: String::from(body),
        }
    }

    // Since the only one of these values that can change in length is the body,
    // an easy way to calculate the size of a packet is to find the byte-length
    // of the packet body, then add 10 to it.
    pub fn size(&self) -> i32 {
        self.body.len() as i32 + Self::BASE_PACKET_SIZE
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn packet_type(&self) -> i32 {
        self.packet_type
    }

    pub fn body(&self) -> &str {
        self.body.as_ref()
    }

    pub fn pack(&self) -> Vec<u8> {
        // Size, ID, Type, Body, Terminator
        let mut payload = Vec::<u8>::with_capacity(self.size() as usize + 4);
        payload.extend_from_slice(&self.size().to_le_bytes());
        payload.extend_from_slice(&self.id().to_le_bytes());
        payload.extend_from_slice(&self.packet_type().to_le_bytes());
        payload.extend_from_slice(self.body().as_bytes());
        // null terminate the body (C++ interop 🤢), then null terminate the entire package
        payload.extend_from_slice(&[0u8, 0u8]);
        payload
    }

    /// Lenient decode of whatever has been buffered so far.
    ///
    /// Returns `None` if there aren't enough bytes for a header. The declared
    /// size is not checked: everything after the header except the last two
    /// bytes is taken as the body. Invalid UTF-8 is replaced, never rejected.
    /// Use [PacketBuffer] when the size field should be trusted.
    pub fn unpack(incoming: &[u8]) -> Option<Self> {
        if incoming.len() < HEADER_SIZE {
            return None;
        }

        let (_size, id, packet_type) = read_header(incoming);
        let body_end = incoming.len().saturating_sub(2).max(HEADER_SIZE);
        let body = String::from_utf8_lossy(&incoming[HEADER_SIZE..body_end]);

        Some(Packet {
            id,
            packet_type,
            body: body.into_owned(),
        })
    }
}

fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    i32::from_le_bytes(word)
}

// caller guarantees at least HEADER_SIZE bytes
fn read_header(bytes: &[u8]) -> (i32, i32, i32) {
    (read_i32(bytes, 0), read_i32(bytes, 4), read_i32(bytes, 8))
}

/// Accumulates bytes off the socket and cuts them into frames using the size
/// field, so a single read can yield several packets and a packet can span
/// several reads.
#[derive(Debug, Default)]
pub struct PacketBuffer {
    buf: Vec<u8>,
}

impl PacketBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Declared length of the frame at the front, including the size field.
    fn frame_len(&self) -> Result<Option<usize>, RconError> {
        if self.buf.len() < 4 {
            return Ok(None);
        }

        let size = read_i32(&self.buf, 0);
        if !(Packet::BASE_PACKET_SIZE..=MAX_PACKET_SIZE).contains(&size) {
            return Err(RconError::InvalidPacketSize(size));
        }

        let frame_len = size as usize + 4;
        if self.buf.len() < frame_len {
            Ok(None)
        } else {
            Ok(Some(frame_len))
        }
    }

    pub fn has_complete_frame(&self) -> bool {
        matches!(self.frame_len(), Ok(Some(_)))
    }

    /// Pop the next complete frame. `Ok(None)` means keep reading.
    pub fn next_packet(&mut self) -> Result<Option<Packet>, RconError> {
        let frame_len = match self.frame_len()? {
            Some(frame_len) => frame_len,
            None => return Ok(None),
        };

        let frame: Vec<u8> = self.buf.drain(..frame_len).collect();
        let (_size, id, packet_type) = read_header(&frame);
        let body = String::from_utf8_lossy(&frame[HEADER_SIZE..frame_len - 2]);

        Ok(Some(Packet {
            id,
            packet_type,
            body: body.into_owned(),
        }))
    }

    /// Decode every complete frame without consuming the buffer. Decoding
    /// stops at the first framing error, which is returned next to the frames
    /// that came before it.
    pub fn peek_packets(&self) -> (Vec<Packet>, Option<RconError>) {
        let mut copy = PacketBuffer {
            buf: self.buf.clone(),
        };
        let mut packets = Vec::new();
        loop {
            match copy.next_packet() {
                Ok(Some(packet)) => packets.push(packet),
                Ok(None) => return (packets, None),
                Err(err) => return (packets, Some(err)),
            }
        }
    }
}
