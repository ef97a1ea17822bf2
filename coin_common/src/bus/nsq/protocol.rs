//! NSQ TCP protocol (V2) framing.
//!
//! Client → server traffic is line based (`SUB topic channel\n`, `RDY n\n`,
//! `FIN id\n`, ...), except `PUB`, which is followed by a 4-byte big-endian body size
//! and the body. Server → client traffic is framed as
//! `[size: u32 BE][frame type: u32 BE][data]`, where `size` counts the frame type and
//! the data. Message frames carry
//! `[timestamp: i64 BE][attempts: u16 BE][id: 16 bytes][body]`.
use std::io::{Read, Write};

use crate::error::CoinError;
use crate::result::Result;

/// Protocol magic sent once after connecting.
pub const MAGIC_V2: &[u8; 4] = b"  V2";
/// Body of the heartbeat response frame.
pub const HEARTBEAT: &[u8] = b"_heartbeat_";
/// Body of a successful command response.
pub const OK: &[u8] = b"OK";
/// Response to `CLS` once the server stops sending messages.
pub const CLOSE_WAIT: &[u8] = b"CLOSE_WAIT";

/// Largest frame accepted from the server.
pub const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

const FRAME_TYPE_RESPONSE: u32 = 0;
const FRAME_TYPE_ERROR: u32 = 1;
const FRAME_TYPE_MESSAGE: u32 = 2;

const MESSAGE_HEADER_BYTES: usize = 8 + 2 + 16;

/// One frame received from `nsqd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Command response, including heartbeats.
    Response(Vec<u8>),
    /// Error response (e.g., `E_BAD_TOPIC`).
    Error(Vec<u8>),
    /// Delivered message.
    Message(NsqMessage),
}

/// Message delivered to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsqMessage {
    /// Publish time in nanoseconds since the Unix epoch.
    pub timestamp: i64,
    /// Delivery attempts so far, starting at 1.
    pub attempts: u16,
    /// Message id used by `FIN`/`REQ`.
    pub id: [u8; 16],
    /// Message body.
    pub body: Vec<u8>,
}

/// Read one frame.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Frame> {
    let mut word = [0u8; 4];
    reader.read_exact(&mut word)?;
    let size = u32::from_be_bytes(word);
    if !(4..=MAX_FRAME_BYTES).contains(&size) {
        return Err(CoinError::Bus(format!("invalid frame size {}", size)));
    }
    reader.read_exact(&mut word)?;
    let frame_type = u32::from_be_bytes(word);

    let mut data = vec![0u8; (size - 4) as usize];
    reader.read_exact(&mut data)?;

    match frame_type {
        FRAME_TYPE_RESPONSE => Ok(Frame::Response(data)),
        FRAME_TYPE_ERROR => Ok(Frame::Error(data)),
        FRAME_TYPE_MESSAGE => parse_message(&data).map(Frame::Message),
        other => Err(CoinError::Bus(format!("unknown frame type {}", other))),
    }
}

fn parse_message(data: &[u8]) -> Result<NsqMessage> {
    if data.len() < MESSAGE_HEADER_BYTES {
        return Err(CoinError::Bus(format!("message frame too short: {} bytes", data.len())));
    }
    let mut timestamp = [0u8; 8];
    timestamp.copy_from_slice(&data[..8]);
    let attempts = u16::from_be_bytes([data[8], data[9]]);
    let mut id = [0u8; 16];
    id.copy_from_slice(&data[10..26]);

    Ok(NsqMessage {
        timestamp: i64::from_be_bytes(timestamp),
        attempts,
        id,
        body: data[MESSAGE_HEADER_BYTES..].to_vec(),
    })
}

/// Write a frame the way `nsqd` would.
#[cfg(test)]
pub(crate) fn write_frame<W: Write>(writer: &mut W, frame: &Frame) -> Result<()> {
    let (frame_type, data) = match frame {
        Frame::Response(data) => (FRAME_TYPE_RESPONSE, data.clone()),
        Frame::Error(data) => (FRAME_TYPE_ERROR, data.clone()),
        Frame::Message(msg) => {
            let mut data = Vec::with_capacity(MESSAGE_HEADER_BYTES + msg.body.len());
            data.extend_from_slice(&msg.timestamp.to_be_bytes());
            data.extend_from_slice(&msg.attempts.to_be_bytes());
            data.extend_from_slice(&msg.id);
            data.extend_from_slice(&msg.body);
            (FRAME_TYPE_MESSAGE, data)
        }
    };
    let size = u32::try_from(data.len() + 4)
        .map_err(|_| CoinError::Bus(format!("frame too large: {} bytes", data.len())))?;
    writer.write_all(&size.to_be_bytes())?;
    writer.write_all(&frame_type.to_be_bytes())?;
    writer.write_all(&data)?;
    writer.flush()?;
    Ok(())
}

/// Write `PUB <topic>\n[size][body]`.
pub fn write_pub<W: Write>(writer: &mut W, topic: &str, body: &[u8]) -> Result<()> {
    validate_name(topic)?;
    let size = u32::try_from(body.len())
        .map_err(|_| CoinError::Bus(format!("message too large: {} bytes", body.len())))?;
    let mut buf = Vec::with_capacity(topic.len() + 9 + body.len());
    buf.extend_from_slice(b"PUB ");
    buf.extend_from_slice(topic.as_bytes());
    buf.push(b'\n');
    buf.extend_from_slice(&size.to_be_bytes());
    buf.extend_from_slice(body);
    writer.write_all(&buf)?;
    writer.flush()?;
    Ok(())
}

/// Write a single-line command such as `RDY 16` or `NOP`.
pub fn write_command<W: Write>(writer: &mut W, command: &str) -> Result<()> {
    writer.write_all(command.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Write `FIN <id>\n`.
pub fn write_fin<W: Write>(writer: &mut W, id: &[u8; 16]) -> Result<()> {
    let mut buf = Vec::with_capacity(21);
    buf.extend_from_slice(b"FIN ");
    buf.extend_from_slice(id);
    buf.push(b'\n');
    writer.write_all(&buf)?;
    writer.flush()?;
    Ok(())
}

/// Topic and channel names: 1–64 characters of `[.a-zA-Z0-9_-]`.
pub fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(CoinError::Bus(format!("invalid topic/channel name {:?}", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_message_frame() {
        let mut data = Vec::new();
        data.extend_from_slice(&1_700_000_000_000_000_000i64.to_be_bytes());
        data.extend_from_slice(&3u16.to_be_bytes());
        data.extend_from_slice(b"0123456789abcdef");
        data.extend_from_slice(b"payload");
        let mut wire = Vec::new();
        wire.extend_from_slice(&((data.len() + 4) as u32).to_be_bytes());
        wire.extend_from_slice(&2u32.to_be_bytes());
        wire.extend_from_slice(&data);

        let frame = read_frame(&mut Cursor::new(wire)).unwrap();
        let Frame::Message(msg) = frame else {
            panic!("expected message frame, got {:?}", frame);
        };
        assert_eq!(msg.attempts, 3);
        assert_eq!(&msg.id, b"0123456789abcdef");
        assert_eq!(msg.body, b"payload");
    }

    #[test]
    fn reads_heartbeat_and_error() {
        let mut wire = Vec::new();
        write_frame(&mut wire, &Frame::Response(HEARTBEAT.to_vec())).unwrap();
        write_frame(&mut wire, &Frame::Error(b"E_INVALID".to_vec())).unwrap();
        let mut cursor = Cursor::new(wire);
        assert_eq!(read_frame(&mut cursor).unwrap(), Frame::Response(HEARTBEAT.to_vec()));
        assert_eq!(read_frame(&mut cursor).unwrap(), Frame::Error(b"E_INVALID".to_vec()));
    }

    #[test]
    fn rejects_bad_frames() {
        let mut short = Vec::new();
        short.extend_from_slice(&2u32.to_be_bytes());
        assert!(read_frame(&mut Cursor::new(short)).is_err());

        let mut unknown = Vec::new();
        unknown.extend_from_slice(&4u32.to_be_bytes());
        unknown.extend_from_slice(&9u32.to_be_bytes());
        assert!(read_frame(&mut Cursor::new(unknown)).is_err());

        let mut truncated_msg = Vec::new();
        truncated_msg.extend_from_slice(&10u32.to_be_bytes());
        truncated_msg.extend_from_slice(&2u32.to_be_bytes());
        truncated_msg.extend_from_slice(&[0u8; 6]);
        assert!(read_frame(&mut Cursor::new(truncated_msg)).is_err());
    }

    #[test]
    fn pub_command_layout() {
        let mut wire = Vec::new();
        write_pub(&mut wire, "coins", b"abc").unwrap();
        assert_eq!(wire, b"PUB coins\n\x00\x00\x00\x03abc");
        assert!(write_pub(&mut Vec::new(), "bad topic", b"abc").is_err());
    }
}
