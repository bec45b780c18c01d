use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FrameError, Result};
use crate::ids::{is_extended, EXTENDED_ID_MASK, STANDARD_ID_MAX};

/// Payload size of every frame on this bus.
pub const PAYLOAD_LEN: usize = 8;

/// Size of one SocketCAN `struct can_frame`: id (4) + dlc (1) + pad (3) + data (8).
pub const WIRE_SIZE: usize = 16;

const CAN_EFF_FLAG: u32 = 0x8000_0000;
const CAN_RTR_FLAG: u32 = 0x4000_0000;
const CAN_ERR_FLAG: u32 = 0x2000_0000;

/// An addressed bus frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BusFrame {
    /// Bus identifier (11-bit standard or 29-bit extended).
    pub id: u32,
    /// The payload; shorter frames are zero-padded.
    pub data: [u8; PAYLOAD_LEN],
}

impl BusFrame {
    /// Create a new frame.
    pub fn new(id: u32, data: [u8; PAYLOAD_LEN]) -> Self {
        Self { id, data }
    }

    /// A frame with an all-zero payload.
    pub fn zeroed(id: u32) -> Self {
        Self::new(id, [0; PAYLOAD_LEN])
    }

    /// Create a frame from a payload of at most 8 bytes.
    pub fn from_slice(id: u32, payload: &[u8]) -> Result<Self> {
        if payload.len() > PAYLOAD_LEN {
            return Err(FrameError::InvalidLength {
                dlc: payload.len().min(u8::MAX as usize) as u8,
            });
        }
        let mut data = [0u8; PAYLOAD_LEN];
        data[..payload.len()].copy_from_slice(payload);
        Ok(Self::new(id, data))
    }

    /// Big-endian unsigned 16-bit field starting at `offset`.
    pub fn u16_be(&self, offset: usize) -> u16 {
        u16::from_be_bytes([self.data[offset], self.data[offset + 1]])
    }

    /// Big-endian signed 16-bit field starting at `offset`.
    pub fn i16_be(&self, offset: usize) -> i16 {
        i16::from_be_bytes([self.data[offset], self.data[offset + 1]])
    }
}

/// Encode a frame into the SocketCAN wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬─────────┬───────────┬──────────────┐
/// │ can_id (4B)  │ dlc (1B)│ pad (3B)  │ data (8B)    │
/// │ native order │ always 8│ zero      │              │
/// └──────────────┴─────────┴───────────┴──────────────┘
/// ```
/// Identifiers above 0x7FF are sent with the extended-format flag.
pub fn encode_frame(frame: &BusFrame, dst: &mut BytesMut) {
    let can_id = if is_extended(frame.id) {
        (frame.id & EXTENDED_ID_MASK) | CAN_EFF_FLAG
    } else {
        frame.id
    };
    dst.reserve(WIRE_SIZE);
    dst.put_slice(&can_id.to_ne_bytes());
    dst.put_u8(PAYLOAD_LEN as u8);
    dst.put_bytes(0, 3);
    dst.put_slice(&frame.data);
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success or on a rejected frame, consumes the frame bytes from the buffer,
/// so a caller can log the error and keep reading.
pub fn decode_frame(src: &mut BytesMut) -> Result<Option<BusFrame>> {
    if src.len() < WIRE_SIZE {
        return Ok(None); // Need more data
    }

    let mut raw = src.split_to(WIRE_SIZE);
    let mut id_bytes = [0u8; 4];
    raw.copy_to_slice(&mut id_bytes);
    let can_id = u32::from_ne_bytes(id_bytes);
    let dlc = raw.get_u8();
    raw.advance(3);

    if can_id & CAN_ERR_FLAG != 0 {
        return Err(FrameError::UnsupportedFrame {
            kind: "error",
            id: can_id & EXTENDED_ID_MASK,
        });
    }
    let id = if can_id & CAN_EFF_FLAG != 0 {
        can_id & EXTENDED_ID_MASK
    } else {
        can_id & STANDARD_ID_MAX
    };
    if can_id & CAN_RTR_FLAG != 0 {
        return Err(FrameError::UnsupportedFrame { kind: "remote", id });
    }
    if dlc as usize > PAYLOAD_LEN {
        return Err(FrameError::InvalidLength { dlc });
    }

    let mut data = [0u8; PAYLOAD_LEN];
    data[..dlc as usize].copy_from_slice(&raw[..dlc as usize]);
    Ok(Some(BusFrame { id, data }))
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone, Default)]
pub struct FrameConfig {
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}
