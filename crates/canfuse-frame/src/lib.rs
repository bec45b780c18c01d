//! Fixed-size CAN frame codec for the actuator/IMU bus.
//!
//! Every bus message is an identifier plus an 8-byte payload. This crate owns:
//! - [`BusFrame`] and the bus identifier constants
//! - the 16-byte SocketCAN `struct can_frame` wire layout
//! - blocking [`FrameReader`]/[`FrameWriter`] over any `Read`/`Write`
//! - the vendor 1-5-10 half-float used by the IMU ([`half_float`])
//! - candump log lines for replay and inspection ([`candump`])

#[cfg(feature = "async")]
pub mod async_codec;
pub mod candump;
pub mod codec;
pub mod error;
pub mod half_float;
pub mod ids;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::BusCodec;
pub use codec::{decode_frame, encode_frame, BusFrame, FrameConfig, PAYLOAD_LEN, WIRE_SIZE};
pub use error::{FrameError, Result};
pub use ids::{ADDRESSED_BROADCAST, SHARED_BASE_ADDRESS, SHARED_GROUP_0, SHARED_GROUP_1};
pub use reader::FrameReader;
pub use writer::FrameWriter;
