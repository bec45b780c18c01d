//! Raw CAN bus transport.
//!
//! Provides a [`BusStream`] over a Linux SocketCAN raw socket. Each `read`
//! yields exactly one 16-byte `struct can_frame`, each `write` sends one.
//!
//! This is the lowest layer of canfuse. Frame codecs in `canfuse-frame`
//! work over any `Read`/`Write`, so replays and tests never need a socket.

pub mod error;
pub mod traits;

#[cfg(target_os = "linux")]
pub mod socketcan;

pub use error::{Result, TransportError};
pub use traits::BusStream;

#[cfg(target_os = "linux")]
pub use socketcan::CanSocket;
