//! Bus session for canfuse.
//!
//! Opens the bus with retry, then splits into a receive half that feeds every
//! inbound frame to the [`TelemetryDecoder`](canfuse_core::TelemetryDecoder)
//! and a transmit half that writes one control tick of command frames at a
//! time. Both halves share one [`Registry`](canfuse_core::Registry).

pub mod config;
pub mod error;
pub mod session;

pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use session::{open_with_retry, ReceiveStats, Session, SessionReceiver, SessionTransmitter};
