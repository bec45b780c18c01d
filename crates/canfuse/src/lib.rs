//! Actuator command packing and actuator/IMU telemetry fusion over SocketCAN.
//!
//! canfuse turns per-actuator effort/position/velocity setpoints into bus
//! command frames and folds inbound telemetry frames back into continuous
//! multi-turn positions, filtered velocities and assembled IMU samples.
//!
//! # Crate Structure
//!
//! - [`transport`] - SocketCAN raw socket stream
//! - [`frame`] - Bus frames, wire codec, half-float and candump helpers
//! - [`fusion`] - Registry, frame encoder and telemetry decoder
//! - [`session`] - Open-with-retry and receive/transmit loops (behind `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use canfuse_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use canfuse_frame::*;
}

/// Re-export registry, encoder and decoder types.
pub mod fusion {
    pub use canfuse_core::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use canfuse_session::*;
}
