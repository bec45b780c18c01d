//! Actuator command packing and telemetry fusion for a shared CAN bus.
//!
//! Two actuator families and one IMU share the bus:
//! - shared-frame actuators: commands packed four to a frame, telemetry as a
//!   13-bit position counter that wraps once per revolution
//! - addressed actuators: one bit-packed command frame each, telemetry on a
//!   common broadcast identifier with a bounded position in radians
//! - IMUs: three consecutive identifiers of packed half-floats that together
//!   form one orientation/acceleration/angular-velocity sample
//!
//! [`FrameEncoder`] turns the command side of a [`Registry`] into frames,
//! [`TelemetryDecoder`] folds incoming frames back into it. Neither blocks.

pub mod coeff;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod filter;
pub mod registry;
pub mod state;
pub mod unwrap;

pub use coeff::{ActuatorCoefficients, ActuatorFamily};
pub use config::{ActuatorEntry, BusConfig, ImuEntry};
pub use decoder::{DecodeOutcome, DecoderConfig, TelemetryDecoder};
pub use encoder::{EncoderConfig, FrameEncoder};
pub use error::{CoreError, Result};
pub use filter::{ButterworthLowPass, FilterSpec, PassThrough, VelocityFilter};
pub use registry::{Actuator, Imu, Registry};
pub use state::{ActuatorCommand, ActuatorSnapshot, ImuState};
pub use unwrap::UnwrapState;
