use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::coeff::ActuatorFamily;
use crate::filter::VelocityFilter;
use crate::unwrap::UnwrapState;

/// Standard gravity used to scale IMU acceleration from g to m/s².
pub const GRAVITY: f64 = 9.81;

/// Setpoints written by the control side and read by the encoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActuatorCommand {
    pub effort: f64,
    pub position: f64,
    pub velocity: f64,
}

/// Telemetry written only by the decoder.
pub struct ActuatorTelemetry {
    pub pos: f64,
    pub vel: f64,
    pub effort: f64,
    pub temp: f64,
    pub unwrap: UnwrapState,
    pub(crate) filter: Box<dyn VelocityFilter>,
}

impl ActuatorTelemetry {
    pub(crate) fn new(filter: Box<dyn VelocityFilter>) -> Self {
        Self {
            pos: 0.0,
            vel: 0.0,
            effort: 0.0,
            temp: 0.0,
            unwrap: UnwrapState::default(),
            filter,
        }
    }

    /// Run a raw velocity through the filter and store the filtered value.
    pub(crate) fn store_velocity(&mut self, raw: f64) {
        self.filter.input(raw);
        self.vel = self.filter.output();
    }
}

impl std::fmt::Debug for ActuatorTelemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActuatorTelemetry")
            .field("pos", &self.pos)
            .field("vel", &self.vel)
            .field("effort", &self.effort)
            .field("temp", &self.temp)
            .field("unwrap", &self.unwrap)
            .finish_non_exhaustive()
    }
}

/// Point-in-time copy of one actuator, taken under its locks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActuatorSnapshot {
    pub name: String,
    pub address: u32,
    #[serde(rename = "type")]
    pub type_name: String,
    pub family: ActuatorFamily,
    pub command: ActuatorCommand,
    pub pos: f64,
    pub vel: f64,
    pub effort: f64,
    pub temp: f64,
    pub revolution_count: i64,
    pub sample_seq: u64,
}

/// One IMU sample, assembled from three consecutive sub-frames.
///
/// `orientation` is a quaternion stored as `[w, x, y, z]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImuState {
    pub linear_acc: [f64; 3],
    pub angular_vel: [f64; 3],
    pub orientation: [f64; 4],
    /// Completed three-frame cycles.
    pub samples: u64,
    #[serde(skip)]
    sub_frame_mask: u8,
}

impl ImuState {
    /// Sub-frames per sample.
    pub const SUB_FRAMES: u32 = 3;

    const FULL_MASK: u8 = 0b111;

    /// Apply the four decoded values of sub-frame `offset` (0, 1 or 2).
    ///
    /// Returns false and leaves the state untouched for any other offset.
    pub fn apply(&mut self, offset: u32, values: [f32; 4]) -> bool {
        let [v0, v1, v2, v3] = values.map(f64::from);
        match offset {
            0 => {
                self.linear_acc = [v0 * GRAVITY, v1 * GRAVITY, v2 * GRAVITY];
                self.angular_vel[0] = deg_to_rad(v3);
            }
            1 => {
                self.angular_vel[1] = deg_to_rad(v0);
                self.angular_vel[2] = deg_to_rad(v1);
                // z arrives before w on the wire.
                self.orientation[3] = v2;
                self.orientation[0] = v3;
            }
            2 => {
                self.orientation[1] = v0;
                self.orientation[2] = v1;
            }
            _ => return false,
        }

        self.sub_frame_mask |= 1 << offset;
        if self.sub_frame_mask == Self::FULL_MASK {
            self.samples += 1;
            self.sub_frame_mask = 0;
        }
        true
    }

    /// True once all three sub-frames have arrived at least once.
    pub fn is_complete(&self) -> bool {
        self.samples > 0
    }
}

fn deg_to_rad(degrees: f64) -> f64 {
    degrees / 360.0 * 2.0 * PI
}
