use canfuse_frame::ids::SHARED_SLOTS_PER_FRAME;
use canfuse_frame::{BusFrame, SHARED_BASE_ADDRESS, SHARED_GROUP_0, SHARED_GROUP_1};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::coeff::ActuatorFamily;
use crate::registry::{Actuator, Registry};

/// Encoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncoderConfig {
    /// Shared-frame actuators at or above this temperature get no command.
    pub max_temperature: f64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            max_temperature: 100.0,
        }
    }
}

/// Builds the command frames of one control tick.
#[derive(Debug, Clone, Default)]
pub struct FrameEncoder {
    config: EncoderConfig,
}

impl FrameEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Encode every actuator's current command.
    ///
    /// Addressed actuators each produce one frame, in address order. The two
    /// shared group frames start zeroed on every call and follow at the end,
    /// each only if at least one of its slots was filled.
    pub fn encode(&self, registry: &Registry) -> Vec<BusFrame> {
        let mut groups = [
            BusFrame::zeroed(SHARED_GROUP_0),
            BusFrame::zeroed(SHARED_GROUP_1),
        ];
        let mut filled = [false; 2];
        let mut frames = Vec::new();

        for actuator in registry.actuators() {
            match actuator.family() {
                ActuatorFamily::SharedFrame => {
                    let Some((group, offset, raw)) = self.shared_slot(actuator) else {
                        continue;
                    };
                    groups[group].data[offset..offset + 2].copy_from_slice(&raw.to_be_bytes());
                    filled[group] = true;
                }
                ActuatorFamily::Addressed => frames.push(encode_addressed(actuator)),
                ActuatorFamily::Unknown => {}
            }
        }

        frames.extend(
            groups
                .into_iter()
                .zip(filled)
                .filter_map(|(frame, used)| used.then_some(frame)),
        );
        frames
    }

    /// Group index, byte offset and raw value for one shared-frame actuator,
    /// or `None` if it is too hot or outside the eight addressable slots.
    fn shared_slot(&self, actuator: &Actuator) -> Option<(usize, usize, i16)> {
        let temperature = actuator.temperature();
        if temperature >= self.config.max_temperature {
            trace!(
                actuator = actuator.name(),
                temperature,
                "over temperature, command suppressed"
            );
            return None;
        }

        let index = actuator.address().checked_sub(SHARED_BASE_ADDRESS)? as usize;
        if index >= 2 * SHARED_SLOTS_PER_FRAME {
            return None;
        }

        let coefficients = actuator.coefficients();
        let command = actuator.command();
        let raw = min_abs(coefficients.effort2act * command.effort, coefficients.max_out);
        Some((
            index / SHARED_SLOTS_PER_FRAME,
            2 * (index % SHARED_SLOTS_PER_FRAME),
            raw as i16,
        ))
    }
}

/// Pack one addressed command: position(16) velocity(12) kp(12) kd(12) torque(12).
///
/// Gains are always zero; the actuator then tracks the torque feed-forward only
/// and reports position and velocity back.
fn encode_addressed(actuator: &Actuator) -> BusFrame {
    let coefficients = actuator.coefficients();
    let command = actuator.command();

    let position =
        to_raw(coefficients.pos2act * (command.position - coefficients.act2pos_offset));
    let velocity =
        to_raw(coefficients.vel2act * (command.velocity - coefficients.act2vel_offset)) & 0x0FFF;
    let kp = 0u16;
    let kd = 0u16;
    let torque =
        to_raw(coefficients.effort2act * (command.effort - coefficients.act2effort_offset))
            & 0x0FFF;

    BusFrame::new(actuator.address(), pack_addressed(position, velocity, kp, kd, torque))
}

pub(crate) fn pack_addressed(position: u16, velocity: u16, kp: u16, kd: u16, torque: u16) -> [u8; 8] {
    [
        (position >> 8) as u8,
        (position & 0xFF) as u8,
        (velocity >> 4) as u8,
        (((velocity & 0xF) << 4) | (kp >> 8)) as u8,
        (kp & 0xFF) as u8,
        (kd >> 4) as u8,
        (((kd & 0xF) << 4) | (torque >> 8)) as u8,
        (torque & 0xFF) as u8,
    ]
}

/// Truncate towards zero, then keep the low 16 bits.
fn to_raw(value: f64) -> u16 {
    value as i32 as u16
}

/// Clamp `value` to `±bound`, keeping its sign. NaN commands nothing.
fn min_abs(value: f64, bound: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    let sign = if value < 0.0 { -1.0 } else { 1.0 };
    sign * value.abs().min(bound)
}
