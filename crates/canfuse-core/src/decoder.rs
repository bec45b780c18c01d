use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use canfuse_frame::{half_float, BusFrame, ADDRESSED_BROADCAST};
use serde::{Deserialize, Serialize};
use tracing::{error, trace};

use crate::coeff::ActuatorFamily;
use crate::registry::{Actuator, Registry};
use crate::state::ImuState;

/// Decoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecoderConfig {
    /// IMU frames with any value beyond this magnitude are dropped as noise.
    pub imu_plausibility_limit: f32,
    /// Identifier on which addressed actuators report telemetry.
    pub broadcast_id: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            imu_plausibility_limit: 1000.0,
            broadcast_id: ADDRESSED_BROADCAST,
        }
    }
}

/// What happened to one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Telemetry of the shared-frame actuator at `address`.
    SharedFrame { address: u32 },
    /// Telemetry of the addressed actuator at `address`.
    Addressed { address: u32 },
    /// Sub-frame `offset` of the IMU at `base_id`.
    Imu { base_id: u32, offset: u32 },
    /// A value exceeded the plausibility limit; nothing was updated.
    ImplausibleImu,
    /// Nothing matched. `reported` is true the first time an identifier is seen.
    Unrecognized { reported: bool },
}

impl DecodeOutcome {
    /// Whether the frame updated any record.
    pub fn is_applied(&self) -> bool {
        matches!(
            self,
            Self::SharedFrame { .. } | Self::Addressed { .. } | Self::Imu { .. }
        )
    }
}

/// Folds inbound frames into the records of a [`Registry`].
#[derive(Debug)]
pub struct TelemetryDecoder {
    bus_name: String,
    config: DecoderConfig,
    reported: Mutex<HashSet<u32>>,
}

impl TelemetryDecoder {
    pub fn new(bus_name: impl Into<String>, config: DecoderConfig) -> Self {
        Self {
            bus_name: bus_name.into(),
            config,
            reported: Mutex::new(HashSet::new()),
        }
    }

    pub fn bus_name(&self) -> &str {
        &self.bus_name
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Route one frame.
    ///
    /// A shared-frame actuator registered at the identifier wins, then an
    /// addressed actuator named by byte 0 of a broadcast frame, then IMU
    /// reassembly. Anything left over is reported once per identifier.
    pub fn decode(&self, registry: &Registry, frame: &BusFrame) -> DecodeOutcome {
        if let Some(actuator) = registry
            .actuator(frame.id)
            .filter(|actuator| actuator.family() == ActuatorFamily::SharedFrame)
        {
            decode_shared(actuator, frame);
            return DecodeOutcome::SharedFrame { address: frame.id };
        }

        if frame.id == self.config.broadcast_id {
            if let Some(actuator) = registry
                .actuator(u32::from(frame.data[0]))
                .filter(|actuator| actuator.family() == ActuatorFamily::Addressed)
            {
                decode_addressed(actuator, frame);
                return DecodeOutcome::Addressed {
                    address: actuator.address(),
                };
            }
        }

        let values = half_float::decode_payload(&frame.data);
        let limit = self.config.imu_plausibility_limit;
        if values.iter().any(|value| value.abs() > limit) {
            trace!(id = format_args!("{:#x}", frame.id), "implausible IMU values dropped");
            return DecodeOutcome::ImplausibleImu;
        }

        for imu in registry.imus() {
            let Some(offset) = frame.id.checked_sub(imu.base_id()) else {
                continue;
            };
            if offset < ImuState::SUB_FRAMES {
                imu.lock_state().apply(offset, values);
                return DecodeOutcome::Imu {
                    base_id: imu.base_id(),
                    offset,
                };
            }
        }

        let reported = self
            .reported
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(frame.id);
        if reported {
            error!(
                id = format_args!("{:#x}", frame.id),
                bus = %self.bus_name,
                "can not find defined device"
            );
        }
        DecodeOutcome::Unrecognized { reported }
    }
}

/// Position counter(16) velocity(16, signed) current(16, signed) temperature(8).
fn decode_shared(actuator: &Actuator, frame: &BusFrame) {
    let coefficients = actuator.coefficients();
    let q = frame.u16_be(0);
    let qd = frame.i16_be(2);
    let cur = frame.i16_be(4);

    let mut telemetry = actuator.telemetry();
    let count = telemetry.unwrap.track_counter(q);
    telemetry.pos = coefficients.act2pos * count as f64;
    telemetry.effort = coefficients.act2effort * f64::from(cur);
    telemetry.temp = f64::from(frame.data[6]);
    telemetry.store_velocity(coefficients.act2vel * f64::from(qd));
}

/// Address(8) position(16) velocity(12) current(12).
fn decode_addressed(actuator: &Actuator, frame: &BusFrame) {
    let coefficients = actuator.coefficients();
    let data = &frame.data;
    let q = u16::from_be_bytes([data[1], data[2]]);
    let qd = (u16::from(data[3]) << 4) | u16::from(data[4] >> 4);
    let cur = (u16::from(data[4] & 0x0F) << 8) | u16::from(data[5]);

    let mut telemetry = actuator.telemetry();
    let bounded = coefficients.act2pos * f64::from(q) + coefficients.act2pos_offset;
    let previous = telemetry.pos;
    telemetry.pos = telemetry.unwrap.track_continuous(bounded, previous);
    telemetry.effort = coefficients.act2effort * f64::from(cur) + coefficients.act2effort_offset;
    telemetry.store_velocity(coefficients.act2vel * f64::from(qd) + coefficients.act2vel_offset);
}
