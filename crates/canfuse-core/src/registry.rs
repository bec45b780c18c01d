use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::coeff::{ActuatorCoefficients, ActuatorFamily};
use crate::error::{CoreError, Result};
use crate::filter::VelocityFilter;
use crate::state::{ActuatorCommand, ActuatorSnapshot, ActuatorTelemetry, ImuState};

/// One registered actuator.
///
/// Command and telemetry are locked separately: the control side only ever
/// writes the command, the decoder only ever writes the telemetry, and each
/// side takes a lock for the whole of one update.
pub struct Actuator {
    name: String,
    address: u32,
    type_name: String,
    family: ActuatorFamily,
    coefficients: Arc<ActuatorCoefficients>,
    command: Mutex<ActuatorCommand>,
    telemetry: Mutex<ActuatorTelemetry>,
}

impl Actuator {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn family(&self) -> ActuatorFamily {
        self.family
    }

    pub fn coefficients(&self) -> &ActuatorCoefficients {
        &self.coefficients
    }

    /// Current setpoints.
    pub fn command(&self) -> ActuatorCommand {
        *lock(&self.command)
    }

    /// Replace the setpoints.
    pub fn set_command(&self, command: ActuatorCommand) {
        *lock(&self.command) = command;
    }

    /// Last decoded temperature.
    pub fn temperature(&self) -> f64 {
        lock(&self.telemetry).temp
    }

    /// Consistent copy of command and telemetry.
    pub fn snapshot(&self) -> ActuatorSnapshot {
        let command = self.command();
        let telemetry = lock(&self.telemetry);
        ActuatorSnapshot {
            name: self.name.clone(),
            address: self.address,
            type_name: self.type_name.clone(),
            family: self.family,
            command,
            pos: telemetry.pos,
            vel: telemetry.vel,
            effort: telemetry.effort,
            temp: telemetry.temp,
            revolution_count: telemetry.unwrap.revolution_count,
            sample_seq: telemetry.unwrap.sample_seq,
        }
    }

    pub(crate) fn telemetry(&self) -> MutexGuard<'_, ActuatorTelemetry> {
        lock(&self.telemetry)
    }
}

impl std::fmt::Debug for Actuator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actuator")
            .field("name", &self.name)
            .field("address", &format_args!("{:#x}", self.address))
            .field("type_name", &self.type_name)
            .field("family", &self.family)
            .finish_non_exhaustive()
    }
}

/// One registered IMU, answering on `base_id`, `base_id + 1` and `base_id + 2`.
#[derive(Debug)]
pub struct Imu {
    name: String,
    base_id: u32,
    state: Mutex<ImuState>,
}

impl Imu {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_id(&self) -> u32 {
        self.base_id
    }

    /// Copy of the current sample.
    pub fn state(&self) -> ImuState {
        lock(&self.state).clone()
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, ImuState> {
        lock(&self.state)
    }
}

/// Actuators keyed by bus address and IMUs keyed by base identifier.
///
/// The set of records is fixed once populated; share it behind an `Arc`
/// between the receive side and the control tick.
#[derive(Debug, Default)]
pub struct Registry {
    actuators: BTreeMap<u32, Actuator>,
    imus: BTreeMap<u32, Imu>,
    names: BTreeMap<String, u32>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an actuator.
    ///
    /// The family is resolved from `type_name` here, once. Shared-frame and
    /// addressed actuators must come with coefficients.
    pub fn insert_actuator(
        &mut self,
        name: &str,
        address: u32,
        type_name: &str,
        coefficients: Option<Arc<ActuatorCoefficients>>,
        filter: Box<dyn VelocityFilter>,
    ) -> Result<()> {
        let family = ActuatorFamily::from_type_name(type_name);
        let coefficients = match coefficients {
            Some(coefficients) => coefficients,
            None if family.needs_coefficients() => {
                return Err(CoreError::MissingCoefficients {
                    actuator: name.to_string(),
                    type_name: type_name.to_string(),
                });
            }
            None => Arc::new(ActuatorCoefficients::default()),
        };
        if self.actuators.contains_key(&address) {
            return Err(CoreError::DuplicateAddress {
                address,
                name: name.to_string(),
            });
        }
        self.claim_name(name, address)?;

        self.actuators.insert(
            address,
            Actuator {
                name: name.to_string(),
                address,
                type_name: type_name.to_string(),
                family,
                coefficients,
                command: Mutex::new(ActuatorCommand::default()),
                telemetry: Mutex::new(ActuatorTelemetry::new(filter)),
            },
        );
        Ok(())
    }

    /// Register an IMU by the identifier of its first sub-frame.
    pub fn insert_imu(&mut self, name: &str, base_id: u32) -> Result<()> {
        if self.imus.contains_key(&base_id) {
            return Err(CoreError::DuplicateAddress {
                address: base_id,
                name: name.to_string(),
            });
        }
        self.claim_name(name, base_id)?;
        self.imus.insert(
            base_id,
            Imu {
                name: name.to_string(),
                base_id,
                state: Mutex::new(ImuState::default()),
            },
        );
        Ok(())
    }

    /// Actuator registered at a bus address.
    pub fn actuator(&self, address: u32) -> Option<&Actuator> {
        self.actuators.get(&address)
    }

    /// Actuator registered under a name.
    pub fn actuator_by_name(&self, name: &str) -> Option<&Actuator> {
        self.names
            .get(name)
            .and_then(|address| self.actuators.get(address))
            .filter(|actuator| actuator.name == name)
    }

    /// All actuators in ascending address order.
    pub fn actuators(&self) -> impl Iterator<Item = &Actuator> {
        self.actuators.values()
    }

    /// IMU registered at a base identifier.
    pub fn imu(&self, base_id: u32) -> Option<&Imu> {
        self.imus.get(&base_id)
    }

    /// All IMUs in ascending base identifier order.
    pub fn imus(&self) -> impl Iterator<Item = &Imu> {
        self.imus.values()
    }

    /// Set the command of a named actuator.
    pub fn set_command(&self, name: &str, command: ActuatorCommand) -> Result<()> {
        let actuator = self
            .actuator_by_name(name)
            .ok_or_else(|| CoreError::UnknownActuator(name.to_string()))?;
        actuator.set_command(command);
        Ok(())
    }

    /// Snapshots of every actuator in address order.
    pub fn snapshot(&self) -> Vec<ActuatorSnapshot> {
        self.actuators().map(Actuator::snapshot).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.actuators.is_empty() && self.imus.is_empty()
    }

    fn claim_name(&mut self, name: &str, address: u32) -> Result<()> {
        if self.names.contains_key(name) {
            return Err(CoreError::DuplicateName(name.to_string()));
        }
        self.names.insert(name.to_string(), address);
        Ok(())
    }
}

/// Records hold plain values, so a panic elsewhere cannot leave one invalid.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::PassThrough;

    fn coeffs() -> Option<Arc<ActuatorCoefficients>> {
        Some(Arc::new(ActuatorCoefficients::default()))
    }

    fn filter() -> Box<dyn VelocityFilter> {
        Box::new(PassThrough::default())
    }

    #[test]
    fn insert_and_lookup() {
        let mut registry = Registry::new();
        registry
            .insert_actuator("yaw", 0x205, "rm_6020", coeffs(), filter())
            .unwrap();
        registry
            .insert_actuator("leg", 0x01, "cheetah", coeffs(), filter())
            .unwrap();
        registry.insert_imu("gimbal_imu", 0x100).unwrap();

        let yaw = registry.actuator(0x205).unwrap();
        assert_eq!(yaw.name(), "yaw");
        assert_eq!(yaw.family(), ActuatorFamily::SharedFrame);
        assert_eq!(
            registry.actuator_by_name("leg").unwrap().family(),
            ActuatorFamily::Addressed
        );
        assert_eq!(registry.imu(0x100).unwrap().name(), "gimbal_imu");
        assert!(registry.actuator_by_name("gimbal_imu").is_none());

        let addresses: Vec<u32> = registry.actuators().map(Actuator::address).collect();
        assert_eq!(addresses, vec![0x01, 0x205]);
    }

    #[test]
    fn missing_coefficients_rejected_for_known_family() {
        let mut registry = Registry::new();
        let err = registry
            .insert_actuator("yaw", 0x205, "rm_6020", None, filter())
            .unwrap_err();
        assert!(matches!(err, CoreError::MissingCoefficients { .. }));

        registry
            .insert_actuator("servo", 0x300, "dynamixel", None, filter())
            .unwrap();
        assert_eq!(
            registry.actuator(0x300).unwrap().family(),
            ActuatorFamily::Unknown
        );
    }

    #[test]
    fn duplicates_rejected() {
        let mut registry = Registry::new();
        registry
            .insert_actuator("a", 0x201, "rm_3508", coeffs(), filter())
            .unwrap();
        assert!(matches!(
            registry.insert_actuator("b", 0x201, "rm_3508", coeffs(), filter()),
            Err(CoreError::DuplicateAddress { address: 0x201, .. })
        ));
        assert!(matches!(
            registry.insert_actuator("a", 0x202, "rm_3508", coeffs(), filter()),
            Err(CoreError::DuplicateName(_))
        ));
        registry.insert_imu("imu", 0x100).unwrap();
        assert!(registry.insert_imu("imu2", 0x100).is_err());
    }

    #[test]
    fn commands_by_name() {
        let mut registry = Registry::new();
        registry
            .insert_actuator("a", 0x201, "rm_3508", coeffs(), filter())
            .unwrap();
        let command = ActuatorCommand {
            effort: 1.5,
            position: 0.0,
            velocity: -2.0,
        };
        registry.set_command("a", command).unwrap();
        assert_eq!(registry.actuator(0x201).unwrap().command(), command);
        assert!(matches!(
            registry.set_command("missing", command),
            Err(CoreError::UnknownActuator(_))
        ));
    }

    #[test]
    fn snapshot_reports_defaults() {
        let mut registry = Registry::new();
        registry
            .insert_actuator("a", 0x201, "rm_3508", coeffs(), filter())
            .unwrap();
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "a");
        assert_eq!(snapshot[0].sample_seq, 0);
        assert_eq!(snapshot[0].temp, 0.0);
    }

    #[test]
    fn registry_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Registry>();
    }

    #[test]
    fn concurrent_decode_never_exposes_partial_telemetry() {
        use std::sync::atomic::{AtomicBool, Ordering};

        use canfuse_frame::BusFrame;

        use crate::decoder::TelemetryDecoder;
        use crate::encoder::FrameEncoder;

        const FRAMES: u32 = 20_000;

        let mut registry = Registry::new();
        registry
            .insert_actuator(
                "m",
                0x201,
                "rm_3508",
                Some(Arc::new(ActuatorCoefficients {
                    act2pos: 1.0,
                    effort2act: 1.0,
                    max_out: 16384.0,
                    ..ActuatorCoefficients::default()
                })),
                filter(),
            )
            .unwrap();
        registry
            .set_command(
                "m",
                ActuatorCommand {
                    effort: 7.0,
                    ..ActuatorCommand::default()
                },
            )
            .unwrap();
        let registry = Arc::new(registry);
        let decoder = TelemetryDecoder::new("can0", Default::default());
        let encoder = FrameEncoder::default();
        let done = AtomicBool::new(false);

        // Frame k carries counter k mod 8191 and temperature k mod 100, so
        // every consistent record satisfies pos == sample_seq - 1.
        std::thread::scope(|scope| {
            scope.spawn(|| {
                for k in 0..FRAMES {
                    let [hi, lo] = ((k % 8191) as u16).to_be_bytes();
                    let frame = BusFrame::new(0x201, [hi, lo, 0, 0, 0, 0, (k % 100) as u8, 0]);
                    decoder.decode(&registry, &frame);
                }
                done.store(true, Ordering::Release);
            });

            scope.spawn(|| {
                let mut observed = 0u64;
                while !done.load(Ordering::Acquire) || observed == 0 {
                    let frames = encoder.encode(&registry);
                    assert_eq!(frames.len(), 1);
                    assert_eq!(frames[0].i16_be(0), 7);

                    let snapshot = registry.actuator(0x201).unwrap().snapshot();
                    if snapshot.sample_seq == 0 {
                        continue;
                    }
                    let k = snapshot.sample_seq - 1;
                    assert_eq!(snapshot.pos, k as f64);
                    assert_eq!(snapshot.revolution_count, (k / 8191) as i64);
                    assert_eq!(snapshot.temp, (k % 100) as f64);
                    observed += 1;
                }
            });
        });

        let last = registry.actuator(0x201).unwrap().snapshot();
        assert_eq!(last.sample_seq, u64::from(FRAMES));
        assert_eq!(last.pos, f64::from(FRAMES - 1));
    }
}
