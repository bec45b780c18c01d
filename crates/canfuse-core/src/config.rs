use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::coeff::{ActuatorCoefficients, ActuatorFamily};
use crate::decoder::{DecoderConfig, TelemetryDecoder};
use crate::encoder::{EncoderConfig, FrameEncoder};
use crate::error::{CoreError, Result};
use crate::filter::FilterSpec;
use crate::registry::Registry;

/// Largest configuration file accepted by [`BusConfig::from_path`].
pub const MAX_CONFIG_BYTES: usize = 1024 * 1024;

/// Deployment description of one bus.
///
/// ```json
/// {
///   "bus_name": "can0",
///   "actuator_coefficients": { "rm_3508": { "act2pos": 0.0007669, "max_out": 16384 } },
///   "actuators": [ { "name": "wheel", "address": "0x201", "type": "rm_3508" } ],
///   "imus": [ { "name": "gimbal_imu", "base_id": "0x100" } ]
/// }
/// ```
///
/// Identifiers may be written as numbers or as `0x`-prefixed hex strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    pub bus_name: String,
    #[serde(default)]
    pub actuator_coefficients: BTreeMap<String, ActuatorCoefficients>,
    #[serde(default)]
    pub actuators: Vec<ActuatorEntry>,
    #[serde(default)]
    pub imus: Vec<ImuEntry>,
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
}

/// One actuator instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActuatorEntry {
    pub name: String,
    #[serde(deserialize_with = "bus_id")]
    pub address: u32,
    /// Actuator type; selects the coefficient table and the protocol family.
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub filter: FilterSpec,
}

/// One IMU instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImuEntry {
    pub name: String,
    #[serde(deserialize_with = "bus_id")]
    pub base_id: u32,
}

impl BusConfig {
    /// Parse a configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|err| CoreError::LoadFailed(format!("{}: {err}", path.display())))?;

        let read_limit = u64::try_from(MAX_CONFIG_BYTES.saturating_add(1)).unwrap_or(u64::MAX);
        let mut content = String::new();
        file.take(read_limit)
            .read_to_string(&mut content)
            .map_err(|err| CoreError::LoadFailed(format!("{}: {err}", path.display())))?;
        if content.len() > MAX_CONFIG_BYTES {
            return Err(CoreError::LoadFailed(format!(
                "{}: larger than {MAX_CONFIG_BYTES} bytes",
                path.display()
            )));
        }

        debug!(path = %path.display(), bytes = content.len(), "loaded bus configuration");
        Self::from_json(&content)
    }

    /// Populate a fresh registry.
    ///
    /// Each actuator gets its own filter instance and shares its type's
    /// coefficient table. Fails on an unknown coefficient table for a
    /// shared-frame or addressed actuator, on a duplicate address or name,
    /// and on an invalid filter.
    pub fn build_registry(&self) -> Result<Registry> {
        let tables: BTreeMap<&str, Arc<ActuatorCoefficients>> = self
            .actuator_coefficients
            .iter()
            .map(|(type_name, coefficients)| (type_name.as_str(), Arc::new(*coefficients)))
            .collect();

        let mut registry = Registry::new();
        for entry in &self.actuators {
            let coefficients = tables.get(entry.type_name.as_str()).cloned();
            registry.insert_actuator(
                &entry.name,
                entry.address,
                &entry.type_name,
                coefficients,
                entry.filter.build()?,
            )?;
            debug!(
                actuator = %entry.name,
                address = format_args!("{:#x}", entry.address),
                family = ActuatorFamily::from_type_name(&entry.type_name).as_str(),
                "registered actuator"
            );
        }
        for entry in &self.imus {
            registry.insert_imu(&entry.name, entry.base_id)?;
        }
        Ok(registry)
    }

    pub fn encoder(&self) -> FrameEncoder {
        FrameEncoder::new(self.encoder)
    }

    pub fn decoder(&self) -> TelemetryDecoder {
        TelemetryDecoder::new(self.bus_name.clone(), self.decoder)
    }
}

fn bus_id<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u32),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => parse_bus_id(&text).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid bus identifier {text:?}"))
        }),
    }
}

/// Parse `0x1ff`, `0X1FF` or plain decimal.
pub fn parse_bus_id(text: &str) -> Option<u32> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ActuatorCommand;

    const CONFIG: &str = r#"{
        "bus_name": "can1",
        "actuator_coefficients": {
            "rm_3508": { "act2pos": 0.0007669903, "act2vel": 0.10472, "act2effort": 0.0018311,
                         "effort2act": 546.13, "max_out": 16384 },
            "cheetah": { "act2pos": 0.0003835, "act2pos_offset": -12.566 }
        },
        "actuators": [
            { "name": "left_wheel", "address": "0x201", "type": "rm_3508" },
            { "name": "right_wheel", "address": 514, "type": "rm_3508",
              "filter": { "kind": "butterworth", "cutoff_hz": 100, "sample_rate_hz": 1000 } },
            { "name": "knee", "address": "0x1", "type": "cheetah" }
        ],
        "imus": [ { "name": "gimbal_imu", "base_id": "0x100" } ],
        "encoder": { "max_temperature": 80 }
    }"#;

    #[test]
    fn parses_full_document() {
        let config = BusConfig::from_json(CONFIG).unwrap();
        assert_eq!(config.bus_name, "can1");
        assert_eq!(config.actuators.len(), 3);
        assert_eq!(config.actuators[0].address, 0x201);
        assert_eq!(config.actuators[1].address, 0x202);
        assert_eq!(config.imus[0].base_id, 0x100);
        assert_eq!(config.encoder.max_temperature, 80.0);
        assert_eq!(config.decoder, DecoderConfig::default());
        assert_eq!(config.actuator_coefficients["rm_3508"].max_out, 16384.0);
        assert_eq!(config.actuator_coefficients["cheetah"].effort2act, 0.0);
    }

    #[test]
    fn builds_registry() {
        let registry = BusConfig::from_json(CONFIG)
            .unwrap()
            .build_registry()
            .unwrap();
        assert_eq!(
            registry.actuator(0x202).unwrap().family(),
            ActuatorFamily::SharedFrame
        );
        assert_eq!(
            registry.actuator_by_name("knee").unwrap().family(),
            ActuatorFamily::Addressed
        );
        assert_eq!(registry.imu(0x100).unwrap().name(), "gimbal_imu");
        assert_eq!(
            registry.actuator(0x201).unwrap().coefficients().effort2act,
            546.13
        );
    }

    #[test]
    fn encoder_and_decoder_follow_config() {
        let config = BusConfig::from_json(CONFIG).unwrap();
        let registry = config.build_registry().unwrap();
        registry
            .set_command(
                "left_wheel",
                ActuatorCommand {
                    effort: 1.0,
                    ..ActuatorCommand::default()
                },
            )
            .unwrap();

        let frames = config.encoder().encode(&registry);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].id, 0x1);
        assert_eq!(frames[1].i16_be(0), 546);
        assert_eq!(config.encoder().config().max_temperature, 80.0);
        assert_eq!(config.decoder().bus_name(), "can1");
    }

    #[test]
    fn missing_coefficient_table_fails() {
        let config = BusConfig::from_json(
            r#"{ "bus_name": "can0",
                 "actuators": [ { "name": "m", "address": 513, "type": "rm_2006" } ] }"#,
        )
        .unwrap();
        assert!(matches!(
            config.build_registry(),
            Err(CoreError::MissingCoefficients { .. })
        ));
    }

    #[test]
    fn unknown_type_needs_no_table() {
        let config = BusConfig::from_json(
            r#"{ "bus_name": "can0",
                 "actuators": [ { "name": "servo", "address": 768, "type": "dynamixel" } ] }"#,
        )
        .unwrap();
        let registry = config.build_registry().unwrap();
        assert_eq!(
            registry.actuator(768).unwrap().family(),
            ActuatorFamily::Unknown
        );
    }

    #[test]
    fn duplicate_address_fails() {
        let config = BusConfig::from_json(
            r#"{ "bus_name": "can0",
                 "actuator_coefficients": { "rm_3508": {} },
                 "actuators": [
                    { "name": "a", "address": "0x201", "type": "rm_3508" },
                    { "name": "b", "address": 513, "type": "rm_3508" } ] }"#,
        )
        .unwrap();
        assert!(matches!(
            config.build_registry(),
            Err(CoreError::DuplicateAddress { address: 0x201, .. })
        ));
    }

    #[test]
    fn invalid_filter_fails() {
        let config = BusConfig::from_json(
            r#"{ "bus_name": "can0",
                 "actuator_coefficients": { "rm_3508": {} },
                 "actuators": [ { "name": "a", "address": 513, "type": "rm_3508",
                    "filter": { "kind": "butterworth", "cutoff_hz": 900, "sample_rate_hz": 1000 } } ] }"#,
        )
        .unwrap();
        assert!(matches!(
            config.build_registry(),
            Err(CoreError::InvalidFilter(_))
        ));
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(matches!(
            BusConfig::from_json("{"),
            Err(CoreError::InvalidJson(_))
        ));
        assert!(BusConfig::from_json(r#"{ "bus_name": "can0", "bogus": 1 }"#).is_err());
        assert!(BusConfig::from_json(
            r#"{ "bus_name": "can0", "imus": [ { "name": "i", "base_id": "0xZZ" } ] }"#
        )
        .is_err());
    }

    #[test]
    fn bus_id_forms() {
        assert_eq!(parse_bus_id("0x1FF"), Some(0x1FF));
        assert_eq!(parse_bus_id("0X200"), Some(0x200));
        assert_eq!(parse_bus_id(" 513 "), Some(513));
        assert_eq!(parse_bus_id("0x"), None);
        assert_eq!(parse_bus_id("can"), None);
    }

    #[test]
    fn from_path_reports_missing_file() {
        let err = BusConfig::from_path(Path::new("/nonexistent/canfuse.json")).unwrap_err();
        assert!(matches!(err, CoreError::LoadFailed(_)));
    }

    #[test]
    fn from_path_reads_file() {
        let path = std::env::temp_dir().join(format!("canfuse-config-{}.json", std::process::id()));
        std::fs::write(&path, CONFIG).unwrap();
        let config = BusConfig::from_path(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.imus.len(), 1);
    }
}
