use serde::{Deserialize, Serialize};

/// Scale/offset pairs between raw bus units and physical units, per actuator type.
///
/// `*2act` factors convert physical commands to raw units, `act2*` factors
/// and offsets convert raw telemetry back. Fields missing from a
/// configuration default to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActuatorCoefficients {
    pub effort2act: f64,
    pub act2effort: f64,
    pub act2effort_offset: f64,
    pub pos2act: f64,
    pub act2pos: f64,
    pub act2pos_offset: f64,
    pub vel2act: f64,
    pub act2vel: f64,
    pub act2vel_offset: f64,
    /// Saturation bound for the raw effort command.
    pub max_out: f64,
}

/// Protocol family of an actuator, resolved once from its type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorFamily {
    /// Commands share a frame four at a time; telemetry is a wrapping 13-bit counter.
    SharedFrame,
    /// One command frame per actuator; telemetry arrives on the broadcast identifier.
    Addressed,
    /// Registered but neither encoded nor decoded.
    Unknown,
}

impl ActuatorFamily {
    /// Resolve the family from an actuator type name such as `rm_3508` or `cheetah`.
    ///
    /// The shared-frame marker is checked first.
    pub fn from_type_name(type_name: &str) -> Self {
        if type_name.contains("rm") {
            Self::SharedFrame
        } else if type_name.contains("cheetah") {
            Self::Addressed
        } else {
            Self::Unknown
        }
    }

    /// Whether actuators of this family need a coefficient table.
    pub fn needs_coefficients(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SharedFrame => "shared_frame",
            Self::Addressed => "addressed",
            Self::Unknown => "unknown",
        }
    }
}
