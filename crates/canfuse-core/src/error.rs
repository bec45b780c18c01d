/// Errors raised while building or loading a bus registry.
///
/// Encoding and decoding never fail; their outcomes are plain values.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An actuator names a coefficient table that was never defined.
    #[error("actuator {actuator:?}: no coefficients for type {type_name:?}")]
    MissingCoefficients { actuator: String, type_name: String },

    /// Two actuators, or two IMUs, share a bus address.
    #[error("duplicate bus address {address:#x} ({name:?})")]
    DuplicateAddress { address: u32, name: String },

    /// Two records share a name.
    #[error("duplicate device name {0:?}")]
    DuplicateName(String),

    /// No actuator with the given name exists.
    #[error("unknown actuator {0:?}")]
    UnknownActuator(String),

    /// A filter specification is out of range.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// The configuration could not be read.
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    /// The configuration is not valid JSON for this schema.
    #[error("configuration is not valid: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
