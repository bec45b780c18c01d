/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame declares more payload bytes than a classic CAN frame carries.
    #[error("invalid frame length ({dlc} bytes, max 8)")]
    InvalidLength { dlc: u8 },

    /// Remote-request and error frames carry no telemetry.
    #[error("unsupported {kind} frame (id {id:#x})")]
    UnsupportedFrame { kind: &'static str, id: u32 },

    /// A candump log line could not be parsed.
    #[error("candump line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
