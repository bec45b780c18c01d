/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] canfuse_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] canfuse_frame::FrameError),

    /// Registry or configuration error.
    #[error(transparent)]
    Core(#[from] canfuse_core::CoreError),

    /// The bus could not be opened within the configured number of attempts.
    #[error("gave up opening the bus after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: canfuse_transport::TransportError,
    },

    /// Stopped before the bus was opened.
    #[error("cancelled before the bus was opened")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, SessionError>;
