/// Errors that can occur in bus transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The interface name cannot be used with SocketCAN.
    #[error("invalid interface name {name:?}: {reason}")]
    InvalidInterface { name: String, reason: &'static str },

    /// Failed to open or bind the raw socket on the named interface.
    #[error("failed to open {interface}: {source}")]
    Open {
        interface: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on the bus stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The platform has no raw CAN socket support.
    #[error("raw CAN sockets are not supported on this platform")]
    Unsupported,
}

pub type Result<T> = std::result::Result<T, TransportError>;
