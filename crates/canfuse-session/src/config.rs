use std::time::Duration;

use canfuse_frame::FrameConfig;

/// Controls how a session opens and drives the bus.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// SocketCAN interface name.
    pub interface: String,
    /// Wait between failed open attempts.
    pub retry_interval: Duration,
    /// Give up after this many failed attempts. `None` retries until stopped.
    pub max_attempts: Option<u32>,
    /// Read and write timeouts. The read timeout bounds how long a receive
    /// loop takes to notice it was stopped.
    pub frame: FrameConfig,
}

impl SessionConfig {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            ..Self::default()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            interface: "can0".to_string(),
            retry_interval: Duration::from_millis(500),
            max_attempts: None,
            frame: FrameConfig {
                read_timeout: Some(Duration::from_millis(100)),
                write_timeout: Some(Duration::from_millis(100)),
            },
        }
    }
}
