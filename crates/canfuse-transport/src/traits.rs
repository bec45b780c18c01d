use std::fs::File;
use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// A bound bus stream implementing Read + Write.
///
/// This is the fundamental I/O type returned by transport operations.
/// On Linux, this wraps a SocketCAN raw socket descriptor. Reads and writes
/// move whole frames: the kernel never splits or merges them.
pub struct BusStream {
    inner: File,
    interface: String,
}

impl Read for BusStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for BusStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl BusStream {
    /// Wrap an already bound socket descriptor.
    #[cfg(target_os = "linux")]
    pub(crate) fn from_socket(socket: std::os::fd::OwnedFd, interface: &str) -> Self {
        Self {
            inner: File::from(socket),
            interface: interface.to_string(),
        }
    }

    /// Interface this stream is bound to.
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Set read timeout on the underlying socket.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.set_timeout(libc_opt::SO_RCVTIMEO, timeout)
    }

    /// Set write timeout on the underlying socket.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.set_timeout(libc_opt::SO_SNDTIMEO, timeout)
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            inner: self.inner.try_clone()?,
            interface: self.interface.clone(),
        })
    }

    #[cfg(unix)]
    fn set_timeout(&self, option: libc::c_int, timeout: Option<Duration>) -> Result<()> {
        use std::os::fd::AsRawFd;

        // A zero timeval means "block forever" to the kernel.
        let tv = match timeout {
            Some(duration) if duration.is_zero() => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "cannot set a zero duration timeout",
                )
                .into());
            }
            Some(duration) => libc::timeval {
                tv_sec: duration.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
                tv_usec: duration.subsec_micros() as libc::suseconds_t,
            },
            None => libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            },
        };

        // SAFETY: `tv` is a valid timeval for the duration of the call and the
        // descriptor is owned by `self.inner`.
        let rc = unsafe {
            libc::setsockopt(
                self.inner.as_raw_fd(),
                libc::SOL_SOCKET,
                option,
                (&tv as *const libc::timeval).cast::<libc::c_void>(),
                std::mem::size_of::<libc::timeval>() as libc::socklen_t,
            )
        };

        if rc == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error().into())
        }
    }

    #[cfg(not(unix))]
    fn set_timeout(&self, _option: i32, _timeout: Option<Duration>) -> Result<()> {
        Err(crate::error::TransportError::Unsupported)
    }
}

#[cfg(unix)]
mod libc_opt {
    pub const SO_RCVTIMEO: libc::c_int = libc::SO_RCVTIMEO;
    pub const SO_SNDTIMEO: libc::c_int = libc::SO_SNDTIMEO;
}

#[cfg(not(unix))]
mod libc_opt {
    pub const SO_RCVTIMEO: i32 = 0;
    pub const SO_SNDTIMEO: i32 = 1;
}

impl std::fmt::Debug for BusStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusStream")
            .field("type", &"socketcan")
            .field("interface", &self.interface)
            .finish()
    }
}
