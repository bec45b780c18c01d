use std::ffi::CString;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::BusStream;

/// SocketCAN raw socket transport.
///
/// Binds a `CAN_RAW` socket to one network interface (`can0`, `vcan0`, ...).
/// The socket receives every frame on the bus, including frames sent by other
/// sockets on this host.
pub struct CanSocket;

impl CanSocket {
    /// Maximum interface name length, excluding the trailing NUL.
    const MAX_NAME_LEN: usize = libc::IFNAMSIZ - 1;

    /// Open and bind a raw CAN socket on `interface` (blocking I/O).
    pub fn open(interface: &str) -> Result<BusStream> {
        if interface.is_empty() {
            return Err(TransportError::InvalidInterface {
                name: interface.to_string(),
                reason: "name is empty",
            });
        }
        if interface.len() > Self::MAX_NAME_LEN {
            return Err(TransportError::InvalidInterface {
                name: interface.to_string(),
                reason: "name exceeds IFNAMSIZ",
            });
        }
        let c_name = CString::new(interface).map_err(|_| TransportError::InvalidInterface {
            name: interface.to_string(),
            reason: "name contains a NUL byte",
        })?;

        // SAFETY: `c_name` is a valid NUL-terminated string for the duration of the call.
        let ifindex = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
        if ifindex == 0 {
            return Err(open_error(interface));
        }

        // SAFETY: plain syscall with constant arguments; the result is checked below.
        let raw = unsafe {
            libc::socket(
                libc::PF_CAN,
                libc::SOCK_RAW | libc::SOCK_CLOEXEC,
                libc::CAN_RAW,
            )
        };
        if raw < 0 {
            return Err(open_error(interface));
        }
        // SAFETY: `raw` is a freshly created descriptor that nothing else owns.
        let socket = unsafe { OwnedFd::from_raw_fd(raw) };

        // SAFETY: sockaddr_can is a plain C struct for which all-zero is a valid value.
        let mut addr: libc::sockaddr_can = unsafe { std::mem::zeroed() };
        addr.can_family = libc::AF_CAN as libc::sa_family_t;
        addr.can_ifindex = ifindex as libc::c_int;

        // SAFETY: `addr` is a valid sockaddr_can and the length matches its size.
        let rc = unsafe {
            libc::bind(
                socket.as_raw_fd(),
                (&addr as *const libc::sockaddr_can).cast::<libc::sockaddr>(),
                std::mem::size_of::<libc::sockaddr_can>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            return Err(open_error(interface));
        }

        debug!(interface, ifindex, "bound raw CAN socket");
        info!(interface, "opened CAN interface");
        Ok(BusStream::from_socket(socket, interface))
    }

    /// Transport name for diagnostics.
    pub fn transport_name() -> &'static str {
        "socketcan-raw"
    }
}

fn open_error(interface: &str) -> TransportError {
    TransportError::Open {
        interface: interface.to_string(),
        source: std::io::Error::last_os_error(),
    }
}
