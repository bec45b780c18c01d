//! Bus identifiers.
//!
//! Shared-frame actuators answer on `SHARED_BASE_ADDRESS + index` and take
//! their commands packed four to a frame on the two group identifiers.
//! Addressed actuators take commands on their own address and all answer
//! on the broadcast identifier with their address in byte 0.

/// Command frame carrying shared-frame actuators with logical index 0-3.
pub const SHARED_GROUP_0: u32 = 0x200;

/// Command frame carrying shared-frame actuators with logical index 4-7.
pub const SHARED_GROUP_1: u32 = 0x1FF;

/// Bus address of the shared-frame actuator with logical index 0.
pub const SHARED_BASE_ADDRESS: u32 = 0x201;

/// Number of actuator slots in one shared command frame.
pub const SHARED_SLOTS_PER_FRAME: usize = 4;

/// Telemetry identifier used by every addressed actuator.
pub const ADDRESSED_BROADCAST: u32 = 0x000;

/// Highest 11-bit identifier.
pub const STANDARD_ID_MAX: u32 = 0x7FF;

/// Mask of a 29-bit extended identifier.
pub const EXTENDED_ID_MASK: u32 = 0x1FFF_FFFF;

/// Returns a human-readable name for a well-known identifier.
pub fn id_name(id: u32) -> &'static str {
    match id {
        SHARED_GROUP_0 => "SHARED_GROUP_0",
        SHARED_GROUP_1 => "SHARED_GROUP_1",
        ADDRESSED_BROADCAST => "ADDRESSED_BROADCAST",
        _ => "DEVICE",
    }
}

/// Returns true if the identifier needs the 29-bit extended format.
pub fn is_extended(id: u32) -> bool {
    id > STANDARD_ID_MAX
}
