//! Device handles for address-space tracking.
//!
//! Buffers in a column batch are tagged with the device that owns them so the
//! save path can force everything onto the CPU before serialization. The
//! actual accelerator allocator sits below this crate; here a handle is the
//! identity `(device_type, device_id)` used to decide whether a copy crosses
//! an address space.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of memory space a buffer lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    Cpu,
    Gpu,
}

/// Identity of a memory space: a device type plus an ordinal for
/// machines with multiple accelerators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceHandle {
    pub device_type: DeviceType,
    pub device_id: i32,
}

/// The host address space. CPU buffers all share one space regardless of
/// socket, so the id is always zero.
pub const CPU_DEVICE: DeviceHandle = DeviceHandle {
    device_type: DeviceType::Cpu,
    device_id: 0,
};

impl DeviceHandle {
    pub fn gpu(device_id: i32) -> Self {
        Self {
            device_type: DeviceType::Gpu,
            device_id,
        }
    }

    #[inline]
    pub fn is_cpu(&self) -> bool {
        self.device_type == DeviceType::Cpu
    }

    /// True when a copy between the two handles stays within one address
    /// space and can be elided.
    #[inline]
    pub fn same_address_space(&self, other: &DeviceHandle) -> bool {
        match (self.device_type, other.device_type) {
            (DeviceType::Cpu, DeviceType::Cpu) => true,
            _ => self == other,
        }
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.device_type {
            DeviceType::Cpu => write!(f, "cpu"),
            DeviceType::Gpu => write!(f, "gpu:{}", self.device_id),
        }
    }
}
