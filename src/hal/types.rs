use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Opaque capability token issued by a [`DevicePropertySource`](super::DevicePropertySource).
///
/// Only the source that issued a handle knows what its bits mean. A handle is
/// owned by exactly one [`DeviceDescriptor`] and is never shared or cloned.
#[derive(PartialEq, Eq, Hash)]
pub struct DeviceHandle(u64);

impl DeviceHandle {
    /// Wrap a source-specific token.
    pub fn from_raw(token: u64) -> Self {
        Self(token)
    }

    /// Token as understood by the issuing source.
    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceHandle({:#x})", self.0)
    }
}

/// Snapshot of one controlled audio interface, produced by enumeration.
///
/// Descriptors are never mutated; a re-enumeration supersedes the whole list.
#[derive(Debug)]
pub struct DeviceDescriptor {
    /// Position among the controlled devices in the enumeration that produced it
    pub index: usize,
    /// Stable device interface path
    pub path: String,
    pub name: String,
    pub handle: DeviceHandle,
    /// Bit `n` set means the n-th entry of the standard rate universe is supported
    pub supported_rates: u32,
    pub sample_rate: u32,
    /// Buffer size in frames at the 1x coefficient
    pub buffer_size: u32,
}

/// Two snapshots describe the same hardware state when index, path, current
/// rate and buffer size agree. Names, capability masks and handles are ignored.
impl PartialEq for DeviceDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.path == other.path
            && self.sample_rate == other.sample_rate
            && self.buffer_size == other.buffer_size
    }
}

impl Eq for DeviceDescriptor {}

/// Shared, immutable enumeration result.
pub type Devices = Arc<[DeviceDescriptor]>;

/// Device property addressed by a get/set call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    SampleRate,
    BufferSize,
    AsioDevicePath,
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyKind::SampleRate => "sample rate",
            PropertyKind::BufferSize => "buffer size",
            PropertyKind::AsioDevicePath => "ASIO device path",
        };
        f.write_str(name)
    }
}

/// Failure status of a single property call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    #[error("device refused {0} request")]
    Rejected(PropertyKind),

    #[error("device handle is no longer valid ({0} request)")]
    InvalidHandle(PropertyKind),
}

impl PropertyError {
    pub fn property(&self) -> PropertyKind {
        match self {
            PropertyError::Rejected(kind) | PropertyError::InvalidHandle(kind) => *kind,
        }
    }
}

pub type PropertyResult<T> = Result<T, PropertyError>;
