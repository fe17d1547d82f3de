use async_trait::async_trait;
use super::types::{DeviceDescriptor, DeviceHandle, PropertyResult};

/// Asynchronous access to the controlled audio interfaces.
///
/// Every call may block on hardware I/O, so callers await them off the panel's
/// owner task. Handles passed in must come from a descriptor this source produced.
#[async_trait]
pub trait DevicePropertySource: Send + Sync {
    /// Enumerate controlled devices. An enumeration failure yields an empty list.
    async fn enumerate(&self) -> Vec<DeviceDescriptor>;

    /// Live sample rate of the device
    async fn sample_rate(&self, handle: &DeviceHandle) -> PropertyResult<u32>;

    /// Request a new sample rate
    async fn set_sample_rate(&self, handle: &DeviceHandle, rate: u32) -> PropertyResult<()>;

    /// ASIO buffer size in frames at the 1x coefficient
    async fn buffer_size(&self, handle: &DeviceHandle) -> PropertyResult<u32>;

    /// Request a new buffer size in frames at the 1x coefficient
    async fn set_buffer_size(&self, handle: &DeviceHandle, frames: u32) -> PropertyResult<()>;

    /// Path of the device the driver currently designates for ASIO
    async fn asio_device_path(&self, handle: &DeviceHandle) -> PropertyResult<String>;

    /// Designate the device at `path` for ASIO (driver-wide)
    async fn set_asio_device_path(&self, handle: &DeviceHandle, path: &str) -> PropertyResult<()>;
}
