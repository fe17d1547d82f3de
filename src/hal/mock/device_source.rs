use crate::hal::{DeviceDescriptor, DeviceHandle, DevicePropertySource, PropertyError, PropertyKind, PropertyResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tokio::time::{sleep, Duration};

/// Buffer size reported when a device's ASIO buffer size cannot be read
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Configuration of one simulated audio interface
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedDevice {
    pub path: String,
    pub name: String,
    pub supported_rates: u32,
    pub sample_rate: u32,
    pub buffer_size: u32,
    pub input_channels: u32,
    pub output_channels: u32,
}

impl SimulatedDevice {
    /// Stereo in/out interface supporting 44.1 kHz and 48 kHz, running at 48 kHz / 256 frames
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            supported_rates: 0x18,
            sample_rate: 48000,
            buffer_size: 256,
            input_channels: 2,
            output_channels: 2,
        }
    }

    pub fn with_rates(mut self, supported_rates: u32) -> Self {
        self.supported_rates = supported_rates;
        self
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn with_buffer_size(mut self, frames: u32) -> Self {
        self.buffer_size = frames;
        self
    }

    pub fn with_channels(mut self, inputs: u32, outputs: u32) -> Self {
        self.input_channels = inputs;
        self.output_channels = outputs;
        self
    }
}

/// A setter call observed by the simulated source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    SampleRate { path: String, rate: u32 },
    BufferSize { path: String, frames: u32 },
    AsioDevicePath { path: String, asio_path: String },
}

impl WriteOp {
    /// Path of the device whose handle received the write
    pub fn device_path(&self) -> &str {
        match self {
            WriteOp::SampleRate { path, .. }
            | WriteOp::BufferSize { path, .. }
            | WriteOp::AsioDevicePath { path, .. } => path,
        }
    }
}

struct Inner {
    devices: Vec<SimulatedDevice>,
    handles: HashMap<u64, String>,
    next_token: u64,
    asio_device_path: String,
    failing_reads: HashSet<String>,
    failing_writes: HashSet<String>,
    enumeration_fails: bool,
    enumerations: usize,
    journal: Vec<WriteOp>,
}

impl Inner {
    fn resolve(&self, handle: &DeviceHandle, kind: PropertyKind) -> PropertyResult<usize> {
        let path = self
            .handles
            .get(&handle.as_raw())
            .ok_or(PropertyError::InvalidHandle(kind))?;

        self.devices
            .iter()
            .position(|d| &d.path == path)
            .ok_or(PropertyError::InvalidHandle(kind))
    }

    fn readable(&self, handle: &DeviceHandle, kind: PropertyKind) -> PropertyResult<usize> {
        let pos = self.resolve(handle, kind)?;
        if self.failing_reads.contains(&self.devices[pos].path) {
            return Err(PropertyError::Rejected(kind));
        }
        Ok(pos)
    }

    fn writable(&self, handle: &DeviceHandle, kind: PropertyKind) -> PropertyResult<usize> {
        let pos = self.resolve(handle, kind)?;
        if self.failing_writes.contains(&self.devices[pos].path) {
            return Err(PropertyError::Rejected(kind));
        }
        Ok(pos)
    }
}

/// In-memory [`DevicePropertySource`] used by tests and the demo binary.
///
/// Devices can be plugged and unplugged, reconfigured behind the panel's back,
/// and made to fail reads or writes. Every setter call is journaled in order,
/// including rejected ones. Only handles from the latest successful
/// enumeration are valid.
pub struct SimulatedPropertySource {
    inner: Mutex<Inner>,
    latency: Duration,
}

impl SimulatedPropertySource {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                devices: Vec::new(),
                handles: HashMap::new(),
                next_token: 1,
                asio_device_path: String::new(),
                failing_reads: HashSet::new(),
                failing_writes: HashSet::new(),
                enumeration_fails: false,
                enumerations: 0,
                journal: Vec::new(),
            }),
            latency: Duration::ZERO,
        }
    }

    pub fn with_devices(devices: impl IntoIterator<Item = SimulatedDevice>) -> Self {
        let source = Self::new();
        for device in devices {
            source.plug(device);
        }
        source
    }

    /// Delay every call by `latency` to simulate blocking hardware I/O
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Connect a device. A device with an already known path replaces it.
    pub fn plug(&self, device: SimulatedDevice) {
        let mut inner = self.inner.lock();
        match inner.devices.iter().position(|d| d.path == device.path) {
            Some(pos) => inner.devices[pos] = device,
            None => inner.devices.push(device),
        }
    }

    /// Disconnect a device; handles issued for it become invalid.
    pub fn unplug(&self, path: &str) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.devices.len();
        inner.devices.retain(|d| d.path != path);
        inner.handles.retain(|_, p| p != path);
        inner.devices.len() != before
    }

    /// Change a device's sample rate out of band, as another application would
    pub fn set_external_sample_rate(&self, path: &str, rate: u32) -> bool {
        let mut inner = self.inner.lock();
        match inner.devices.iter_mut().find(|d| d.path == path) {
            Some(device) => {
                device.sample_rate = rate;
                true
            }
            None => false,
        }
    }

    /// Set the driver's designated ASIO device path
    pub fn set_designated_path(&self, path: impl Into<String>) {
        self.inner.lock().asio_device_path = path.into();
    }

    pub fn designated_path(&self) -> String {
        self.inner.lock().asio_device_path.clone()
    }

    pub fn fail_reads(&self, path: &str, fail: bool) {
        let mut inner = self.inner.lock();
        if fail {
            inner.failing_reads.insert(path.to_string());
        } else {
            inner.failing_reads.remove(path);
        }
    }

    pub fn fail_writes(&self, path: &str, fail: bool) {
        let mut inner = self.inner.lock();
        if fail {
            inner.failing_writes.insert(path.to_string());
        } else {
            inner.failing_writes.remove(path);
        }
    }

    /// Make enumeration report no devices
    pub fn fail_enumeration(&self, fail: bool) {
        self.inner.lock().enumeration_fails = fail;
    }

    pub fn device(&self, path: &str) -> Option<SimulatedDevice> {
        self.inner.lock().devices.iter().find(|d| d.path == path).cloned()
    }

    pub fn enumeration_count(&self) -> usize {
        self.inner.lock().enumerations
    }

    pub fn journal(&self) -> Vec<WriteOp> {
        self.inner.lock().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.inner.lock().journal.clear();
    }

    async fn io_delay(&self) {
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }
    }
}

impl Default for SimulatedPropertySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DevicePropertySource for SimulatedPropertySource {
    async fn enumerate(&self) -> Vec<DeviceDescriptor> {
        self.io_delay().await;

        let mut inner = self.inner.lock();
        inner.enumerations += 1;

        if inner.enumeration_fails {
            return Vec::new();
        }

        // Handles from the previous enumeration are revoked
        inner.handles.clear();

        let controlled: Vec<SimulatedDevice> = inner
            .devices
            .iter()
            .filter(|d| d.input_channels != 0 || d.output_channels != 0)
            .cloned()
            .collect();

        let mut results = Vec::with_capacity(controlled.len());
        for (index, device) in controlled.into_iter().enumerate() {
            let token = inner.next_token;
            inner.next_token += 1;
            inner.handles.insert(token, device.path.clone());

            let buffer_size = if inner.failing_reads.contains(&device.path) {
                DEFAULT_BUFFER_SIZE
            } else {
                device.buffer_size
            };

            results.push(DeviceDescriptor {
                index,
                path: device.path,
                name: device.name,
                handle: DeviceHandle::from_raw(token),
                supported_rates: device.supported_rates,
                sample_rate: device.sample_rate,
                buffer_size,
            });
        }

        results
    }

    async fn sample_rate(&self, handle: &DeviceHandle) -> PropertyResult<u32> {
        self.io_delay().await;

        let inner = self.inner.lock();
        let pos = inner.readable(handle, PropertyKind::SampleRate)?;
        Ok(inner.devices[pos].sample_rate)
    }

    async fn set_sample_rate(&self, handle: &DeviceHandle, rate: u32) -> PropertyResult<()> {
        self.io_delay().await;

        let mut inner = self.inner.lock();
        let pos = inner.resolve(handle, PropertyKind::SampleRate)?;
        let path = inner.devices[pos].path.clone();
        inner.journal.push(WriteOp::SampleRate { path, rate });

        inner.writable(handle, PropertyKind::SampleRate)?;
        inner.devices[pos].sample_rate = rate;
        Ok(())
    }

    async fn buffer_size(&self, handle: &DeviceHandle) -> PropertyResult<u32> {
        self.io_delay().await;

        let inner = self.inner.lock();
        let pos = inner.readable(handle, PropertyKind::BufferSize)?;
        Ok(inner.devices[pos].buffer_size)
    }

    async fn set_buffer_size(&self, handle: &DeviceHandle, frames: u32) -> PropertyResult<()> {
        self.io_delay().await;

        let mut inner = self.inner.lock();
        let pos = inner.resolve(handle, PropertyKind::BufferSize)?;
        let path = inner.devices[pos].path.clone();
        inner.journal.push(WriteOp::BufferSize { path, frames });

        inner.writable(handle, PropertyKind::BufferSize)?;
        inner.devices[pos].buffer_size = frames;
        Ok(())
    }

    async fn asio_device_path(&self, handle: &DeviceHandle) -> PropertyResult<String> {
        self.io_delay().await;

        let inner = self.inner.lock();
        inner.readable(handle, PropertyKind::AsioDevicePath)?;
        Ok(inner.asio_device_path.clone())
    }

    async fn set_asio_device_path(&self, handle: &DeviceHandle, path: &str) -> PropertyResult<()> {
        self.io_delay().await;

        let mut inner = self.inner.lock();
        let pos = inner.resolve(handle, PropertyKind::AsioDevicePath)?;
        let device_path = inner.devices[pos].path.clone();
        inner.journal.push(WriteOp::AsioDevicePath {
            path: device_path,
            asio_path: path.to_string(),
        });

        inner.writable(handle, PropertyKind::AsioDevicePath)?;
        inner.asio_device_path = path.to_string();
        Ok(())
    }
}
