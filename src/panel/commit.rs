use log::{info, warn};

use crate::hal::{DeviceDescriptor, DevicePropertySource, Devices, PropertyKind, PropertyResult};
use super::engine::ReconciliationEngine;

/// Values to push to hardware, captured on the owner task when the user confirms
#[derive(Debug, Clone)]
pub struct CommitPlan {
    pub devices: Devices,
    /// Index of the device that becomes the ASIO device
    pub selected: usize,
    pub device_path: String,
    pub sample_rate: u32,
    /// Buffer size in frames at the 1x coefficient
    pub buffer_size: u32,
}

impl CommitPlan {
    /// `None` when no real device is selected.
    ///
    /// An unlisted or unselected rate commits the device's own rate; an
    /// unselected buffer size commits the device's own size.
    pub fn capture(engine: &ReconciliationEngine) -> Option<Self> {
        let selected = engine.selection().device?;
        let device = engine.selected_device()?;

        let sample_rate = engine.selected_sample_rate().unwrap_or(device.sample_rate);
        let coefficient = engine.buffer_coefficient().unwrap_or(1);
        let buffer_size = engine
            .selected_buffer_size()
            .map(|size| size / coefficient)
            .unwrap_or(device.buffer_size);

        Some(Self {
            devices: engine.devices().clone(),
            selected,
            device_path: device.path.clone(),
            sample_rate,
            buffer_size,
        })
    }
}

/// Result of one property write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub device_index: usize,
    pub path: String,
    pub property: PropertyKind,
    pub result: PropertyResult<()>,
}

/// Every write attempted by a commit, in issue order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub writes: Vec<WriteOutcome>,
}

impl CommitReport {
    pub fn is_clean(&self) -> bool {
        self.writes.iter().all(|w| w.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &WriteOutcome> {
        self.writes.iter().filter(|w| w.result.is_err())
    }

    /// Paths of devices with at least one failed write, in issue order
    pub fn failed_devices(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = Vec::new();
        for write in self.failures() {
            if !paths.contains(&write.path.as_str()) {
                paths.push(&write.path);
            }
        }
        paths
    }

    fn record(&mut self, device_index: usize, device: &DeviceDescriptor, property: PropertyKind, result: PropertyResult<()>) {
        if let Err(e) = &result {
            warn!("commit: writing {} to {} failed: {}", property, device.path, e);
        }
        self.writes.push(WriteOutcome {
            device_index,
            path: device.path.clone(),
            property,
            result,
        });
    }
}

/// Push the plan to hardware.
///
/// The selected device receives path, rate, then buffer size. Every other
/// device gets its own current rate and buffer size written back. Writes are
/// independent: a failure is recorded and the pass continues.
pub async fn execute(plan: &CommitPlan, source: &dyn DevicePropertySource) -> CommitReport {
    let mut report = CommitReport::default();

    let Some(selected) = plan.devices.get(plan.selected) else {
        warn!("commit: selected index {} outside {} device(s)", plan.selected, plan.devices.len());
        return report;
    };

    info!(
        "commit: {} at {} Hz, {} frames",
        plan.device_path, plan.sample_rate, plan.buffer_size
    );

    let result = source.set_asio_device_path(&selected.handle, &plan.device_path).await;
    report.record(plan.selected, selected, PropertyKind::AsioDevicePath, result);

    let result = source.set_sample_rate(&selected.handle, plan.sample_rate).await;
    report.record(plan.selected, selected, PropertyKind::SampleRate, result);

    let result = source.set_buffer_size(&selected.handle, plan.buffer_size).await;
    report.record(plan.selected, selected, PropertyKind::BufferSize, result);

    for (index, device) in plan.devices.iter().enumerate() {
        if index == plan.selected {
            continue;
        }

        info!("commit: re-asserting {}", device.path);

        let result = source.set_sample_rate(&device.handle, device.sample_rate).await;
        report.record(index, device, PropertyKind::SampleRate, result);

        let result = source.set_buffer_size(&device.handle, device.buffer_size).await;
        report.record(index, device, PropertyKind::BufferSize, result);
    }

    info!("commit finished: {} write(s), {} failed", report.writes.len(), report.failures().count());
    report
}
