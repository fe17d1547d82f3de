//! Device-change and sample-rate drift detection.
//!
//! Both detectors run off the owner task. They enumerate and plan the request
//! the owner task will reconcile; they never touch the selection state
//! themselves. The owner makes the final no-change decision against what it
//! displays when the request arrives.

use log::{debug, info, warn};
use std::sync::Arc;

use crate::hal::{DeviceDescriptor, DevicePropertySource, Devices};
use super::engine::{BufferRebuild, ReconcileRequest};

/// What the presentation layer currently shows, captured on the owner task
#[derive(Debug, Clone)]
pub struct Displayed {
    pub devices: Devices,
    pub selected: Option<usize>,
}

impl Displayed {
    pub fn selected_device(&self) -> Option<&DeviceDescriptor> {
        self.selected.and_then(|i| self.devices.get(i))
    }
}

/// Driver's designated ASIO device path, read through the first device.
/// Any failure means "no preference".
pub async fn designated_path(source: &dyn DevicePropertySource, devices: &[DeviceDescriptor]) -> String {
    let Some(first) = devices.first() else {
        return String::new();
    };

    match source.asio_device_path(&first.handle).await {
        Ok(path) => path,
        Err(e) => {
            warn!("reading designated ASIO device path failed: {}", e);
            String::new()
        }
    }
}

/// Handle an OS device-change notification.
pub async fn on_device_changed(
    source: &dyn DevicePropertySource,
    displayed: &Displayed,
) -> ReconcileRequest {
    debug!(
        "device change: {} displayed device(s), selected {:?}",
        displayed.devices.len(),
        displayed.selected
    );

    let fresh = source.enumerate().await;
    plan(source, displayed, fresh).await
}

/// Poll the selected device's live sample rate; any drift forces a full
/// re-enumeration.
pub async fn poll_sample_rate(
    source: &dyn DevicePropertySource,
    displayed: &Displayed,
) -> Option<ReconcileRequest> {
    let device = displayed.selected_device()?;

    match source.sample_rate(&device.handle).await {
        Ok(rate) if rate != device.sample_rate => {
            info!(
                "sample rate of {} drifted: {} -> {}",
                device.path, device.sample_rate, rate
            );
            let fresh = source.enumerate().await;
            Some(plan(source, displayed, fresh).await)
        }
        Ok(_) => None,
        Err(e) => {
            debug!("poll of {} failed: {}", device.path, e);
            None
        }
    }
}

async fn plan(
    source: &dyn DevicePropertySource,
    displayed: &Displayed,
    fresh: Vec<DeviceDescriptor>,
) -> ReconcileRequest {
    let unchanged = displayed.devices[..] == fresh[..];
    if unchanged {
        debug!("no change in device information");
    }

    let (preferred_path, buffer_rebuild) = match displayed.selected_device() {
        Some(device) => (device.path.clone(), BufferRebuild::Preserve),
        None if unchanged => (String::new(), BufferRebuild::Search),
        None => {
            debug!("device change: no device selected");
            (designated_path(source, &fresh).await, BufferRebuild::Search)
        }
    };

    ReconcileRequest {
        devices: Arc::from(fresh),
        preferred_path,
        buffer_rebuild,
    }
}
