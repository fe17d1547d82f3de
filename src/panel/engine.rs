use log::debug;
use std::sync::Arc;

use crate::hal::{DeviceDescriptor, Devices};
use super::detector::Displayed;
use super::rates::{buffer_coefficient, buffer_sizes, decode_sample_rates};
use super::state::{ChangeNotifier, PanelEvent, PanelSnapshot, SelectionState};

/// Device list entry shown in diagnostic mode when nothing is connected
pub const NO_DEVICES_PLACEHOLDER: &str = "Debug: No devices found";

/// Which buffer-size rebuild closes a reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferRebuild {
    /// Keep the current buffer-size index (live session continues)
    Preserve,
    /// Select the entry matching the device's current buffer size (cold start)
    Search,
}

/// A fresh snapshot to be applied on the owner task
#[derive(Debug)]
pub struct ReconcileRequest {
    pub devices: Devices,
    pub preferred_path: String,
    pub buffer_rebuild: BufferRebuild,
}

/// Owns the selection state and the three lists it indexes into.
///
/// Lists are always rebuilt from a single device snapshot, never patched.
/// The engine is not `Sync`-shared: exactly one task mutates it.
pub struct ReconciliationEngine {
    devices: Devices,
    device_names: Vec<String>,
    sample_rates: Vec<u32>,
    buffer_sizes: Vec<u32>,
    selection: SelectionState,
    diagnostic: bool,
    notifier: ChangeNotifier,
}

impl ReconciliationEngine {
    pub fn new(diagnostic: bool, notifier: ChangeNotifier) -> Self {
        Self {
            devices: Arc::from(Vec::new()),
            device_names: Vec::new(),
            sample_rates: Vec::new(),
            buffer_sizes: Vec::new(),
            selection: SelectionState::default(),
            diagnostic,
            notifier,
        }
    }

    pub fn devices(&self) -> &Devices {
        &self.devices
    }

    pub fn device_names(&self) -> &[String] {
        &self.device_names
    }

    pub fn sample_rates(&self) -> &[u32] {
        &self.sample_rates
    }

    pub fn buffer_sizes(&self) -> &[u32] {
        &self.buffer_sizes
    }

    pub fn selection(&self) -> SelectionState {
        self.selection
    }

    pub fn is_diagnostic(&self) -> bool {
        self.diagnostic
    }

    /// Descriptor behind the selected device index, if it refers to a real device
    pub fn selected_device(&self) -> Option<&DeviceDescriptor> {
        self.selection.device.and_then(|i| self.devices.get(i))
    }

    /// Rate currently selected from the list. `None` when unselected or unlisted.
    pub fn selected_sample_rate(&self) -> Option<u32> {
        self.selection
            .sample_rate
            .and_then(|i| self.sample_rates.get(i).copied())
    }

    pub fn selected_buffer_size(&self) -> Option<u32> {
        self.selection
            .buffer_size
            .and_then(|i| self.buffer_sizes.get(i).copied())
    }

    /// Coefficient for the selected device: the selected listed rate wins,
    /// otherwise the device's own reported rate.
    pub fn buffer_coefficient(&self) -> Option<u32> {
        let device = self.selected_device()?;
        let rate = self.selected_sample_rate().unwrap_or(device.sample_rate);
        Some(buffer_coefficient(rate))
    }

    pub fn displayed(&self) -> Displayed {
        Displayed {
            devices: Arc::clone(&self.devices),
            selected: self.selection.device,
        }
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        PanelSnapshot {
            device_names: self.device_names.clone(),
            sample_rates: self.sample_rates.clone(),
            buffer_sizes: self.buffer_sizes.clone(),
            selection: self.selection,
        }
    }

    /// Replace the device list and pick the device to select.
    ///
    /// The device at `preferred_path` wins, then the first device. With no
    /// devices the index is unselected, or points at a placeholder entry in
    /// diagnostic mode.
    pub fn rebuild_devices(&mut self, devices: Devices, preferred_path: &str) {
        debug!(
            "rebuild devices: {} device(s), preferred path {:?}",
            devices.len(),
            preferred_path
        );

        let mut names: Vec<String> = devices.iter().map(|d| d.name.clone()).collect();

        let selected = if devices.is_empty() {
            if self.diagnostic {
                names.push(NO_DEVICES_PLACEHOLDER.to_string());
                Some(0)
            } else {
                None
            }
        } else {
            let preferred = if preferred_path.is_empty() {
                None
            } else {
                devices.iter().position(|d| d.path == preferred_path)
            };
            Some(preferred.unwrap_or(0))
        };

        debug!("rebuild devices: selected {:?}", selected);

        self.devices = devices;
        self.device_names = names;
        self.selection.device = selected;

        self.notifier.raise(PanelEvent::Devices);
        self.notifier.raise(PanelEvent::DeviceSelectedIndex);
    }

    /// Rebuild the rate list from the selected device's mask and select its
    /// current rate, or the one-past-the-end index when the rate is unlisted.
    pub fn rebuild_sample_rates(&mut self) {
        let rebuilt = self.selected_device().map(|device| {
            let rates = decode_sample_rates(device.supported_rates);
            let index = rates
                .iter()
                .position(|r| *r == device.sample_rate)
                .unwrap_or(rates.len());
            (rates, index)
        });

        match rebuilt {
            Some((rates, index)) => {
                debug!("rebuild sample rates: {:?}, selected {}", rates, index);
                self.sample_rates = rates;
                self.selection.sample_rate = Some(index);
            }
            None => {
                self.sample_rates.clear();
                self.selection.sample_rate = None;
            }
        }

        self.notifier.raise(PanelEvent::SampleRates);
        self.notifier.raise(PanelEvent::SampleRateSelectedIndex);
    }

    /// Rebuild the buffer list and select the entry matching the device's
    /// current buffer size. Without a match the previous index is kept.
    pub fn init_buffer_sizes(&mut self) {
        self.load_buffer_sizes(true);
    }

    /// Rebuild the buffer list for the current rate, keeping the buffer index.
    pub fn rebuild_buffer_sizes(&mut self) {
        self.load_buffer_sizes(false);
    }

    fn load_buffer_sizes(&mut self, search: bool) {
        let rebuilt = self.selected_device().map(|device| {
            let coefficient = self.buffer_coefficient().unwrap_or(1);
            let sizes = buffer_sizes(coefficient, self.diagnostic);

            let previous = self.selection.buffer_size.filter(|i| *i < sizes.len());
            // A reported size too large to scale matches nothing
            let matched = if search {
                device
                    .buffer_size
                    .checked_mul(coefficient)
                    .and_then(|current| sizes.iter().position(|s| *s == current))
            } else {
                None
            };

            (sizes, matched.or(previous), coefficient)
        });

        match rebuilt {
            Some((sizes, index, coefficient)) => {
                debug!(
                    "{} buffer sizes: coefficient {}, selected {:?}",
                    if search { "init" } else { "rebuild" },
                    coefficient,
                    index
                );
                self.buffer_sizes = sizes;
                self.selection.buffer_size = index;
            }
            None => {
                self.buffer_sizes.clear();
                self.selection.buffer_size = None;
            }
        }

        self.notifier.raise(PanelEvent::BufferSizes);
        self.notifier.raise(PanelEvent::BufferSizeSelectedIndex);
    }

    /// User picked a device. Out-of-range indices are rejected.
    /// Returns true if the selection changed.
    pub fn set_device_index(&mut self, index: usize) -> bool {
        if index >= self.devices.len() {
            debug!("device index {} rejected ({} devices)", index, self.devices.len());
            return false;
        }
        if self.selection.device == Some(index) {
            return false;
        }

        self.selection.device = Some(index);
        self.notifier.raise(PanelEvent::DeviceSelectedIndex);

        self.rebuild_sample_rates();
        self.init_buffer_sizes();
        true
    }

    /// User picked a sample rate. `None` deselects without touching the
    /// buffer list; the one-past-the-end index is accepted.
    pub fn set_sample_rate_index(&mut self, index: Option<usize>) -> bool {
        if let Some(i) = index {
            if self.selected_device().is_none() || i > self.sample_rates.len() {
                debug!("sample rate index {} rejected", i);
                return false;
            }
        }
        if self.selection.sample_rate == index {
            return false;
        }

        self.selection.sample_rate = index;
        self.notifier.raise(PanelEvent::SampleRateSelectedIndex);

        if index.is_some() {
            self.rebuild_buffer_sizes();
        }
        true
    }

    pub fn set_buffer_size_index(&mut self, index: Option<usize>) -> bool {
        if let Some(i) = index {
            if i >= self.buffer_sizes.len() {
                debug!("buffer size index {} rejected", i);
                return false;
            }
        }
        if self.selection.buffer_size == index {
            return false;
        }

        self.selection.buffer_size = index;
        self.notifier.raise(PanelEvent::BufferSizeSelectedIndex);
        true
    }

    /// One reconciliation pass: devices, then rates, then the requested
    /// buffer-size rebuild.
    pub fn apply(&mut self, request: ReconcileRequest) {
        self.rebuild_devices(request.devices, &request.preferred_path);
        self.rebuild_sample_rates();
        match request.buffer_rebuild {
            BufferRebuild::Preserve => self.rebuild_buffer_sizes(),
            BufferRebuild::Search => self.init_buffer_sizes(),
        }
    }

    /// Apply a detector-planned request against the state as it is now.
    ///
    /// A snapshot equal to the displayed devices changes nothing visible; its
    /// descriptors replace the displayed ones silently so later polls and
    /// commits use the newest handles. When a device is selected, the request
    /// is re-keyed to that selection, since a user edit or another
    /// reconciliation may have landed while the request was being planned.
    /// Returns true if lists were rebuilt.
    pub fn reconcile(&mut self, mut request: ReconcileRequest) -> bool {
        if self.devices[..] == request.devices[..] {
            debug!("no change in device information");
            self.devices = request.devices;
            return false;
        }

        if let Some(device) = self.selected_device() {
            if device.path != request.preferred_path || request.buffer_rebuild != BufferRebuild::Preserve {
                debug!("reconcile: re-keyed to current selection {}", device.path);
            }
            request.preferred_path = device.path.clone();
            request.buffer_rebuild = BufferRebuild::Preserve;
        }

        self.apply(request);
        true
    }
}
