use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// The three dependent selections. `None` means unselected.
///
/// A sample-rate index equal to the rate list's length is valid and means the
/// device runs at a rate outside the standard universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SelectionState {
    pub device: Option<usize>,
    pub sample_rate: Option<usize>,
    pub buffer_size: Option<usize>,
}

/// Change notification raised after every list or index mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PanelEvent {
    Devices,
    DeviceSelectedIndex,
    SampleRates,
    SampleRateSelectedIndex,
    BufferSizes,
    BufferSizeSelectedIndex,
}

/// Fans change notifications out to any number of presentation subscribers.
#[derive(Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<PanelEvent>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PanelEvent> {
        self.tx.subscribe()
    }

    pub fn raise(&self, event: PanelEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event);
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Read-only view handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PanelSnapshot {
    pub device_names: Vec<String>,
    pub sample_rates: Vec<u32>,
    pub buffer_sizes: Vec<u32>,
    pub selection: SelectionState,
}

impl PanelSnapshot {
    pub fn selected_device_name(&self) -> Option<&str> {
        self.selection
            .device
            .and_then(|i| self.device_names.get(i))
            .map(String::as_str)
    }

    /// Selected rate, `None` when unselected or unlisted
    pub fn selected_sample_rate(&self) -> Option<u32> {
        self.selection.sample_rate.and_then(|i| self.sample_rates.get(i).copied())
    }

    pub fn selected_buffer_size(&self) -> Option<u32> {
        self.selection.buffer_size.and_then(|i| self.buffer_sizes.get(i).copied())
    }

    /// True when the device reports a rate outside the standard universe
    pub fn sample_rate_unlisted(&self) -> bool {
        self.selection.sample_rate == Some(self.sample_rates.len())
    }
}
