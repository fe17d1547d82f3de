pub mod rates;
pub mod state;
pub mod engine;
pub mod detector;
pub mod commit;
pub mod runtime;

pub use commit::{CommitPlan, CommitReport, WriteOutcome};
pub use detector::Displayed;
pub use engine::{BufferRebuild, ReconcileRequest, ReconciliationEngine, NO_DEVICES_PLACEHOLDER};
pub use runtime::{AsioPanel, DeviceChangeHook, ReconcileOutcome};
pub use state::{ChangeNotifier, PanelEvent, PanelSnapshot, SelectionState};
