pub mod config;
pub mod hal;
pub mod panel;

pub use config::PanelConfig;
pub use panel::AsioPanel;
