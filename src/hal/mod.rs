pub mod traits;
pub mod types;
pub mod mock;

pub use traits::DevicePropertySource;
pub use types::{
    DeviceDescriptor, DeviceHandle, Devices, PropertyError, PropertyKind, PropertyResult,
};
