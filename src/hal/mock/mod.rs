pub mod device_source;

pub use device_source::{SimulatedDevice, SimulatedPropertySource, WriteOp, DEFAULT_BUFFER_SIZE};
