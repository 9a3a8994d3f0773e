pub mod settings;

pub use settings::{Config, DeviceConfig, ParityConfig, StopBitsConfig, DEFAULT_SLAVE_ADDRESS};
