pub mod smi2;
pub mod traits;

pub use smi2::{DemoTiming, Smi2Display};
pub use traits::Device;
