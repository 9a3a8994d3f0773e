//! Modbus RTU master transaction engine.
//!
//! Builds read holding (0x03), read input (0x04) and write multiple (0x10)
//! register requests, exchanges them over a half-duplex serial bus and resolves
//! the variable-length response byte by byte into a typed result. Everything
//! runs synchronously on the calling thread; one transaction is in flight per
//! engine at any time.

pub mod cli;
pub mod config;
pub mod devices;
pub mod modbus;
pub mod output;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use devices::{Device, Smi2Display};
pub use modbus::{
    FrameBuffer, FunctionCode, ModbusClient, ModbusClientTrait, ModbusRequest, Response, SerialTransport,
    TimeoutPolicy, TransactionEngine, TransactionSettings, Transport,
};
pub use output::{ConsoleFormatter, DataFormatter, HexFormatter, JsonFormatter};
pub use utils::error::{ExceptionCode, ModbusError, ModbusResult};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
