pub mod buffer;
pub mod client;
pub mod codec;
pub mod crc;
pub mod frame;
pub mod protocol;
pub mod transaction;
pub mod transport;

pub use buffer::{FrameBuffer, DEFAULT_BUFFER_SIZE, READ_DATA_START, WRITE_DATA_START};
pub use client::{ModbusClient, ModbusClientTrait};
pub use crc::{append_crc, crc16_modbus, verify_crc};
pub use frame::{build_read_holding, build_read_input, build_write_multiple};
pub use protocol::{FunctionCode, ModbusRequest};
pub use transaction::{
    ExpectedLength, LengthResolver, Response, TimeoutPolicy, TransactionEngine, TransactionSettings,
};
pub use transport::{SerialTransport, Transport};
