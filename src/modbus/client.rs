use log::{debug, info};
use std::time::Duration;

use super::buffer::FrameBuffer;
use super::codec::decode_registers;
use super::protocol::ModbusRequest;
use super::transaction::{Response, TransactionEngine, TransactionSettings};
use super::transport::{SerialTransport, Transport};
use crate::config::settings::Config;
use crate::utils::error::{ModbusError, ModbusResult};

/// Register access as seen by device drivers.
pub trait ModbusClientTrait {
    fn read_holding_registers(&mut self, slave_id: u8, start_addr: u16, count: u16) -> ModbusResult<Vec<u16>>;

    fn read_input_registers(&mut self, slave_id: u8, start_addr: u16, count: u16) -> ModbusResult<Vec<u16>>;

    fn write_multiple_registers(&mut self, slave_id: u8, start_addr: u16, values: &[u16]) -> ModbusResult<()>;
}

/// A transaction engine paired with the one buffer its transactions run in.
///
/// Every call takes `&mut self`, so one client never has two transactions in
/// flight. Sharing a client between threads needs a lock around it.
pub struct ModbusClient<T: Transport> {
    engine: TransactionEngine<T>,
    buffer: FrameBuffer,
}

impl ModbusClient<SerialTransport> {
    pub fn open(config: &Config) -> ModbusResult<Self> {
        let transport = SerialTransport::open(config)?;
        Ok(Self::with_settings(
            transport,
            config.buffer_size,
            config.transaction_settings(),
        ))
    }
}

impl<T: Transport> ModbusClient<T> {
    pub fn new(transport: T) -> Self {
        Self::with_settings(transport, super::buffer::DEFAULT_BUFFER_SIZE, TransactionSettings::default())
    }

    pub fn with_settings(transport: T, buffer_size: usize, settings: TransactionSettings) -> Self {
        Self {
            engine: TransactionEngine::with_settings(transport, settings),
            buffer: FrameBuffer::with_capacity(buffer_size),
        }
    }

    pub fn byte_timeout(&self) -> Duration {
        self.engine.settings().byte_timeout
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.engine.transport_mut()
    }

    /// The shared buffer, for callers that place write values themselves.
    pub fn buffer_mut(&mut self) -> &mut FrameBuffer {
        &mut self.buffer
    }

    /// Runs a transaction on whatever the caller assembled in the buffer.
    pub fn transact_raw(&mut self, payload_size: usize) -> ModbusResult<Response> {
        self.engine.transact(&mut self.buffer, payload_size)
    }

    pub fn execute(&mut self, request: &ModbusRequest) -> ModbusResult<Response> {
        debug!("➡️  {} to slave {}", request.function(), request.address());
        let payload_size = request.build(&mut self.buffer)?;
        self.engine.transact(&mut self.buffer, payload_size)
    }

    fn read_registers(&mut self, request: ModbusRequest, count: u16) -> ModbusResult<Vec<u16>> {
        self.execute(&request)?;

        let payload = self.buffer.read_payload();
        let values = decode_registers(payload);
        if values.len() != count as usize {
            return Err(ModbusError::InvalidData(format!(
                "requested {} registers, slave returned {}",
                count,
                values.len()
            )));
        }
        Ok(values)
    }

    /// One holding register.
    pub fn read_register(&mut self, slave_id: u8, register: u16) -> ModbusResult<u16> {
        let values = self.read_holding_registers(slave_id, register, 1)?;
        Ok(values[0])
    }

    /// Two consecutive holding registers as one 32-bit value, high word first.
    pub fn read_register32(&mut self, slave_id: u8, register: u16) -> ModbusResult<u32> {
        self.read_holding_registers(slave_id, register, 2)?;
        self.buffer.read_value32(0)
    }

    pub fn write_register(&mut self, slave_id: u8, register: u16, value: u16) -> ModbusResult<()> {
        self.write_multiple_registers(slave_id, register, &[value])
    }
}

impl<T: Transport> ModbusClientTrait for ModbusClient<T> {
    fn read_holding_registers(&mut self, slave_id: u8, start_addr: u16, count: u16) -> ModbusResult<Vec<u16>> {
        info!("📊 Reading {} holding registers from slave {} at {}", count, slave_id, start_addr);
        self.read_registers(
            ModbusRequest::ReadHoldingRegisters {
                address: slave_id,
                start_register: start_addr,
                quantity: count,
            },
            count,
        )
    }

    fn read_input_registers(&mut self, slave_id: u8, start_addr: u16, count: u16) -> ModbusResult<Vec<u16>> {
        info!("📊 Reading {} input registers from slave {} at {}", count, slave_id, start_addr);
        self.read_registers(
            ModbusRequest::ReadInputRegisters {
                address: slave_id,
                start_register: start_addr,
                quantity: count,
            },
            count,
        )
    }

    fn write_multiple_registers(&mut self, slave_id: u8, start_addr: u16, values: &[u16]) -> ModbusResult<()> {
        info!("📝 Writing {} registers to slave {} at {}", values.len(), slave_id, start_addr);
        self.execute(&ModbusRequest::WriteMultipleRegisters {
            address: slave_id,
            start_register: start_addr,
            values: values.to_vec(),
        })?;
        Ok(())
    }
}
