use std::fmt;

use super::buffer::FrameBuffer;
use super::frame;
use crate::utils::error::{ModbusError, ModbusResult};

/// High bit of the echoed function code in an exception response.
pub const EXCEPTION_FLAG: u8 = 0x80;

/// Highest function code that reads; anything above writes.
pub const MAX_READ_FUNCTION: u8 = 0x04;

/// Fixed length of a write multiple registers response, CRC included.
pub const WRITE_RESPONSE_LEN: usize = 8;

/// Fixed length of an exception response, CRC included.
pub const EXCEPTION_RESPONSE_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCode {
    ReadHoldingRegisters,
    ReadInputRegisters,
    WriteMultipleRegisters,
}

impl FunctionCode {
    pub fn code(&self) -> u8 {
        match self {
            FunctionCode::ReadHoldingRegisters => 0x03,
            FunctionCode::ReadInputRegisters => 0x04,
            FunctionCode::WriteMultipleRegisters => 0x10,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code & !EXCEPTION_FLAG {
            0x03 => Some(FunctionCode::ReadHoldingRegisters),
            0x04 => Some(FunctionCode::ReadInputRegisters),
            0x10 => Some(FunctionCode::WriteMultipleRegisters),
            _ => None,
        }
    }

    pub fn is_write(&self) -> bool {
        is_write_code(self.code())
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FunctionCode::ReadHoldingRegisters => "Read Holding Registers",
            FunctionCode::ReadInputRegisters => "Read Input Registers",
            FunctionCode::WriteMultipleRegisters => "Write Multiple Registers",
        };
        write!(f, "{} (0x{:02X})", name, self.code())
    }
}

/// Write responses have a length fixed by the standard; reads announce theirs.
pub fn is_write_code(code: u8) -> bool {
    code > MAX_READ_FUNCTION
}

pub fn is_exception_code(code: u8) -> bool {
    code & EXCEPTION_FLAG == EXCEPTION_FLAG
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModbusRequest {
    ReadHoldingRegisters {
        address: u8,
        start_register: u16,
        quantity: u16,
    },
    ReadInputRegisters {
        address: u8,
        start_register: u16,
        quantity: u16,
    },
    WriteMultipleRegisters {
        address: u8,
        start_register: u16,
        values: Vec<u16>,
    },
}

impl ModbusRequest {
    pub fn address(&self) -> u8 {
        match self {
            ModbusRequest::ReadHoldingRegisters { address, .. }
            | ModbusRequest::ReadInputRegisters { address, .. }
            | ModbusRequest::WriteMultipleRegisters { address, .. } => *address,
        }
    }

    pub fn function(&self) -> FunctionCode {
        match self {
            ModbusRequest::ReadHoldingRegisters { .. } => FunctionCode::ReadHoldingRegisters,
            ModbusRequest::ReadInputRegisters { .. } => FunctionCode::ReadInputRegisters,
            ModbusRequest::WriteMultipleRegisters { .. } => FunctionCode::WriteMultipleRegisters,
        }
    }

    /// Assembles the request in `buffer` and returns the payload size to hand to
    /// the transaction engine. Write values are placed before the header is built.
    pub fn build(&self, buffer: &mut FrameBuffer) -> ModbusResult<usize> {
        match self {
            ModbusRequest::ReadHoldingRegisters {
                address,
                start_register,
                quantity,
            } => frame::build_read_holding(buffer, *address, *start_register, *quantity),
            ModbusRequest::ReadInputRegisters {
                address,
                start_register,
                quantity,
            } => frame::build_read_input(buffer, *address, *start_register, *quantity),
            ModbusRequest::WriteMultipleRegisters {
                address,
                start_register,
                values,
            } => {
                for (index, value) in values.iter().enumerate() {
                    buffer.set_write_value(index, *value)?;
                }
                let count = u16::try_from(values.len()).map_err(|_| {
                    ModbusError::InvalidData(format!(
                        "{} register values do not fit one request",
                        values.len()
                    ))
                })?;
                frame::build_write_multiple(buffer, *address, *start_register, count)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_codes() {
        assert_eq!(FunctionCode::ReadHoldingRegisters.code(), 0x03);
        assert_eq!(FunctionCode::from_code(0x84), Some(FunctionCode::ReadInputRegisters));
        assert_eq!(FunctionCode::from_code(0x05), None);
        assert!(FunctionCode::WriteMultipleRegisters.is_write());
        assert!(!FunctionCode::ReadInputRegisters.is_write());
    }

    #[test]
    fn test_exception_flag() {
        assert!(is_exception_code(0x83));
        assert!(!is_exception_code(0x10));
        assert!(is_write_code(0x90));
    }

    #[test]
    fn test_write_request_places_values() {
        let request = ModbusRequest::WriteMultipleRegisters {
            address: 0x10,
            start_register: 33,
            values: vec![0x8080, 0x8080],
        };
        let mut buffer = FrameBuffer::new();
        let size = request.build(&mut buffer).unwrap();
        assert_eq!(size, 11);
        assert_eq!(
            buffer.frame(),
            &[0x10, 0x10, 0x00, 0x21, 0x00, 0x02, 0x04, 0x80, 0x80, 0x80, 0x80]
        );
        assert_eq!(request.address(), 0x10);
        assert_eq!(request.function(), FunctionCode::WriteMultipleRegisters);
    }

    #[test]
    fn test_oversized_write_request_is_rejected() {
        let request = ModbusRequest::WriteMultipleRegisters {
            address: 1,
            start_register: 0,
            values: vec![0; 200],
        };
        assert!(request.build(&mut FrameBuffer::new()).is_err());
    }
}
