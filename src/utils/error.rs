use std::fmt;
use thiserror::Error;

pub type ModbusResult<T> = Result<T, ModbusError>;

/// Exception codes a slave reports in the third byte of an exception response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    SlaveDeviceFailure,
    Acknowledge,
    SlaveDeviceBusy,
    NegativeAcknowledge,
    MemoryParityError,
    Unknown(u8),
}

impl ExceptionCode {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => ExceptionCode::IllegalFunction,
            2 => ExceptionCode::IllegalDataAddress,
            3 => ExceptionCode::IllegalDataValue,
            4 => ExceptionCode::SlaveDeviceFailure,
            5 => ExceptionCode::Acknowledge,
            6 => ExceptionCode::SlaveDeviceBusy,
            7 => ExceptionCode::NegativeAcknowledge,
            8 => ExceptionCode::MemoryParityError,
            other => ExceptionCode::Unknown(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            ExceptionCode::IllegalFunction => 1,
            ExceptionCode::IllegalDataAddress => 2,
            ExceptionCode::IllegalDataValue => 3,
            ExceptionCode::SlaveDeviceFailure => 4,
            ExceptionCode::Acknowledge => 5,
            ExceptionCode::SlaveDeviceBusy => 6,
            ExceptionCode::NegativeAcknowledge => 7,
            ExceptionCode::MemoryParityError => 8,
            ExceptionCode::Unknown(code) => *code,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ExceptionCode::IllegalFunction => "illegal function",
            ExceptionCode::IllegalDataAddress => "illegal data address",
            ExceptionCode::IllegalDataValue => "illegal data value",
            ExceptionCode::SlaveDeviceFailure => "slave device failure",
            ExceptionCode::Acknowledge => "acknowledge, request still processing",
            ExceptionCode::SlaveDeviceBusy => "slave device busy",
            ExceptionCode::NegativeAcknowledge => "negative acknowledge",
            ExceptionCode::MemoryParityError => "memory parity error",
            ExceptionCode::Unknown(_) => "unknown exception",
        }
    }
}

impl From<u8> for ExceptionCode {
    fn from(code: u8) -> Self {
        ExceptionCode::from_code(code)
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}

fn describe_length(expected: &Option<usize>) -> String {
    match expected {
        Some(len) => format!("{} bytes", len),
        None => "unresolved length".to_string(),
    }
}

#[derive(Error, Debug)]
pub enum ModbusError {
    #[error("Slave exception for function 0x{function:02X}: {code}")]
    SlaveException { function: u8, code: ExceptionCode },

    #[error("Response size mismatch: expected {}, received {received} bytes", describe_length(.expected))]
    SizeMismatch {
        expected: Option<usize>,
        received: usize,
    },

    #[error("CRC checksum mismatch: calculated 0x{expected:04X}, received 0x{received:04X}")]
    CrcMismatch { expected: u16, received: u16 },

    #[error("Response from slave {received} while addressing slave {expected}")]
    SlaveAddressMismatch { expected: u8, received: u8 },

    #[error("Buffer access at offset {offset} (+{size}) exceeds capacity {capacity}")]
    BufferOverflow {
        offset: usize,
        size: usize,
        capacity: usize,
    },

    #[error("Invalid slave address: {0}")]
    InvalidDevice(u8),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Communication error: {0}")]
    CommunicationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ModbusError {
    pub fn slave_exception(function: u8, code: u8) -> Self {
        ModbusError::SlaveException {
            function: function & 0x7F,
            code: ExceptionCode::from_code(code),
        }
    }

    /// Numeric result code: 1..=8 for slave exceptions, 9 for CRC, 10 for size
    /// and 11 for address echo failures. Anything else maps to 0xFF.
    pub fn code(&self) -> u8 {
        match self {
            ModbusError::SlaveException { code, .. } => code.code(),
            ModbusError::CrcMismatch { .. } => 9,
            ModbusError::SizeMismatch { .. } => 10,
            ModbusError::SlaveAddressMismatch { .. } => 11,
            _ => 0xFF,
        }
    }

    /// Failures of the bus itself: nothing usable came back.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            ModbusError::SizeMismatch { .. }
                | ModbusError::CrcMismatch { .. }
                | ModbusError::ConnectionError(_)
                | ModbusError::CommunicationError(_)
        )
    }

    /// The slave answered, but not with what was asked for.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            ModbusError::SlaveException { .. } | ModbusError::SlaveAddressMismatch { .. }
        )
    }
}

impl From<std::io::Error> for ModbusError {
    fn from(err: std::io::Error) -> Self {
        ModbusError::CommunicationError(format!("IO error: {}", err))
    }
}

impl From<serialport::Error> for ModbusError {
    fn from(err: serialport::Error) -> Self {
        ModbusError::ConnectionError(format!("Serial port error: {}", err))
    }
}

impl From<toml::de::Error> for ModbusError {
    fn from(err: toml::de::Error) -> Self {
        ModbusError::ConfigError(format!("TOML parse error: {}", err))
    }
}

impl From<toml::ser::Error> for ModbusError {
    fn from(err: toml::ser::Error) -> Self {
        ModbusError::ConfigError(format!("TOML write error: {}", err))
    }
}
