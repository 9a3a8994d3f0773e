use super::buffer::{FrameBuffer, WRITE_DATA_START};
use super::protocol::FunctionCode;
use crate::utils::error::{ModbusError, ModbusResult};

/// Highest unicast slave address; 0 is broadcast and 248..=255 are reserved.
pub const MAX_SLAVE_ADDRESS: u8 = 247;

/// Header size of a read request, i.e. its payload size before the CRC.
pub const READ_REQUEST_LEN: usize = 6;

fn check_address(address: u8) -> ModbusResult<()> {
    if address == 0 || address > MAX_SLAVE_ADDRESS {
        return Err(ModbusError::InvalidDevice(address));
    }
    Ok(())
}

fn build_header(
    buffer: &mut FrameBuffer,
    address: u8,
    function: FunctionCode,
    start_register: u16,
    count: u16,
) -> ModbusResult<()> {
    check_address(address)?;
    buffer.set_u8(0, address)?;
    buffer.set_u8(1, function.code())?;
    buffer.set_reg(2, start_register)?;
    buffer.set_reg(4, count)?;
    Ok(())
}

fn build_read(
    buffer: &mut FrameBuffer,
    address: u8,
    function: FunctionCode,
    start_register: u16,
    count: u16,
) -> ModbusResult<usize> {
    build_header(buffer, address, function, start_register, count)?;
    buffer.set_len(READ_REQUEST_LEN)?;
    Ok(READ_REQUEST_LEN)
}

/// 0x03 - Read Holding Registers.
pub fn build_read_holding(
    buffer: &mut FrameBuffer,
    address: u8,
    start_register: u16,
    count: u16,
) -> ModbusResult<usize> {
    build_read(buffer, address, FunctionCode::ReadHoldingRegisters, start_register, count)
}

/// 0x04 - Read Input Registers.
pub fn build_read_input(
    buffer: &mut FrameBuffer,
    address: u8,
    start_register: u16,
    count: u16,
) -> ModbusResult<usize> {
    build_read(buffer, address, FunctionCode::ReadInputRegisters, start_register, count)
}

/// 0x10 - Write Multiple Registers.
///
/// Only the header is filled in. The `count` register values must already sit
/// in the buffer from [`WRITE_DATA_START`] on; nothing checks that they do.
pub fn build_write_multiple(
    buffer: &mut FrameBuffer,
    address: u8,
    start_register: u16,
    count: u16,
) -> ModbusResult<usize> {
    let byte_count = count
        .checked_mul(2)
        .and_then(|bytes| u8::try_from(bytes).ok())
        .ok_or_else(|| {
            ModbusError::InvalidData(format!("{} registers exceed the byte count field", count))
        })?;

    build_header(buffer, address, FunctionCode::WriteMultipleRegisters, start_register, count)?;
    buffer.set_u8(WRITE_DATA_START - 1, byte_count)?;

    let payload_size = WRITE_DATA_START + byte_count as usize;
    buffer.set_len(payload_size)?;
    Ok(payload_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_holding_layout() {
        let mut buffer = FrameBuffer::new();
        let size = build_read_holding(&mut buffer, 0x10, 17, 1).unwrap();
        assert_eq!(size, 6);
        assert_eq!(buffer.frame(), &[0x10, 0x03, 0x00, 0x11, 0x00, 0x01]);
    }

    #[test]
    fn test_read_input_layout() {
        let mut buffer = FrameBuffer::new();
        let size = build_read_input(&mut buffer, 0x01, 0x0102, 0x0A).unwrap();
        assert_eq!(size, 6);
        assert_eq!(buffer.frame(), &[0x01, 0x04, 0x01, 0x02, 0x00, 0x0A]);
    }

    #[test]
    fn test_write_multiple_layout() {
        let mut buffer = FrameBuffer::new();
        buffer.set_write_value(0, 0x8080).unwrap();
        buffer.set_write_value(1, 0x8080).unwrap();
        let size = build_write_multiple(&mut buffer, 0x10, 33, 2).unwrap();
        assert_eq!(size, 11);
        assert_eq!(
            buffer.frame(),
            &[0x10, 0x10, 0x00, 0x21, 0x00, 0x02, 0x04, 0x80, 0x80, 0x80, 0x80]
        );
    }

    #[test]
    fn test_write_does_not_validate_placed_values() {
        let mut buffer = FrameBuffer::new();
        let size = build_write_multiple(&mut buffer, 0x10, 15, 1).unwrap();
        assert_eq!(size, 9);
        assert_eq!(&buffer.frame()[7..], &[0x00, 0x00]);
    }

    #[test]
    fn test_broadcast_and_reserved_addresses_rejected() {
        let mut buffer = FrameBuffer::new();
        assert!(matches!(
            build_read_holding(&mut buffer, 0, 0, 1),
            Err(ModbusError::InvalidDevice(0))
        ));
        assert!(matches!(
            build_read_input(&mut buffer, 248, 0, 1),
            Err(ModbusError::InvalidDevice(248))
        ));
    }

    #[test]
    fn test_write_too_large_for_buffer() {
        let mut buffer = FrameBuffer::with_capacity(16);
        assert!(matches!(
            build_write_multiple(&mut buffer, 1, 0, 10),
            Err(ModbusError::BufferOverflow { .. })
        ));
        assert!(matches!(
            build_write_multiple(&mut buffer, 1, 0, 200),
            Err(ModbusError::InvalidData(_))
        ));
    }
}
