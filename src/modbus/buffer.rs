use super::codec::{decode16, decode32, encode16};
use crate::utils::error::{ModbusError, ModbusResult};

/// Default transmit/receive buffer size, in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 256;

/// Offset of the first data byte in a read response (after address, function, byte count).
pub const READ_DATA_START: usize = 3;

/// Offset of the first register value in a write multiple registers request.
pub const WRITE_DATA_START: usize = 7;

/// Fixed-capacity transmit/receive buffer owned by one transaction at a time.
///
/// The request is assembled in place, the response overwrites it. Every
/// accessor checks the capacity instead of trusting fixed offsets.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    data: Box<[u8]>,
    len: usize,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Length of the frame currently held: the request payload before a
    /// transaction, the received response after one.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn frame(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Bytes between the header and the CRC of a read response.
    pub fn read_payload(&self) -> &[u8] {
        if self.len < READ_DATA_START + 2 {
            return &[];
        }
        &self.data[READ_DATA_START..self.len - 2]
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
        self.len = 0;
    }

    pub(crate) fn set_len(&mut self, len: usize) -> ModbusResult<()> {
        self.check(0, len)?;
        self.len = len;
        Ok(())
    }

    pub(crate) fn raw_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn check(&self, offset: usize, size: usize) -> ModbusResult<()> {
        match offset.checked_add(size) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(ModbusError::BufferOverflow {
                offset,
                size,
                capacity: self.data.len(),
            }),
        }
    }

    pub fn set_u8(&mut self, offset: usize, value: u8) -> ModbusResult<()> {
        self.check(offset, 1)?;
        self.data[offset] = value;
        Ok(())
    }

    pub fn get_u8(&self, offset: usize) -> ModbusResult<u8> {
        self.check(offset, 1)?;
        Ok(self.data[offset])
    }

    pub fn set_reg(&mut self, offset: usize, value: u16) -> ModbusResult<()> {
        self.check(offset, 2)?;
        self.data[offset..offset + 2].copy_from_slice(&encode16(value));
        Ok(())
    }

    pub fn get_reg(&self, offset: usize) -> ModbusResult<u16> {
        self.check(offset, 2)?;
        Ok(decode16(&self.data, offset))
    }

    pub fn get_reg32(&self, offset: usize) -> ModbusResult<u32> {
        self.check(offset, 4)?;
        Ok(decode32(&self.data, offset))
    }

    /// Places the `index`-th register value of a write request.
    pub fn set_write_value(&mut self, index: usize, value: u16) -> ModbusResult<()> {
        self.set_reg(WRITE_DATA_START + index * 2, value)
    }

    /// Reads the `index`-th register of a read response.
    pub fn read_value(&self, index: usize) -> ModbusResult<u16> {
        self.get_reg(READ_DATA_START + index * 2)
    }

    /// Reads registers `index` and `index + 1` of a read response as one 32-bit value.
    pub fn read_value32(&self, index: usize) -> ModbusResult<u32> {
        self.get_reg32(READ_DATA_START + index * 2)
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
