//! Big-endian register encoding as carried inside Modbus payloads.
//!
//! These helpers index slices directly and panic when `offset + size` runs past
//! the end; bounds are enforced one level up by [`FrameBuffer`](super::buffer::FrameBuffer).

pub fn encode16(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

pub fn decode16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

pub fn decode32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Decodes consecutive register pairs. A trailing odd byte is ignored.
pub fn decode_registers(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}
