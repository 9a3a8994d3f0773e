/// Modbus CRC16: reflected polynomial 0xA001, initial register 0xFFFF.
pub fn crc16_modbus(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    let poly: u16 = 0xA001;

    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ poly;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Writes the checksum of `frame[..len]` into `frame[len..len + 2]`, low byte first.
///
/// Panics if `frame` is shorter than `len + 2`.
pub fn append_crc(frame: &mut [u8], len: usize) -> u16 {
    let crc = crc16_modbus(&frame[..len]);
    frame[len..len + 2].copy_from_slice(&crc.to_le_bytes());
    crc
}

/// Checks the trailing two bytes of `frame` against the checksum of everything before them.
///
/// On mismatch returns `(calculated, received)`.
pub fn verify_crc(frame: &[u8]) -> Result<(), (u16, u16)> {
    if frame.len() < 3 {
        return Err((crc16_modbus(frame), 0));
    }

    let data_len = frame.len() - 2;
    let received = u16::from_le_bytes([frame[data_len], frame[data_len + 1]]);
    let calculated = crc16_modbus(&frame[..data_len]);

    if received == calculated {
        Ok(())
    } else {
        Err((calculated, received))
    }
}
