//! Integration tests for the Modbus RTU master.
//!
//! A simulated slave answers requests over an in-memory bus, so the whole
//! path from request building to response decoding runs without hardware.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use modbus_rtu_master::modbus::crc::{crc16_modbus, verify_crc};
use modbus_rtu_master::modbus::frame::{build_read_holding, build_write_multiple};
use modbus_rtu_master::*;

/// Simulated slave with a small holding register bank.
struct SimulatedSlave {
    address: u8,
    registers: Vec<u16>,
    pending: VecDeque<u8>,
    requests: Vec<Vec<u8>>,
    /// Drop the response after this many bytes.
    cut_after: Option<usize>,
    /// Flip one bit in the response at this index.
    corrupt_at: Option<usize>,
}

impl SimulatedSlave {
    fn new(address: u8) -> Self {
        Self {
            address,
            registers: vec![0; 64],
            pending: VecDeque::new(),
            requests: Vec::new(),
            cut_after: None,
            corrupt_at: None,
        }
    }

    fn respond(&mut self, body: Vec<u8>) {
        let mut frame = body;
        let crc = crc16_modbus(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());

        if let Some(index) = self.corrupt_at {
            frame[index] ^= 0x01;
        }
        if let Some(len) = self.cut_after {
            frame.truncate(len);
        }
        self.pending.extend(frame);
    }

    fn exception(&mut self, function: u8, code: u8) {
        self.respond(vec![self.address, function | 0x80, code]);
    }

    fn handle(&mut self, request: &[u8]) {
        assert!(verify_crc(request).is_ok(), "master sent a bad CRC");
        let function = request[1];
        let start = u16::from_be_bytes([request[2], request[3]]) as usize;
        let count = u16::from_be_bytes([request[4], request[5]]) as usize;

        match function {
            0x03 | 0x04 => {
                if start + count > self.registers.len() {
                    return self.exception(function, 0x02);
                }
                let mut body = vec![self.address, function, (count * 2) as u8];
                for value in &self.registers[start..start + count] {
                    body.extend_from_slice(&value.to_be_bytes());
                }
                self.respond(body);
            }
            0x10 => {
                if request[6] as usize != count * 2 {
                    return self.exception(function, 0x03);
                }
                if start + count > self.registers.len() {
                    return self.exception(function, 0x02);
                }
                for i in 0..count {
                    self.registers[start + i] = u16::from_be_bytes([request[7 + i * 2], request[8 + i * 2]]);
                }
                self.respond(request[..6].to_vec());
            }
            _ => self.exception(function, 0x01),
        }
    }
}

impl Transport for SimulatedSlave {
    fn write_frame(&mut self, frame: &[u8]) -> ModbusResult<()> {
        self.requests.push(frame.to_vec());
        if frame[0] == self.address {
            self.handle(frame);
        }
        Ok(())
    }

    fn read_byte(&mut self, _timeout: Duration) -> io::Result<u8> {
        self.pending
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "bus silent"))
    }
}

#[test]
fn test_write_then_read_back() {
    let mut client = ModbusClient::new(SimulatedSlave::new(0x10));

    client.write_multiple_registers(0x10, 33, &[0x8080, 0x9292]).unwrap();
    assert_eq!(client.read_holding_registers(0x10, 33, 2).unwrap(), vec![0x8080, 0x9292]);
    assert_eq!(client.read_register(0x10, 34).unwrap(), 0x9292);
    assert_eq!(client.read_register32(0x10, 33).unwrap(), 0x8080_9292);
}

#[test]
fn test_request_frames_on_the_wire() {
    let mut client = ModbusClient::new(SimulatedSlave::new(0x10));
    client.read_holding_registers(0x10, 17, 1).unwrap();
    client.write_multiple_registers(0x10, 33, &[0x8080, 0x8080]).unwrap();

    let requests = &client.transport_mut().requests;
    assert_eq!(&requests[0][..6], &[0x10, 0x03, 0x00, 0x11, 0x00, 0x01]);
    assert_eq!(requests[0].len(), 8);
    assert_eq!(
        &requests[1][..11],
        &[0x10, 0x10, 0x00, 0x21, 0x00, 0x02, 0x04, 0x80, 0x80, 0x80, 0x80]
    );
    assert_eq!(requests[1].len(), 13);
}

#[test]
fn test_illegal_address_exception() {
    let mut client = ModbusClient::new(SimulatedSlave::new(0x10));

    match client.read_input_registers(0x10, 60, 10) {
        Err(ModbusError::SlaveException { function, code }) => {
            assert_eq!(function, 0x04);
            assert_eq!(code, ExceptionCode::IllegalDataAddress);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_exception_on_write() {
    let mut client = ModbusClient::new(SimulatedSlave::new(0x10));

    let err = client.write_multiple_registers(0x10, 63, &[1, 2]).unwrap_err();
    assert_eq!(err.code(), 2);
    assert!(err.is_protocol_error());
}

#[test]
fn test_unanswered_request_is_size_mismatch() {
    let mut client = ModbusClient::new(SimulatedSlave::new(0x10));

    let err = client.read_holding_registers(0x22, 0, 1).unwrap_err();
    assert!(matches!(err, ModbusError::SizeMismatch { expected: None, received: 0 }));
    assert_eq!(err.code(), 10);
}

#[test]
fn test_truncated_response() {
    let mut slave = SimulatedSlave::new(0x10);
    slave.cut_after = Some(6);
    let mut client = ModbusClient::new(slave);

    let err = client.read_holding_registers(0x10, 0, 2).unwrap_err();
    assert!(matches!(err, ModbusError::SizeMismatch { expected: Some(9), received: 6 }));
}

#[test]
fn test_truncated_exception_degrades_to_size_mismatch() {
    let mut slave = SimulatedSlave::new(0x10);
    slave.cut_after = Some(4);
    let mut client = ModbusClient::new(slave);

    let err = client.read_holding_registers(0x10, 100, 1).unwrap_err();
    assert!(matches!(err, ModbusError::SizeMismatch { expected: Some(5), received: 4 }));
}

#[test]
fn test_corrupted_payload_is_crc_mismatch() {
    let mut slave = SimulatedSlave::new(0x10);
    slave.corrupt_at = Some(4);
    let mut client = ModbusClient::new(slave);

    let err = client.read_holding_registers(0x10, 0, 1).unwrap_err();
    assert!(matches!(err, ModbusError::CrcMismatch { .. }));
    assert_eq!(err.code(), 9);
    assert!(err.is_transport_error());
}

#[test]
fn test_low_level_engine_with_shared_buffer() {
    let mut slave = SimulatedSlave::new(0x10);
    let mut buffer = FrameBuffer::new();

    buffer.set_write_value(0, 4).unwrap();
    let size = build_write_multiple(&mut buffer, 0x10, 17, 1).unwrap();
    let response = TransactionEngine::new(&mut slave).transact(&mut buffer, size).unwrap();
    assert_eq!(response.length, 8);

    let size = build_read_holding(&mut buffer, 0x10, 17, 1).unwrap();
    let response = TransactionEngine::new(&mut slave).transact(&mut buffer, size).unwrap();
    assert_eq!(response.length, 7);
    assert_eq!(buffer.read_value(0).unwrap(), 4);
    assert_eq!(slave.registers[17], 4);
}

#[test]
fn test_idempotent_reads() {
    let mut slave = SimulatedSlave::new(0x10);
    slave.registers[5] = 0xCAFE;
    let mut client = ModbusClient::new(slave);

    let first = client.read_holding_registers(0x10, 0, 8).unwrap();
    let second = client.read_holding_registers(0x10, 0, 8).unwrap();
    assert_eq!(first, second);
    assert_eq!(first[5], 0xCAFE);
}

#[test]
fn test_smi2_demo_against_simulated_slave() {
    let mut client = ModbusClient::new(SimulatedSlave::new(16));
    let display = Smi2Display::new(16, "bench".to_string());

    display.initialize(&mut client).unwrap();
    assert_eq!(display.read_display_mode(&mut client).unwrap(), 4);

    display.show_segments(&mut client, [0x80, 0x80, 0x80, 0x80]).unwrap();
    assert_eq!(client.read_holding_registers(16, 33, 2).unwrap(), vec![0x8080, 0x8080]);
    assert_eq!(client.read_register(16, 15).unwrap(), 0x81);
}
