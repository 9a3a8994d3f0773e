//! Request/response exchange over a half-duplex bus.
//!
//! The response length is not known up front. Write responses are always 8
//! bytes; read responses announce their size in the third byte; exception
//! responses are recognised from the second byte and are 5 bytes long.
//! [`LengthResolver`] tracks that discovery byte by byte, and
//! [`TransactionEngine::transact`] drives it from the transport.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::time::{Duration, Instant};

use super::buffer::FrameBuffer;
use super::crc::{append_crc, verify_crc};
use super::protocol::{
    is_exception_code, is_write_code, EXCEPTION_RESPONSE_LEN, WRITE_RESPONSE_LEN,
};
use super::transport::Transport;
use crate::output::formatters::format_frame_dump;
use crate::utils::error::{ModbusError, ModbusResult};

/// Default time to wait for each response byte.
pub const DEFAULT_BYTE_TIMEOUT: Duration = Duration::from_millis(10_000);

/// How the response timeout is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeoutPolicy {
    /// Re-armed for every byte. A trickling response may take
    /// `expected length × timeout` in total.
    PerByte,
    /// One deadline for the whole response, starting after the request is written.
    Transaction,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        TimeoutPolicy::PerByte
    }
}

impl fmt::Display for TimeoutPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutPolicy::PerByte => write!(f, "per-byte"),
            TimeoutPolicy::Transaction => write!(f, "transaction"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedLength {
    Unknown,
    Known(usize),
}

/// Receive state machine: how many bytes the response should have, given the
/// bytes seen so far.
#[derive(Debug, Clone)]
pub struct LengthResolver {
    expected: ExpectedLength,
    received: usize,
    exception: bool,
    exception_code: Option<u8>,
}

impl LengthResolver {
    pub fn new(request_function: u8) -> Self {
        let expected = if is_write_code(request_function) {
            ExpectedLength::Known(WRITE_RESPONSE_LEN)
        } else {
            ExpectedLength::Unknown
        };

        Self {
            expected,
            received: 0,
            exception: false,
            exception_code: None,
        }
    }

    /// Feeds the next received byte.
    pub fn push(&mut self, byte: u8) {
        self.received += 1;

        match self.received {
            2 => self.exception = is_exception_code(byte),
            3 if self.exception => {
                self.exception_code = Some(byte);
                self.expected = ExpectedLength::Known(EXCEPTION_RESPONSE_LEN);
            }
            3 if self.expected == ExpectedLength::Unknown => {
                self.expected = ExpectedLength::Known(3 + byte as usize + 2);
            }
            _ => {}
        }
    }

    pub fn expected(&self) -> ExpectedLength {
        self.expected
    }

    pub fn received(&self) -> usize {
        self.received
    }

    pub fn is_exception(&self) -> bool {
        self.exception
    }

    pub fn exception_code(&self) -> Option<u8> {
        self.exception_code
    }

    /// True once the resolved length has been reached or `capacity` is full.
    pub fn is_complete(&self, capacity: usize) -> bool {
        if self.received >= capacity {
            return true;
        }
        match self.expected {
            ExpectedLength::Known(len) => self.received >= len,
            ExpectedLength::Unknown => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransactionSettings {
    pub byte_timeout: Duration,
    pub timeout_policy: TimeoutPolicy,
    pub verify_slave_address: bool,
    pub trace_frames: bool,
}

impl Default for TransactionSettings {
    fn default() -> Self {
        Self {
            byte_timeout: DEFAULT_BYTE_TIMEOUT,
            timeout_policy: TimeoutPolicy::PerByte,
            verify_slave_address: true,
            trace_frames: true,
        }
    }
}

/// Summary of a successful exchange; the response bytes stay in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub slave_address: u8,
    pub function_code: u8,
    pub length: usize,
}

pub struct TransactionEngine<T: Transport> {
    transport: T,
    settings: TransactionSettings,
}

impl<T: Transport> TransactionEngine<T> {
    pub fn new(transport: T) -> Self {
        Self::with_settings(transport, TransactionSettings::default())
    }

    pub fn with_settings(transport: T, settings: TransactionSettings) -> Self {
        Self { transport, settings }
    }

    pub fn settings(&self) -> &TransactionSettings {
        &self.settings
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Sends `buffer[..payload_size]` with a CRC appended and reads the response
    /// back into `buffer`.
    ///
    /// Single attempt: every failure is returned as is, retrying is up to the caller.
    pub fn transact(&mut self, buffer: &mut FrameBuffer, payload_size: usize) -> ModbusResult<Response> {
        if payload_size < 2 || payload_size.checked_add(2).map_or(true, |len| len > buffer.capacity()) {
            return Err(ModbusError::InvalidData(format!(
                "payload of {} bytes does not fit a {} byte buffer",
                payload_size,
                buffer.capacity()
            )));
        }

        let capacity = buffer.capacity();
        let raw = buffer.raw_mut();
        let request_address = raw[0];
        let request_function = raw[1];

        append_crc(raw, payload_size);
        let request = &raw[..payload_size + 2];
        if self.settings.trace_frames {
            debug!("📤 Request ({} bytes):\n{}", request.len(), format_frame_dump(request));
        }
        self.transport.write_frame(request)?;

        let mut resolver = LengthResolver::new(request_function);
        let deadline = Instant::now() + self.settings.byte_timeout;

        while !resolver.is_complete(capacity) {
            let timeout = match self.settings.timeout_policy {
                TimeoutPolicy::PerByte => self.settings.byte_timeout,
                TimeoutPolicy::Transaction => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        debug!("Response deadline passed after {} bytes", resolver.received());
                        break;
                    }
                    remaining
                }
            };

            match self.transport.read_byte(timeout) {
                Ok(byte) => {
                    raw[resolver.received()] = byte;
                    resolver.push(byte);
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    debug!("Byte read timed out after {} bytes", resolver.received());
                    break;
                }
                Err(e) => {
                    warn!("⚠️  Byte read failed after {} bytes: {}", resolver.received(), e);
                    break;
                }
            }
        }

        let received = resolver.received();
        buffer.set_len(received)?;

        let expected = match resolver.expected() {
            ExpectedLength::Known(len) if len == received => len,
            ExpectedLength::Known(len) => {
                warn!("❌ Response size mismatch: expected {} bytes, received {}", len, received);
                self.dump_failed(buffer.frame());
                return Err(ModbusError::SizeMismatch {
                    expected: Some(len),
                    received,
                });
            }
            ExpectedLength::Unknown => {
                warn!("❌ Response size unresolved, received {} bytes", received);
                self.dump_failed(buffer.frame());
                return Err(ModbusError::SizeMismatch {
                    expected: None,
                    received,
                });
            }
        };

        let response = buffer.frame();
        if self.settings.trace_frames {
            debug!("📥 Response ({} bytes):\n{}", expected, format_frame_dump(response));
        }

        if let Err((calculated, received_crc)) = verify_crc(response) {
            warn!(
                "❌ CRC mismatch: calculated 0x{:04X}, received 0x{:04X}",
                calculated, received_crc
            );
            return Err(ModbusError::CrcMismatch {
                expected: calculated,
                received: received_crc,
            });
        }

        let slave_address = response[0];
        let function_code = response[1];

        if self.settings.verify_slave_address && slave_address != request_address {
            warn!(
                "❌ Response from slave {} while addressing slave {}",
                slave_address, request_address
            );
            return Err(ModbusError::SlaveAddressMismatch {
                expected: request_address,
                received: slave_address,
            });
        }

        if let Some(code) = resolver.exception_code() {
            return Err(ModbusError::slave_exception(function_code, code));
        }

        Ok(Response {
            slave_address,
            function_code,
            length: expected,
        })
    }

    fn dump_failed(&self, frame: &[u8]) {
        if !frame.is_empty() {
            warn!("Received bytes:\n{}", format_frame_dump(frame));
        }
    }
}
