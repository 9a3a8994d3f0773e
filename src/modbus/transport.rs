use log::{debug, error, info, warn};
use serialport::{ClearBuffer, SerialPort};
use std::io::{self, Read, Write};
use std::time::Duration;

use crate::config::settings::{Config, ParityConfig, StopBitsConfig};
use crate::utils::error::{ModbusError, ModbusResult};

/// Byte-level access to a half-duplex bus.
///
/// The engine calls `write_frame` once per transaction, then `read_byte`
/// until the response is complete or a read fails.
pub trait Transport {
    fn write_frame(&mut self, frame: &[u8]) -> ModbusResult<()>;

    /// Waits at most `timeout` for the next byte.
    fn read_byte(&mut self, timeout: Duration) -> io::Result<u8>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write_frame(&mut self, frame: &[u8]) -> ModbusResult<()> {
        (**self).write_frame(frame)
    }

    fn read_byte(&mut self, timeout: Duration) -> io::Result<u8> {
        (**self).read_byte(timeout)
    }
}

pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    port_name: String,
    read_timeout: Duration,
}

impl SerialTransport {
    pub fn open(config: &Config) -> ModbusResult<Self> {
        info!("🔌 Connecting to Modbus RTU port: {}", config.serial_port);
        info!(
            "⚙️  Configuration: {} baud, 8 data bits, {} parity, {} stop bit(s)",
            config.baud_rate, config.parity, config.stop_bits
        );

        let parity = match config.parity {
            ParityConfig::None => serialport::Parity::None,
            ParityConfig::Even => serialport::Parity::Even,
            ParityConfig::Odd => serialport::Parity::Odd,
        };
        let stop_bits = match config.stop_bits {
            StopBitsConfig::One => serialport::StopBits::One,
            StopBitsConfig::Two => serialport::StopBits::Two,
        };
        let read_timeout = Duration::from_millis(config.timeout_ms);

        let port = serialport::new(config.serial_port.as_str(), config.baud_rate)
            .timeout(read_timeout)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(stop_bits)
            .parity(parity)
            .open()
            .map_err(|e| {
                error!("❌ Failed to open serial port {}: {}", config.serial_port, e);
                ModbusError::ConnectionError(format!("Failed to open port {}: {}", config.serial_port, e))
            })?;

        info!("✅ Modbus RTU connection established");
        Ok(Self {
            port,
            port_name: config.serial_port.clone(),
            read_timeout,
        })
    }
}

impl Transport for SerialTransport {
    fn write_frame(&mut self, frame: &[u8]) -> ModbusResult<()> {
        // Leftovers from an earlier, abandoned response would shift the next one.
        if let Err(e) = self.port.clear(ClearBuffer::Input) {
            warn!("⚠️  Could not discard stale input on {}: {}", self.port_name, e);
        }

        self.port
            .write_all(frame)
            .map_err(|e| ModbusError::CommunicationError(format!("Write failed: {}", e)))?;
        self.port
            .flush()
            .map_err(|e| ModbusError::CommunicationError(format!("Flush failed: {}", e)))?;
        Ok(())
    }

    fn read_byte(&mut self, timeout: Duration) -> io::Result<u8> {
        if timeout != self.read_timeout {
            self.port.set_timeout(timeout).map_err(io::Error::from)?;
            self.read_timeout = timeout;
        }

        let mut byte = [0u8; 1];
        match self.port.read(&mut byte)? {
            1 => Ok(byte[0]),
            _ => Err(io::Error::new(io::ErrorKind::TimedOut, "no byte before timeout")),
        }
    }
}

/// Lists serial ports visible to the system as `(name, description)` pairs.
pub fn available_ports() -> ModbusResult<Vec<(String, String)>> {
    let ports = serialport::available_ports()?;
    debug!("Found {} serial port(s)", ports.len());

    Ok(ports
        .into_iter()
        .map(|port| {
            let description = match &port.port_type {
                serialport::SerialPortType::UsbPort(usb) => match &usb.product {
                    Some(product) => format!("USB {:04x}:{:04x} {}", usb.vid, usb.pid, product),
                    None => format!("USB {:04x}:{:04x}", usb.vid, usb.pid),
                },
                serialport::SerialPortType::PciPort => "PCI".to_string(),
                serialport::SerialPortType::BluetoothPort => "Bluetooth".to_string(),
                serialport::SerialPortType::Unknown => "unknown".to_string(),
            };
            (port.port_name, description)
        })
        .collect())
}
