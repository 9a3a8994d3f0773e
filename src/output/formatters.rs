use chrono::Utc;
use serde_json::json;

/// Renders a frame two bytes per line (`10 03`), the last line holding the odd byte if any.
pub fn format_frame_dump(frame: &[u8]) -> String {
    frame
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|b| format!("{:02X}", b))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Register block read from one slave, ready for output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterReading {
    pub slave_address: u8,
    pub function_code: u8,
    pub start_register: u16,
    pub values: Vec<u16>,
}

impl RegisterReading {
    /// Consecutive register pairs as big-endian 32-bit values.
    pub fn values32(&self) -> Vec<u32> {
        self.values
            .chunks_exact(2)
            .map(|pair| ((pair[0] as u32) << 16) | pair[1] as u32)
            .collect()
    }
}

pub trait DataFormatter: Send + Sync {
    fn format_reading(&self, reading: &RegisterReading) -> String;
    fn format_write(&self, slave_address: u8, start_register: u16, count: usize) -> String;
}

pub struct ConsoleFormatter;

impl DataFormatter for ConsoleFormatter {
    fn format_reading(&self, reading: &RegisterReading) -> String {
        let mut output = format!(
            "🔹 Slave {} (function 0x{:02X}) - {}\n",
            reading.slave_address,
            reading.function_code,
            Utc::now().format("%Y-%m-%d %H:%M:%S")
        );
        for (offset, value) in reading.values.iter().enumerate() {
            output.push_str(&format!(
                "  Register {}: {} (0x{:04X})\n",
                reading.start_register as usize + offset,
                value,
                value
            ));
        }
        output
    }

    fn format_write(&self, slave_address: u8, start_register: u16, count: usize) -> String {
        format!(
            "✅ Wrote {} register(s) to slave {} starting at {}",
            count, slave_address, start_register
        )
    }
}

pub struct JsonFormatter;

impl DataFormatter for JsonFormatter {
    fn format_reading(&self, reading: &RegisterReading) -> String {
        let value = json!({
            "slave_address": reading.slave_address,
            "function_code": reading.function_code,
            "start_register": reading.start_register,
            "timestamp": Utc::now().to_rfc3339(),
            "values": reading.values,
        });
        serde_json::to_string_pretty(&value).unwrap_or_default()
    }

    fn format_write(&self, slave_address: u8, start_register: u16, count: usize) -> String {
        json!({
            "slave_address": slave_address,
            "start_register": start_register,
            "written": count,
            "timestamp": Utc::now().to_rfc3339(),
        })
        .to_string()
    }
}

pub struct HexFormatter;

impl DataFormatter for HexFormatter {
    fn format_reading(&self, reading: &RegisterReading) -> String {
        let bytes: Vec<u8> = reading.values.iter().flat_map(|v| v.to_be_bytes()).collect();
        format!(
            "{} | Slave {} | Start {} | Hex: {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            reading.slave_address,
            reading.start_register,
            hex::encode_upper(bytes)
        )
    }

    fn format_write(&self, slave_address: u8, start_register: u16, count: usize) -> String {
        format!("Slave {} | Start {} | Written {}", slave_address, start_register, count)
    }
}

pub fn formatter_for(name: &str) -> Option<Box<dyn DataFormatter>> {
    match name {
        "console" => Some(Box::new(ConsoleFormatter)),
        "json" => Some(Box::new(JsonFormatter)),
        "hex" => Some(Box::new(HexFormatter)),
        _ => None,
    }
}
