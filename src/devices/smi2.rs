use log::info;
use std::thread;
use std::time::Duration;

use super::traits::Device;
use crate::modbus::client::ModbusClientTrait;
use crate::utils::error::ModbusError;

/// Display mode register.
pub const REG_DISPLAY_MODE: u16 = 17;
/// Command register; writing [`CMD_APPLY_SETTINGS`] activates the configured mode.
pub const REG_COMMAND: u16 = 15;
/// First of the two segment registers, one byte per digit, leftmost digit first.
pub const REG_SEGMENTS: u16 = 33;

pub const MODE_PORTRAIT: u16 = 4;
pub const CMD_APPLY_SETTINGS: u16 = 0x81;

/// Segment A (top) is bit 7 of a digit byte.
pub const SEGMENT_TOP: u8 = 0x80;
/// Top, middle and bottom segments of one digit.
pub const SEGMENTS_HORIZONTAL: u8 = 0x92;

#[derive(Debug, Clone, Copy)]
pub struct DemoTiming {
    /// Pause after each static pattern.
    pub hold: Duration,
    /// Pause between chaser frames; the indicator needs at least 200 ms.
    pub step: Duration,
}

impl Default for DemoTiming {
    fn default() -> Self {
        Self {
            hold: Duration::from_secs(10),
            step: Duration::from_millis(200),
        }
    }
}

/// Four-digit seven-segment SMI2 indicator driven in raw segment mode.
#[derive(Debug, Clone)]
pub struct Smi2Display {
    pub address: u8,
    pub name: String,
}

impl Smi2Display {
    pub fn new(address: u8, name: String) -> Self {
        Self { address, name }
    }

    fn digits_to_registers(digits: [u8; 4]) -> [u16; 2] {
        [
            u16::from_be_bytes([digits[0], digits[1]]),
            u16::from_be_bytes([digits[2], digits[3]]),
        ]
    }

    pub fn read_display_mode(&self, client: &mut dyn ModbusClientTrait) -> Result<u16, ModbusError> {
        let values = client.read_holding_registers(self.address, REG_DISPLAY_MODE, 1)?;
        values
            .first()
            .copied()
            .ok_or_else(|| ModbusError::InvalidData("empty display mode read".to_string()))
    }

    pub fn show_segments(&self, client: &mut dyn ModbusClientTrait, digits: [u8; 4]) -> Result<(), ModbusError> {
        client.write_multiple_registers(self.address, REG_SEGMENTS, &Self::digits_to_registers(digits))
    }

    /// Updates only the two leftmost digits; the others keep what they showed.
    pub fn show_left_pair(&self, client: &mut dyn ModbusClientTrait, left: u8, right: u8) -> Result<(), ModbusError> {
        client.write_multiple_registers(self.address, REG_SEGMENTS, &[u16::from_be_bytes([left, right])])
    }

    pub fn clear(&self, client: &mut dyn ModbusClientTrait) -> Result<(), ModbusError> {
        self.show_segments(client, [0; 4])
    }

    /// Segment blinking walkthrough: static patterns, partial updates, then
    /// chasers running a lit segment across the second digit, the first digit
    /// and finally both left digits at once.
    pub fn run_demo(&self, client: &mut dyn ModbusClientTrait, timing: DemoTiming) -> Result<(), ModbusError> {
        info!("🎬 Running segment demo on {} (slave {})", self.name, self.address);
        self.initialize(client)?;

        self.show_segments(client, [SEGMENT_TOP; 4])?;
        pause(timing.hold);

        self.show_segments(client, [SEGMENTS_HORIZONTAL; 4])?;
        pause(timing.hold);

        // Registers keep their value until power-off, so the right pair stays lit.
        self.show_left_pair(client, 0, SEGMENTS_HORIZONTAL)?;
        pause(timing.hold);

        self.show_left_pair(client, SEGMENTS_HORIZONTAL, 0)?;
        pause(timing.hold);

        self.clear(client)?;
        self.run_chaser(client, timing.step, |segment| (0, segment))?;

        self.clear(client)?;
        self.run_chaser(client, timing.step, |segment| (segment, 0))?;

        self.clear(client)?;
        self.run_chaser(client, timing.step, |segment| (segment, segment))?;

        info!("✅ Segment demo finished");
        Ok(())
    }

    fn run_chaser(
        &self,
        client: &mut dyn ModbusClientTrait,
        step: Duration,
        place: impl Fn(u8) -> (u8, u8),
    ) -> Result<(), ModbusError> {
        for _ in 0..3 {
            // Skips the two lowest segment bits.
            for shift in 2..8 {
                let (left, right) = place(1 << shift);
                self.show_left_pair(client, left, right)?;
                pause(step);
            }
        }
        Ok(())
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

impl Device for Smi2Display {
    fn device_type(&self) -> &str {
        "SMI2"
    }

    fn address(&self) -> u8 {
        self.address
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&self, client: &mut dyn ModbusClientTrait) -> Result<(), ModbusError> {
        client.write_multiple_registers(self.address, REG_DISPLAY_MODE, &[MODE_PORTRAIT])?;
        client.write_multiple_registers(self.address, REG_COMMAND, &[CMD_APPLY_SETTINGS])?;
        info!("Switched {} (slave {}) to portrait mode", self.name, self.address);
        Ok(())
    }
}
