use crate::modbus::client::ModbusClientTrait;
use crate::utils::error::ModbusError;

pub trait Device {
    fn device_type(&self) -> &str;
    fn address(&self) -> u8;
    fn name(&self) -> &str;

    /// Brings the device into the state the driver expects.
    fn initialize(&self, client: &mut dyn ModbusClientTrait) -> Result<(), ModbusError>;
}
