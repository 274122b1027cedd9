//! MCP23017 16 pin I2C GPIO expander
//!
//! All pins are inputs with the internal pull-ups enabled, buttons pull them to ground.
//! Pins 0..7 are port A, 8..15 port B.

use super::{ButtonSource, ButtonStatus};
use crate::bus::{rppal_opener, I2cBus, I2cOpener};
use crate::config::ControllerSpec;
use crate::error::{ConfigError, ConnectError, ReadError};
use crate::source::SourceInfo;
use tracing::{debug, info};

pub const DEFAULT_ADDRESS: u16 = 0x20;
pub const DEFAULT_BUS: u8 = 1;
pub const PINS: usize = 16;

// BANK = 0 register addresses
const IODIRA: u8 = 0x00;
const IODIRB: u8 = 0x01;
const GPPUA: u8 = 0x0C;
const GPPUB: u8 = 0x0D;
const GPIOA: u8 = 0x12;

pub struct Mcp23017 {
    info: SourceInfo,
    busnum: u8,
    address: u16,
    opener: I2cOpener,
    bus: Option<Box<dyn I2cBus>>,
}

impl Mcp23017 {
    pub fn from_spec(spec: &ControllerSpec) -> Result<Self, ConfigError> {
        Self::with_opener(spec, rppal_opener())
    }

    pub fn with_opener(spec: &ControllerSpec, opener: I2cOpener) -> Result<Self, ConfigError> {
        let info = SourceInfo::button(spec)?;
        info.check_capacity(PINS)?;

        Ok(Self {
            info,
            busnum: spec.options.bus(DEFAULT_BUS)?,
            address: spec.options.hex("address", DEFAULT_ADDRESS)?,
            opener,
            bus: None,
        })
    }

    /// Levels of all 16 pins, port A in the low byte
    fn read_levels(&mut self) -> Result<u16, ReadError> {
        let bus = self.bus.as_mut().ok_or(ReadError::NotConnected)?;
        let mut ports = [0u8; 2];
        // sequential read continues into GPIOB
        bus.read_register(GPIOA, &mut ports)?;
        Ok(u16::from_le_bytes(ports))
    }
}

impl ButtonSource for Mcp23017 {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn button_count(&self) -> usize {
        PINS
    }

    fn connect(&mut self) -> Result<(), ConnectError> {
        self.bus = None;
        debug!(
            "Connecting MCP23017 {} on bus {} at {:#04x}",
            self.info.name, self.busnum, self.address
        );
        let mut bus = (self.opener)(self.busnum, self.address)?;
        for register in [IODIRA, IODIRB, GPPUA, GPPUB] {
            bus.write_register(register, &[0xFF])?;
        }

        self.bus = Some(bus);
        info!("MCP23017 {} connected", self.info.name);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.bus.is_some()
    }

    fn button_status(&mut self, index: usize) -> Result<ButtonStatus, ReadError> {
        if index >= PINS {
            return Ok(ButtonStatus::Unknown);
        }
        let levels = self.read_levels()?;
        Ok(ButtonStatus::from_active_low(levels & (1 << index) != 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::MockBus;
    use crate::source::tests::spec;
    use serde_json::json;

    fn connected() -> (Mcp23017, MockBus) {
        let bus = MockBus::default();
        let mut mcp = Mcp23017::with_opener(
            &spec("MCP23017", &["BTN_0", "BTN_1"], json!({"address": "0x21"})),
            bus.opener(),
        )
        .unwrap();
        mcp.connect().unwrap();
        (mcp, bus)
    }

    #[test]
    fn connect_configures_inputs_with_pullups() {
        let (mcp, bus) = connected();
        assert!(mcp.is_connected());
        assert_eq!(
            bus.writes(),
            vec![
                (0x00, vec![0xFF]),
                (0x01, vec![0xFF]),
                (0x0C, vec![0xFF]),
                (0x0D, vec![0xFF]),
            ]
        );
    }

    #[test]
    fn low_level_is_pressed() {
        let (mut mcp, bus) = connected();
        // pin 0 and pin 9 pulled low
        bus.set_register(GPIOA, &[0b1111_1110, 0b1111_1101]);

        assert_eq!(mcp.button_status(0).unwrap(), ButtonStatus::Pressed);
        assert_eq!(mcp.button_status(1).unwrap(), ButtonStatus::Unpressed);
        assert_eq!(mcp.button_status(8).unwrap(), ButtonStatus::Unpressed);
        assert_eq!(mcp.button_status(9).unwrap(), ButtonStatus::Pressed);
        assert_eq!(mcp.button_status(16).unwrap(), ButtonStatus::Unknown);
    }

    #[test]
    fn read_failure_is_an_error() {
        let (mut mcp, bus) = connected();
        bus.set_fail_reads(true);
        assert!(mcp.button_status(0).is_err());
    }

    #[test]
    fn too_many_mappings() {
        let names: Vec<String> = (1..=17).map(|i| format!("BTN_TRIGGER_HAPPY{}", i)).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        assert!(matches!(
            Mcp23017::with_opener(&spec("MCP23017", &names, json!({})), MockBus::default().opener())
                .err(),
            Some(ConfigError::TooManyMappings { mapped: 17, available: 16, .. })
        ));
    }
}
