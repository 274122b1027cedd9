//! ADS1115 16-bit four channel ADC
//!
//! Channels are read single-ended against GND with single-shot conversions at 128 SPS.
//! The converter reads a few counts high at rest, so `BIAS` is subtracted before the
//! reading is normalized.

use super::{calibration_from_options, check_index, AxisSource, Calibration};
use super::{DEFAULT_CALIBRATION_MAX, DEFAULT_CALIBRATION_MIN};
use crate::bus::{rppal_opener, I2cBus, I2cOpener};
use crate::config::ControllerSpec;
use crate::error::{ConfigError, ConnectError, ReadError};
use crate::source::SourceInfo;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_ADDRESS: u16 = 0x48;
pub const DEFAULT_BUS: u8 = 1;
pub const CHANNELS: usize = 4;

const BIAS: f64 = 10.0;

const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

const CONFIG_OS_SINGLE: u16 = 0x8000;
const CONFIG_MUX_SINGLE_BASE: u16 = 0x4;
const CONFIG_MODE_SINGLE_SHOT: u16 = 0x0100;
const CONFIG_DR_128SPS: u16 = 0b100 << 5;
const CONFIG_COMP_DISABLE: u16 = 0x0003;

const CONVERSION_POLLS: usize = 20;
const CONVERSION_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// PGA bits for a gain setting
fn pga_bits(gain: i64) -> Option<u16> {
    match gain {
        0 => Some(0b000),
        1 => Some(0b001),
        2 => Some(0b010),
        4 => Some(0b011),
        8 => Some(0b100),
        16 => Some(0b101),
        _ => None,
    }
}

/// Config register value starting a single-shot conversion on `channel`
fn conversion_config(channel: usize, pga: u16) -> u16 {
    CONFIG_OS_SINGLE
        | ((CONFIG_MUX_SINGLE_BASE + channel as u16) << 12)
        | (pga << 9)
        | CONFIG_MODE_SINGLE_SHOT
        | CONFIG_DR_128SPS
        | CONFIG_COMP_DISABLE
}

pub struct Ads1115 {
    info: SourceInfo,
    busnum: u8,
    address: u16,
    pga: u16,
    calibration: Calibration,
    opener: I2cOpener,
    bus: Option<Box<dyn I2cBus>>,
}

impl Ads1115 {
    pub fn from_spec(spec: &ControllerSpec) -> Result<Self, ConfigError> {
        Self::with_opener(spec, rppal_opener())
    }

    pub fn with_opener(spec: &ControllerSpec, opener: I2cOpener) -> Result<Self, ConfigError> {
        let info = SourceInfo::axis(spec)?;
        info.check_capacity(CHANNELS)?;

        let options = &spec.options;
        let gain = options.int("gain", 0)?;
        let pga = pga_bits(gain).ok_or_else(|| ConfigError::InvalidOption {
            controller: spec.name.clone(),
            key: "gain".to_string(),
            reason: format!("{} is not one of 0, 1, 2, 4, 8, 16", gain),
        })?;

        Ok(Self {
            info,
            busnum: options.bus(DEFAULT_BUS)?,
            address: options.hex("address", DEFAULT_ADDRESS)?,
            pga,
            calibration: calibration_from_options(
                options,
                DEFAULT_CALIBRATION_MIN,
                DEFAULT_CALIBRATION_MAX,
            )?,
            opener,
            bus: None,
        })
    }

    fn read_channel(&mut self, channel: usize) -> Result<i16, ReadError> {
        let pga = self.pga;
        let bus = self.bus.as_mut().ok_or(ReadError::NotConnected)?;

        let config = conversion_config(channel, pga);
        bus.write_register(REG_CONFIG, &config.to_be_bytes())?;

        let mut status = [0u8; 2];
        let mut ready = false;
        for _ in 0..CONVERSION_POLLS {
            bus.read_register(REG_CONFIG, &mut status)?;
            if u16::from_be_bytes(status) & CONFIG_OS_SINGLE != 0 {
                ready = true;
                break;
            }
            thread::sleep(CONVERSION_POLL_INTERVAL);
        }
        if !ready {
            return Err(ReadError::Transport(format!(
                "conversion on channel {} did not complete",
                channel
            )));
        }

        let mut conversion = [0u8; 2];
        bus.read_register(REG_CONVERSION, &mut conversion)?;
        Ok(i16::from_be_bytes(conversion))
    }
}

impl AxisSource for Ads1115 {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn axis_count(&self) -> usize {
        CHANNELS
    }

    fn connect(&mut self) -> Result<(), ConnectError> {
        self.bus = None;
        debug!(
            "Connecting ADS1115 {} on bus {} at {:#04x}",
            self.info.name, self.busnum, self.address
        );
        let mut bus = (self.opener)(self.busnum, self.address)?;

        // the device must answer on the config register before we accept it
        let mut config = [0u8; 2];
        bus.read_register(REG_CONFIG, &mut config)?;

        self.bus = Some(bus);
        info!("ADS1115 {} connected", self.info.name);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.bus.is_some()
    }

    fn axis_value(&mut self, index: usize) -> Result<f64, ReadError> {
        check_index(index, CHANNELS)?;
        let raw = f64::from(self.read_channel(index)?) - BIAS;
        Ok(self.calibration.normalize(raw))
    }
}
