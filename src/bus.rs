//! Register-level I2C access
//!
//! Sources talk to their chips through [`I2cBus`] so that the register sequences can be
//! exercised without hardware. The production bus is rppal's `/dev/i2c-N` handle.

use crate::error::{ConnectError, ReadError};
use rppal::i2c::I2c;
use tracing::debug;

/// Register read/write on one slave address
pub trait I2cBus: Send {
    /// Write `data` starting at `register`
    fn write_register(&mut self, register: u8, data: &[u8]) -> Result<(), ReadError>;

    /// Fill `buffer` starting at `register`
    fn read_register(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), ReadError>;
}

/// Opens a bus for `(busnum, address)`, called on every connect attempt
pub type I2cOpener = Box<dyn FnMut(u8, u16) -> Result<Box<dyn I2cBus>, ConnectError> + Send>;

/// I2C bus backed by the Raspberry Pi's kernel driver
pub struct RppalBus {
    i2c: I2c,
}

impl RppalBus {
    pub fn open(busnum: u8, address: u16) -> Result<Self, ConnectError> {
        debug!("Opening I2C bus {} for address {:#04x}", busnum, address);
        let mut i2c = I2c::with_bus(busnum)?;
        i2c.set_slave_address(address)?;
        Ok(Self { i2c })
    }
}

impl I2cBus for RppalBus {
    fn write_register(&mut self, register: u8, data: &[u8]) -> Result<(), ReadError> {
        self.i2c.block_write(register, data)?;
        Ok(())
    }

    fn read_register(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), ReadError> {
        self.i2c.block_read(register, buffer)?;
        Ok(())
    }
}

/// Default opener used by the hardware sources
pub fn rppal_opener() -> I2cOpener {
    Box::new(|busnum, address| {
        let bus = RppalBus::open(busnum, address)?;
        Ok(Box::new(bus) as Box<dyn I2cBus>)
    })
}
