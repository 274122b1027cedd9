//! Dummy axis source producing random values

use super::{check_index, AxisSource};
use crate::config::ControllerSpec;
use crate::error::{ConfigError, ConnectError, ReadError};
use crate::source::SourceInfo;
use rand::Rng;
use tracing::info;

pub const AXES: usize = 4;

const VALUE_MIN: i32 = -32765;
const VALUE_MAX: i32 = 32765;

/// Axis source returning uniformly random values, for running without hardware
pub struct DummyAxis {
    info: SourceInfo,
    connected: bool,
}

impl DummyAxis {
    pub fn from_spec(spec: &ControllerSpec) -> Result<Self, ConfigError> {
        let info = SourceInfo::axis(spec)?;
        info.check_capacity(AXES)?;
        Ok(Self {
            info,
            connected: false,
        })
    }
}

impl AxisSource for DummyAxis {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn axis_count(&self) -> usize {
        AXES
    }

    fn connect(&mut self) -> Result<(), ConnectError> {
        self.connected = true;
        info!("Dummy axis source {} connected", self.info.name);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn axis_value(&mut self, index: usize) -> Result<f64, ReadError> {
        check_index(index, AXES)?;
        if !self.connected {
            return Err(ReadError::NotConnected);
        }
        Ok(f64::from(rand::rng().random_range(VALUE_MIN..=VALUE_MAX)))
    }
}
