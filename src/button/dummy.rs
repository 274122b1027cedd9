//! Dummy button source producing random presses

use super::{ButtonSource, ButtonStatus};
use crate::config::ControllerSpec;
use crate::error::{ConfigError, ConnectError, ReadError};
use crate::source::SourceInfo;
use rand::Rng;
use tracing::info;

pub const BUTTONS: usize = 16;

/// Button source returning random states, for running without hardware
pub struct DummyButtons {
    info: SourceInfo,
    connected: bool,
}

impl DummyButtons {
    pub fn from_spec(spec: &ControllerSpec) -> Result<Self, ConfigError> {
        let info = SourceInfo::button(spec)?;
        info.check_capacity(BUTTONS)?;
        Ok(Self {
            info,
            connected: false,
        })
    }
}

impl ButtonSource for DummyButtons {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn button_count(&self) -> usize {
        BUTTONS
    }

    fn connect(&mut self) -> Result<(), ConnectError> {
        self.connected = true;
        info!("Dummy button source {} connected", self.info.name);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn button_status(&mut self, index: usize) -> Result<ButtonStatus, ReadError> {
        if index >= BUTTONS {
            return Ok(ButtonStatus::Unknown);
        }
        if !self.connected {
            return Err(ReadError::NotConnected);
        }
        Ok(ButtonStatus::from_active_low(rand::rng().random_bool(0.5)))
    }
}
