//! Button sources: devices producing binary readings for virtual joystick buttons

pub mod dummy;
pub mod ftdi;
pub mod mcp23017;

pub use dummy::DummyButtons;
pub use ftdi::{FtdiButtons, FtdiUrl};
pub use mcp23017::Mcp23017;

use crate::config::ControllerSpec;
use crate::error::{ConfigError, ConnectError, ReadError};
use crate::source::SourceInfo;

/// Logical state of one button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonStatus {
    Pressed,
    #[default]
    Unpressed,
    /// The index does not exist on the device
    Unknown,
}

impl ButtonStatus {
    /// Status of an active-low input: a low level means pressed
    pub fn from_active_low(level_high: bool) -> Self {
        if level_high {
            ButtonStatus::Unpressed
        } else {
            ButtonStatus::Pressed
        }
    }

    /// Value written to the key event, `None` for `Unknown`
    pub fn event_value(self) -> Option<i32> {
        match self {
            ButtonStatus::Pressed => Some(1),
            ButtonStatus::Unpressed => Some(0),
            ButtonStatus::Unknown => None,
        }
    }
}

/// A device producing `button_count` binary readings
pub trait ButtonSource: Send {
    fn info(&self) -> &SourceInfo;

    /// Number of buttons, may change on connect for variable-width devices
    fn button_count(&self) -> usize;

    /// Open the transport and configure the inputs
    ///
    /// A failure leaves the source disconnected.
    fn connect(&mut self) -> Result<(), ConnectError>;

    fn is_connected(&self) -> bool;

    /// `Unknown` for an index past `button_count`, transport failures are errors
    fn button_status(&mut self, index: usize) -> Result<ButtonStatus, ReadError>;

    fn mapped_count(&self) -> usize {
        self.info().mapped_count()
    }
}

/// Build the button source named by `spec.kind`
pub fn create_button_source(
    spec: &ControllerSpec,
) -> Result<Box<dyn ButtonSource>, ConfigError> {
    let source: Box<dyn ButtonSource> = match spec.kind.as_str() {
        "MCP23017" => Box::new(Mcp23017::from_spec(spec)?),
        "FTDI" => Box::new(FtdiButtons::from_spec(spec)?),
        "Dummy" => Box::new(DummyButtons::from_spec(spec)?),
        other => {
            return Err(ConfigError::UnknownType {
                controller: spec.name.clone(),
                kind: other.to_string(),
            })
        }
    };
    Ok(source)
}
