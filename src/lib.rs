//! Joyspyck polls analog, tilt and button hardware and republishes it as virtual
//! joysticks on Linux uinput.

pub mod axis;
pub mod bus;
pub mod button;
pub mod config;
pub mod error;
pub mod events;
pub mod joystick;
pub mod runtime;
pub mod scheduler;
pub mod source;

pub use config::JoyspyckConfig;
pub use error::{ConfigError, ConnectError, JoystickError, ReadError, SinkError, WorkerError};
pub use joystick::Joystick;
pub use runtime::Joyspyck;
