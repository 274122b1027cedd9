//! Axis sources: devices producing continuous readings for virtual joystick axes
//!
//! Every variant implements [`AxisSource`]. [`create_axis_source`] resolves the `type`
//! string of a controller entry to a variant.

pub mod ads1115;
pub mod calibration;
pub mod dummy;
pub mod mpu6050;

pub use ads1115::Ads1115;
pub use calibration::{Calibration, POST_MAX, POST_MIN};
pub use dummy::DummyAxis;
pub use mpu6050::Mpu6050;

use crate::config::{ControllerSpec, OptionSet};
use crate::error::{ConfigError, ConnectError, ReadError};
use crate::source::SourceInfo;

pub const DEFAULT_CALIBRATION_MIN: f64 = -32766.0;
pub const DEFAULT_CALIBRATION_MAX: f64 = 32766.0;
pub const DEFAULT_CALIBRATION_THRESHOLD: f64 = 0.009;

/// A device producing `axis_count` normalized readings
pub trait AxisSource: Send {
    fn info(&self) -> &SourceInfo;

    /// Number of axes the device provides
    fn axis_count(&self) -> usize;

    /// Open the transport and program the device
    ///
    /// A failure leaves the source disconnected. Calling this again replaces any open
    /// transport.
    fn connect(&mut self) -> Result<(), ConnectError>;

    fn is_connected(&self) -> bool;

    /// Read axis `index` and map it onto `[POST_MIN, POST_MAX]`
    fn axis_value(&mut self, index: usize) -> Result<f64, ReadError>;

    /// Number of axes wired to output events
    fn mapped_count(&self) -> usize {
        self.info().mapped_count()
    }
}

/// Build the axis source named by `spec.kind`
pub fn create_axis_source(spec: &ControllerSpec) -> Result<Box<dyn AxisSource>, ConfigError> {
    let source: Box<dyn AxisSource> = match spec.kind.as_str() {
        "ADS1115" => Box::new(Ads1115::from_spec(spec)?),
        "MPU6050" => Box::new(Mpu6050::from_spec(spec)?),
        "Dummy" => Box::new(DummyAxis::from_spec(spec)?),
        other => {
            return Err(ConfigError::UnknownType {
                controller: spec.name.clone(),
                kind: other.to_string(),
            })
        }
    };
    Ok(source)
}

/// Calibration from `calibration_min`/`calibration_max`/`calibration_threshold`
pub(crate) fn calibration_from_options(
    options: &OptionSet,
    default_min: f64,
    default_max: f64,
) -> Result<Calibration, ConfigError> {
    Calibration::new(
        options.float("calibration_min", default_min)?,
        options.float("calibration_max", default_max)?,
        options.float("calibration_threshold", DEFAULT_CALIBRATION_THRESHOLD)?,
    )
}

pub(crate) fn check_index(index: usize, count: usize) -> Result<(), ReadError> {
    if index >= count {
        return Err(ReadError::IndexOutOfRange { index, count });
    }
    Ok(())
}
