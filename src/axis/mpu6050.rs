//! MPU6050 accelerometer used as a tilt sensor
//!
//! Only the accelerometer is read. Each logical axis is the angle between one sensor
//! axis and the measured gravity vector, in degrees. A single accelerometer cannot tell
//! N° from 180°-N°, so the raw range is fixed to `[0, 180]`.

use super::{check_index, AxisSource, Calibration, DEFAULT_CALIBRATION_THRESHOLD};
use crate::bus::{rppal_opener, I2cBus, I2cOpener};
use crate::config::ControllerSpec;
use crate::error::{ConfigError, ConnectError, ReadError};
use crate::source::SourceInfo;
use tracing::{debug, info};

pub const DEFAULT_ADDRESS: u16 = 0x68;
pub const DEFAULT_BUS: u8 = 1;
pub const AXES: usize = 3;

const ANGLE_MIN: f64 = 0.0;
const ANGLE_MAX: f64 = 180.0;

/// LSB per g at ±2 g full scale
const ACCEL_SCALE: f64 = 16384.0;

const SMPLRT_DIV: u8 = 0x19;
const CONFIG: u8 = 0x1A;
const GYRO_CONFIG: u8 = 0x1B;
const ACCEL_CONFIG: u8 = 0x1C;
const INT_ENABLE: u8 = 0x38;
const ACCEL_XOUT_H: u8 = 0x3B;
const PWR_MGMT_1: u8 = 0x6B;

/// Register writes performed on connect, in order
const INIT_SEQUENCE: [(u8, u8); 6] = [
    (SMPLRT_DIV, 7),
    // wake up, clock from the X gyro
    (PWR_MGMT_1, 1),
    (CONFIG, 0),
    (INT_ENABLE, 1),
    (GYRO_CONFIG, 24),
    (ACCEL_CONFIG, 0),
];

fn dist(a: f64, b: f64) -> f64 {
    (a * a + b * b).sqrt()
}

/// Angles in degrees between gravity and the sensor's Y, X and Z axes
///
/// `[atan2(dist(x, z), y), atan2(dist(y, z), x), atan2(dist(x, y), z)]`. With the board
/// lying flat the X and Y angles are 90° and Z is 0°.
pub fn tilt_angles(x: f64, y: f64, z: f64) -> [f64; 3] {
    [
        dist(x, z).atan2(y).to_degrees(),
        dist(y, z).atan2(x).to_degrees(),
        dist(x, y).atan2(z).to_degrees(),
    ]
}

pub struct Mpu6050 {
    info: SourceInfo,
    busnum: u8,
    address: u16,
    calibration: Calibration,
    opener: I2cOpener,
    bus: Option<Box<dyn I2cBus>>,
}

impl Mpu6050 {
    pub fn from_spec(spec: &ControllerSpec) -> Result<Self, ConfigError> {
        Self::with_opener(spec, rppal_opener())
    }

    pub fn with_opener(spec: &ControllerSpec, opener: I2cOpener) -> Result<Self, ConfigError> {
        let info = SourceInfo::axis(spec)?;
        info.check_capacity(AXES)?;

        let options = &spec.options;
        let threshold = options.float("calibration_threshold", DEFAULT_CALIBRATION_THRESHOLD)?;

        Ok(Self {
            info,
            busnum: options.bus(DEFAULT_BUS)?,
            address: options.hex("address", DEFAULT_ADDRESS)?,
            calibration: Calibration::new(ANGLE_MIN, ANGLE_MAX, threshold)?,
            opener,
            bus: None,
        })
    }

    /// Acceleration in g along x, y and z
    fn read_acceleration(&mut self) -> Result<(f64, f64, f64), ReadError> {
        let bus = self.bus.as_mut().ok_or(ReadError::NotConnected)?;
        let mut raw = [0u8; 6];
        bus.read_register(ACCEL_XOUT_H, &mut raw)?;

        let word = |i: usize| f64::from(i16::from_be_bytes([raw[i], raw[i + 1]])) / ACCEL_SCALE;
        Ok((word(0), word(2), word(4)))
    }
}

impl AxisSource for Mpu6050 {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn axis_count(&self) -> usize {
        AXES
    }

    fn connect(&mut self) -> Result<(), ConnectError> {
        self.bus = None;
        debug!(
            "Connecting MPU6050 {} on bus {} at {:#04x}",
            self.info.name, self.busnum, self.address
        );
        let mut bus = (self.opener)(self.busnum, self.address)?;
        for (register, value) in INIT_SEQUENCE {
            bus.write_register(register, &[value])?;
        }

        self.bus = Some(bus);
        info!("MPU6050 {} connected", self.info.name);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.bus.is_some()
    }

    fn axis_value(&mut self, index: usize) -> Result<f64, ReadError> {
        check_index(index, AXES)?;
        let (x, y, z) = self.read_acceleration()?;
        let angle = tilt_angles(x, y, z)[index];
        Ok(self.calibration.normalize(angle))
    }
}
