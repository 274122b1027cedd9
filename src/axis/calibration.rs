//! Mapping of raw sensor readings onto the virtual axis range

use crate::error::ConfigError;

/// Lower bound of every normalized axis value
pub const POST_MIN: f64 = -32765.0;
/// Upper bound of every normalized axis value
pub const POST_MAX: f64 = 32765.0;

/// Map `raw` from `[calib_min, calib_max]` onto `[post_min, post_max]`
///
/// Results whose magnitude is below `(post_max - post_min) * threshold` are snapped to
/// exactly zero. The result is not truncated, that happens when the value is emitted.
pub fn normalize(
    raw: f64,
    calib_min: f64,
    calib_max: f64,
    post_min: f64,
    post_max: f64,
    threshold: f64,
) -> f64 {
    let translated =
        post_min + (raw - calib_min) * (post_max - post_min) / (calib_max - calib_min);
    let half_range = (post_max - post_min) * threshold;

    if -half_range < translated && translated < half_range {
        0.0
    } else {
        translated
    }
}

/// Calibration bounds of one axis source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    raw_min: f64,
    raw_max: f64,
    post_min: f64,
    post_max: f64,
    threshold: f64,
}

impl Calibration {
    /// Bounds mapped onto the fixed `[POST_MIN, POST_MAX]` output range
    pub fn new(raw_min: f64, raw_max: f64, threshold: f64) -> Result<Self, ConfigError> {
        if !raw_min.is_finite() || !raw_max.is_finite() {
            return Err(ConfigError::InvalidCalibration(format!(
                "bounds must be finite, got [{}, {}]",
                raw_min, raw_max
            )));
        }
        if raw_min == raw_max {
            return Err(ConfigError::InvalidCalibration(format!(
                "calibration_min and calibration_max are both {}",
                raw_min
            )));
        }
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ConfigError::InvalidCalibration(format!(
                "threshold must be a non-negative number, got {}",
                threshold
            )));
        }

        Ok(Self {
            raw_min,
            raw_max,
            post_min: POST_MIN,
            post_max: POST_MAX,
            threshold,
        })
    }

    pub fn normalize(&self, raw: f64) -> f64 {
        normalize(
            raw,
            self.raw_min,
            self.raw_max,
            self.post_min,
            self.post_max,
            self.threshold,
        )
    }

    pub fn raw_min(&self) -> f64 {
        self.raw_min
    }

    pub fn raw_max(&self) -> f64 {
        self.raw_max
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_round_trip() {
        let calib = Calibration::new(-32766.0, 32766.0, 0.009).unwrap();
        assert_eq!(calib.normalize(-32766.0), POST_MIN);
        assert_eq!(calib.normalize(32766.0), POST_MAX);

        let tilt = Calibration::new(0.0, 180.0, 0.009).unwrap();
        assert_eq!(tilt.normalize(0.0), POST_MIN);
        assert_eq!(tilt.normalize(180.0), POST_MAX);
        assert_eq!(tilt.normalize(90.0), 0.0);
    }

    #[test]
    fn center_of_adc_range_is_zero() {
        let calib = Calibration::new(-32766.0, 32766.0, 0.009).unwrap();
        // raw 10 minus the converter bias
        assert_eq!(calib.normalize(10.0 - 10.0), 0.0);
        // 0.9% of the output span
        assert_eq!(calib.normalize(500.0), 0.0);
        assert!(calib.normalize(700.0) > 0.0);
    }

    #[test]
    fn rejects_degenerate_bounds() {
        assert!(matches!(
            Calibration::new(5.0, 5.0, 0.0),
            Err(ConfigError::InvalidCalibration(_))
        ));
        assert!(Calibration::new(f64::NAN, 5.0, 0.0).is_err());
        assert!(Calibration::new(0.0, 5.0, -0.1).is_err());
        assert!(Calibration::new(0.0, 5.0, f64::INFINITY).is_err());
    }

    #[test]
    fn inverted_bounds_flip_the_axis() {
        let calib = Calibration::new(100.0, 0.0, 0.0).unwrap();
        assert_eq!(calib.normalize(100.0), POST_MIN);
        assert_eq!(calib.normalize(0.0), POST_MAX);
    }
}
