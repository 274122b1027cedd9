//! Configuration model for joysticks and their controllers
//!
//! The config file is a JSON array of joystick definitions. A `.toml` file with a
//! `[[joysticks]]` array is accepted as well. Controller `options` are free-form because
//! every source type reads its own keys, and values may be given either as numbers or as
//! strings (`"0x48"`, `"32766"`).

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_JOYSTICK_NAME: &str = "Joyspyck Virtual Joystick";
pub const DEFAULT_WAIT_TIME_SECS: f64 = 0.05;

const UNNAMED_CONTROLLER: &str = "<unnamed>";

/// Poll interval as found in the file: seconds as a number or a numeric string
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum WaitTime {
    Seconds(f64),
    Text(String),
}

impl WaitTime {
    pub fn to_duration(&self) -> Result<Duration, ConfigError> {
        let (secs, raw) = match self {
            WaitTime::Seconds(secs) => (*secs, secs.to_string()),
            WaitTime::Text(text) => {
                let secs = text
                    .trim()
                    .parse::<f64>()
                    .map_err(|e| ConfigError::InvalidWaitTime {
                        value: text.clone(),
                        reason: e.to_string(),
                    })?;
                (secs, text.clone())
            }
        };

        Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::InvalidWaitTime {
            value: raw,
            reason: e.to_string(),
        })
    }
}

/// One controller entry (`buttonControllers[i]` / `axisControllers[i]`)
///
/// Fields are optional at the serde level so that a missing one is reported by
/// [`ControllerConfig::validate`] with the controller name instead of a bare parse error.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct ControllerConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub options: Option<Map<String, Value>>,
    #[serde(default)]
    pub mapping: Option<Vec<String>>,
}

impl ControllerConfig {
    /// Check that name/type/options/mapping are all present
    pub fn validate(&self) -> Result<ControllerSpec, ConfigError> {
        let name = self.name.clone().ok_or_else(|| ConfigError::MissingField {
            controller: UNNAMED_CONTROLLER.to_string(),
            field: "name",
        })?;
        let missing = |field| ConfigError::MissingField {
            controller: name.clone(),
            field,
        };

        let kind = self.kind.clone().ok_or_else(|| missing("type"))?;
        let options = self.options.clone().ok_or_else(|| missing("options"))?;
        let mapping = self.mapping.clone().ok_or_else(|| missing("mapping"))?;

        Ok(ControllerSpec {
            options: OptionSet::new(&name, options),
            name,
            kind,
            mapping,
        })
    }
}

/// A validated controller entry, input to the source factories
#[derive(Clone, Debug)]
pub struct ControllerSpec {
    pub name: String,
    pub kind: String,
    pub options: OptionSet,
    pub mapping: Vec<String>,
}

/// Variant-specific options with number/string coercion
#[derive(Clone, Debug, Default)]
pub struct OptionSet {
    controller: String,
    values: Map<String, Value>,
}

impl OptionSet {
    pub fn new(controller: &str, values: Map<String, Value>) -> Self {
        Self {
            controller: controller.to_string(),
            values,
        }
    }

    fn invalid(&self, key: &str, reason: impl ToString) -> ConfigError {
        ConfigError::InvalidOption {
            controller: self.controller.clone(),
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Base-10 integer option
    pub fn int(&self, key: &str, default: i64) -> Result<i64, ConfigError> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Number(n)) => n
                .as_i64()
                .ok_or_else(|| self.invalid(key, format!("{} is not an integer", n))),
            Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|e| self.invalid(key, e)),
            Some(other) => Err(self.invalid(key, format!("unexpected value {}", other))),
        }
    }

    /// Base-16 integer option, used for bus addresses
    ///
    /// Strings are parsed as hex with or without a `0x` prefix, numbers are taken as-is.
    pub fn hex(&self, key: &str, default: u16) -> Result<u16, ConfigError> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|v| u16::try_from(v).ok())
                .ok_or_else(|| self.invalid(key, format!("{} is not a valid address", n))),
            Some(Value::String(s)) => {
                let s = s.trim();
                let digits = s
                    .strip_prefix("0x")
                    .or_else(|| s.strip_prefix("0X"))
                    .unwrap_or(s);
                u16::from_str_radix(digits, 16).map_err(|e| self.invalid(key, e))
            }
            Some(other) => Err(self.invalid(key, format!("unexpected value {}", other))),
        }
    }

    pub fn float(&self, key: &str, default: f64) -> Result<f64, ConfigError> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| self.invalid(key, format!("{} is not a number", n))),
            Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|e| self.invalid(key, e)),
            Some(other) => Err(self.invalid(key, format!("unexpected value {}", other))),
        }
    }

    pub fn string(&self, key: &str, default: &str) -> Result<String, ConfigError> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(default.to_string()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(self.invalid(key, format!("expected a string, got {}", other))),
        }
    }

    /// Bus number option (`busnum`), shared by all I2C sources
    pub fn bus(&self, default: u8) -> Result<u8, ConfigError> {
        let value = self.int("busnum", i64::from(default))?;
        u8::try_from(value).map_err(|e| self.invalid("busnum", e))
    }
}

/// One virtual joystick definition
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct JoystickConfig {
    #[serde(default = "default_joystick_name")]
    pub name: String,
    #[serde(rename = "waitTimeButtons", default)]
    pub wait_time_buttons: Option<WaitTime>,
    #[serde(rename = "waitTimeAxis", default)]
    pub wait_time_axis: Option<WaitTime>,
    #[serde(rename = "buttonControllers", default)]
    pub button_controllers: Vec<ControllerConfig>,
    #[serde(rename = "axisControllers", default)]
    pub axis_controllers: Vec<ControllerConfig>,
}

fn default_joystick_name() -> String {
    DEFAULT_JOYSTICK_NAME.to_string()
}

impl JoystickConfig {
    pub fn button_interval(&self) -> Result<Duration, ConfigError> {
        resolve_wait_time(self.wait_time_buttons.as_ref())
    }

    pub fn axis_interval(&self) -> Result<Duration, ConfigError> {
        resolve_wait_time(self.wait_time_axis.as_ref())
    }
}

fn resolve_wait_time(value: Option<&WaitTime>) -> Result<Duration, ConfigError> {
    match value {
        Some(wait) => wait.to_duration(),
        None => Ok(Duration::from_secs_f64(DEFAULT_WAIT_TIME_SECS)),
    }
}

#[derive(Deserialize)]
struct TomlDocument {
    #[serde(default)]
    joysticks: Vec<JoystickConfig>,
}

/// The whole config file
#[derive(Clone, Debug, Default)]
pub struct JoyspyckConfig {
    pub joysticks: Vec<JoystickConfig>,
}

impl JoyspyckConfig {
    /// Read and parse a config file, TOML when the extension says so, JSON otherwise
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading config from {}", path.display());
        let content = fs::read_to_string(path)?;

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        let config = if is_toml {
            Self::from_toml(&content)?
        } else {
            Self::from_json(&content)?
        };
        debug!("Config contains {} joysticks", config.joysticks.len());
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let joysticks: Vec<JoystickConfig> = serde_json::from_str(content)?;
        Ok(Self { joysticks })
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let document: TomlDocument = toml::from_str(content)?;
        Ok(Self {
            joysticks: document.joysticks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn options(value: Value) -> OptionSet {
        match value {
            Value::Object(map) => OptionSet::new("test", map),
            _ => panic!("options must be an object"),
        }
    }

    #[test]
    fn parses_json_array_layout() {
        let config = JoyspyckConfig::from_json(
            r#"[{
                "waitTimeButtons": 0.02,
                "buttonControllers": [
                    {"name": "pad", "type": "Dummy", "options": {}, "mapping": ["BTN_0", "BTN_1"]}
                ],
                "axisControllers": [
                    {"name": "stick", "type": "ADS1115", "options": {"address": "0x49"}, "mapping": ["ABS_X"]}
                ]
            }]"#,
        )
        .unwrap();

        assert_eq!(config.joysticks.len(), 1);
        let js = &config.joysticks[0];
        assert_eq!(js.name, DEFAULT_JOYSTICK_NAME);
        assert_eq!(js.button_interval().unwrap(), Duration::from_millis(20));
        assert_eq!(js.axis_interval().unwrap(), Duration::from_millis(50));
        assert_eq!(js.button_controllers[0].kind.as_deref(), Some("Dummy"));
        assert_eq!(js.axis_controllers[0].mapping.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn wait_time_accepts_numeric_strings() {
        assert_eq!(
            WaitTime::Text("2".into()).to_duration().unwrap(),
            Duration::from_secs(2)
        );
        assert!(WaitTime::Text("soon".into()).to_duration().is_err());
        assert!(WaitTime::Seconds(-1.0).to_duration().is_err());
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = JoyspyckConfig::from_json("[{").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn missing_fields_name_the_controller() {
        let entry = ControllerConfig {
            name: Some("stick".into()),
            kind: Some("ADS1115".into()),
            options: None,
            mapping: Some(vec![]),
        };
        match entry.validate().unwrap_err() {
            ConfigError::MissingField { controller, field } => {
                assert_eq!(controller, "stick");
                assert_eq!(field, "options");
            }
            other => panic!("unexpected error {:?}", other),
        }

        let unnamed = ControllerConfig::default();
        assert!(matches!(
            unnamed.validate().unwrap_err(),
            ConfigError::MissingField { field: "name", .. }
        ));
    }

    #[test]
    fn option_coercion() {
        let opts = options(json!({
            "address": "0x20",
            "plain_hex": "68",
            "numeric_address": 72,
            "gain": "2",
            "threshold": "0.5",
            "bad": "abc",
            "url": "ftdi:///1"
        }));

        assert_eq!(opts.hex("address", 0).unwrap(), 0x20);
        assert_eq!(opts.hex("plain_hex", 0).unwrap(), 0x68);
        assert_eq!(opts.hex("numeric_address", 0).unwrap(), 72);
        assert_eq!(opts.hex("missing", 0x48).unwrap(), 0x48);
        assert_eq!(opts.int("gain", 0).unwrap(), 2);
        assert_eq!(opts.float("threshold", 0.0).unwrap(), 0.5);
        assert_eq!(opts.string("url", "").unwrap(), "ftdi:///1");
        assert_eq!(opts.bus(1).unwrap(), 1);
        assert!(matches!(
            opts.int("bad", 0).unwrap_err(),
            ConfigError::InvalidOption { .. }
        ));
    }

    #[test]
    fn loads_toml_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[[joysticks]]
name = "Cockpit"
waitTimeAxis = 0.01

[[joysticks.axisControllers]]
name = "tilt"
type = "MPU6050"
mapping = ["ABS_X", "ABS_Y"]

[joysticks.axisControllers.options]
address = "0x69"
"#
        )
        .unwrap();

        let config = JoyspyckConfig::load(file.path()).unwrap();
        let js = &config.joysticks[0];
        assert_eq!(js.name, "Cockpit");
        assert_eq!(js.axis_interval().unwrap(), Duration::from_millis(10));
        let spec = js.axis_controllers[0].validate().unwrap();
        assert_eq!(spec.options.hex("address", 0x68).unwrap(), 0x69);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = JoyspyckConfig::load(Path::new("/nonexistent/joyspyck.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
