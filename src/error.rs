//! Error definitions shared by sources, joysticks and the scheduler

use thiserror::Error;

/// Errors raised while loading and validating the joystick configuration
///
/// All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Could not read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON
    #[error("Malformed JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// Config file is not valid TOML
    #[error("Malformed TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A controller entry lacks one of name/type/options/mapping
    #[error("Controller {controller} does not have a {field}")]
    MissingField {
        controller: String,
        field: &'static str,
    },

    /// Mapping references an event name that is not in the event table
    #[error("Event {0} is not a valid input event")]
    UnknownEvent(String),

    /// Mapping references an event of the wrong kind for the controller
    #[error("Controller {controller} cannot map {event}: expected a {expected} event")]
    WrongEventKind {
        controller: String,
        event: String,
        expected: &'static str,
    },

    /// No source variant is registered for this type string
    #[error("Controller {controller} has unknown type {kind}")]
    UnknownType { controller: String, kind: String },

    /// Option value could not be coerced to the expected type
    #[error("Option {key} of controller {controller} is invalid: {reason}")]
    InvalidOption {
        controller: String,
        key: String,
        reason: String,
    },

    /// Calibration bounds are unusable
    #[error("Invalid calibration: {0}")]
    InvalidCalibration(String),

    /// More events mapped than the device provides
    #[error("Controller {controller} maps {mapped} events but only has {available} inputs")]
    TooManyMappings {
        controller: String,
        mapped: usize,
        available: usize,
    },

    /// Poll interval could not be parsed
    #[error("Invalid wait time {value}: {reason}")]
    InvalidWaitTime { value: String, reason: String },
}

/// Errors raised while establishing a transport to a device
///
/// Never fatal, the source stays disconnected until a later reconnect.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// I2C bus could not be opened or the device did not acknowledge
    #[error("I2C error: {0}")]
    I2c(#[from] rppal::i2c::Error),

    /// Register programming failed after the bus was opened
    #[error("Handshake failed: {0}")]
    Handshake(#[from] ReadError),

    /// Device-specific open failure
    #[error("Device error: {0}")]
    Device(String),

    /// Transport not compiled into this build
    #[error("Unsupported transport: {0}")]
    Unsupported(String),
}

/// Errors raised while reading a value from a connected source
#[derive(Debug, Error)]
pub enum ReadError {
    /// Requested index is past the end of the device
    #[error("Index {index} out of range (device has {count} inputs)")]
    IndexOutOfRange { index: usize, count: usize },

    /// Source has no open transport
    #[error("Source is not connected")]
    NotConnected,

    /// I2C transfer failed
    #[error("I2C read failed: {0}")]
    I2c(#[from] rppal::i2c::Error),

    /// Any other transport failure
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Errors raised by the virtual device sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to create virtual device: {0}")]
    CreateDevice(#[source] std::io::Error),

    #[error("Failed to emit event: {0}")]
    EmitEvent(#[source] std::io::Error),

    #[error("Event code {0} cannot be emitted by this device")]
    UnsupportedEvent(String),
}

/// Errors raised while building a joystick
#[derive(Debug, Error)]
pub enum JoystickError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Errors that end an update worker
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The sink rejected an event, treated as fatal
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// The blocking sweep panicked or was aborted
    #[error("Worker task failed: {0}")]
    Task(String),
}
