//! Buttons wired to the GPIO pins of an FTDI USB adapter
//!
//! The adapter is put into asynchronous bit-bang mode with every pin as an input. The
//! number of buttons is the width of the adapter's pin mask and is only known once the
//! port is open. A high level is Unpressed and a low level is Pressed.

use super::{ButtonSource, ButtonStatus};
use crate::config::ControllerSpec;
use crate::error::{ConfigError, ConnectError, ReadError};
use crate::source::SourceInfo;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

pub const DEFAULT_URL: &str = "ftdi:///1";

const FTDI_VENDOR: u16 = 0x0403;
const DEFAULT_PRODUCT: u16 = 0x6014;

/// Product names accepted in place of a hex product id
const PRODUCT_ALIASES: &[(&str, u16)] = &[
    ("232", 0x6001),
    ("232r", 0x6001),
    ("2232", 0x6010),
    ("2232h", 0x6010),
    ("4232", 0x6011),
    ("4232h", 0x6011),
    ("232h", 0x6014),
    ("230x", 0x6015),
];

/// `ftdi://[vendor][:product]/interface`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FtdiUrl {
    pub vendor: u16,
    pub product: u16,
    /// 1-based interface of multi-port adapters
    pub interface: u8,
}

fn parse_id(text: &str) -> Result<u16, String> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid id {:?}: {}", text, e))
}

impl FromStr for FtdiUrl {
    type Err = String;

    fn from_str(url: &str) -> Result<Self, Self::Err> {
        let rest = url
            .strip_prefix("ftdi://")
            .ok_or_else(|| format!("{:?} does not start with ftdi://", url))?;
        let (device, interface) = rest
            .split_once('/')
            .ok_or_else(|| format!("{:?} has no interface", url))?;

        let interface = match interface.parse::<u8>() {
            Ok(n @ 1..=4) => n,
            _ => return Err(format!("interface {:?} is not 1..4", interface)),
        };

        let (vendor, product) = device.split_once(':').unwrap_or((device, ""));
        let vendor = match vendor.to_ascii_lowercase().as_str() {
            "" | "ftdi" => FTDI_VENDOR,
            other => parse_id(other)?,
        };
        let product = match product.to_ascii_lowercase().as_str() {
            "" => DEFAULT_PRODUCT,
            name => match PRODUCT_ALIASES.iter().find(|(alias, _)| *alias == name) {
                Some(&(_, id)) => id,
                None => parse_id(name)?,
            },
        };

        Ok(Self {
            vendor,
            product,
            interface,
        })
    }
}

impl fmt::Display for FtdiUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ftdi://{:#06x}:{:#06x}/{}",
            self.vendor, self.product, self.interface
        )
    }
}

/// An open GPIO port
pub trait GpioPort: Send {
    /// Mask of the pins usable as GPIO
    fn pins(&self) -> u16;

    /// Current level of every pin
    fn read(&mut self) -> Result<u16, ReadError>;
}

pub type FtdiOpener = Box<dyn FnMut(&FtdiUrl) -> Result<Box<dyn GpioPort>, ConnectError> + Send>;

/// Number of buttons behind a pin mask: the bit length of the mask
fn width_of(pins: u16) -> usize {
    (u16::BITS - pins.leading_zeros()) as usize
}

pub struct FtdiButtons {
    info: SourceInfo,
    url: FtdiUrl,
    opener: FtdiOpener,
    port: Option<Box<dyn GpioPort>>,
    button_count: usize,
}

impl FtdiButtons {
    pub fn from_spec(spec: &ControllerSpec) -> Result<Self, ConfigError> {
        Self::with_opener(spec, Box::new(hardware::open))
    }

    pub fn with_opener(spec: &ControllerSpec, opener: FtdiOpener) -> Result<Self, ConfigError> {
        let info = SourceInfo::button(spec)?;
        let raw_url = spec.options.string("ftdi_url", DEFAULT_URL)?;
        let url = raw_url
            .parse::<FtdiUrl>()
            .map_err(|reason| ConfigError::InvalidOption {
                controller: spec.name.clone(),
                key: "ftdi_url".to_string(),
                reason,
            })?;

        Ok(Self {
            info,
            url,
            opener,
            port: None,
            button_count: 0,
        })
    }

    pub fn url(&self) -> &FtdiUrl {
        &self.url
    }
}

impl ButtonSource for FtdiButtons {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn button_count(&self) -> usize {
        self.button_count
    }

    fn connect(&mut self) -> Result<(), ConnectError> {
        self.port = None;
        debug!("Opening FTDI port {} for {}", self.url, self.info.name);
        let port = (self.opener)(&self.url)?;

        self.button_count = width_of(port.pins());
        if self.info.mapped_count() > self.button_count {
            warn!(
                "{} maps {} buttons but {} only has {} pins",
                self.info.name,
                self.info.mapped_count(),
                self.url,
                self.button_count
            );
        }

        self.port = Some(port);
        info!(
            "FTDI {} connected with {} buttons",
            self.info.name, self.button_count
        );
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn button_status(&mut self, index: usize) -> Result<ButtonStatus, ReadError> {
        let port = self.port.as_mut().ok_or(ReadError::NotConnected)?;
        if index >= self.button_count {
            return Ok(ButtonStatus::Unknown);
        }
        let levels = port.read()?;
        Ok(ButtonStatus::from_active_low(levels & (1 << index) != 0))
    }
}

#[cfg(feature = "ftdi")]
mod hardware {
    //! The libftdi context is not `Send`, so it lives on its own thread and the port
    //! talks to it over channels. Dropping the port ends the thread and closes the device.

    use super::{FtdiUrl, GpioPort};
    use crate::error::{ConnectError, ReadError};
    use std::io::Read;
    use std::sync::mpsc::{self, Receiver, Sender};
    use tracing::debug;

    /// Bit-bang mode exposes the 8 pins of one interface
    const BITBANG_PINS: u16 = 0x00ff;

    struct BitbangPort {
        requests: Sender<()>,
        levels: Receiver<Result<u8, String>>,
    }

    impl GpioPort for BitbangPort {
        fn pins(&self) -> u16 {
            BITBANG_PINS
        }

        fn read(&mut self) -> Result<u16, ReadError> {
            let closed = || ReadError::Transport("FTDI reader thread exited".to_string());
            self.requests.send(()).map_err(|_| closed())?;
            let level = self
                .levels
                .recv()
                .map_err(|_| closed())?
                .map_err(ReadError::Transport)?;
            Ok(u16::from(level))
        }
    }

    fn open_device(url: &FtdiUrl) -> Result<ftdi::Device, ConnectError> {
        let interface = match url.interface {
            1 => ftdi::Interface::A,
            2 => ftdi::Interface::B,
            3 => ftdi::Interface::C,
            _ => ftdi::Interface::D,
        };
        let device_error = |e: ftdi::Error| ConnectError::Device(e.to_string());

        let mut device = ftdi::find_by_vid_pid(url.vendor, url.product)
            .interface(interface)
            .open()
            .map_err(device_error)?;
        device.usb_reset().map_err(device_error)?;
        // direction mask 0: every pin is an input
        device
            .set_bitmode(0x00, ftdi::BitMode::Bitbang)
            .map_err(device_error)?;
        Ok(device)
    }

    fn serve(mut device: ftdi::Device, requests: Receiver<()>, levels: Sender<Result<u8, String>>) {
        while requests.recv().is_ok() {
            let mut level = [0u8; 1];
            let result = device
                .read_exact(&mut level)
                .map(|()| level[0])
                .map_err(|e| e.to_string());
            if levels.send(result).is_err() {
                break;
            }
        }
        debug!("FTDI reader thread done");
    }

    pub(super) fn open(url: &FtdiUrl) -> Result<Box<dyn GpioPort>, ConnectError> {
        let url = *url;
        let (opened_tx, opened_rx) = mpsc::channel();
        let (request_tx, request_rx) = mpsc::channel();
        let (level_tx, level_rx) = mpsc::channel();

        std::thread::Builder::new()
            .name(format!("ftdi-{}", url.interface))
            .spawn(move || match open_device(&url) {
                Ok(device) => {
                    if opened_tx.send(Ok(())).is_ok() {
                        serve(device, request_rx, level_tx);
                    }
                }
                Err(e) => {
                    let _ = opened_tx.send(Err(e));
                }
            })
            .map_err(|e| ConnectError::Device(format!("cannot start FTDI thread: {}", e)))?;

        opened_rx
            .recv()
            .map_err(|_| ConnectError::Device("FTDI thread exited while opening".to_string()))??;

        Ok(Box::new(BitbangPort {
            requests: request_tx,
            levels: level_rx,
        }))
    }
}

#[cfg(not(feature = "ftdi"))]
mod hardware {
    use super::{FtdiUrl, GpioPort};
    use crate::error::ConnectError;

    pub(super) fn open(url: &FtdiUrl) -> Result<Box<dyn GpioPort>, ConnectError> {
        Err(ConnectError::Unsupported(format!(
            "{} requires building with the ftdi feature",
            url
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::tests::spec;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    struct FakePort {
        pins: u16,
        levels: Arc<Mutex<Result<u16, String>>>,
    }

    impl GpioPort for FakePort {
        fn pins(&self) -> u16 {
            self.pins
        }

        fn read(&mut self) -> Result<u16, ReadError> {
            self.levels.lock().unwrap().clone().map_err(ReadError::Transport)
        }
    }

    fn fake_opener(pins: u16, levels: Arc<Mutex<Result<u16, String>>>) -> FtdiOpener {
        Box::new(move |_: &FtdiUrl| {
            Ok(Box::new(FakePort {
                pins,
                levels: levels.clone(),
            }) as Box<dyn GpioPort>)
        })
    }

    #[test]
    fn parses_urls() {
        assert_eq!(
            "ftdi:///1".parse::<FtdiUrl>().unwrap(),
            FtdiUrl {
                vendor: 0x0403,
                product: 0x6014,
                interface: 1
            }
        );
        assert_eq!(
            "ftdi://ftdi:2232h/2".parse::<FtdiUrl>().unwrap(),
            FtdiUrl {
                vendor: 0x0403,
                product: 0x6010,
                interface: 2
            }
        );
        assert_eq!(
            "ftdi://0x0403:6001/1".parse::<FtdiUrl>().unwrap().product,
            0x6001
        );
    }

    #[test]
    fn rejects_bad_urls() {
        assert!("usb:///1".parse::<FtdiUrl>().is_err());
        assert!("ftdi://ftdi:232h".parse::<FtdiUrl>().is_err());
        assert!("ftdi:///5".parse::<FtdiUrl>().is_err());
        assert!("ftdi://ftdi:nope/1".parse::<FtdiUrl>().is_err());

        let err = FtdiButtons::from_spec(&spec("FTDI", &[], json!({"ftdi_url": "ftdi:///0"}))).err();
        assert!(matches!(err, Some(ConfigError::InvalidOption { key, .. }) if key == "ftdi_url"));
    }

    #[test]
    fn width_is_known_after_connect() {
        let levels = Arc::new(Mutex::new(Ok(0x00ff)));
        let mut ftdi = FtdiButtons::with_opener(
            &spec("FTDI", &["BTN_0", "BTN_1"], json!({})),
            fake_opener(0x00ff, levels.clone()),
        )
        .unwrap();
        assert_eq!(ftdi.button_count(), 0);
        assert!(matches!(ftdi.button_status(0), Err(ReadError::NotConnected)));

        ftdi.connect().unwrap();
        assert_eq!(ftdi.button_count(), 8);
        assert_eq!(ftdi.button_status(0).unwrap(), ButtonStatus::Unpressed);

        *levels.lock().unwrap() = Ok(0b1111_1110);
        assert_eq!(ftdi.button_status(0).unwrap(), ButtonStatus::Pressed);
        assert_eq!(ftdi.button_status(1).unwrap(), ButtonStatus::Unpressed);
        assert_eq!(ftdi.button_status(8).unwrap(), ButtonStatus::Unknown);

        *levels.lock().unwrap() = Err("unplugged".to_string());
        assert!(ftdi.button_status(0).is_err());
    }

    #[test]
    fn width_is_bit_length_of_mask() {
        assert_eq!(width_of(0x00ff), 8);
        assert_eq!(width_of(0x0f00), 12);
        assert_eq!(width_of(0xffff), 16);
        assert_eq!(width_of(0), 0);
    }

    #[cfg(not(feature = "ftdi"))]
    #[test]
    fn unsupported_without_feature() {
        let mut ftdi = FtdiButtons::from_spec(&spec("FTDI", &["BTN_0"], json!({}))).unwrap();
        assert!(matches!(ftdi.connect(), Err(ConnectError::Unsupported(_))));
        assert!(!ftdi.is_connected());
    }
}
