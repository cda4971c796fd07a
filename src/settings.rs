//! Settings related to the serial port and the loading session.
//!
//! Use the [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
//! pattern to set the configurable values.

use std::time::Duration;

pub use serialport::{DataBits, FlowControl, Parity, StopBits};

/// Serial speed of the device firmware, in bits per second.
pub const DEFAULT_BAUD_RATE: u32 = 62_500;

/// How long the first exchange may wait for the firmware to answer.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// Public Interface
// =============================================================================

/// Groups all settings related to the serial port used by `tkload` and acts as
/// a [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
/// for the settings.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Settings {
    /// The port name, usually the device path.
    pub path: Option<String>,
    /// The baud rate in symbols-per-second.
    pub baud_rate: u32,
    /// Number of bits used to represent a character sent on the line.
    pub data_bits: DataBits,
    /// The type of signalling to use for controlling data transfer.
    pub flow_control: FlowControl,
    /// The type of parity to use for error checking.
    pub parity: Parity,
    /// Number of bits to use to signal the end of a character.
    pub stop_bits: StopBits,

    /// Path to the app binary to be loaded.
    pub app_file: Option<String>,

    /// Read timeout of the first exchange after connecting. A device that is
    /// not in firmware mode stays silent, and this is how long we wait before
    /// giving up. `None` waits forever.
    pub probe_timeout: Option<Duration>,

    /// Restrict creation of `Settings` instances unless through the
    /// `SettingsBuilder`.
    #[doc(hidden)]
    _private_use_builder: (),
}

/// The builder for the `Settings` values.
///
/// All values are optional and have default values that will be used if not
/// explicitly set.
///
/// **Example**
///
/// ```
/// let settings = tkload::SettingsBuilder::new().path("/dev/ttyACM0").finalize();
/// assert_eq!(settings.baud_rate, 62_500);
/// ```
pub struct SettingsBuilder {
    settings: Settings,
}
impl SettingsBuilder {
    /// Start building the settings using default values and no path for the
    /// port.
    pub fn new() -> Self {
        SettingsBuilder {
            settings: Settings {
                path: None,
                baud_rate: DEFAULT_BAUD_RATE,
                data_bits: DataBits::Eight,
                flow_control: FlowControl::None,
                parity: Parity::None,
                stop_bits: StopBits::One,
                app_file: None,
                probe_timeout: Some(DEFAULT_PROBE_TIMEOUT),
                _private_use_builder: (),
            },
        }
    }

    /// Set the path to the serial port
    pub fn path<'a>(mut self, path: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.path = Some(path.into().as_ref().to_owned());
        self
    }

    /// Set the baud rate in symbols-per-second
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.settings.baud_rate = baud_rate;
        self
    }

    /// Set the number of bits used to represent a character sent on the line
    pub fn data_bits(mut self, data_bits: DataBits) -> Self {
        self.settings.data_bits = data_bits;
        self
    }

    /// Set the type of signalling to use for controlling data transfer
    pub fn flow_control(mut self, flow_control: FlowControl) -> Self {
        self.settings.flow_control = flow_control;
        self
    }

    /// Set the type of parity to use for error checking
    pub fn parity(mut self, parity: Parity) -> Self {
        self.settings.parity = parity;
        self
    }

    /// Set the number of bits to use to signal the end of a character
    pub fn stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.settings.stop_bits = stop_bits;
        self
    }

    /// Set the path to the app binary
    pub fn app_file<'a>(mut self, app_file: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.app_file = Some(app_file.into().as_ref().to_owned());
        self
    }

    /// Set the read timeout of the first exchange, `None` to wait forever
    pub fn probe_timeout(mut self, probe_timeout: Option<Duration>) -> Self {
        self.settings.probe_timeout = probe_timeout;
        self
    }

    pub fn finalize(self) -> Settings {
        self.settings
    }
}
impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn all_default() {
    let settings = SettingsBuilder::new().finalize();
    assert_eq!(
        settings,
        Settings {
            path: None,
            baud_rate: 62_500,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
            app_file: None,
            probe_timeout: Some(Duration::from_secs(2)),
            _private_use_builder: (),
        }
    )
}

#[test]
fn path() {
    let settings = SettingsBuilder::new().path("/dev/ttyACM0").finalize();
    assert_eq!(settings.path.unwrap(), "/dev/ttyACM0");
}

#[test]
fn baud_rate() {
    let baud_rate = 115_200;
    let settings = SettingsBuilder::new().baud_rate(baud_rate).finalize();
    assert_eq!(settings.baud_rate, baud_rate);
}

#[test]
fn parity() {
    let parity = Parity::Even;
    let settings = SettingsBuilder::new().parity(parity).finalize();
    assert_eq!(settings.parity, parity);
}

#[test]
fn stop_bits() {
    let stop_bits = StopBits::Two;
    let settings = SettingsBuilder::new().stop_bits(stop_bits).finalize();
    assert_eq!(settings.stop_bits, stop_bits);
}

#[test]
fn app_file() {
    let settings = SettingsBuilder::new().app_file("signer.bin").finalize();
    assert_eq!(settings.app_file.unwrap(), "signer.bin");
}

#[test]
fn probe_timeout() {
    let settings = SettingsBuilder::default().probe_timeout(None).finalize();
    assert_eq!(settings.probe_timeout, None);
}
