//! Settings for the serial link, the tick source and the credential storage.
//!
//! Use the [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
//! pattern to set the configurable values.

use std::time::Duration;

use log::warn;
pub use serialport::{DataBits, FlowControl, Parity, StopBits};

use crate::protocol::LOCKOUT_SECS;

// =============================================================================
// Public Interface
// =============================================================================

/// Groups all settings used by the two controller nodes and acts as a
/// [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
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

    /// Real time between two ticks of the elapsed-seconds counter. One second
    /// on a real door; shorter to run the timed phases faster in simulation.
    pub tick_period: Duration,

    /// Longest wait for a peer byte in the middle of a protocol exchange.
    /// `None` waits forever, which leaves a desynchronised pair of nodes
    /// stuck. Never shorter than [`Settings::min_read_timeout`], so the
    /// front-end can sit through a whole lockout.
    pub read_timeout: Option<Duration>,

    /// Path to the file emulating the back-end EEPROM. When not set, the
    /// credential is kept in memory and lost on exit.
    pub eeprom_image: Option<String>,

    /// Restrict creation of `Settings` instances unless through the
    /// `SettingsBuilder`.
    #[doc(hidden)]
    _private_use_builder: (),
}

impl Settings {
    /// Longest silence tolerated from the tick source inside a timed phase.
    pub fn tick_stall_limit(&self) -> Duration {
        self.tick_period * 4
    }

    /// Shortest accepted `read_timeout`: the lockout plus one tick.
    pub fn min_read_timeout(&self) -> Duration {
        self.tick_period * (LOCKOUT_SECS + 1)
    }
}

/// The builder for the `Settings` values.
///
/// All values are optional and have default values that will be used if not
/// explicitly set.
///
/// **Example**
///
/// ```
/// use doorlock::SettingsBuilder;
///
/// let settings = SettingsBuilder::new().path("/dev/ttyUSB0").finalize();
/// assert_eq!(settings.baud_rate, 9600);
/// ```
#[derive(Default)]
pub struct SettingsBuilder {
    settings: Settings,
}
impl SettingsBuilder {
    /// Start building the settings using default values and no path for the
    /// port.
    pub fn new() -> Self {
        Self::default()
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

    /// Set the real duration of one counted second
    pub fn tick_period(mut self, tick_period: Duration) -> Self {
        self.settings.tick_period = tick_period;
        self
    }

    /// Set the mid-exchange read timeout, `None` to block forever. A timeout
    /// shorter than the lockout is raised when finalizing.
    pub fn read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.settings.read_timeout = read_timeout;
        self
    }

    /// Set the path to the EEPROM image file
    pub fn eeprom_image<'a>(mut self, eeprom_image: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.eeprom_image = Some(eeprom_image.into().as_ref().to_owned());
        self
    }

    pub fn finalize(mut self) -> Settings {
        let floor = self.settings.min_read_timeout();
        if let Some(timeout) = self.settings.read_timeout {
            if timeout < floor {
                warn!(
                    "read timeout of {:?} is shorter than the lockout, using {:?}",
                    timeout, floor
                );
                self.settings.read_timeout = Some(floor);
            }
        }
        self.settings
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            path: None,
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
            tick_period: Duration::from_secs(1),
            read_timeout: Some(Duration::from_secs(120)),
            eeprom_image: None,
            _private_use_builder: (),
        }
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
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
            tick_period: Duration::from_secs(1),
            read_timeout: Some(Duration::from_secs(120)),
            eeprom_image: None,
            _private_use_builder: (),
        }
    )
}

#[test]
fn default_timeout_outlasts_the_lockout() {
    let settings = SettingsBuilder::new().finalize();
    let lockout = settings.tick_period * LOCKOUT_SECS;
    assert!(settings.read_timeout.unwrap() > lockout);
}

#[test]
fn timeout_is_raised_to_outlast_a_slow_lockout() {
    let settings = SettingsBuilder::new()
        .tick_period(Duration::from_millis(2500))
        .finalize();
    let lockout = settings.tick_period * LOCKOUT_SECS;
    assert_eq!(settings.read_timeout, Some(Duration::from_millis(152_500)));
    assert!(settings.read_timeout.unwrap() > lockout);

    let settings = SettingsBuilder::new()
        .tick_period(Duration::from_millis(10))
        .read_timeout(Some(Duration::from_millis(100)))
        .finalize();
    assert_eq!(settings.read_timeout, Some(Duration::from_millis(610)));
}

#[test]
fn long_enough_timeout_is_kept() {
    let settings = SettingsBuilder::new()
        .tick_period(Duration::from_millis(10))
        .read_timeout(Some(Duration::from_secs(2)))
        .finalize();
    assert_eq!(settings.read_timeout, Some(Duration::from_secs(2)));
}

#[test]
fn path() {
    let settings = SettingsBuilder::new().path("/dev/ttyUSB0").finalize();
    assert_eq!(settings.path.unwrap(), "/dev/ttyUSB0");
}

#[test]
fn baud_rate() {
    let baud_rate = 115_200;
    let settings = SettingsBuilder::new().baud_rate(baud_rate).finalize();
    assert_eq!(settings.baud_rate, baud_rate);
}

#[test]
fn serial_framing() {
    let settings = SettingsBuilder::new()
        .data_bits(DataBits::Seven)
        .parity(Parity::Even)
        .stop_bits(StopBits::Two)
        .flow_control(FlowControl::Hardware)
        .finalize();
    assert_eq!(settings.data_bits, DataBits::Seven);
    assert_eq!(settings.parity, Parity::Even);
    assert_eq!(settings.stop_bits, StopBits::Two);
    assert_eq!(settings.flow_control, FlowControl::Hardware);
}

#[test]
fn tick_period_drives_stall_limit() {
    let settings = SettingsBuilder::new()
        .tick_period(Duration::from_millis(5))
        .finalize();
    assert_eq!(settings.tick_period, Duration::from_millis(5));
    assert_eq!(settings.tick_stall_limit(), Duration::from_millis(20));
}

#[test]
fn unbounded_reads() {
    let settings = SettingsBuilder::new().read_timeout(None).finalize();
    assert_eq!(settings.read_timeout, None);
}

#[test]
fn eeprom_image() {
    let settings = SettingsBuilder::new()
        .eeprom_image("door.eeprom")
        .finalize();
    assert_eq!(settings.eeprom_image.unwrap(), "door.eeprom");
}
