//! Back-end node: credential owner, lockout policy and door motor sequencing.
//!
//! **Example** - Running the back-end over a serial port:
//! ```no_run
//! use std::sync::Arc;
//!
//! use doorlock::{
//!     control::{self, ControlPeripherals},
//!     hal::{
//!         ConsoleAlarm, ConsoleMotor, FileEeprom, PeriodicTicker, StridedCredentialStore,
//!     },
//!     protocol::ElapsedSeconds,
//!     utils, SettingsBuilder,
//! };
//!
//! let settings = SettingsBuilder::new().path("/dev/ttyUSB0").finalize();
//! let seconds = Arc::new(ElapsedSeconds::new());
//! let peripherals = ControlPeripherals {
//!     link: Box::new(utils::open_link(&settings).unwrap()),
//!     store: Box::new(StridedCredentialStore::new(
//!         FileEeprom::open("door.eeprom").unwrap(),
//!     )),
//!     motor: Box::new(ConsoleMotor::new()),
//!     alarm: Box::new(ConsoleAlarm::new()),
//!     ticker: Box::new(PeriodicTicker::new(Arc::clone(&seconds), settings.tick_period)),
//!     seconds,
//! };
//! let status = control::factory(settings, peripherals).run();
//! std::process::exit(status.into());
//! ```

mod events;
mod session;
mod state_machine;
mod states;

pub use session::ControlPeripherals;
pub use state_machine::{factory, BackEndController};
