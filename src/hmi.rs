//! Front-end node: keypad entry, display prompts and the user-facing side of
//! the protocol.
//!
//! The front-end never sees the stored credential. It forwards what the user
//! types and shows whatever outcome the back-end reports.
//!
//! **Example** - Running the front-end on the PC terminal:
//! ```no_run
//! use doorlock::{
//!     hal::{TerminalDisplay, TerminalKeypad},
//!     hmi::{self, HmiPeripherals},
//!     utils, SettingsBuilder,
//! };
//!
//! let settings = SettingsBuilder::new().path("/dev/ttyUSB1").finalize();
//! let peripherals = HmiPeripherals {
//!     link: Box::new(utils::open_link(&settings).unwrap()),
//!     display: Box::new(TerminalDisplay::new()),
//!     keypad: Box::new(TerminalKeypad::new()),
//! };
//! let status = hmi::factory(settings, peripherals).run();
//! std::process::exit(status.into());
//! ```

mod events;
mod session;
mod state_machine;
mod states;

pub use session::HmiPeripherals;
pub use state_machine::{factory, FrontEndController};
