//! Capability interfaces between the controller state machines and the
//! hardware, plus host implementations of each of them.
//!
//! | Interface | Node | Host implementation |
//! |---|---|---|
//! | [`SerialLink`] | both | [`SerialPortLink`], [`ChannelLink`] |
//! | [`CredentialStore`] / [`ByteStorage`] | back-end | [`StridedCredentialStore`] over [`FileEeprom`] or [`MemoryEeprom`] |
//! | [`ActuatorDriver`] | back-end | [`ConsoleMotor`] |
//! | [`AlarmDriver`] | back-end | [`ConsoleAlarm`] |
//! | [`TickSource`] | back-end | [`PeriodicTicker`] |
//! | [`DisplayDriver`] | front-end | [`TerminalDisplay`] |
//! | [`InputDriver`] | front-end | [`TerminalKeypad`] |

#[macro_use]
mod macros;

mod actuators;
mod link;
mod storage;
mod ticker;
mod ui;

#[cfg(test)]
pub(crate) mod fakes;

pub use actuators::{ActuatorDriver, AlarmDriver, ConsoleAlarm, ConsoleMotor, Direction};
pub use link::{ChannelLink, SerialLink, SerialPortLink};
pub use storage::{
    ByteStorage, CredentialStore, FileEeprom, MemoryEeprom, StridedCredentialStore,
    CREDENTIAL_BASE, EEPROM_CAPACITY, SYMBOL_STRIDE,
};
pub use ticker::{PeriodicTicker, TickSource};
pub use ui::{DisplayDriver, InputDriver, Key, TerminalDisplay, TerminalKeypad};
