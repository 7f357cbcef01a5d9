//! Doorlock is a two-node door locker. A front-end node owns the keypad and
//! the character display, a back-end node owns the door motor, the alarm, the
//! credential in EEPROM and the lockout policy. The two talk over a serial
//! line with single-byte messages.
//!
//! The back-end is the authority: the front-end forwards what the user typed
//! and reports the verdicts and door phases it is told about. A 6-digit
//! credential is set at first power-up, gates opening the door and gates its
//! own replacement. Three consecutive failures lock the keypad out for a
//! minute with the alarm on.
//!
//! Both nodes can run on a PC: each on its own serial port, facing the other
//! node over a real (or virtual) null-modem cable, or together in one process
//! for a quick simulation.
//!
//! Each node is implemented as a state machine. State machines are implemented
//! in terms of **states** and **transitions** between them with the following
//! characteristics:
//!
//! * Can only be in one state at any time.
//! * Each state can have its own associated data if needed.
//! * There is shared data between **all** states: the settings and the
//!   peripherals of the node.
//! * Transitions between states are triggered via typed **events** and follow
//!   defined semantics.
//! * Only explicitly defined transitions should be permitted and as many errors
//!   should be detected at **compile-time**.
//! * Transitioning from one state to another consumes the original state and
//!   renders it unusable. Any transition back to that state would create a new
//!   state.
//! * Data can be transferred from one state to the next by attaching it to the
//!   transition event.
//!
//! The implementation of state transitions leverages `rust`'s `From` and `Into`
//! pattern: each state type implements `From` for the event types that lead to
//! it, so only transitions for which the `From` trait is implemented are
//! authorized.
//!
//! Errors never leave a state directly. Each state returns a `Result`, and the
//! state machine turns a failure into either a resynchronisation with the peer
//! (timeouts, garbage on the line) or the `Done` state (closed link, storage
//! failure).

pub mod control;
pub mod error;
pub mod hal;
pub mod hmi;
pub mod protocol;
mod settings;
pub mod simulator;
pub mod utils;

pub use settings::{Settings, SettingsBuilder};
