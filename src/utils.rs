//! Helper functions to deal with serial ports and the terminal keyboard.

mod keyboard;
mod ports;

pub(crate) use keyboard::read_keypad_key;
pub use ports::{open_link, select_port};
