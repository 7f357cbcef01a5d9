//! Keypad and character display of the front-end node.

use std::io;

use console::{style, Term};
use log::warn;

use crate::{error::InputError, utils::read_keypad_key};

/// Columns of the character display.
const COLUMNS: usize = 16;
/// Rows of the character display.
const ROWS: usize = 2;

/// One key of the 4x4 keypad.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Key {
    Digit(u8),
    Enter,
    /// Menu key selecting "change credential".
    Plus,
    /// Menu key selecting "open door".
    Minus,
    Other(char),
}

impl Key {
    pub fn from_char(c: char) -> Self {
        match c {
            '0'..='9' => Key::Digit(c as u8 - b'0'),
            '+' => Key::Plus,
            '-' => Key::Minus,
            '\r' | '\n' => Key::Enter,
            other => Key::Other(other),
        }
    }
}

/// Source of key presses.
pub trait InputDriver {
    /// Block until the next key press.
    fn read_key(&mut self) -> Result<Key, InputError>;
}

/// Character display with a cursor.
pub trait DisplayDriver {
    fn clear(&mut self);
    /// Write `text` at the cursor and advance it.
    fn write(&mut self, text: &str);
    fn move_to(&mut self, row: u8, column: u8);
}

// TerminalKeypad ==============================================================

/// Keypad emulated with the PC keyboard: digits, `Enter`, `+` and `-`.
#[derive(Debug, Default)]
pub struct TerminalKeypad;

impl TerminalKeypad {
    pub fn new() -> Self {
        TerminalKeypad
    }
}

impl InputDriver for TerminalKeypad {
    fn read_key(&mut self) -> Result<Key, InputError> {
        read_keypad_key()
            .map_err(|e| InputError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))
    }
}

// TerminalDisplay =============================================================

/// 16x2 character display drawn on the terminal. Every `clear` starts a new
/// frame so earlier messages stay in the scrollback.
pub struct TerminalDisplay {
    term: Term,
    rows: [String; ROWS],
    cursor: (usize, usize),
    drawn: bool,
}

impl TerminalDisplay {
    pub fn new() -> Self {
        TerminalDisplay {
            term: Term::stdout(),
            rows: [String::new(), String::new()],
            cursor: (0, 0),
            drawn: false,
        }
    }

    fn render(&mut self) -> io::Result<()> {
        if self.drawn {
            self.term.clear_last_lines(ROWS + 2)?;
        }
        let border = format!("+{}+", "-".repeat(COLUMNS));
        self.term.write_line(&style(&border).dim().to_string())?;
        for row in self.rows.iter() {
            self.term.write_line(&format!(
                "{}{}{}",
                style("|").dim(),
                style(format!("{:<width$}", row, width = COLUMNS)).green(),
                style("|").dim()
            ))?;
        }
        self.term.write_line(&style(&border).dim().to_string())?;
        self.drawn = true;
        Ok(())
    }

    fn refresh(&mut self) {
        if let Err(e) = self.render() {
            warn!("display refresh failed: {}", e);
        }
    }
}

impl Default for TerminalDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayDriver for TerminalDisplay {
    fn clear(&mut self) {
        self.rows = [String::new(), String::new()];
        self.cursor = (0, 0);
        // Keep the previous frame on screen, the next one is drawn below it.
        self.drawn = false;
    }

    fn write(&mut self, text: &str) {
        let (row, column) = self.cursor;
        let line = &mut self.rows[row];
        let mut cells: Vec<char> = line.chars().collect();
        for (offset, c) in text.chars().enumerate() {
            let at = column + offset;
            if at >= COLUMNS {
                break;
            }
            if at < cells.len() {
                cells[at] = c;
            } else {
                cells.resize(at, ' ');
                cells.push(c);
            }
        }
        *line = cells.into_iter().collect();
        self.cursor = (row, (column + text.chars().count()).min(COLUMNS));
        self.refresh();
    }

    fn move_to(&mut self, row: u8, column: u8) {
        self.cursor = (
            usize::from(row).min(ROWS - 1),
            usize::from(column).min(COLUMNS),
        );
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn keys_from_keyboard_characters() {
    assert_eq!(Key::from_char('0'), Key::Digit(0));
    assert_eq!(Key::from_char('9'), Key::Digit(9));
    assert_eq!(Key::from_char('\r'), Key::Enter);
    assert_eq!(Key::from_char('+'), Key::Plus);
    assert_eq!(Key::from_char('-'), Key::Minus);
    assert_eq!(Key::from_char('*'), Key::Other('*'));
}
