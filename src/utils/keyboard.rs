use std::{io::stdout, process};

use crossterm::{
    cursor::{Hide, Show},
    event::{read, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode},
    Result,
};

use crate::hal::Key;

/// Block until the user presses a key the keypad knows about and translate it
/// into a keypad [`Key`].
pub(crate) fn read_keypad_key() -> Result<Key> {
    enable_raw_mode()?;
    execute!(stdout(), Hide)?;

    let key = loop {
        if let Event::Key(event) = read()? {
            if let Some(key) = translate(event) {
                break key;
            }
        }
    };

    execute!(stdout(), Show)?;
    disable_raw_mode()?;

    Ok(key)
}

fn translate(event: KeyEvent) -> Option<Key> {
    if event.modifiers == KeyModifiers::CONTROL && event.code == KeyCode::Char('c') {
        // As we are in raw mode, Ctrl+C will be captured here as a key
        // event. Catch it and exit the process if that happens
        let _ = disable_raw_mode();
        process::exit(0);
    }
    match event.code {
        KeyCode::Enter => Some(Key::Enter),
        KeyCode::Char(c) => Some(Key::from_char(c)),
        _ => None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn translates_keypad_keys() {
    let key = |code| translate(KeyEvent::from(code));
    assert_eq!(key(KeyCode::Char('7')), Some(Key::Digit(7)));
    assert_eq!(key(KeyCode::Enter), Some(Key::Enter));
    assert_eq!(key(KeyCode::Char('+')), Some(Key::Plus));
    assert_eq!(key(KeyCode::Char('-')), Some(Key::Minus));
    assert_eq!(key(KeyCode::Char('x')), Some(Key::Other('x')));
    assert_eq!(key(KeyCode::Esc), None);
}
