//! Typed single-byte protocol messages.

use std::{convert::TryFrom, fmt::Debug};

/// A protocol symbol that travels as exactly one byte on the link.
pub trait WireSymbol: Copy + Debug + Into<u8> + TryFrom<u8> {
    /// Decode `byte` if it belongs to this symbol set.
    fn decode(byte: u8) -> Option<Self> {
        Self::try_from(byte).ok()
    }
}

/// Generates a fieldless enum with explicit byte values, its `u8`
/// conversions and the [`WireSymbol`] marker.
macro_rules! wire_symbols {
    (
        $(#[$meta:meta])*
        $name:ident { $( $(#[$vmeta:meta])* $variant:ident = $value:literal ),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl From<$name> for u8 {
            fn from(symbol: $name) -> u8 {
                match symbol {
                    $( $name::$variant => $value ),+
                }
            }
        }

        impl TryFrom<u8> for $name {
            type Error = u8;

            fn try_from(byte: u8) -> Result<Self, u8> {
                match byte {
                    $( $value => Ok($name::$variant), )+
                    other => Err(other),
                }
            }
        }

        impl WireSymbol for $name {}
    };
}

wire_symbols! {
    /// Link management symbols, valid in every phase.
    LinkControl {
        /// Back-end initialised (or resynchronised) and waiting for the
        /// initial setup.
        Ready = 0xF0,
        /// Front-end lost track of the protocol and asks the back-end to
        /// re-announce itself.
        Resync = 0xF1,
        /// Back-end resynchronised and holding a credential; the session
        /// resumes at the menu.
        Armed = 0xF2,
    }
}

wire_symbols! {
    /// Menu selection sent by the front-end while the back-end is `Ready`.
    Command {
        Open = 0xA0,
        Change = 0xA1,
    }
}

wire_symbols! {
    /// Outcome of one credential comparison.
    Verdict {
        Unmatched = 0xB1,
        Matched = 0xB2,
    }
}

wire_symbols! {
    /// Progress notices sent by the back-end at the end of timed phases.
    Notice {
        /// Lockout finished; back to the menu.
        Reset = 0xC2,
        /// Door fully open; hold phase begins.
        Opened = 0xC3,
        /// Door fully closed.
        Closed = 0xC4,
        /// Close phase begins.
        Closing = 0xC5,
        /// Credential change committed.
        Done = 0xC6,
    }
}

impl Verdict {
    pub fn is_match(self) -> bool {
        self == Verdict::Matched
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
fn all_bytes() -> Vec<u8> {
    let mut bytes: Vec<u8> = [LinkControl::Ready, LinkControl::Resync, LinkControl::Armed]
        .iter()
        .map(|&l| u8::from(l))
        .collect();
    bytes.extend([Command::Open, Command::Change].iter().map(|&c| u8::from(c)));
    bytes.extend(
        [Verdict::Unmatched, Verdict::Matched]
            .iter()
            .map(|&v| u8::from(v)),
    );
    bytes.extend(
        [
            Notice::Reset,
            Notice::Opened,
            Notice::Closed,
            Notice::Closing,
            Notice::Done,
        ]
        .iter()
        .map(|&n| u8::from(n)),
    );
    bytes
}

#[test]
fn symbol_sets_are_disjoint() {
    let bytes = all_bytes();
    let mut sorted = bytes.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), bytes.len());
}

#[test]
fn symbols_never_collide_with_credential_bytes() {
    for byte in all_bytes() {
        assert!(byte > super::TERMINATOR, "{:#04x} overlaps entry bytes", byte);
    }
}

#[test]
fn decoding_is_scoped_to_the_symbol_set() {
    assert_eq!(Command::decode(0xA0), Some(Command::Open));
    assert_eq!(Command::decode(0xB1), None);
    assert_eq!(Verdict::decode(0xB1), Some(Verdict::Unmatched));
    assert_eq!(Verdict::decode(0xA1), None);
    assert_eq!(Notice::decode(0xC6), Some(Notice::Done));
    assert_eq!(LinkControl::decode(0xF0), Some(LinkControl::Ready));
    assert_eq!(LinkControl::decode(0xF2), Some(LinkControl::Armed));
    assert_eq!(Notice::try_from(0x07), Err(0x07));
}
