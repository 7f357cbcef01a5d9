//! Wire protocol and timing policy shared by the front-end and back-end nodes.
//!
//! All messages are single bytes. Every protocol phase has its own symbol set
//! and the sets are disjoint, so a byte can never be read as a valid symbol of
//! the wrong phase:
//!
//! ```text
//!   0x00..=0x09  credential digits        0x0D  credential terminator
//!   0xA0..=0xA1  Command  (front -> back)
//!   0xB1..=0xB2  Verdict  (back -> front)
//!   0xC2..=0xC6  Notice   (back -> front)
//!   0xF0..=0xF2  LinkControl (READY / RESYNC / ARMED)
//! ```
//!
//! **Example** - Comparing a decoded candidate with the stored credential:
//! ```
//! use doorlock::protocol::{Candidate, Credential, Verdict};
//!
//! let stored = Credential::new([1, 2, 3, 4, 5, 6]);
//! let candidate = Candidate::from_digits(&[1, 2, 3, 4, 5, 6]);
//! assert_eq!(candidate.verdict_against(&stored), Verdict::Matched);
//! ```

mod credential;
mod messages;
mod timing;

pub use credential::{
    encode_entry, Candidate, Credential, CREDENTIAL_LEN, MAX_ENTRY_LEN, TERMINATOR,
};
pub use messages::{Command, LinkControl, Notice, Verdict, WireSymbol};
pub use timing::{
    ElapsedSeconds, DOOR_CLOSE_SECS, DOOR_OPEN_SECS, HOLD_OPEN_SECS, LOCKOUT_SECS, MAX_RETRIES,
    MOTOR_FULL_DUTY,
};
