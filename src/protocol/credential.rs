//! Credentials, candidates and their wire encoding.

use std::fmt;

use super::messages::Verdict;

/// Number of symbols in a credential.
pub const CREDENTIAL_LEN: usize = 6;

/// Key code of the keypad's Enter key, also used on the wire to terminate a
/// credential frame.
pub const TERMINATOR: u8 = 0x0D;

/// Longest entry the front-end will collect and the back-end will accept
/// before declaring the frame garbage.
pub const MAX_ENTRY_LEN: usize = 15;

/// The 6-digit secret gating door access and its own replacement.
///
/// `Debug` output is masked so credentials never end up in logs.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Credential([u8; CREDENTIAL_LEN]);

impl Credential {
    pub fn new(digits: [u8; CREDENTIAL_LEN]) -> Self {
        Credential(digits)
    }

    /// Build a credential from entered digits; `None` unless there are exactly
    /// [`CREDENTIAL_LEN`] of them.
    pub fn from_digits(digits: &[u8]) -> Option<Self> {
        if digits.len() != CREDENTIAL_LEN || digits.iter().any(|d| *d > 9) {
            return None;
        }
        let mut symbols = [0; CREDENTIAL_LEN];
        symbols.copy_from_slice(digits);
        Some(Credential(symbols))
    }

    pub fn digits(&self) -> &[u8; CREDENTIAL_LEN] {
        &self.0
    }

    /// Element-wise comparison; a single differing symbol fails the whole
    /// comparison.
    pub fn verdict_against(&self, other: &Credential) -> Verdict {
        if self.0.iter().zip(other.0.iter()).all(|(a, b)| a == b) {
            Verdict::Matched
        } else {
            Verdict::Unmatched
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&"******").finish()
    }
}

/// What the back-end decoded out of one credential frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Candidate {
    Valid(Credential),
    /// Well-formed frame with the wrong number of digits. Never matches.
    WrongLength(usize),
}

impl Candidate {
    pub fn from_digits(digits: &[u8]) -> Self {
        match Credential::from_digits(digits) {
            Some(credential) => Candidate::Valid(credential),
            None => Candidate::WrongLength(digits.len()),
        }
    }

    pub fn verdict_against(&self, stored: &Credential) -> Verdict {
        match self {
            Candidate::Valid(credential) => credential.verdict_against(stored),
            Candidate::WrongLength(_) => Verdict::Unmatched,
        }
    }

    /// Compare two candidates of the setup protocol. Only two valid and
    /// identical candidates yield the credential to persist.
    pub fn confirm(&self, other: &Candidate) -> Option<Credential> {
        match (self, other) {
            (Candidate::Valid(first), Candidate::Valid(second))
                if first.verdict_against(second).is_match() =>
            {
                Some(*first)
            }
            _ => None,
        }
    }
}

/// Wire frame of an entry: one byte per digit followed by [`TERMINATOR`].
pub fn encode_entry(digits: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(digits.len() + 1);
    frame.extend_from_slice(digits);
    frame.push(TERMINATOR);
    frame
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn identical_credentials_match() {
    let a = Credential::new([1, 2, 3, 4, 5, 6]);
    let b = Credential::new([1, 2, 3, 4, 5, 6]);
    assert_eq!(a.verdict_against(&b), Verdict::Matched);
}

#[test]
fn any_single_difference_fails() {
    let stored = Credential::new([1, 2, 3, 4, 5, 6]);
    for position in 0..CREDENTIAL_LEN {
        let mut digits = *stored.digits();
        digits[position] = (digits[position] + 1) % 10;
        let other = Credential::new(digits);
        assert_eq!(
            other.verdict_against(&stored),
            Verdict::Unmatched,
            "position {}",
            position
        );
    }
}

#[test]
fn wrong_length_never_matches() {
    let stored = Credential::new([1, 2, 3, 4, 5, 6]);
    let short = Candidate::from_digits(&[1, 2, 3, 4, 5]);
    let long = Candidate::from_digits(&[1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(short, Candidate::WrongLength(5));
    assert_eq!(short.verdict_against(&stored), Verdict::Unmatched);
    assert_eq!(long.verdict_against(&stored), Verdict::Unmatched);
    assert_eq!(short.confirm(&short), None);
}

#[test]
fn confirm_requires_identical_pair() {
    let first = Candidate::from_digits(&[9, 9, 0, 0, 1, 1]);
    let second = Candidate::from_digits(&[9, 9, 0, 0, 1, 2]);
    assert_eq!(first.confirm(&second), None);
    assert_eq!(
        first.confirm(&first),
        Some(Credential::new([9, 9, 0, 0, 1, 1]))
    );
}

#[test]
fn entry_frame_ends_with_terminator() {
    assert_eq!(encode_entry(&[1, 2, 3]), vec![1, 2, 3, TERMINATOR]);
    assert_eq!(encode_entry(&[]), vec![TERMINATOR]);
}

#[test]
fn debug_output_is_masked() {
    let credential = Credential::new([1, 2, 3, 4, 5, 6]);
    let shown = format!("{:?}", credential);
    assert!(!shown.contains('1'));
}
