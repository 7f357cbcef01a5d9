//! Error types shared by both controller nodes.
//!
//! Every fallible peripheral operation has its own error enum. The state
//! machines only deal with the umbrella [`Error`], which the `step()` of each
//! state machine turns into either a resynchronisation or a termination.

use std::{io, time::Duration};

use thiserror::Error;

/// Errors raised by a [`SerialLink`](crate::hal::SerialLink).
#[derive(Debug, Error)]
pub enum LinkError {
    /// No byte arrived within the allowed time.
    #[error("no data received within {0:?}")]
    Timeout(Duration),

    /// The peer is gone (channel hung up, port closed).
    #[error("link closed by peer")]
    Closed,

    /// Underlying I/O failure.
    #[error("link I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port configuration or access failure.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

/// Errors raised by persistent credential storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Address outside of the storage device.
    #[error("address {address:#06x} is out of range (capacity {capacity} bytes)")]
    OutOfRange {
        /// The faulty address.
        address: u16,
        /// Size of the device in bytes.
        capacity: usize,
    },

    /// A stored cell does not hold a credential symbol.
    #[error("cell {address:#06x} holds {value:#04x}, not a credential digit")]
    Corrupt {
        /// Address of the bad cell.
        address: u16,
        /// What was read there.
        value: u8,
    },

    /// The credential read back after a write differs from what was written.
    #[error("credential read back after write does not match")]
    VerifyFailed,

    /// Backing file failure.
    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised by an [`InputDriver`](crate::hal::InputDriver).
#[derive(Debug, Error)]
pub enum InputError {
    /// No more keys will ever arrive.
    #[error("input device closed")]
    Closed,

    /// Terminal or device failure.
    #[error("input I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while waiting on the elapsed-seconds counter.
#[derive(Debug, Error)]
pub enum TimingError {
    /// The tick source stopped delivering ticks in the middle of a phase.
    #[error("tick source stalled after {elapsed} of {target} seconds")]
    Stalled {
        /// Seconds counted before the stall.
        elapsed: u32,
        /// Seconds the phase was waiting for.
        target: u32,
    },
}

/// Umbrella error for the controller state machines.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Timing(#[from] TimingError),

    /// The peer sent something that makes no sense in the current phase.
    #[error("protocol desynchronised: {0}")]
    Desync(String),

    /// The back-end announced itself as ready in the middle of a session.
    #[error("peer re-announced itself mid-session")]
    Reannounced,
}

/// What a state machine should do with an [`Error`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Disposition {
    /// Recoverable: re-announce readiness and resume.
    Resync,
    /// The peer or the user went away; stop without reporting an error.
    Shutdown,
    /// Unrecoverable; stop and report the error.
    Fatal,
}

impl Error {
    pub(crate) fn disposition(&self) -> Disposition {
        match self {
            Error::Link(LinkError::Timeout(_)) | Error::Desync(_) | Error::Reannounced => {
                Disposition::Resync
            }
            Error::Link(LinkError::Closed) | Error::Input(InputError::Closed) => {
                Disposition::Shutdown
            }
            _ => Disposition::Fatal,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn timeouts_and_desync_are_recoverable() {
    let timeout: Error = LinkError::Timeout(Duration::from_secs(1)).into();
    assert_eq!(timeout.disposition(), Disposition::Resync);
    let desync = Error::Desync("stray byte".into());
    assert_eq!(desync.disposition(), Disposition::Resync);
    assert_eq!(Error::Reannounced.disposition(), Disposition::Resync);
}

#[test]
fn closed_peers_shut_down_cleanly() {
    let link: Error = LinkError::Closed.into();
    assert_eq!(link.disposition(), Disposition::Shutdown);
    let input: Error = InputError::Closed.into();
    assert_eq!(input.disposition(), Disposition::Shutdown);
}

#[test]
fn storage_failures_are_fatal() {
    let err: Error = StorageError::VerifyFailed.into();
    assert_eq!(err.disposition(), Disposition::Fatal);
    let err: Error = TimingError::Stalled {
        elapsed: 3,
        target: 15,
    }
    .into();
    assert_eq!(err.disposition(), Disposition::Fatal);
}
