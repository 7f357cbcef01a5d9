//! Events for the back-end state machine.
//!
//! This module is private and restricted to the [`control`](crate::control)
//! scope. Refer to the [`state_machine`](super::state_machine) module for an
//! overview of states, events and transitions.

use crate::protocol::Command;

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Why the setup protocol is being run.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum SetupPurpose {
    /// First credential after power-up.
    Initial,
    /// Replacement after the old credential was verified; ends with `DONE`.
    Change,
}

/// Run the two-candidate setup protocol.
#[derive(Debug)]
pub(crate) struct SetupEvent {
    pub purpose: SetupPurpose,
}

/// Go back to waiting for a menu command.
#[derive(Debug)]
pub(crate) struct ReadyEvent {}

/// A command was received; verify the stored credential before acting on it.
#[derive(Debug)]
pub(crate) struct VerifyEvent {
    pub command: Command,
}

/// The credential was verified for an open command.
#[derive(Debug)]
pub(crate) struct ActuateDoorEvent {}

/// Three consecutive failed attempts.
#[derive(Debug)]
pub(crate) struct LockoutEvent {
    pub command: Command,
}

/// The protocol lost sync with the peer (timeout, garbage, resync request).
#[derive(Debug)]
pub(crate) struct ResyncEvent {}

/// The controller is about to stop.
#[derive(Debug)]
pub(crate) struct DoneEvent {
    /// When `true`, indicates an abnormal completion caused by an error.
    pub with_errors: bool,
}

/// Leave the event loop.
#[derive(Debug)]
pub(crate) struct ExitEvent {
    pub with_error: bool,
}

/// Events that can be triggered within the back-end state machine.
#[derive(Debug)]
pub(crate) enum Event {
    Setup(SetupEvent),
    Ready(ReadyEvent),
    Verify(VerifyEvent),
    ActuateDoor(ActuateDoorEvent),
    Lockout(LockoutEvent),
    Resync(ResyncEvent),
    Done(DoneEvent),
    Exit(ExitEvent),
}
