//! Events for the front-end state machine.
//!
//! This module is private and restricted to the [`hmi`](crate::hmi) scope.
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use crate::protocol::Command;

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Why the user is asked for a new credential.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum SetupPurpose {
    Initial,
    /// After the old credential was accepted; the back-end confirms with
    /// `DONE` once the new one is stored.
    Change,
}

#[derive(Debug)]
pub(crate) struct SetupEvent {
    pub purpose: SetupPurpose,
}

#[derive(Debug)]
pub(crate) struct MenuEvent {}

/// A menu command was sent; the user must now prove they know the credential.
#[derive(Debug)]
pub(crate) struct VerifyEvent {
    pub command: Command,
}

#[derive(Debug)]
pub(crate) struct DoorCycleEvent {}

#[derive(Debug)]
pub(crate) struct LockoutEvent {
    pub command: Command,
}

#[derive(Debug)]
pub(crate) struct ResyncEvent {}

#[derive(Debug)]
pub(crate) struct DoneEvent {
    /// When `true`, indicates an abnormal completion caused by an error.
    pub with_errors: bool,
}

#[derive(Debug)]
pub(crate) struct ExitEvent {
    pub with_error: bool,
}

/// Events that can be triggered within the front-end state machine.
#[derive(Debug)]
pub(crate) enum Event {
    Setup(SetupEvent),
    Menu(MenuEvent),
    Verify(VerifyEvent),
    DoorCycle(DoorCycleEvent),
    Lockout(LockoutEvent),
    Resync(ResyncEvent),
    Done(DoneEvent),
    Exit(ExitEvent),
}
