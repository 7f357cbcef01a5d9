//! States for the front-end state machine.
//!
//! This module is private and restricted to the [`hmi`](crate::hmi) scope.
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use log::{debug, info, warn};

use crate::{
    error::{Error, LinkError},
    hal::Key,
    protocol::{Command, LinkControl, Notice, Verdict, WireSymbol},
};

use super::events::*;
use super::session::*;

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Trait adding the ability for a state to be `run` after a transition into it.
pub(crate) trait Runnable {
    /// Do the work of the state, then request the next transition by
    /// returning the appropriate `event`. Errors are turned into events by the
    /// state machine.
    fn run(&mut self, ctx: &mut HmiContext) -> Result<Event, Error>;
}

// Init State ==================================================================

/// Waits for the back-end to come up. Nothing can be shown to the user before
/// that.
///
/// A back-end that was already running when this node started has announced
/// itself long ago, so every timeout asks it to announce itself again. An
/// `ARMED` answer skips the initial setup.
#[derive(Debug)]
pub(crate) struct InitState {}
impl Runnable for InitState {
    fn run(&mut self, ctx: &mut HmiContext) -> Result<Event, Error> {
        info!("=> Init");
        loop {
            let byte = match ctx.io.link.receive(ctx.settings.read_timeout) {
                Ok(byte) => byte,
                Err(LinkError::Timeout(_)) => {
                    info!("no word from the back-end yet, asking it to announce itself");
                    ctx.send(LinkControl::Resync)?;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            match LinkControl::decode(byte) {
                Some(LinkControl::Ready) => {
                    return Ok(Event::Setup(SetupEvent {
                        purpose: SetupPurpose::Initial,
                    }))
                }
                Some(LinkControl::Armed) => return Ok(Event::Menu(MenuEvent {})),
                _ => warn!("ignoring byte {:#04x} before the back-end is ready", byte),
            }
        }
    }
}

// Setup State =================================================================

#[derive(Debug)]
pub(crate) struct SetupState {
    pub purpose: SetupPurpose,
}
impl Runnable for SetupState {
    fn run(&mut self, ctx: &mut HmiContext) -> Result<Event, Error> {
        info!("=> Setup ({:?})", self.purpose);
        ctx.choose_credential()?;
        if self.purpose == SetupPurpose::Change {
            ctx.await_notice(Notice::Done)?;
        }
        Ok(Event::Menu(MenuEvent {}))
    }
}

// Menu State ==================================================================

/// Main menu. `-` opens the door, `+` changes the credential.
#[derive(Debug)]
pub(crate) struct MenuState {}
impl Runnable for MenuState {
    fn run(&mut self, ctx: &mut HmiContext) -> Result<Event, Error> {
        info!("=> Menu");
        loop {
            ctx.show(MENU_OPEN, Some(MENU_CHANGE));
            let command = match ctx.io.keypad.read_key()? {
                Key::Minus => Command::Open,
                Key::Plus => Command::Change,
                key => {
                    debug!("no menu entry for {:?}", key);
                    continue;
                }
            };
            ctx.send(command)?;
            return Ok(Event::Verify(VerifyEvent { command }));
        }
    }
}

// Verify State ================================================================

#[derive(Debug)]
pub(crate) struct VerifyState {
    pub command: Command,
}
impl Runnable for VerifyState {
    fn run(&mut self, ctx: &mut HmiContext) -> Result<Event, Error> {
        info!("=> Verify ({:?})", self.command);
        let prompt = match self.command {
            Command::Open => ENTER_PASS,
            Command::Change => ENTER_OLD,
        };
        let event = match (ctx.prove_credential(prompt)?, self.command) {
            (Verdict::Unmatched, command) => Event::Lockout(LockoutEvent { command }),
            (Verdict::Matched, Command::Open) => Event::DoorCycle(DoorCycleEvent {}),
            (Verdict::Matched, Command::Change) => Event::Setup(SetupEvent {
                purpose: SetupPurpose::Change,
            }),
        };
        Ok(event)
    }
}

// DoorCycle State =============================================================

/// Mirrors the door phases reported by the back-end.
#[derive(Debug)]
pub(crate) struct DoorCycleState {}
impl Runnable for DoorCycleState {
    fn run(&mut self, ctx: &mut HmiContext) -> Result<Event, Error> {
        info!("=> DoorCycle");
        ctx.show(DOOR_OPENING, None);
        ctx.await_notice(Notice::Opened)?;
        ctx.show(DOOR_OPENED, None);
        ctx.await_notice(Notice::Closing)?;
        ctx.show(DOOR_CLOSING, None);
        ctx.await_notice(Notice::Closed)?;
        Ok(Event::Menu(MenuEvent {}))
    }
}

// Lockout State ===============================================================

#[derive(Debug)]
pub(crate) struct LockoutState {
    pub command: Command,
}
impl Runnable for LockoutState {
    fn run(&mut self, ctx: &mut HmiContext) -> Result<Event, Error> {
        warn!("=> Lockout ({:?} denied)", self.command);
        let message = match self.command {
            Command::Open => OPEN_LOCKOUT,
            Command::Change => CHANGE_LOCKOUT,
        };
        ctx.show(message, None);
        ctx.await_notice(Notice::Reset)?;
        Ok(Event::Menu(MenuEvent {}))
    }
}

// Resync State ================================================================

/// Gets both nodes back to a known point: ask the back-end where the session
/// stands, drop anything else in flight, then resume where it says.
///
/// An unsolicited `READY` or `ARMED` leads here too. It is not trusted as the
/// answer, as more frames or verdicts may have crossed it on the link.
#[derive(Debug)]
pub(crate) struct ResyncState {}
impl Runnable for ResyncState {
    fn run(&mut self, ctx: &mut HmiContext) -> Result<Event, Error> {
        info!("=> Resync");
        ctx.show(LINK_LOST, None);

        let armed = ctx.request_announce()?;
        ctx.io.link.discard_pending()?;

        if armed {
            Ok(Event::Menu(MenuEvent {}))
        } else {
            Ok(Event::Setup(SetupEvent {
                purpose: SetupPurpose::Initial,
            }))
        }
    }
}

// Done State ==================================================================

#[derive(Debug, Copy, Clone)]
pub(crate) struct DoneState {
    pub with_error: bool,
    pub should_exit: bool,
}
impl Runnable for DoneState {
    fn run(&mut self, _ctx: &mut HmiContext) -> Result<Event, Error> {
        info!(
            "=> Done with{}errors",
            if self.with_error { " " } else { " no " }
        );
        Ok(Event::Exit(ExitEvent {
            with_error: self.with_error,
        }))
    }
}

// -----------------------------------------------------------------------------
// State from Event transitions
// -----------------------------------------------------------------------------

impl From<SetupEvent> for SetupState {
    fn from(event: SetupEvent) -> Self {
        SetupState {
            purpose: event.purpose,
        }
    }
}

impl From<MenuEvent> for MenuState {
    fn from(_: MenuEvent) -> Self {
        MenuState {}
    }
}

impl From<VerifyEvent> for VerifyState {
    fn from(event: VerifyEvent) -> Self {
        VerifyState {
            command: event.command,
        }
    }
}

impl From<DoorCycleEvent> for DoorCycleState {
    fn from(_: DoorCycleEvent) -> Self {
        DoorCycleState {}
    }
}

impl From<LockoutEvent> for LockoutState {
    fn from(event: LockoutEvent) -> Self {
        LockoutState {
            command: event.command,
        }
    }
}

impl From<ResyncEvent> for ResyncState {
    fn from(_: ResyncEvent) -> Self {
        ResyncState {}
    }
}

impl From<DoneEvent> for DoneState {
    fn from(event: DoneEvent) -> Self {
        DoneState {
            with_error: event.with_errors,
            should_exit: false,
        }
    }
}
impl From<ExitEvent> for DoneState {
    fn from(event: ExitEvent) -> Self {
        DoneState {
            with_error: event.with_error,
            should_exit: true,
        }
    }
}
