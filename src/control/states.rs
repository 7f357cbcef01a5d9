//! States for the back-end state machine.
//!
//! This module is private and restricted to the [`control`](crate::control)
//! scope. The public interface of the state machine is provided by
//! [`control`](crate::control).
//!
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use log::{info, warn};

use crate::{
    error::Error,
    hal::Direction,
    protocol::{
        Command, LinkControl, Notice, WireSymbol, DOOR_CLOSE_SECS, DOOR_OPEN_SECS,
        HOLD_OPEN_SECS, LOCKOUT_SECS, MOTOR_FULL_DUTY,
    },
};

use super::events::*;
use super::session::{Access, ControlContext};

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Trait adding the ability for a state to be `run` after a transition into it.
pub(crate) trait Runnable {
    /// A state implements this method so it can be `run` after the state
    /// machine transitions into it.
    ///
    /// During this call, the state talks to the peer and drives the
    /// peripherals held by the context, and when finished, requests the
    /// transition to a new state by returning the appropriate `event`. Errors
    /// are not handled here; the state machine turns them into a `Resync` or
    /// a `Done` event.
    fn run(&mut self, ctx: &mut ControlContext) -> Result<Event, Error>;
}

// Init State ==================================================================

/// Power-up state: announce readiness to the front-end.
///
/// From the `InitState`, the state machine can only evolve via the
/// **`SetupEvent` => `SetupState`** transition, as nothing can be verified
/// before a first credential is set.
#[derive(Debug)]
pub(crate) struct InitState {}
impl Runnable for InitState {
    fn run(&mut self, ctx: &mut ControlContext) -> Result<Event, Error> {
        info!("=> Init");
        ctx.send(LinkControl::Ready)?;
        Ok(Event::Setup(SetupEvent {
            purpose: SetupPurpose::Initial,
        }))
    }
}

// Setup State =================================================================

/// Runs the two-candidate setup protocol until a credential is confirmed and
/// persisted.
#[derive(Debug)]
pub(crate) struct SetupState {
    pub purpose: SetupPurpose,
}
impl Runnable for SetupState {
    fn run(&mut self, ctx: &mut ControlContext) -> Result<Event, Error> {
        info!("=> Setup ({:?})", self.purpose);
        ctx.run_setup()?;
        if self.purpose == SetupPurpose::Change {
            ctx.send(Notice::Done)?;
        }
        Ok(Event::Ready(ReadyEvent {}))
    }
}

// Ready State =================================================================

/// Idle, waiting for a menu command. The read has no timeout: the user may
/// walk away from the keypad for as long as they like.
#[derive(Debug)]
pub(crate) struct ReadyState {}
impl Runnable for ReadyState {
    fn run(&mut self, ctx: &mut ControlContext) -> Result<Event, Error> {
        info!("=> Ready");
        loop {
            let byte = ctx.io.link.receive(None)?;
            if let Some(command) = Command::decode(byte) {
                info!("command {:?}", command);
                return Ok(Event::Verify(VerifyEvent { command }));
            }
            match LinkControl::decode(byte) {
                Some(LinkControl::Resync) => {
                    info!("resync requested by the front-end");
                    ctx.announce()?;
                }
                _ => warn!("ignoring byte {:#04x} while ready", byte),
            }
        }
    }
}

// Verify State ================================================================

/// Checks the entered credential against the stored one, allowing retries,
/// before acting on `command`.
#[derive(Debug)]
pub(crate) struct VerifyState {
    pub command: Command,
}
impl Runnable for VerifyState {
    fn run(&mut self, ctx: &mut ControlContext) -> Result<Event, Error> {
        info!("=> Verify ({:?})", self.command);
        let event = match (ctx.verify()?, self.command) {
            (Access::Denied, command) => Event::Lockout(LockoutEvent { command }),
            (Access::Granted, Command::Open) => Event::ActuateDoor(ActuateDoorEvent {}),
            (Access::Granted, Command::Change) => Event::Setup(SetupEvent {
                purpose: SetupPurpose::Change,
            }),
        };
        Ok(event)
    }
}

// ActuateDoor State ===========================================================

/// Open, hold, close. Each phase is counted in elapsed seconds and its end is
/// reported to the front-end.
#[derive(Debug)]
pub(crate) struct ActuateDoorState {}
impl Runnable for ActuateDoorState {
    fn run(&mut self, ctx: &mut ControlContext) -> Result<Event, Error> {
        info!("=> ActuateDoor");

        ctx.io.motor.drive(Direction::Clockwise, MOTOR_FULL_DUTY);
        let opened = ctx.hold_for(DOOR_OPEN_SECS);
        ctx.io.motor.stop();
        opened?;
        ctx.send(Notice::Opened)?;

        ctx.hold_for(HOLD_OPEN_SECS)?;
        ctx.send(Notice::Closing)?;

        ctx.io.motor.drive(Direction::CounterClockwise, MOTOR_FULL_DUTY);
        let closed = ctx.hold_for(DOOR_CLOSE_SECS);
        ctx.io.motor.stop();
        closed?;
        ctx.send(Notice::Closed)?;

        Ok(Event::Ready(ReadyEvent {}))
    }
}

// Lockout State ===============================================================

/// Too many failed attempts: sound the alarm for a fixed time.
#[derive(Debug)]
pub(crate) struct LockoutState {
    pub command: Command,
}
impl Runnable for LockoutState {
    fn run(&mut self, ctx: &mut ControlContext) -> Result<Event, Error> {
        warn!("=> Lockout ({:?} denied)", self.command);

        ctx.io.alarm.set_active(true);
        let held = ctx.hold_for(LOCKOUT_SECS);
        ctx.io.alarm.set_active(false);
        held?;
        ctx.send(Notice::Reset)?;

        Ok(Event::Ready(ReadyEvent {}))
    }
}

// Resync State ================================================================

/// Drop whatever the peer had in flight and announce where the session
/// resumes.
#[derive(Debug)]
pub(crate) struct ResyncState {}
impl Runnable for ResyncState {
    fn run(&mut self, ctx: &mut ControlContext) -> Result<Event, Error> {
        info!("=> Resync");
        ctx.io.link.discard_pending()?;
        ctx.announce()?;
        if ctx.provisioned {
            Ok(Event::Ready(ReadyEvent {}))
        } else {
            Ok(Event::Setup(SetupEvent {
                purpose: SetupPurpose::Initial,
            }))
        }
    }
}

// Done State ==================================================================

/// Leaves the hardware in a safe state before the event loop exits.
#[derive(Debug, Copy, Clone)]
pub(crate) struct DoneState {
    pub with_error: bool,
    pub should_exit: bool,
}
impl Runnable for DoneState {
    fn run(&mut self, ctx: &mut ControlContext) -> Result<Event, Error> {
        info!(
            "=> Done with{}errors",
            if self.with_error { " " } else { " no " }
        );
        ctx.io.motor.stop();
        ctx.io.alarm.set_active(false);
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

impl From<ReadyEvent> for ReadyState {
    fn from(_: ReadyEvent) -> Self {
        ReadyState {}
    }
}

impl From<VerifyEvent> for VerifyState {
    fn from(event: VerifyEvent) -> Self {
        VerifyState {
            command: event.command,
        }
    }
}

impl From<ActuateDoorEvent> for ActuateDoorState {
    fn from(_: ActuateDoorEvent) -> Self {
        ActuateDoorState {}
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
