//! Back-end state machine.
//!
//! The back-end is the authority of the system: it holds the credential, runs
//! the comparisons, decides on lockout and drives the door. The front-end only
//! ever learns about outcomes through the symbols sent from here.
//!
//! The following state diagram summarizes the different states and transitions
//! the back-end goes through:
//!
//! ```text
//!                 START
//!                   |
//!                   v
//!               .-------.
//!               | Init  |  READY
//!               '-------'
//!                   |
//!                   v
//!              .---------.   unmatched: again
//!       .----->|  Setup  |<-------------------.
//!       |      '---------'                    |
//!       |           |  MATCHED, stored        |
//!       |           |  (DONE after a change)  |
//!       |           v                         |
//!       |      .---------.  RESYNC: ARMED     |
//!       |      |  Ready  |<------------.      |
//!       |      '---------'             |      |
//!       |           | OPEN / CHANGE    |      |
//!       |           v                  |      |
//!       |      .----------.  change    |      |
//!       |      |  Verify  |------------+------'
//!       |      '----------'            |
//!       |     3 fails |   | open       |
//!       |             v   v            |
//!       |   .---------. .-------------.|
//!       |   | Lockout | | ActuateDoor ||
//!       |   '---------' '-------------'|
//!       |        |   RESET     |  CLOSED
//!       |        '-------------+-------'
//!       |
//!       |   .--------.  garbage, RESYNC or a stalled frame
//!       '---| Resync |<------ (any state reading a frame)
//!           '--------'
//!                         link closed, storage failure
//!                           --------> Done --> END
//! ```
//!
//! `Resync` goes back to `Setup` and announces `READY` only while no
//! credential was stored since power-up; otherwise it announces `ARMED` and
//! goes to `Ready`.
//!
//! Waiting for the first byte of a frame never times out, as it depends on
//! the user at the keypad. Once a frame has started, each further byte must
//! arrive within `Settings::read_timeout`.

use log::{error, info, warn};

use super::events::*;
use super::session::{ControlContext, ControlPeripherals};
use super::states::*;
use crate::{error::Disposition, settings::Settings};

// =============================================================================
// Public Interface
// =============================================================================

/// Represents the back-end state machine. Use the `factory()` function to get
/// an instance then run it by calling its `run()` method.
pub struct BackEndController {
    sm: ControlStates,
}
impl BackEndController {
    /// The event loop runs until the `Done` state is reached and its
    /// `should_exit` flag is set. At such point, the event loop terminates and
    /// returns an exit code indicating no errors when equal to **`0`**;
    /// otherwise a termination with error.
    pub fn run(self) -> i8 {
        let mut sm = self.sm;
        loop {
            sm = sm.step();
            if let ControlStates::Done(done) = &sm {
                if done.state.should_exit {
                    return if done.state.with_error { 1 } else { 0 };
                }
            }
        }
    }
}

/// Factory function for the back-end state machine. The peripherals are owned
/// by the machine until `run()` returns.
pub fn factory(settings: Settings, peripherals: ControlPeripherals) -> BackEndController {
    BackEndController {
        sm: ControlStates::Init(ControlSM::new(ControlContext::new(settings, peripherals))),
    }
}

// =============================================================================
// Private stuff
// =============================================================================

/// The raw state machine: the shared context plus the current state.
///
/// The context owns the peripherals, which cannot be cloned into events the
/// way plain settings can. Transitions therefore move the context over with
/// [`transition`](ControlSM::transition), and events only carry state data.
struct ControlSM<S: Runnable> {
    ctx: ControlContext,
    state: S,
}
impl<S: Runnable> ControlSM<S> {
    /// Run the current state and map any error to the event handling it.
    fn run(&mut self) -> Event {
        match self.state.run(&mut self.ctx) {
            Ok(event) => event,
            Err(err) => match err.disposition() {
                Disposition::Resync => {
                    warn!("{}", err);
                    Event::Resync(ResyncEvent {})
                }
                Disposition::Shutdown => {
                    info!("{}", err);
                    Event::Done(DoneEvent { with_errors: false })
                }
                Disposition::Fatal => {
                    error!("{}", err);
                    Event::Done(DoneEvent { with_errors: true })
                }
            },
        }
    }

    fn transition<T: Runnable>(self, state: T) -> ControlSM<T> {
        ControlSM {
            ctx: self.ctx,
            state,
        }
    }
}

/// The state machine starts in the `InitState`.
impl ControlSM<InitState> {
    fn new(ctx: ControlContext) -> Self {
        ControlSM {
            ctx,
            state: InitState {},
        }
    }
}

enum ControlStates {
    Init(ControlSM<InitState>),
    Setup(ControlSM<SetupState>),
    Ready(ControlSM<ReadyState>),
    Verify(ControlSM<VerifyState>),
    ActuateDoor(ControlSM<ActuateDoorState>),
    Lockout(ControlSM<LockoutState>),
    Resync(ControlSM<ResyncState>),
    Done(ControlSM<DoneState>),
}
impl ControlStates {
    /// The unit of work in the state machine event loop. It runs the current
    /// state and decides the next transition from the event it returned.
    /// State data is built from the event using the `From`/`Into` pattern.
    fn step(self) -> Self {
        match self {
            ControlStates::Init(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Setup(ev) => ControlStates::Setup(sm.transition(ev.into())),
                    Event::Resync(ev) => ControlStates::Resync(sm.transition(ev.into())),
                    Event::Done(ev) => ControlStates::Done(sm.transition(ev.into())),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm.state),
                }
            }
            ControlStates::Setup(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Ready(ev) => ControlStates::Ready(sm.transition(ev.into())),
                    Event::Resync(ev) => ControlStates::Resync(sm.transition(ev.into())),
                    Event::Done(ev) => ControlStates::Done(sm.transition(ev.into())),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm.state),
                }
            }
            ControlStates::Ready(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Verify(ev) => ControlStates::Verify(sm.transition(ev.into())),
                    Event::Resync(ev) => ControlStates::Resync(sm.transition(ev.into())),
                    Event::Done(ev) => ControlStates::Done(sm.transition(ev.into())),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm.state),
                }
            }
            ControlStates::Verify(mut sm) => {
                let event = sm.run();
                match event {
                    Event::ActuateDoor(ev) => ControlStates::ActuateDoor(sm.transition(ev.into())),
                    Event::Setup(ev) => ControlStates::Setup(sm.transition(ev.into())),
                    Event::Lockout(ev) => ControlStates::Lockout(sm.transition(ev.into())),
                    Event::Resync(ev) => ControlStates::Resync(sm.transition(ev.into())),
                    Event::Done(ev) => ControlStates::Done(sm.transition(ev.into())),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm.state),
                }
            }
            ControlStates::ActuateDoor(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Ready(ev) => ControlStates::Ready(sm.transition(ev.into())),
                    Event::Resync(ev) => ControlStates::Resync(sm.transition(ev.into())),
                    Event::Done(ev) => ControlStates::Done(sm.transition(ev.into())),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm.state),
                }
            }
            ControlStates::Lockout(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Ready(ev) => ControlStates::Ready(sm.transition(ev.into())),
                    Event::Resync(ev) => ControlStates::Resync(sm.transition(ev.into())),
                    Event::Done(ev) => ControlStates::Done(sm.transition(ev.into())),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm.state),
                }
            }
            ControlStates::Resync(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Ready(ev) => ControlStates::Ready(sm.transition(ev.into())),
                    Event::Setup(ev) => ControlStates::Setup(sm.transition(ev.into())),
                    Event::Resync(ev) => ControlStates::Resync(sm.transition(ev.into())),
                    Event::Done(ev) => ControlStates::Done(sm.transition(ev.into())),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm.state),
                }
            }
            ControlStates::Done(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Exit(ev) => ControlStates::Done(sm.transition(ev.into())),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm.state),
                }
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
use crate::{
    hal::{fakes::*, CredentialStore, Direction, MemoryEeprom, StridedCredentialStore},
    protocol::{
        Command, Credential, ElapsedSeconds, LinkControl, Notice, Verdict, TERMINATOR,
    },
    SettingsBuilder,
};
#[cfg(test)]
use std::{sync::Arc, time::Duration};

#[cfg(test)]
const READY: u8 = 0xF0;
#[cfg(test)]
const RESYNC: u8 = 0xF1;
#[cfg(test)]
const UNMATCHED: u8 = 0xB1;
#[cfg(test)]
const MATCHED: u8 = 0xB2;
#[cfg(test)]
const ARMED: u8 = 0xF2;

#[cfg(test)]
struct Bench {
    journal: Journal,
    eeprom: SharedEeprom,
    seconds: Arc<ElapsedSeconds>,
}

#[cfg(test)]
impl Bench {
    fn new() -> Self {
        Bench {
            journal: Journal::default(),
            eeprom: SharedEeprom::default(),
            seconds: Arc::new(ElapsedSeconds::new()),
        }
    }

    /// A link whose script starts with the initial setup of `123456`.
    fn link(&self) -> ScriptedLink {
        ScriptedLink::new(&self.journal)
            .watching(&self.seconds)
            .bytes(&frame("123456"))
            .bytes(&frame("123456"))
    }

    fn run(&self, link: ScriptedLink) -> i8 {
        self.run_with_store(link, Box::new(JournaledStore::new(&self.eeprom, &self.journal)))
    }

    fn run_with_store(
        &self,
        link: ScriptedLink,
        store: Box<dyn CredentialStore + Send>,
    ) -> i8 {
        let settings = SettingsBuilder::new()
            .tick_period(Duration::from_millis(50))
            .finalize();
        let peripherals = ControlPeripherals {
            link: Box::new(link),
            store,
            motor: Box::new(RecordingMotor(self.journal.clone())),
            alarm: Box::new(RecordingAlarm(self.journal.clone())),
            ticker: Box::new(CountingTicker::new(&self.seconds, &self.journal)),
            seconds: Arc::clone(&self.seconds),
        };
        factory(settings, peripherals).run()
    }
}

#[cfg(test)]
fn credential(digits: &str) -> Credential {
    let digits: Vec<u8> = digits.bytes().map(|b| b - b'0').collect();
    Credential::from_digits(&digits).unwrap()
}

#[cfg(test)]
fn provisioned() -> Vec<Record> {
    vec![
        Record::Sent(READY),
        Record::Sent(MATCHED),
        Record::Stored(credential("123456")),
    ]
}

#[cfg(test)]
fn door_cycle() -> Vec<Record> {
    vec![
        Record::Motor(Direction::Clockwise, 100),
        Record::Ticks(15),
        Record::MotorStop,
        Record::Sent(Notice::Opened.into()),
        Record::Ticks(3),
        Record::Sent(Notice::Closing.into()),
        Record::Motor(Direction::CounterClockwise, 100),
        Record::Ticks(15),
        Record::MotorStop,
        Record::Sent(Notice::Closed.into()),
    ]
}

#[cfg(test)]
fn lockout() -> Vec<Record> {
    vec![
        Record::Alarm(true),
        Record::Ticks(60),
        Record::Alarm(false),
        Record::Sent(Notice::Reset.into()),
    ]
}

#[cfg(test)]
fn shutdown() -> Vec<Record> {
    vec![Record::MotorStop, Record::Alarm(false)]
}

#[cfg(test)]
fn concat(parts: &[Vec<Record>]) -> Vec<Record> {
    parts.concat()
}

#[test]
fn setup_repeats_until_both_entries_agree() {
    let bench = Bench::new();
    let link = ScriptedLink::new(&bench.journal)
        .bytes(&frame("123456"))
        .bytes(&frame("123457"))
        .bytes(&frame("12345"))
        .bytes(&frame("12345"))
        .bytes(&frame("123456"))
        .bytes(&frame("123456"));

    assert_eq!(bench.run(link), 0);
    assert_eq!(
        bench.journal.hardware(),
        concat(&[
            vec![
                Record::Sent(READY),
                Record::Sent(UNMATCHED),
                Record::Sent(UNMATCHED),
                Record::Sent(MATCHED),
                Record::Stored(credential("123456")),
            ],
            shutdown(),
        ])
    );
    assert_eq!(bench.eeprom.credential().unwrap(), credential("123456"));
}

#[test]
fn second_attempt_match_opens_and_closes_the_door() {
    let bench = Bench::new();
    let link = bench
        .link()
        .byte(Command::Open)
        .bytes(&frame("654321"))
        .bytes(&frame("123456"));

    assert_eq!(bench.run(link), 0);
    assert_eq!(
        bench.journal.hardware(),
        concat(&[
            provisioned(),
            vec![Record::Sent(UNMATCHED), Record::Sent(MATCHED)],
            door_cycle(),
            shutdown(),
        ])
    );
}

#[test]
fn three_failures_lock_out_without_moving_the_door() {
    let bench = Bench::new();
    let link = bench
        .link()
        .byte(Command::Open)
        .bytes(&frame("111111"))
        .bytes(&frame("222222"))
        .bytes(&frame("333333"))
        // Back at the menu after the lockout.
        .byte(Command::Open)
        .bytes(&frame("123456"));

    assert_eq!(bench.run(link), 0);
    assert_eq!(
        bench.journal.hardware(),
        concat(&[
            provisioned(),
            vec![
                Record::Sent(UNMATCHED),
                Record::Sent(UNMATCHED),
                Record::Sent(UNMATCHED),
            ],
            lockout(),
            vec![Record::Sent(MATCHED)],
            door_cycle(),
            shutdown(),
        ])
    );
}

#[test]
fn match_on_the_last_attempt_does_not_lock_out() {
    let bench = Bench::new();
    let link = bench
        .link()
        .byte(Command::Open)
        .bytes(&frame("111111"))
        .bytes(&frame("222222"))
        .bytes(&frame("123456"));

    assert_eq!(bench.run(link), 0);
    let journal = bench.journal.hardware();
    assert!(!journal.contains(&Record::Alarm(true)));
    assert_eq!(
        journal,
        concat(&[
            provisioned(),
            vec![
                Record::Sent(UNMATCHED),
                Record::Sent(UNMATCHED),
                Record::Sent(MATCHED),
            ],
            door_cycle(),
            shutdown(),
        ])
    );
}

#[test]
fn wrong_length_entries_count_as_failed_attempts() {
    let bench = Bench::new();
    let link = bench
        .link()
        .byte(Command::Open)
        .bytes(&frame("12345"))
        .bytes(&frame("1234567"))
        .bytes(&frame(""));

    assert_eq!(bench.run(link), 0);
    assert_eq!(
        bench.journal.hardware(),
        concat(&[
            provisioned(),
            vec![
                Record::Sent(UNMATCHED),
                Record::Sent(UNMATCHED),
                Record::Sent(UNMATCHED),
            ],
            lockout(),
            shutdown(),
        ])
    );
}

#[test]
fn change_replaces_the_credential() {
    let bench = Bench::new();
    let link = bench
        .link()
        .byte(Command::Change)
        .bytes(&frame("123456"))
        .bytes(&frame("999999"))
        .bytes(&frame("999999"))
        .byte(Command::Open)
        .bytes(&frame("123456"))
        .bytes(&frame("999999"));

    assert_eq!(bench.run(link), 0);
    assert_eq!(
        bench.journal.hardware(),
        concat(&[
            provisioned(),
            vec![
                Record::Sent(MATCHED),
                Record::Sent(MATCHED),
                Record::Stored(credential("999999")),
                Record::Sent(Notice::Done.into()),
                Record::Sent(UNMATCHED),
                Record::Sent(MATCHED),
            ],
            door_cycle(),
            shutdown(),
        ])
    );
    assert_eq!(bench.eeprom.credential().unwrap(), credential("999999"));
}

#[test]
fn failed_change_locks_out_and_keeps_the_credential() {
    let bench = Bench::new();
    let link = bench
        .link()
        .byte(Command::Change)
        .bytes(&frame("000000"))
        .bytes(&frame("000000"))
        .bytes(&frame("000000"));

    assert_eq!(bench.run(link), 0);
    assert_eq!(
        bench.journal.hardware(),
        concat(&[
            provisioned(),
            vec![
                Record::Sent(UNMATCHED),
                Record::Sent(UNMATCHED),
                Record::Sent(UNMATCHED),
            ],
            lockout(),
            shutdown(),
        ])
    );
    assert_eq!(bench.eeprom.credential().unwrap(), credential("123456"));
}

#[test]
fn ready_ignores_stray_bytes_and_answers_resync() {
    let bench = Bench::new();
    let link = bench
        .link()
        .bytes(&[0x42, 0x05, TERMINATOR])
        .byte(Verdict::Matched)
        .byte(LinkControl::Resync);

    assert_eq!(bench.run(link), 0);
    assert_eq!(
        bench.journal.hardware(),
        concat(&[provisioned(), vec![Record::Sent(ARMED)], shutdown()])
    );
}

#[test]
fn resync_request_before_any_credential_restarts_setup() {
    let bench = Bench::new();
    let link = ScriptedLink::new(&bench.journal)
        .watching(&bench.seconds)
        .byte(LinkControl::Resync)
        .bytes(&frame("123456"))
        .bytes(&frame("123456"));

    assert_eq!(bench.run(link), 0);
    assert_eq!(
        bench.journal.hardware(),
        concat(&[
            vec![Record::Sent(READY), Record::Discarded],
            provisioned(),
            shutdown(),
        ])
    );
}

#[test]
fn stalled_frame_mid_session_announces_armed() {
    let bench = Bench::new();
    let link = bench
        .link()
        .byte(Command::Open)
        .bytes(&[1, 2, 3])
        .silence()
        // The resync leaves the node ready for a fresh command.
        .byte(Command::Open)
        .bytes(&frame("123456"));

    assert_eq!(bench.run(link), 0);
    assert_eq!(
        bench.journal.hardware(),
        concat(&[
            provisioned(),
            vec![Record::Discarded, Record::Sent(ARMED), Record::Sent(MATCHED)],
            door_cycle(),
            shutdown(),
        ])
    );
}

#[test]
fn stalled_frame_before_any_credential_restarts_setup() {
    let bench = Bench::new();
    let link = ScriptedLink::new(&bench.journal)
        .bytes(&frame("123456"))
        .bytes(&[1, 2])
        .silence()
        .bytes(&frame("123456"))
        .bytes(&frame("123456"));

    assert_eq!(bench.run(link), 0);
    assert_eq!(
        bench.journal.hardware(),
        concat(&[
            vec![Record::Sent(READY), Record::Discarded],
            provisioned(),
            shutdown(),
        ])
    );
}

#[test]
fn garbage_or_resync_inside_a_frame_resynchronises() {
    let bench = Bench::new();
    let link = bench
        .link()
        .byte(Command::Open)
        .bytes(&[4, 5, 0x77])
        .byte(Command::Change)
        .bytes(&[1, RESYNC]);

    assert_eq!(bench.run(link), 0);
    assert_eq!(
        bench.journal.hardware(),
        concat(&[
            provisioned(),
            vec![
                Record::Discarded,
                Record::Sent(ARMED),
                Record::Discarded,
                Record::Sent(ARMED),
            ],
            shutdown(),
        ])
    );
}

#[test]
fn overlong_frame_resynchronises() {
    let bench = Bench::new();
    let link = bench.link().byte(Command::Open).bytes(&[7; 16]);

    assert_eq!(bench.run(link), 0);
    assert_eq!(
        bench.journal.hardware(),
        concat(&[
            provisioned(),
            vec![Record::Discarded, Record::Sent(ARMED)],
            shutdown(),
        ])
    );
}

#[test]
fn storage_failure_is_fatal() {
    let bench = Bench::new();
    let store = StridedCredentialStore::new(StuckBitEeprom(MemoryEeprom::new()));
    let link = bench.link().byte(Command::Open).bytes(&frame("123456"));

    assert_eq!(bench.run_with_store(link, Box::new(store)), 1);
    assert_eq!(
        bench.journal.hardware(),
        concat(&[
            vec![Record::Sent(READY), Record::Sent(MATCHED)],
            shutdown(),
        ])
    );
}
