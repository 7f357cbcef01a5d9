//! Front-end state machine.
//!
//! The front-end follows the back-end: it prompts, forwards what was typed,
//! and moves on according to the verdicts and notices it receives.
//!
//! ```text
//!                 START
//!                   |
//!                   v
//!               .-------.
//!               | Init  |  wait for READY (ARMED: straight to Menu)
//!               '-------'
//!                   |
//!                   v
//!              .---------.  "Error Try again"
//!       .----->|  Setup  |<-------------------.
//!       |      '---------'                    |
//!       |           | "Successful !"          |
//!       |           v  (DONE after a change)  |
//!       |      .---------.                    |
//!       |      |  Menu   |<------------.      |
//!       |      '---------'             |      |
//!       |           | '-' / '+'        |      |
//!       |           v                  |      |
//!       |      .----------.  change    |      |
//!       |      |  Verify  |------------+------'
//!       |      '----------'            |
//!       |     3 fails |   | open       |
//!       |             v   v            |
//!       |   .---------. .-----------.  |
//!       |   | Lockout | | DoorCycle |  |
//!       |   '---------' '-----------'  |
//!       |        |  RESET      | CLOSED|
//!       |        '-------------+-------'
//!       |
//!       |   .--------.  timeout or unexpected READY / ARMED
//!       '---| Resync |<------ (any state awaiting the back-end)
//!           '--------'
//!                    link or keypad closed
//!                      --------> Done --> END
//! ```
//!
//! `Resync` sends `RESYNC` and resumes where the back-end's answer says:
//! `READY` leads to the initial `Setup`, `ARMED` to the `Menu`.

use log::{error, info, warn};

use super::events::*;
use super::session::{HmiContext, HmiPeripherals};
use super::states::*;
use crate::{error::Disposition, settings::Settings};

// =============================================================================
// Public Interface
// =============================================================================

/// Represents the front-end state machine. Use the `factory()` function to get
/// an instance then run it by calling its `run()` method.
pub struct FrontEndController {
    sm: HmiStates,
}
impl FrontEndController {
    /// The event loop runs until the `Done` state is reached and its
    /// `should_exit` flag is set, and returns **`0`** for an orderly stop.
    pub fn run(self) -> i8 {
        let mut sm = self.sm;
        loop {
            sm = sm.step();
            if let HmiStates::Done(done) = &sm {
                if done.state.should_exit {
                    return if done.state.with_error { 1 } else { 0 };
                }
            }
        }
    }
}

/// Factory function for the front-end state machine.
pub fn factory(settings: Settings, peripherals: HmiPeripherals) -> FrontEndController {
    FrontEndController {
        sm: HmiStates::Init(HmiSM::new(HmiContext::new(settings, peripherals))),
    }
}

// =============================================================================
// Private stuff
// =============================================================================

struct HmiSM<S: Runnable> {
    ctx: HmiContext,
    state: S,
}
impl<S: Runnable> HmiSM<S> {
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

    fn transition<T: Runnable>(self, state: T) -> HmiSM<T> {
        HmiSM {
            ctx: self.ctx,
            state,
        }
    }
}

impl HmiSM<InitState> {
    fn new(ctx: HmiContext) -> Self {
        HmiSM {
            ctx,
            state: InitState {},
        }
    }
}

enum HmiStates {
    Init(HmiSM<InitState>),
    Setup(HmiSM<SetupState>),
    Menu(HmiSM<MenuState>),
    Verify(HmiSM<VerifyState>),
    DoorCycle(HmiSM<DoorCycleState>),
    Lockout(HmiSM<LockoutState>),
    Resync(HmiSM<ResyncState>),
    Done(HmiSM<DoneState>),
}
impl HmiStates {
    fn step(self) -> Self {
        match self {
            HmiStates::Init(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Setup(ev) => HmiStates::Setup(sm.transition(ev.into())),
                    Event::Menu(ev) => HmiStates::Menu(sm.transition(ev.into())),
                    Event::Done(ev) => HmiStates::Done(sm.transition(ev.into())),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm.state),
                }
            }
            HmiStates::Setup(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Menu(ev) => HmiStates::Menu(sm.transition(ev.into())),
                    Event::Resync(ev) => HmiStates::Resync(sm.transition(ev.into())),
                    Event::Done(ev) => HmiStates::Done(sm.transition(ev.into())),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm.state),
                }
            }
            HmiStates::Menu(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Verify(ev) => HmiStates::Verify(sm.transition(ev.into())),
                    Event::Resync(ev) => HmiStates::Resync(sm.transition(ev.into())),
                    Event::Done(ev) => HmiStates::Done(sm.transition(ev.into())),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm.state),
                }
            }
            HmiStates::Verify(mut sm) => {
                let event = sm.run();
                match event {
                    Event::DoorCycle(ev) => HmiStates::DoorCycle(sm.transition(ev.into())),
                    Event::Setup(ev) => HmiStates::Setup(sm.transition(ev.into())),
                    Event::Lockout(ev) => HmiStates::Lockout(sm.transition(ev.into())),
                    Event::Resync(ev) => HmiStates::Resync(sm.transition(ev.into())),
                    Event::Done(ev) => HmiStates::Done(sm.transition(ev.into())),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm.state),
                }
            }
            HmiStates::DoorCycle(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Menu(ev) => HmiStates::Menu(sm.transition(ev.into())),
                    Event::Resync(ev) => HmiStates::Resync(sm.transition(ev.into())),
                    Event::Done(ev) => HmiStates::Done(sm.transition(ev.into())),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm.state),
                }
            }
            HmiStates::Lockout(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Menu(ev) => HmiStates::Menu(sm.transition(ev.into())),
                    Event::Resync(ev) => HmiStates::Resync(sm.transition(ev.into())),
                    Event::Done(ev) => HmiStates::Done(sm.transition(ev.into())),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm.state),
                }
            }
            HmiStates::Resync(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Menu(ev) => HmiStates::Menu(sm.transition(ev.into())),
                    Event::Setup(ev) => HmiStates::Setup(sm.transition(ev.into())),
                    Event::Resync(ev) => HmiStates::Resync(sm.transition(ev.into())),
                    Event::Done(ev) => HmiStates::Done(sm.transition(ev.into())),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm.state),
                }
            }
            HmiStates::Done(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Exit(ev) => HmiStates::Done(sm.transition(ev.into())),
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
    hal::fakes::*,
    protocol::{Command, LinkControl, Notice, Verdict},
    SettingsBuilder,
};

#[cfg(test)]
fn run_front_end(journal: &Journal, link: ScriptedLink, keys: &str) -> i8 {
    let peripherals = HmiPeripherals {
        link: Box::new(link),
        display: Box::new(RecordingDisplay::new(journal)),
        keypad: Box::new(ScriptedKeypad::new(keys)),
    };
    factory(SettingsBuilder::new().finalize(), peripherals).run()
}

/// Back-end bytes of a successful initial setup.
#[cfg(test)]
fn provisioned(journal: &Journal) -> ScriptedLink {
    ScriptedLink::new(journal)
        .byte(LinkControl::Ready)
        .byte(Verdict::Matched)
}

#[cfg(test)]
const SETUP_KEYS: &str = "123456\n123456\n";

#[cfg(test)]
fn sent_after_setup(journal: &Journal) -> Vec<u8> {
    journal.sent().split_off(2 * frame("123456").len())
}

#[cfg(test)]
fn screens_after_setup(journal: &Journal) -> Vec<String> {
    let screens = journal.screens();
    let at = screens
        .iter()
        .position(|s| s == "Successful !")
        .expect("setup never completed");
    screens[at + 1..].to_vec()
}

#[cfg(test)]
fn strings(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|l| l.to_string()).collect()
}

#[test]
fn setup_prompts_again_until_entries_match() {
    let journal = Journal::default();
    let link = ScriptedLink::new(&journal)
        .byte(LinkControl::Ready)
        .byte(Verdict::Unmatched)
        .byte(Verdict::Matched);

    let status = run_front_end(&journal, link, "123456\n123457\n654321\n654321\n");

    assert_eq!(status, 0);
    assert_eq!(
        journal.sent(),
        [frame("123456"), frame("123457"), frame("654321"), frame("654321")].concat()
    );
    assert_eq!(
        journal.screens(),
        strings(&[
            "Enter New Pass:",
            "******",
            "Reenter New Pass",
            "******",
            "Error Try again",
            "Enter New Pass:",
            "******",
            "Reenter New Pass",
            "******",
            "Successful !",
            "- : Open Door",
            "+ : Change Pass",
        ])
    );
}

#[test]
fn bytes_before_ready_are_ignored() {
    let journal = Journal::default();
    let link = ScriptedLink::new(&journal)
        .bytes(&[0x00, 0x42])
        .byte(Notice::Closed)
        .byte(LinkControl::Ready)
        .byte(Verdict::Matched);

    assert_eq!(run_front_end(&journal, link, SETUP_KEYS), 0);
    assert_eq!(journal.sent(), [frame("123456"), frame("123456")].concat());
}

#[test]
fn open_with_one_retry_follows_the_door() {
    let journal = Journal::default();
    let link = provisioned(&journal)
        .byte(Verdict::Unmatched)
        .byte(Verdict::Matched)
        .byte(Notice::Opened)
        .byte(Notice::Closing)
        .byte(Notice::Closed);

    let keys = format!("{}-654321\n123456\n", SETUP_KEYS);
    assert_eq!(run_front_end(&journal, link, &keys), 0);

    assert_eq!(
        sent_after_setup(&journal),
        [
            vec![Command::Open.into()],
            frame("654321"),
            frame("123456")
        ]
        .concat()
    );
    assert_eq!(
        screens_after_setup(&journal),
        strings(&[
            "- : Open Door",
            "+ : Change Pass",
            "Enter Pass:",
            "******",
            "Wrong Password",
            "Enter Pass:",
            "******",
            "Door is opening",
            "Door is opened",
            "Door is closing",
            "- : Open Door",
            "+ : Change Pass",
        ])
    );
}

#[test]
fn three_wrong_entries_show_the_thief_screen() {
    let journal = Journal::default();
    let link = provisioned(&journal)
        .byte(Verdict::Unmatched)
        .byte(Verdict::Unmatched)
        .byte(Verdict::Unmatched)
        .byte(Notice::Reset);

    let keys = format!("{}-111111\n222222\n333333\n", SETUP_KEYS);
    assert_eq!(run_front_end(&journal, link, &keys), 0);

    let screens = screens_after_setup(&journal);
    let thief = screens.iter().position(|s| s == "Thief !!!").unwrap();
    assert_eq!(
        screens[thief..].to_vec(),
        strings(&["Thief !!!", "- : Open Door", "+ : Change Pass"])
    );
    assert!(!screens.iter().any(|s| s.starts_with("Door is")));
    assert_eq!(
        screens.iter().filter(|s| *s == "Wrong Password").count(),
        2
    );
}

#[test]
fn change_runs_setup_and_waits_for_done() {
    let journal = Journal::default();
    let link = provisioned(&journal)
        .byte(Verdict::Matched)
        .byte(Verdict::Matched)
        .byte(Notice::Done);

    let keys = format!("{}+123456\n999999\n999999\n", SETUP_KEYS);
    assert_eq!(run_front_end(&journal, link, &keys), 0);

    assert_eq!(
        sent_after_setup(&journal),
        [
            vec![Command::Change.into()],
            frame("123456"),
            frame("999999"),
            frame("999999")
        ]
        .concat()
    );
    assert_eq!(
        screens_after_setup(&journal),
        strings(&[
            "- : Open Door",
            "+ : Change Pass",
            "Enter Old Pass:",
            "******",
            "Enter New Pass:",
            "******",
            "Reenter New Pass",
            "******",
            "Successful !",
            "- : Open Door",
            "+ : Change Pass",
        ])
    );
}

#[test]
fn failed_change_shows_the_error_screen() {
    let journal = Journal::default();
    let link = provisioned(&journal)
        .byte(Verdict::Unmatched)
        .byte(Verdict::Unmatched)
        .byte(Verdict::Unmatched)
        .byte(Notice::Reset);

    let keys = format!("{}+1\n2\n3\n", SETUP_KEYS);
    assert_eq!(run_front_end(&journal, link, &keys), 0);
    assert!(screens_after_setup(&journal).contains(&"Error !!!".to_string()));
}

#[test]
fn entry_ignores_other_keys_and_caps_length() {
    let journal = Journal::default();
    let link = provisioned(&journal);

    // `*`, `+` and `-` are not digits; the 16th and later digits are dropped.
    let keys = "1*2+3-456\n12345678901234567890\n";
    assert_eq!(run_front_end(&journal, link, keys), 0);
    assert_eq!(
        journal.sent(),
        [frame("123456"), frame("123456789012345")].concat()
    );
}

#[test]
fn menu_ignores_keys_without_an_entry() {
    let journal = Journal::default();
    let link = provisioned(&journal).byte(Verdict::Matched);

    let keys = format!("{}5\n*-", SETUP_KEYS);
    assert_eq!(run_front_end(&journal, link, &keys), 0);
    assert_eq!(sent_after_setup(&journal), vec![u8::from(Command::Open)]);
    let menus = screens_after_setup(&journal)
        .iter()
        .filter(|s| *s == "- : Open Door")
        .count();
    assert_eq!(menus, 4);
}

#[test]
fn stray_bytes_are_skipped_while_waiting_for_a_notice() {
    let journal = Journal::default();
    let link = provisioned(&journal)
        .byte(Verdict::Matched)
        .bytes(&[0x42])
        .byte(Verdict::Unmatched)
        .byte(Notice::Opened)
        .byte(Notice::Reset)
        .byte(Notice::Closing)
        .byte(Notice::Closed);

    let keys = format!("{}-123456\n", SETUP_KEYS);
    assert_eq!(run_front_end(&journal, link, &keys), 0);
    let screens = screens_after_setup(&journal);
    assert!(screens.contains(&"Door is closing".to_string()));
    assert_eq!(screens.last().map(String::as_str), Some("+ : Change Pass"));
}

#[test]
fn timeout_asks_for_resync_until_the_back_end_answers() {
    let journal = Journal::default();
    let link = provisioned(&journal)
        .silence()
        .silence()
        .byte(Verdict::Unmatched)
        .byte(LinkControl::Armed);

    let keys = format!("{}-123456\n", SETUP_KEYS);
    assert_eq!(run_front_end(&journal, link, &keys), 0);

    let resync: u8 = LinkControl::Resync.into();
    assert_eq!(
        sent_after_setup(&journal),
        [vec![Command::Open.into()], frame("123456"), vec![resync, resync]].concat()
    );
    let records = journal.records();
    assert_eq!(
        records[records.len() - 5..].to_vec(),
        vec![
            Record::Sent(resync),
            Record::Discarded,
            Record::Display("Link lost".into()),
            Record::Display("- : Open Door".into()),
            Record::Display("+ : Change Pass".into()),
        ]
    );
}

#[test]
fn ready_answer_restarts_the_initial_setup() {
    let journal = Journal::default();
    let link = provisioned(&journal)
        .silence()
        .byte(LinkControl::Ready)
        .byte(Verdict::Matched);

    let keys = format!("{}-123456\n654321\n654321\n", SETUP_KEYS);
    assert_eq!(run_front_end(&journal, link, &keys), 0);

    assert_eq!(
        sent_after_setup(&journal),
        [
            vec![Command::Open.into()],
            frame("123456"),
            vec![LinkControl::Resync.into()],
            frame("654321"),
            frame("654321"),
        ]
        .concat()
    );
    let screens = screens_after_setup(&journal);
    let lost = screens.iter().position(|s| s == "Link lost").unwrap();
    assert_eq!(
        screens[lost..].to_vec(),
        strings(&[
            "Link lost",
            "Enter New Pass:",
            "******",
            "Reenter New Pass",
            "******",
            "Successful !",
            "- : Open Door",
            "+ : Change Pass",
        ])
    );
}

#[test]
fn unexpected_announce_is_confirmed_with_a_resync() {
    let journal = Journal::default();
    let link = provisioned(&journal)
        .byte(LinkControl::Ready)
        .byte(Verdict::Matched)
        .byte(LinkControl::Armed);

    let keys = format!("{}-123456\n", SETUP_KEYS);
    assert_eq!(run_front_end(&journal, link, &keys), 0);

    assert_eq!(
        sent_after_setup(&journal),
        [
            vec![Command::Open.into()],
            frame("123456"),
            vec![LinkControl::Resync.into()]
        ]
        .concat()
    );
    let screens = journal.screens();
    let lost = screens.iter().position(|s| s == "Link lost").unwrap();
    assert_eq!(
        screens[lost..].to_vec(),
        strings(&["Link lost", "- : Open Door", "+ : Change Pass"])
    );
}

#[test]
fn armed_back_end_at_start_skips_setup() {
    let journal = Journal::default();
    let link = ScriptedLink::new(&journal)
        .silence()
        .byte(LinkControl::Armed)
        .byte(Verdict::Matched);

    assert_eq!(run_front_end(&journal, link, "-123456\n"), 0);

    assert_eq!(
        journal.sent(),
        [
            vec![LinkControl::Resync.into(), Command::Open.into()],
            frame("123456")
        ]
        .concat()
    );
    assert_eq!(
        journal.screens(),
        strings(&[
            "- : Open Door",
            "+ : Change Pass",
            "Enter Pass:",
            "******",
            "Door is opening",
        ])
    );
}

#[test]
fn closed_link_stops_cleanly() {
    let journal = Journal::default();
    let link = ScriptedLink::new(&journal).byte(LinkControl::Ready);

    assert_eq!(run_front_end(&journal, link, SETUP_KEYS), 0);
    assert_eq!(journal.sent(), [frame("123456"), frame("123456")].concat());
}
