//! Both nodes in one process.
//!
//! The back-end runs on its own thread, the front-end on the caller's thread,
//! wired together with a [`ChannelLink`](crate::hal::ChannelLink) pair (or any
//! other pair of links). When the front-end stops, its end of the link is
//! dropped, the back-end sees a closed link and stops too.

use std::thread;

use log::{error, info};

use crate::{
    control::{self, ControlPeripherals},
    hmi::{self, HmiPeripherals},
    settings::Settings,
};

/// Run both controllers to completion and return their exit statuses as
/// `(back-end, front-end)`.
pub fn run_pair(
    settings: Settings,
    back_end_io: ControlPeripherals,
    front_end_io: HmiPeripherals,
) -> (i8, i8) {
    let back_end_settings = settings.clone();
    let back_end = thread::Builder::new()
        .name("control".into())
        .spawn(move || control::factory(back_end_settings, back_end_io).run());

    let back_end = match back_end {
        Ok(handle) => handle,
        Err(e) => {
            error!("could not start the back-end thread: {}", e);
            return (1, 1);
        }
    };

    let front_status = hmi::factory(settings, front_end_io).run();
    info!("front-end stopped with status {}", front_status);

    let back_status = back_end.join().unwrap_or_else(|_| {
        error!("the back-end thread panicked");
        1
    });
    info!("back-end stopped with status {}", back_status);

    (back_status, front_status)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
use crate::{
    hal::{fakes::*, ChannelLink, Direction},
    protocol::{Credential, ElapsedSeconds, LinkControl, Notice, Verdict},
    SettingsBuilder,
};
#[cfg(test)]
use std::{sync::Arc, time::Duration};

#[cfg(test)]
struct Bench {
    back: Journal,
    front: Journal,
    eeprom: SharedEeprom,
}

#[cfg(test)]
impl Bench {
    fn run(keys: &str) -> Self {
        let settings = SettingsBuilder::new()
            .tick_period(Duration::from_millis(50))
            .read_timeout(Some(Duration::from_secs(10)))
            .finalize();
        Bench::run_with(settings, ScriptedKeypad::new(keys))
    }

    fn run_with(settings: Settings, keypad: ScriptedKeypad) -> Self {
        let bench = Bench {
            back: Journal::default(),
            front: Journal::default(),
            eeprom: SharedEeprom::default(),
        };
        let seconds = Arc::new(ElapsedSeconds::new());
        let (back_link, front_link) = ChannelLink::pair();

        let control = ControlPeripherals {
            link: Box::new(RecordingLink::new(back_link, &bench.back)),
            store: Box::new(JournaledStore::new(&bench.eeprom, &bench.back)),
            motor: Box::new(RecordingMotor(bench.back.clone())),
            alarm: Box::new(RecordingAlarm(bench.back.clone())),
            ticker: Box::new(CountingTicker::new(&seconds, &bench.back)),
            seconds,
        };
        let hmi = HmiPeripherals {
            link: Box::new(RecordingLink::new(front_link, &bench.front)),
            display: Box::new(RecordingDisplay::new(&bench.front)),
            keypad: Box::new(keypad),
        };

        assert_eq!(run_pair(settings, control, hmi), (0, 0));
        bench
    }
}

#[cfg(test)]
fn credential(digits: &str) -> Credential {
    let digits: Vec<u8> = digits.bytes().map(|b| b - b'0').collect();
    Credential::from_digits(&digits).unwrap()
}

#[cfg(test)]
const SETUP_KEYS: &str = "123456\n123456\n";

#[test]
fn wrong_then_right_credential_cycles_the_door() {
    let bench = Bench::run(&format!("{}-654321\n123456\n", SETUP_KEYS));

    assert_eq!(
        bench.back.hardware(),
        vec![
            Record::Sent(LinkControl::Ready.into()),
            Record::Sent(Verdict::Matched.into()),
            Record::Stored(credential("123456")),
            Record::Sent(Verdict::Unmatched.into()),
            Record::Sent(Verdict::Matched.into()),
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
            Record::MotorStop,
            Record::Alarm(false),
        ]
    );

    let screens = bench.front.screens();
    for expected in &[
        "Successful !",
        "Wrong Password",
        "Door is opening",
        "Door is opened",
        "Door is closing",
    ] {
        assert!(screens.iter().any(|s| s == expected), "missing {:?}", expected);
    }
    assert!(!screens.iter().any(|s| s == "Thief !!!"));
}

#[test]
fn three_wrong_credentials_sound_the_alarm() {
    let bench = Bench::run(&format!("{}-111111\n222222\n333333\n", SETUP_KEYS));

    let records = bench.back.hardware();
    assert!(!records.iter().any(|r| matches!(r, Record::Motor(..))));
    let alarm = records
        .iter()
        .position(|r| *r == Record::Alarm(true))
        .expect("alarm never sounded");
    assert_eq!(
        records[alarm..alarm + 4].to_vec(),
        vec![
            Record::Alarm(true),
            Record::Ticks(60),
            Record::Alarm(false),
            Record::Sent(Notice::Reset.into()),
        ]
    );

    let screens = bench.front.screens();
    let thief = screens.iter().position(|s| s == "Thief !!!").unwrap();
    assert_eq!(screens[thief + 1], "- : Open Door");
}

#[test]
fn changed_credential_opens_the_door() {
    let bench = Bench::run(&format!(
        "{}+123456\n246800\n246800\n-123456\n246800\n",
        SETUP_KEYS
    ));

    assert_eq!(bench.eeprom.credential().unwrap(), credential("246800"));
    let records = bench.back.hardware();
    assert!(records.contains(&Record::Sent(Notice::Done.into())));
    assert!(records.contains(&Record::Sent(Notice::Closed.into())));
    assert!(!records.contains(&Record::Alarm(true)));
    assert_eq!(
        bench
            .front
            .screens()
            .iter()
            .filter(|s| *s == "Wrong Password")
            .count(),
        1
    );
}

/// Runs a full session with the user idle before the key at `index` for
/// longer than the link timeout, and checks nobody lost track.
#[cfg(test)]
fn idle_user_before_key(index: usize) -> Bench {
    let settings = SettingsBuilder::new()
        .tick_period(Duration::from_millis(20))
        .read_timeout(Some(Duration::from_millis(1500)))
        .finalize();
    let keypad = ScriptedKeypad::new("111111\n111111\n-111111\n")
        .pausing(index, Duration::from_millis(2000));
    let bench = Bench::run_with(settings, keypad);

    assert_eq!(bench.eeprom.credential().unwrap(), credential("111111"));
    let records = bench.back.records();
    assert!(records.contains(&Record::Sent(Notice::Closed.into())));
    assert!(!records.contains(&Record::Discarded));
    assert!(!bench.front.sent().contains(&u8::from(LinkControl::Resync)));
    assert!(!bench.front.screens().iter().any(|s| s == "Link lost"));
    bench
}

#[test]
fn idle_user_at_the_first_prompt_keeps_both_nodes_in_step() {
    let bench = idle_user_before_key(0);
    assert_eq!(
        bench.back.sent(),
        vec![
            u8::from(LinkControl::Ready),
            u8::from(Verdict::Matched),
            u8::from(Verdict::Matched),
            u8::from(Notice::Opened),
            u8::from(Notice::Closing),
            u8::from(Notice::Closed),
        ]
    );
}

#[test]
fn idle_user_at_the_second_setup_prompt_keeps_both_nodes_in_step() {
    idle_user_before_key(7);
}

#[test]
fn idle_user_at_the_password_prompt_keeps_both_nodes_in_step() {
    idle_user_before_key(15);
}
