//! Test doubles for every capability interface.
//!
//! All fakes write into one shared [`Journal`] so tests can assert the total
//! order of link traffic, motor commands, alarm changes, counted ticks and
//! display output.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use super::{
    ActuatorDriver, AlarmDriver, ByteStorage, ChannelLink, CredentialStore, Direction,
    DisplayDriver, InputDriver, Key, MemoryEeprom, SerialLink, StridedCredentialStore,
    TickSource,
};
use crate::{
    error::{InputError, LinkError, StorageError},
    protocol::{Credential, ElapsedSeconds, TERMINATOR},
};

#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum Record {
    Sent(u8),
    Discarded,
    Motor(Direction, u8),
    MotorStop,
    Alarm(bool),
    Ticks(u32),
    Stored(Credential),
    Display(String),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<Record>>>);

impl Journal {
    pub(crate) fn push(&self, record: Record) {
        self.0.lock().unwrap().push(record);
    }

    pub(crate) fn records(&self) -> Vec<Record> {
        self.0.lock().unwrap().clone()
    }

    /// Everything except display output.
    pub(crate) fn hardware(&self) -> Vec<Record> {
        self.records()
            .into_iter()
            .filter(|r| !matches!(r, Record::Display(_)))
            .collect()
    }

    pub(crate) fn sent(&self) -> Vec<u8> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                Record::Sent(byte) => Some(byte),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn screens(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                Record::Display(text) => Some(text),
                _ => None,
            })
            .collect()
    }
}

/// Credential frame for a string of digits, e.g. `frame("123456")`.
pub(crate) fn frame(digits: &str) -> Vec<u8> {
    let mut bytes: Vec<u8> = digits.bytes().map(|b| b - b'0').collect();
    bytes.push(TERMINATOR);
    bytes
}

/// Keys for a keypad script: digits, `\n` for Enter, `+`, `-`.
pub(crate) fn keys(script: &str) -> Vec<Key> {
    script.chars().map(Key::from_char).collect()
}

// ScriptedLink ================================================================

#[derive(Debug, Clone, Copy)]
pub(crate) enum Incoming {
    Byte(u8),
    /// The next receive times out.
    Silence,
}

/// Link whose incoming bytes are fixed in advance. Runs dry as a closed link.
///
/// When given the elapsed-seconds counter, every send also checks that the
/// counter is at 0, i.e. no timed phase is left half-consumed.
pub(crate) struct ScriptedLink {
    incoming: VecDeque<Incoming>,
    journal: Journal,
    seconds: Option<Arc<ElapsedSeconds>>,
}

impl ScriptedLink {
    pub(crate) fn new(journal: &Journal) -> Self {
        ScriptedLink {
            incoming: VecDeque::new(),
            journal: journal.clone(),
            seconds: None,
        }
    }

    pub(crate) fn watching(mut self, seconds: &Arc<ElapsedSeconds>) -> Self {
        self.seconds = Some(Arc::clone(seconds));
        self
    }

    pub(crate) fn bytes(mut self, bytes: &[u8]) -> Self {
        self.incoming.extend(bytes.iter().map(|b| Incoming::Byte(*b)));
        self
    }

    pub(crate) fn byte(self, byte: impl Into<u8>) -> Self {
        self.bytes(&[byte.into()])
    }

    pub(crate) fn silence(mut self) -> Self {
        self.incoming.push_back(Incoming::Silence);
        self
    }
}

impl SerialLink for ScriptedLink {
    fn send(&mut self, byte: u8) -> Result<(), LinkError> {
        if let Some(seconds) = &self.seconds {
            assert_eq!(seconds.elapsed(), 0, "counter not reset before {:#04x}", byte);
        }
        self.journal.push(Record::Sent(byte));
        Ok(())
    }

    fn receive(&mut self, timeout: Option<Duration>) -> Result<u8, LinkError> {
        match self.incoming.pop_front() {
            Some(Incoming::Byte(byte)) => Ok(byte),
            Some(Incoming::Silence) => Err(LinkError::Timeout(
                timeout.expect("silence scripted on a blocking read"),
            )),
            None => Err(LinkError::Closed),
        }
    }

    fn discard_pending(&mut self) -> Result<(), LinkError> {
        self.journal.push(Record::Discarded);
        Ok(())
    }
}

/// [`ChannelLink`] that journals what it sends.
pub(crate) struct RecordingLink {
    inner: ChannelLink,
    journal: Journal,
}

impl RecordingLink {
    pub(crate) fn new(inner: ChannelLink, journal: &Journal) -> Self {
        RecordingLink {
            inner,
            journal: journal.clone(),
        }
    }
}

impl SerialLink for RecordingLink {
    fn send(&mut self, byte: u8) -> Result<(), LinkError> {
        self.journal.push(Record::Sent(byte));
        self.inner.send(byte)
    }

    fn receive(&mut self, timeout: Option<Duration>) -> Result<u8, LinkError> {
        self.inner.receive(timeout)
    }

    fn discard_pending(&mut self) -> Result<(), LinkError> {
        self.journal.push(Record::Discarded);
        self.inner.discard_pending()
    }
}

// Keypad and display ==========================================================

pub(crate) struct ScriptedKeypad {
    keys: VecDeque<Key>,
    read: usize,
    pause: Option<(usize, Duration)>,
}

impl ScriptedKeypad {
    pub(crate) fn new(script: &str) -> Self {
        ScriptedKeypad {
            keys: keys(script).into(),
            read: 0,
            pause: None,
        }
    }

    /// Hold the key at `index` (0-based) back for `pause`, like a user who
    /// stepped away from the keypad.
    pub(crate) fn pausing(mut self, index: usize, pause: Duration) -> Self {
        self.pause = Some((index, pause));
        self
    }
}

impl InputDriver for ScriptedKeypad {
    fn read_key(&mut self) -> Result<Key, InputError> {
        if let Some((index, pause)) = self.pause {
            if index == self.read {
                thread::sleep(pause);
            }
        }
        self.read += 1;
        self.keys.pop_front().ok_or(InputError::Closed)
    }
}

/// Journals each completed screen line: `write` calls are accumulated until
/// the next `clear` or `move_to`.
pub(crate) struct RecordingDisplay {
    journal: Journal,
    line: String,
}

impl RecordingDisplay {
    pub(crate) fn new(journal: &Journal) -> Self {
        RecordingDisplay {
            journal: journal.clone(),
            line: String::new(),
        }
    }

    fn flush(&mut self) {
        if !self.line.is_empty() {
            let line = std::mem::take(&mut self.line);
            self.journal.push(Record::Display(line));
        }
    }
}

impl DisplayDriver for RecordingDisplay {
    fn clear(&mut self) {
        self.flush();
    }

    fn write(&mut self, text: &str) {
        self.line.push_str(text);
    }

    fn move_to(&mut self, _row: u8, _column: u8) {
        self.flush();
    }
}

impl Drop for RecordingDisplay {
    fn drop(&mut self) {
        self.flush();
    }
}

// Motor, alarm, ticks =========================================================

pub(crate) struct RecordingMotor(pub(crate) Journal);

impl ActuatorDriver for RecordingMotor {
    fn drive(&mut self, direction: Direction, duty: u8) {
        self.0.push(Record::Motor(direction, duty));
    }

    fn stop(&mut self) {
        self.0.push(Record::MotorStop);
    }
}

pub(crate) struct RecordingAlarm(pub(crate) Journal);

impl AlarmDriver for RecordingAlarm {
    fn set_active(&mut self, active: bool) {
        self.0.push(Record::Alarm(active));
    }
}

/// Ticks as fast as it can while started and journals how many ticks the
/// counter accepted between `start` and `stop`.
pub(crate) struct CountingTicker {
    seconds: Arc<ElapsedSeconds>,
    journal: Journal,
    running: Option<(Arc<AtomicBool>, JoinHandle<u32>)>,
}

impl CountingTicker {
    pub(crate) fn new(seconds: &Arc<ElapsedSeconds>, journal: &Journal) -> Self {
        CountingTicker {
            seconds: Arc::clone(seconds),
            journal: journal.clone(),
            running: None,
        }
    }
}

impl TickSource for CountingTicker {
    fn start(&mut self) {
        let flag = Arc::new(AtomicBool::new(true));
        let running = Arc::clone(&flag);
        let seconds = Arc::clone(&self.seconds);
        let handle = thread::spawn(move || {
            let mut accepted = 0;
            while running.load(Ordering::SeqCst) {
                if seconds.tick() {
                    accepted += 1;
                }
                thread::sleep(Duration::from_micros(50));
            }
            accepted
        });
        self.running = Some((flag, handle));
    }

    fn stop(&mut self) {
        if let Some((flag, handle)) = self.running.take() {
            flag.store(false, Ordering::SeqCst);
            let accepted = handle.join().unwrap();
            self.journal.push(Record::Ticks(accepted));
        }
    }
}

// Storage =====================================================================

/// EEPROM shared between the controller under test and the test itself.
#[derive(Clone, Default)]
pub(crate) struct SharedEeprom(pub(crate) Arc<Mutex<MemoryEeprom>>);

impl ByteStorage for SharedEeprom {
    fn capacity(&self) -> usize {
        self.0.lock().unwrap().capacity()
    }

    fn read_byte(&mut self, address: u16) -> Result<u8, StorageError> {
        self.0.lock().unwrap().read_byte(address)
    }

    fn write_byte(&mut self, address: u16, value: u8) -> Result<(), StorageError> {
        self.0.lock().unwrap().write_byte(address, value)
    }
}

impl SharedEeprom {
    pub(crate) fn credential(&self) -> Result<Credential, StorageError> {
        StridedCredentialStore::new(self.clone()).load()
    }
}

/// Credential store journaling successful writes.
pub(crate) struct JournaledStore {
    inner: StridedCredentialStore<SharedEeprom>,
    journal: Journal,
}

impl JournaledStore {
    pub(crate) fn new(eeprom: &SharedEeprom, journal: &Journal) -> Self {
        JournaledStore {
            inner: StridedCredentialStore::new(eeprom.clone()),
            journal: journal.clone(),
        }
    }
}

impl CredentialStore for JournaledStore {
    fn load(&mut self) -> Result<Credential, StorageError> {
        self.inner.load()
    }

    fn store(&mut self, credential: &Credential) -> Result<(), StorageError> {
        self.inner.store(credential)?;
        self.journal.push(Record::Stored(*credential));
        Ok(())
    }
}

/// EEPROM with a stuck bit: every written value reads back with bit 0 set.
pub(crate) struct StuckBitEeprom(pub(crate) MemoryEeprom);

impl ByteStorage for StuckBitEeprom {
    fn capacity(&self) -> usize {
        self.0.capacity()
    }

    fn read_byte(&mut self, address: u16) -> Result<u8, StorageError> {
        Ok(self.0.read_byte(address)? | 0x01)
    }

    fn write_byte(&mut self, address: u16, value: u8) -> Result<(), StorageError> {
        self.0.write_byte(address, value)
    }
}
