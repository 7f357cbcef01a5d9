//! Timing policy and the elapsed-seconds counter fed by the tick source.

use std::{
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use crate::error::TimingError;

/// Seconds the motor drives forward to open the door.
pub const DOOR_OPEN_SECS: u32 = 15;
/// Seconds the door stays open.
pub const HOLD_OPEN_SECS: u32 = 3;
/// Seconds the motor drives in reverse to close the door.
pub const DOOR_CLOSE_SECS: u32 = 15;
/// Seconds the alarm sounds after too many failed attempts.
pub const LOCKOUT_SECS: u32 = 60;
/// Retries allowed after the first failed comparison (3 attempts in total).
pub const MAX_RETRIES: u8 = 2;
/// Motor duty cycle while the door moves, in percent.
pub const MOTOR_FULL_DUTY: u8 = 100;

/// Seconds counted inside one timed phase.
///
/// The counter behaves like a timer compare unit: a phase arms it with a
/// threshold through [`wait_for`](ElapsedSeconds::wait_for), the tick source
/// calls [`tick`](ElapsedSeconds::tick) once per second, and the phase wakes
/// up when the threshold is reached. Reading the count and resetting it to 0
/// happen under one lock, so a tick can never slip in between. Ticks that
/// arrive while no phase is armed, or after the threshold was reached, are
/// dropped.
#[derive(Debug, Default)]
pub struct ElapsedSeconds {
    state: Mutex<Counter>,
    ticked: Condvar,
}

#[derive(Debug, Default)]
struct Counter {
    count: u32,
    target: Option<u32>,
}

impl ElapsedSeconds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by the tick source. Returns `true` when the tick was counted.
    pub fn tick(&self) -> bool {
        let mut counter = self.lock();
        match counter.target {
            Some(target) if counter.count < target => {
                counter.count += 1;
                self.ticked.notify_all();
                true
            }
            _ => false,
        }
    }

    /// Current count of the armed phase (0 between phases).
    pub fn elapsed(&self) -> u32 {
        self.lock().count
    }

    /// Arm the counter at 0, block until `seconds` ticks were counted, then
    /// consume the count (back to 0) and return it.
    ///
    /// `stall` bounds the wait for any single tick; when it expires without
    /// progress the tick source is considered dead.
    pub fn wait_for(&self, seconds: u32, stall: Duration) -> Result<u32, TimingError> {
        let mut counter = self.lock();
        counter.count = 0;
        counter.target = Some(seconds);

        while counter.count < seconds {
            let before = counter.count;
            let (guard, result) = self
                .ticked
                .wait_timeout(counter, stall)
                .unwrap_or_else(PoisonError::into_inner);
            counter = guard;
            if result.timed_out() && counter.count == before {
                let elapsed = Self::consume(&mut counter);
                return Err(TimingError::Stalled {
                    elapsed,
                    target: seconds,
                });
            }
        }

        Ok(Self::consume(&mut counter))
    }

    fn consume(counter: &mut Counter) -> u32 {
        let elapsed = counter.count;
        counter.count = 0;
        counter.target = None;
        elapsed
    }

    fn lock(&self) -> MutexGuard<'_, Counter> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

#[test]
fn ticks_outside_a_phase_are_dropped() {
    let seconds = ElapsedSeconds::new();
    assert!(!seconds.tick());
    assert!(!seconds.tick());
    assert_eq!(seconds.elapsed(), 0);
}

#[test]
fn zero_second_phase_returns_immediately() {
    let seconds = ElapsedSeconds::new();
    assert_eq!(seconds.wait_for(0, Duration::from_millis(10)).unwrap(), 0);
}

#[test]
fn wait_consumes_exactly_the_threshold() {
    let seconds = Arc::new(ElapsedSeconds::new());
    let running = Arc::new(AtomicBool::new(true));

    // Tick as fast as possible; the counter must never overshoot.
    let ticker = {
        let seconds = Arc::clone(&seconds);
        let running = Arc::clone(&running);
        thread::spawn(move || {
            let mut accepted = 0;
            while running.load(Ordering::SeqCst) {
                if seconds.tick() {
                    accepted += 1;
                }
                thread::yield_now();
            }
            accepted
        })
    };

    let first = seconds.wait_for(15, Duration::from_secs(5)).unwrap();
    assert_eq!(seconds.elapsed(), 0);
    let second = seconds.wait_for(3, Duration::from_secs(5)).unwrap();
    assert_eq!(seconds.elapsed(), 0);

    running.store(false, Ordering::SeqCst);
    let accepted = ticker.join().unwrap();

    assert_eq!(first, 15);
    assert_eq!(second, 3);
    assert_eq!(accepted, 18);
}

#[test]
fn stalled_tick_source_is_reported() {
    let seconds = Arc::new(ElapsedSeconds::new());
    let feeder = {
        let seconds = Arc::clone(&seconds);
        thread::spawn(move || {
            // Deliver two ticks once the phase is armed, then go silent.
            let mut delivered = 0;
            while delivered < 2 {
                if seconds.tick() {
                    delivered += 1;
                }
                thread::yield_now();
            }
        })
    };

    let result = seconds.wait_for(60, Duration::from_millis(50));
    feeder.join().unwrap();

    match result {
        Err(TimingError::Stalled { elapsed, target }) => {
            assert_eq!(elapsed, 2);
            assert_eq!(target, 60);
        }
        other => panic!("expected a stall, got {:?}", other),
    }
    assert_eq!(seconds.elapsed(), 0);
}
