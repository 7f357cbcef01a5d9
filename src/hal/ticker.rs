//! The periodic tick source feeding the elapsed-seconds counter.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use log::trace;

use crate::protocol::ElapsedSeconds;

/// A timer that, while started, calls [`ElapsedSeconds::tick`] once per
/// period. The tick callback is its only side effect.
pub trait TickSource {
    fn start(&mut self);
    fn stop(&mut self);
}

/// [`TickSource`] backed by a thread sleeping for one period between ticks.
#[derive(Debug)]
pub struct PeriodicTicker {
    seconds: Arc<ElapsedSeconds>,
    period: Duration,
    running: Option<Arc<AtomicBool>>,
}

impl PeriodicTicker {
    pub fn new(seconds: Arc<ElapsedSeconds>, period: Duration) -> Self {
        PeriodicTicker {
            seconds,
            period,
            running: None,
        }
    }
}

impl TickSource for PeriodicTicker {
    fn start(&mut self) {
        if self.running.is_some() {
            return;
        }
        // Every run gets its own flag: a thread still sleeping from a previous
        // run sees its flag cleared and exits without ticking.
        let running = Arc::new(AtomicBool::new(true));
        let seconds = Arc::clone(&self.seconds);
        let period = self.period;
        let flag = Arc::clone(&running);
        thread::spawn(move || loop {
            thread::sleep(period);
            if !flag.load(Ordering::SeqCst) {
                break;
            }
            let counted = seconds.tick();
            trace!("tick (counted: {})", counted);
        });
        self.running = Some(running);
    }

    fn stop(&mut self) {
        if let Some(flag) = self.running.take() {
            flag.store(false, Ordering::SeqCst);
        }
    }
}

impl Drop for PeriodicTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn ticker_drives_a_phase_to_completion() {
    let seconds = Arc::new(ElapsedSeconds::new());
    let mut ticker = PeriodicTicker::new(Arc::clone(&seconds), Duration::from_millis(1));
    ticker.start();
    let counted = seconds.wait_for(5, Duration::from_secs(2)).unwrap();
    ticker.stop();
    assert_eq!(counted, 5);
    assert_eq!(seconds.elapsed(), 0);
}

#[test]
fn stopped_ticker_stalls_the_phase() {
    let seconds = Arc::new(ElapsedSeconds::new());
    let mut ticker = PeriodicTicker::new(Arc::clone(&seconds), Duration::from_millis(1));
    ticker.start();
    ticker.stop();
    thread::sleep(Duration::from_millis(5));
    assert!(seconds.wait_for(3, Duration::from_millis(30)).is_err());
}
