//! Door motor and alarm buzzer.

use std::fmt;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

/// Rotation direction of the door motor. Clockwise opens the door.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Clockwise => write!(f, "CW"),
            Direction::CounterClockwise => write!(f, "CCW"),
        }
    }
}

/// The door motor.
pub trait ActuatorDriver {
    /// Run the motor in `direction` at `duty` percent.
    fn drive(&mut self, direction: Direction, duty: u8);
    fn stop(&mut self);
}

/// The tamper alarm output.
pub trait AlarmDriver {
    fn set_active(&mut self, active: bool);
}

fn spinner(template: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(120);
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠚", "⠞", "⠖", "⠦", "⠴", "⠲", "⠳", "⠓"])
            .template(template),
    );
    pb
}

// ConsoleMotor ================================================================

/// Renders the motor on the terminal as a spinner while it runs.
#[derive(Default)]
pub struct ConsoleMotor {
    running: Option<ProgressBar>,
}

impl ConsoleMotor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ActuatorDriver for ConsoleMotor {
    fn drive(&mut self, direction: Direction, duty: u8) {
        self.stop();
        info!("motor {} at {}%", direction, duty);
        let pb = spinner("[CTRL] {spinner:.blue} {msg}");
        pb.set_message(format!(
            "⚙️  motor {} at {}%",
            style(direction).cyan(),
            style(duty).bold()
        ));
        self.running = Some(pb);
    }

    fn stop(&mut self) {
        if let Some(pb) = self.running.take() {
            info!("motor stopped");
            pb.finish_with_message("⚙️  motor stopped");
        }
    }
}

// ConsoleAlarm ================================================================

/// Renders the buzzer on the terminal.
#[derive(Default)]
pub struct ConsoleAlarm {
    sounding: Option<ProgressBar>,
}

impl ConsoleAlarm {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AlarmDriver for ConsoleAlarm {
    fn set_active(&mut self, active: bool) {
        match (active, self.sounding.take()) {
            (true, None) => {
                info!("alarm on");
                let pb = spinner("[CTRL] {spinner:.red} {msg}");
                pb.set_message(format!("{}", style("🚨 ALARM").red().bold()));
                self.sounding = Some(pb);
            }
            (true, Some(pb)) => self.sounding = Some(pb),
            (false, Some(pb)) => {
                info!("alarm off");
                pb.finish_with_message("🔕 alarm off");
            }
            (false, None) => {}
        }
    }
}
