//! Doorlock command line interface.

use std::{process, str::FromStr, sync::Arc, time::Duration};

use clap::{
    crate_authors, crate_description, crate_name, crate_version, value_t, App, AppSettings::*,
    Arg, ArgMatches, SubCommand,
};
use console::style;
use log::{debug, error, info, trace, warn, LevelFilter};
use serialport::{DataBits, FlowControl, Parity, StopBits};
use simplelog::*;

use doorlock::{
    self as dl,
    control::{self, ControlPeripherals},
    error::StorageError,
    hal::{
        ChannelLink, ConsoleAlarm, ConsoleMotor, CredentialStore, FileEeprom, MemoryEeprom,
        PeriodicTicker, SerialLink, StridedCredentialStore, TerminalDisplay, TerminalKeypad,
    },
    hmi::{self, HmiPeripherals},
    protocol::ElapsedSeconds,
    simulator, utils, Settings,
};

fn main() {
    println!("[DL] doorlock v{}", crate_version!());

    ctrlc::set_handler(move || {
        println!("🛑 received Ctrl+C!");
        process::exit(0);
    })
    .expect("Failed to install my Ctrl-C handler!");

    let matches = App::new(crate_name!())
        .version(format!("v{}", crate_version!()).as_str())
        .author(crate_authors!())
        .about(crate_description!())
        .long_about(
            "\n\
            Doorlock runs the two nodes of a keypad door locker. The `hmi` \
            node owns the keypad and the display, the `control` node owns the \
            door motor, the alarm and the stored credential. They talk over a \
            serial line, so each can run on its own machine (or on both ends \
            of a virtual null-modem pair).\n\
            \n\
            At first start the user chooses a 6-digit credential. After that, \
            `-` opens the door and `+` changes the credential, both after \
            entering the current one. Three wrong entries in a row sound the \
            alarm for a minute.\n\
            \n\
            `simulate` runs both nodes in this process, wired together in \
            memory.\
        ",
        )
        .max_term_width(80)
        .setting(ColoredHelp)
        .setting(NextLineHelp)
        .setting(SubcommandRequiredElseHelp)
        .arg(Arg::with_name("v").short("v").multiple(true).help(
            "Sets the logging level of verbosity, repeat several times for \
                higher verbosity",
        ))
        .subcommand(
            SubCommand::with_name("control")
                .about("runs the back-end node on a serial port")
                .args(&serial_args())
                .args(&timing_args())
                .arg(eeprom_arg()),
        )
        .subcommand(
            SubCommand::with_name("hmi")
                .about("runs the front-end node on a serial port")
                .args(&serial_args())
                .args(&timing_args()),
        )
        .subcommand(
            SubCommand::with_name("simulate")
                .about("runs both nodes in this process")
                .args(&timing_args())
                .arg(eeprom_arg()),
        )
        .get_matches();

    // Vary the output based on how many times the user used the "verbose" flag
    // (i.e. 'doorlock -v -v -v' or 'doorlock -vvv' vs 'doorlock -v'
    let log_level: LevelFilter;
    match matches.occurrences_of("v") {
        0 => log_level = LevelFilter::Warn,
        1 => log_level = LevelFilter::Info,
        2 => log_level = LevelFilter::Debug,
        _ => log_level = LevelFilter::Trace,
    }

    TermLogger::init(log_level, Config::default(), TerminalMode::Mixed).unwrap();

    trace!("{:#?}", matches);

    let exit_code = match matches.subcommand() {
        ("control", Some(sub)) => run_control(settings_from(sub)),
        ("hmi", Some(sub)) => run_hmi(settings_from(sub)),
        ("simulate", Some(sub)) => run_simulation(settings_from(sub)),
        _ => unreachable!(),
    };
    debug!("exit code: {}", exit_code);
    process::exit(exit_code.into());
}

// Arguments ===================================================================

fn serial_args() -> Vec<Arg<'static, 'static>> {
    vec![
        Arg::with_name("DEVICE_TTY")
            .help("the tty device wired to the other node")
            .long_help(
                "the tty device wired to the other node; when not set, \
                 `doorlock` offers the list of available ports to select \
                 from.",
            )
            .short("-t")
            .long("--tty")
            .takes_value(true)
            .require_equals(true),
        Arg::with_name("BAUD_RATE")
            .help("serial port baud rate")
            .short("-b")
            .long("--baud-rate")
            .takes_value(true)
            .default_value("9600")
            .require_equals(true),
        Arg::with_name("DATA_BITS")
            .help("number of bits per character")
            .short("-d")
            .long("--data-bits")
            .takes_value(true)
            .possible_values(&["5", "6", "7", "8"])
            .default_value("8")
            .require_equals(true),
        Arg::with_name("STOP_BITS")
            .help("number of stop bits per byte")
            .short("-s")
            .long("--stop-bits")
            .takes_value(true)
            .possible_values(&["1", "2"])
            .default_value("1")
            .require_equals(true),
        Arg::with_name("PARITY")
            .help("parity checking protocol")
            .short("-p")
            .long("--parity")
            .takes_value(true)
            .possible_values(&["none", "odd", "even"])
            .default_value("none")
            .require_equals(true),
        Arg::with_name("FLOW_CONTROL")
            .help("flow control mode")
            .short("-f")
            .long("--flow-control")
            .takes_value(true)
            .possible_values(&["none", "soft", "hard"])
            .default_value("none")
            .require_equals(true),
    ]
}

fn timing_args() -> Vec<Arg<'static, 'static>> {
    vec![
        Arg::with_name("TICK_MS")
            .help("milliseconds per counted second")
            .long_help(
                "milliseconds per counted second of the door and lockout \
                 phases; lower it to watch a full door cycle quickly.",
            )
            .long("--tick-ms")
            .takes_value(true)
            .default_value("1000")
            .require_equals(true),
        Arg::with_name("TIMEOUT_SECS")
            .help("seconds to wait for the other node mid-exchange (0: forever)")
            .long_help(
                "seconds to wait for the other node mid-exchange, 0 to wait \
                 forever; raised to the lockout plus one counted second when \
                 shorter.",
            )
            .long("--timeout-secs")
            .takes_value(true)
            .default_value("120")
            .require_equals(true),
    ]
}

fn eeprom_arg() -> Arg<'static, 'static> {
    Arg::with_name("EEPROM_IMAGE")
        .help("file emulating the back-end EEPROM")
        .long_help(
            "file emulating the back-end EEPROM; created when missing. \
             Without it the credential is kept in memory only.",
        )
        .long("--eeprom")
        .takes_value(true)
        .require_equals(true)
}

fn numeric_arg<T: FromStr>(matches: &ArgMatches, name: &str, flag: &str) -> Option<T> {
    if !matches.is_present(name) {
        return None;
    }
    Some(value_t!(matches.value_of(name), T).unwrap_or_else(|_| {
        println!(
            "{}: `{}` needs to be a numeric value",
            style("error").red(),
            style(flag).cyan()
        );
        println!(
            "   {} `{}` is not a valid value",
            style("-->").cyan(),
            style(matches.value_of(name).unwrap_or_default()).on_red()
        );
        process::exit(-1);
    }))
}

fn settings_from(matches: &ArgMatches) -> Settings {
    let mut builder = dl::SettingsBuilder::new();

    if let Some(baud_rate) = numeric_arg::<u32>(matches, "BAUD_RATE", "baud-rate") {
        builder = builder.baud_rate(baud_rate);
    }
    if let Some(data_bits) = matches.value_of("DATA_BITS") {
        builder = builder.data_bits(match data_bits {
            "5" => DataBits::Five,
            "6" => DataBits::Six,
            "7" => DataBits::Seven,
            "8" => DataBits::Eight,
            _ => unreachable!(),
        });
    }
    if let Some(stop_bits) = matches.value_of("STOP_BITS") {
        builder = builder.stop_bits(match stop_bits {
            "1" => StopBits::One,
            "2" => StopBits::Two,
            _ => unreachable!(),
        });
    }
    if let Some(parity) = matches.value_of("PARITY") {
        builder = builder.parity(match parity {
            "none" => Parity::None,
            "even" => Parity::Even,
            "odd" => Parity::Odd,
            _ => unreachable!(),
        });
    }
    if let Some(flow_control) = matches.value_of("FLOW_CONTROL") {
        builder = builder.flow_control(match flow_control {
            "none" => FlowControl::None,
            "soft" => FlowControl::Software,
            "hard" => FlowControl::Hardware,
            _ => unreachable!(),
        });
    }
    if let Some(tick_ms) = numeric_arg::<u64>(matches, "TICK_MS", "tick-ms") {
        builder = builder.tick_period(Duration::from_millis(tick_ms.max(1)));
    }
    if let Some(timeout) = numeric_arg::<u64>(matches, "TIMEOUT_SECS", "timeout-secs") {
        builder = builder.read_timeout(match timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        });
    }
    if let Some(path) = matches.value_of("DEVICE_TTY") {
        builder = builder.path(path);
    }
    if let Some(path) = matches.value_of("EEPROM_IMAGE") {
        builder = builder.eeprom_image(path);
    }

    builder.finalize()
}

// Nodes =======================================================================

fn serial_link(settings: &mut Settings) -> Option<Box<dyn SerialLink + Send>> {
    if settings.path.is_none() {
        settings.path = Some(utils::select_port()?);
    }
    match utils::open_link(settings) {
        Ok(link) => Some(Box::new(link)),
        Err(e) => {
            error!("{}", e);
            None
        }
    }
}

fn credential_store(settings: &Settings) -> Result<Box<dyn CredentialStore + Send>, StorageError> {
    Ok(match &settings.eeprom_image {
        Some(path) => {
            let eeprom = FileEeprom::open(path)?;
            info!("credential kept in {}", eeprom.path().display());
            Box::new(StridedCredentialStore::new(eeprom))
        }
        None => {
            warn!("no EEPROM image given, the credential will not survive a restart");
            Box::new(StridedCredentialStore::new(MemoryEeprom::new()))
        }
    })
}

fn back_end(
    settings: &Settings,
    link: Box<dyn SerialLink + Send>,
) -> Result<ControlPeripherals, StorageError> {
    let seconds = Arc::new(ElapsedSeconds::new());
    Ok(ControlPeripherals {
        link,
        store: credential_store(settings)?,
        motor: Box::new(ConsoleMotor::new()),
        alarm: Box::new(ConsoleAlarm::new()),
        ticker: Box::new(PeriodicTicker::new(Arc::clone(&seconds), settings.tick_period)),
        seconds,
    })
}

fn front_end(link: Box<dyn SerialLink + Send>) -> HmiPeripherals {
    HmiPeripherals {
        link,
        display: Box::new(TerminalDisplay::new()),
        keypad: Box::new(TerminalKeypad::new()),
    }
}

fn run_control(mut settings: Settings) -> i8 {
    let link = match serial_link(&mut settings) {
        Some(link) => link,
        None => return 1,
    };
    match back_end(&settings, link) {
        Ok(peripherals) => control::factory(settings, peripherals).run(),
        Err(e) => {
            error!("{}", e);
            1
        }
    }
}

fn run_hmi(mut settings: Settings) -> i8 {
    match serial_link(&mut settings) {
        Some(link) => hmi::factory(settings, front_end(link)).run(),
        None => 1,
    }
}

fn run_simulation(settings: Settings) -> i8 {
    let (back_link, front_link) = ChannelLink::pair();
    let peripherals = match back_end(&settings, Box::new(back_link)) {
        Ok(peripherals) => peripherals,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };
    match simulator::run_pair(settings, peripherals, front_end(Box::new(front_link))) {
        (0, 0) => 0,
        _ => 1,
    }
}
