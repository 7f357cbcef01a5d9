//! Serial port selection and opening for a node running on a PC.

use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use serialport::{available_ports, SerialPort, SerialPortType};

use std::{thread, time::Duration};

use crate::{error::LinkError, hal::SerialPortLink, Settings};

//==============================================================================
// Public Interface
//==============================================================================

/// Interactively pick the serial port wired to the peer node.
///
/// Waits (with a spinner) until at least one port shows up, then offers the
/// list for selection. Returns `None` if the user cancels the selection.
pub fn select_port() -> Option<String> {
    let waiting_period = Duration::from_secs(1);
    let mut waited = 0;

    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(120);
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠚", "⠞", "⠖", "⠦", "⠴", "⠲", "⠳", "⠓"])
            .template("[DL] {spinner:.blue} {msg}"),
    );

    let found_ports = loop {
        let ports = enumerate_serial_ports();
        if !ports.is_empty() {
            pb.finish_with_message("Select the port wired to the other node:");
            break ports;
        }
        pb.set_message(format!(
            "[{:03}s] ⌛ Waiting for a serial port to show up...",
            style(waited).dim(),
        ));
        waited += 1;
        thread::sleep(waiting_period);
    };

    select_port_interactive(&found_ports)
}

/// Open the port named in `settings` and wrap it as a link.
///
/// Opening is retried a few times as USB serial adapters often need a moment
/// after being plugged in.
pub fn open_link(settings: &Settings) -> Result<SerialPortLink, LinkError> {
    use retry::{delay, retry_with_index};

    let path = match &settings.path {
        Some(path) => path.clone(),
        None => {
            return Err(serialport::Error::new(
                serialport::ErrorKind::InvalidInput,
                "no serial port selected",
            )
            .into())
        }
    };

    let result = retry_with_index(
        delay::Fixed::from_millis(1000).take(4),
        |index| -> Result<Box<dyn SerialPort>, serialport::Error> {
            debug!("Trying to open {} ({})", path, index);
            serialport::new(&path, settings.baud_rate)
                .data_bits(settings.data_bits)
                .stop_bits(settings.stop_bits)
                .parity(settings.parity)
                .flow_control(settings.flow_control)
                .open()
        },
    );

    let port = match result {
        Ok(port) => port,
        Err(retry::Error::Operation {
            error,
            total_delay,
            tries,
        }) => {
            info!(
                "Failed to open the port after {:?} and {} tries: {}",
                total_delay, tries, error,
            );
            return Err(error.into());
        }
        Err(retry::Error::Internal(reason)) => {
            info!("Internal retry error while opening port: {}", reason);
            return Err(serialport::Error::new(
                serialport::ErrorKind::Unknown,
                "internal error while retrying to open the port",
            )
            .into());
        }
    };

    info!("Connected to {} at {} baud", path, settings.baud_rate);
    SerialPortLink::new(port)
}

//==============================================================================
// Private stuff
//==============================================================================

/// Enumerates serial devices on the system, with vendor details for USB ones.
fn enumerate_serial_ports() -> Vec<String> {
    match available_ports() {
        Ok(ports) => ports
            .into_iter()
            .map(|p| match p.port_type {
                SerialPortType::UsbPort(info) => format!(
                    "{}: ({} / {})",
                    p.port_name,
                    info.manufacturer.as_ref().map_or("", String::as_str),
                    info.product.as_ref().map_or("", String::as_str)
                ),
                // Virtual ports (e.g. socat pairs) are useful for bench tests.
                _ => p.port_name,
            })
            .collect(),
        Err(ref e) => {
            info!("error: {}", e);
            vec![]
        }
    }
}

fn select_port_interactive(ports: &[String]) -> Option<String> {
    use dialoguer::{theme::ColorfulTheme, Select};

    let term = Term::buffered_stderr();
    let theme = ColorfulTheme::default();

    let mut select = Select::with_theme(&theme);
    for item in ports {
        select.item(item);
    }

    let selection = match select.default(0).interact_on_opt(&term) {
        Ok(selection) => selection,
        Err(e) => {
            info!("port selection failed: {}", e);
            None
        }
    }?;
    ports.get(selection).and_then(|entry| port_name(entry))
}

/// Strip the vendor details added by [`enumerate_serial_ports`].
fn port_name(entry: &str) -> Option<String> {
    entry.split(": (").next().map(String::from)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn port_name_drops_usb_details() {
    assert_eq!(
        port_name("/dev/ttyUSB0: (FTDI / FT232R)").as_deref(),
        Some("/dev/ttyUSB0")
    );
    assert_eq!(port_name("/dev/pts/3").as_deref(), Some("/dev/pts/3"));
}

#[test]
fn opening_without_a_path_fails() {
    let settings = crate::SettingsBuilder::new().finalize();
    assert!(matches!(open_link(&settings), Err(LinkError::Serial(_))));
}
