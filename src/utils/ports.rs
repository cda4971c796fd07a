//! Serial port device selection.

use std::{thread, time::Duration};

use console::{style, Term};
use dialoguer::{theme::ColorfulTheme, Select};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use serialport::{available_ports, SerialPortType};

//==============================================================================
// Public Interface
//==============================================================================

/// Wait until at least one serial port is present, then ask the user to pick
/// one. Returns `None` when the user cancels the selection (`Esc`).
pub fn select_port() -> Option<String> {
    let mut found_ports;
    let mut attempt: usize = 1;
    let waiting_period: usize = 1;

    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(120);
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠚", "⠞", "⠖", "⠦", "⠴", "⠲", "⠳", "⠓"])
            .template("[TK] {spinner:.blue} {msg}"),
    );

    loop {
        found_ports = enumerate_serial_ports();
        if !found_ports.is_empty() {
            pb.finish_with_message("Select the serial port of the device:");
            break;
        }
        let waited = attempt * waiting_period;
        pb.set_message(format!(
            "[{:03}s] ⌛ Waiting for a serial device to be connected...",
            style(waited).dim(),
        ));
        attempt += 1;

        thread::sleep(Duration::from_secs(waiting_period as u64));
    }

    let selection = select_port_interactive(&found_ports);
    match &selection {
        Some(path) => debug!("selected port {}", path),
        None => debug!("port selection canceled"),
    }
    selection
}

//==============================================================================
// Private stuff
//==============================================================================

/// Enumerates serial devices on the system. USB ports are listed with their
/// manufacturer and product, as `path: (manufacturer / product)`.
fn enumerate_serial_ports() -> Vec<String> {
    let mut ports = vec![];
    match available_ports() {
        Ok(found) => {
            for p in found {
                match p.port_type {
                    SerialPortType::UsbPort(info) => {
                        let extended_name = format!(
                            "{}: ({} / {})",
                            p.port_name,
                            info.manufacturer.as_ref().map_or("", String::as_str),
                            info.product.as_ref().map_or("", String::as_str)
                        );
                        ports.push(extended_name);
                    }
                    // Other devices too, e.g. virtual ports for testing.
                    _ => ports.push(p.port_name),
                }
            }
        }
        Err(ref e) => {
            info!("error: {}", e.to_string());
        }
    }
    ports
}

fn select_port_interactive(ports: &[String]) -> Option<String> {
    let term = Term::buffered_stderr();
    let theme = ColorfulTheme::default();

    let mut select = Select::with_theme(&theme);
    for item in ports {
        select.item(item);
    }

    match select.default(0).interact_on_opt(&term) {
        Ok(selection) => selection
            .and_then(|x| ports.get(x))
            .and_then(|name| name.split(':').next())
            .map(String::from),
        Err(ref e) => {
            info!("error: {}", e.to_string());
            None
        }
    }
}
