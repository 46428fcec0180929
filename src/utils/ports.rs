//! Serial port discovery, selection and setup.

use console::{style, Term};
use dialoguer::{theme::ColorfulTheme, Select};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use serialport::{available_ports, SerialPort, SerialPortType};

use std::{thread, time::Duration};

use crate::{error::DumpError, settings::Settings};

//==============================================================================
// Public Interface
//==============================================================================

/// Wait until at least one serial port shows up, then let the user pick one.
///
/// Returns `None` when the user cancels the selection with `Esc`, in which
/// case the caller may simply ask again to get a refreshed list.
pub fn select_port() -> Option<String> {
    let mut found_ports;
    let mut attempt: usize = 1;
    let waiting_period: usize = 1;

    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(120);
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠚", "⠞", "⠖", "⠦", "⠴", "⠲", "⠳", "⠓"])
            .template("[MD] {spinner:.blue} {msg}"),
    );

    loop {
        found_ports = enumerate_serial_ports();
        if !found_ports.is_empty() {
            pb.finish_with_message("Select the port connected to the bootloader:");
            break;
        }
        pb.set_message(format!(
            "[{:03}s] ⌛ Waiting for a serial controller to be connected...",
            style(attempt * waiting_period).dim(),
        ));
        attempt += 1;
        thread::sleep(Duration::from_secs(waiting_period as u64));
    }

    let selection = select_port_interactive(&found_ports);
    match &selection {
        Some(path) => info!("serial port {} selected", path),
        None => debug!("port selection canceled"),
    }
    selection
}

/// Open the port named in `settings` and apply its configuration, retrying a
/// few times in case the device is still settling.
pub fn open_and_setup_port(settings: &Settings) -> Result<Box<dyn SerialPort>, DumpError> {
    use retry::{delay, retry_with_index};

    let path = settings
        .path
        .clone()
        .ok_or_else(|| DumpError::Configuration("no serial port was given".into()))?;

    let result = retry_with_index(
        delay::Fixed::from_millis(1000).take(4),
        |index| -> Result<Box<dyn SerialPort>, serialport::Error> {
            debug!("Trying to connect {}", index);
            serialport::new(&path, settings.baud_rate)
                .data_bits(settings.data_bits)
                .stop_bits(settings.stop_bits)
                .parity(settings.parity)
                .flow_control(settings.flow_control)
                .timeout(settings.timeout)
                .open()
        },
    );

    match result {
        Ok(mut port) => {
            port.set_baud_rate(settings.baud_rate)?;
            port.set_data_bits(settings.data_bits)?;
            port.set_stop_bits(settings.stop_bits)?;
            port.set_parity(settings.parity)?;
            port.set_flow_control(settings.flow_control)?;
            port.set_timeout(settings.timeout)?;

            info!("Connected to {} at {} baud", path, port.baud_rate()?);
            debug!("data_bits    : {:#?}", port.data_bits()?);
            debug!("stop_bits    : {:#?}", port.stop_bits()?);
            debug!("parity       : {:#?}", port.parity()?);
            debug!("flow control : {:#?}", port.flow_control()?);
            debug!("timeout      : {:?}", port.timeout());

            let baud_rate = port.baud_rate()?;
            if baud_rate != settings.baud_rate {
                return Err(DumpError::Configuration(format!(
                    "the port runs at {} baud instead of {}, which is probably not a valid rate",
                    baud_rate, settings.baud_rate
                )));
            }
            Ok(port)
        }
        Err(retry::Error::Operation {
            error,
            total_delay,
            tries,
        }) => {
            info!(
                "Failed to open the port after {:?} and {} tries: {}",
                total_delay, tries, error,
            );
            Err(error.into())
        }
        Err(retry::Error::Internal(message)) => Err(DumpError::Transport(format!(
            "internal error while retrying to open the port: {}",
            message
        ))),
    }
}

//==============================================================================
// Private stuff
//==============================================================================

/// Enumerates serial devices on the system, with some details for USB ones.
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
                _ => p.port_name,
            })
            .collect(),
        Err(ref e) => {
            info!("error: {}", e.to_string());
            vec![]
        }
    }
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
