//! Helper functions to deal with serial ports and dump artifacts.

mod naming;
mod ports;

pub use naming::{dump_file_name, log_file_name};
pub use ports::{open_and_setup_port, select_port};
