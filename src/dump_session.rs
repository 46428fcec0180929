//! `mddump` memory dump session.
//!
//! **Example** - Replaying a previous log then continuing from the device:
//! ```no_run
//! use std::{fs::File, io::BufReader};
//!
//! use mddump::{open_and_setup_port, DumpSession, SerialLink, SettingsBuilder};
//!
//! let settings = SettingsBuilder::new()
//!     .path("/dev/ttyUSB0")
//!     .range(0x8000_0000, 0x8001_0000)
//!     .finalize();
//! let port = open_and_setup_port(&settings).unwrap();
//! let previous = BufReader::new(File::open("previous.log").unwrap());
//! let mut session = DumpSession::new(settings, Box::new(SerialLink::new(port)))
//!     .replay_from(Box::new(previous));
//! let data = session.run().unwrap();
//! ```

mod context;
mod cursor;
mod events;
mod state_machine;
mod states;

pub use cursor::{Admission, DumpCursor};
pub use state_machine::DumpSession;
