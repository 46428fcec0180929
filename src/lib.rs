//! Mddump is a utility to extract a memory region from an embedded device by
//! driving the bootloader `md` (memory display) command over the serial port
//! connection, then checking and converting its textual output back into raw
//! bytes.
//!
//! Reading a large region at serial speed takes a long time and links are not
//! always reliable. Every line printed by the device is therefore checked
//! before being accepted:
//!
//! * the line must follow the fixed `md` layout exactly,
//! * its hex data must agree with the ASCII text printed next to it,
//! * its address must follow the previously accepted line by 16 bytes.
//!
//! Accepted lines are appended to a resume log as they arrive. When a session
//! is interrupted, the log can be handed to a new session which replays it
//! through the same checks and continues from the device where it left off.
//!
//! The dump session is implemented as a state machine, in terms of **states**
//! and **transitions** between them with the following characteristics:
//!
//! * Can only be in one state at any time.
//! * Each state can have its own associated data if needed.
//! * Data shared between **all** states (the settings, the address cursor, the
//!   device link and the accumulated memory) lives in a session context.
//! * Transitions between states are triggered via typed **events** and follow
//!   defined semantics.
//! * Only explicitly defined transitions are permitted.
//!
//! The implementation of state transitions leverages `rust`'s `From` and
//! `Into` pattern. Only transitions for which the `From` trait is implemented
//! are authorized and any other transition is detected at compile-time as an
//! error.

mod dump_session;
mod error;
mod link;
mod md_line;
mod settings;
mod utils;

pub use dump_session::{Admission, DumpCursor, DumpSession};
pub use error::DumpError;
pub use link::{DeviceLink, SerialLink};
pub use md_line::{
    decode, encode, shadow_of, LineRecord, BYTES_PER_LINE, MD_LINE_WIDTH, PROMPT, TERMINATOR,
};
pub use settings::{DiscardPolicy, OutputMode, Settings, SettingsBuilder, MAX_ADDRESS};
pub use utils::{dump_file_name, log_file_name, open_and_setup_port, select_port};
