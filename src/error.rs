//! Errors reported by the memory dump session.
//!
//! All of them are fatal for a running session. The only recovery path is to
//! start a new session with the resume log produced so far as the previous
//! log, so that already validated memory is replayed instead of re-read.

use thiserror::Error;

// =============================================================================
// Public Interface
// =============================================================================

#[derive(Error, Debug)]
pub enum DumpError {
    /// The raw line does not follow the `md` output layout (length, fixed
    /// separators, hex digits or terminator).
    #[error("malformed line \"{line}\": {reason}")]
    Format { line: String, reason: String },

    /// The line is well formed but its data disagrees with the ASCII text the
    /// device printed next to it.
    #[error(
        "corrupted line at 0x{address:08X}: byte 0x{byte:02X} at offset {offset} \
         does not match '{shadow_char}' (data: {hex}, text: |{shadow}|)"
    )]
    Corruption {
        address: u64,
        offset: usize,
        byte: u8,
        shadow_char: char,
        hex: String,
        shadow: String,
    },

    /// A decoded line does not immediately follow the previous one.
    #[error(
        "possible skip: expected line at 0x{expected:08X} but got 0x{found:08X}"
    )]
    Continuity { expected: u64, found: u64 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serialport::Error> for DumpError {
    fn from(err: serialport::Error) -> Self {
        DumpError::Transport(err.to_string())
    }
}

impl DumpError {
    /// Build a [`DumpError::Format`] for `line`, escaping control characters
    /// so that the offending text is readable on a terminal.
    pub(crate) fn format(line: &str, reason: impl Into<String>) -> Self {
        DumpError::Format {
            line: line.escape_debug().to_string(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn format_error_escapes_control_characters() {
    let err = DumpError::format("00001000: \r\n", "bad length");
    assert_eq!(
        err.to_string(),
        "malformed line \"00001000: \\r\\n\": bad length"
    );
}

#[test]
fn continuity_error_reports_both_addresses() {
    let err = DumpError::Continuity {
        expected: 0x1010,
        found: 0x1030,
    };
    let message = err.to_string();
    assert!(message.contains("0x00001010"));
    assert!(message.contains("0x00001030"));
}
