//! Line oriented link to the device.
//!
//! The dump session only needs to write commands and to read whatever the
//! device printed as a batch of lines. [`DeviceLink`] is that seam, so that
//! the session can be driven by a serial port or by a scripted link in tests.

use std::io::{self, Read, Write};

use log::{debug, trace};
use serialport::SerialPort;

use crate::error::DumpError;

// =============================================================================
// Public Interface
// =============================================================================

pub trait DeviceLink {
    /// Write `text` to the device.
    fn write_text(&mut self, text: &str) -> Result<(), DumpError>;

    /// Read everything the device sends until it goes quiet, split into
    /// lines. Each line keeps its terminator; a trailing fragment without
    /// terminator (such as the prompt) is returned as the last line. An empty
    /// batch means nothing arrived before the timeout.
    fn read_lines(&mut self) -> Result<Vec<String>, DumpError>;
}

/// [`DeviceLink`] over an open and configured serial port.
///
/// A read is considered complete when the port read timeout elapses without
/// any new data.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl SerialLink {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        SerialLink { port }
    }
}

impl DeviceLink for SerialLink {
    fn write_text(&mut self, text: &str) -> Result<(), DumpError> {
        debug!("write: {}", text.escape_debug());
        self.port.write_all(text.as_bytes())?;
        self.port.flush()?;
        Ok(())
    }

    fn read_lines(&mut self) -> Result<Vec<String>, DumpError> {
        let mut received: Vec<u8> = Vec::new();
        let mut serial_buf = [0u8; 4096];
        loop {
            match self.port.read(&mut serial_buf) {
                Ok(0) => break,
                Ok(t) => {
                    trace!("{} bytes read from serial port", t);
                    received.extend_from_slice(&serial_buf[..t]);
                }
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(DumpError::Transport(format!(
                        "read from serial port failed: {}",
                        e
                    )))
                }
            }
        }
        Ok(split_lines(&received))
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SerialLink")
            .field(&self.port.name())
            .field(&self.port.baud_rate())
            .field(&self.port.timeout())
            .finish()
    }
}

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Split raw device output after every `\n`, keeping terminators.
///
/// Non UTF-8 bytes are replaced, which the line decoder then rejects as
/// non-ASCII.
pub(crate) fn split_lines(data: &[u8]) -> Vec<String> {
    data.split_inclusive(|&b| b == b'\n')
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn split_lines_keeps_terminators_and_prompt() {
    let lines = split_lines(b"md 0x0 0x20\r\n00000000: ...\r\n=> ");
    assert_eq!(lines, vec!["md 0x0 0x20\r\n", "00000000: ...\r\n", "=> "]);
}

#[test]
fn split_lines_of_nothing_is_empty() {
    assert!(split_lines(b"").is_empty());
}

#[test]
fn split_lines_replaces_invalid_bytes() {
    let lines = split_lines(b"ab\xffcd\r\n");
    assert_eq!(lines.len(), 1);
    assert!(!lines[0].is_ascii());
}
