//! Data shared by all the states of the dump session state machine.
//!
//! This modules is private and restricted to the
//! [`dump_session`](crate::dump_session) scope.

use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, Write},
};

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};

use super::cursor::{Admission, DumpCursor};
use crate::{
    error::DumpError,
    link::DeviceLink,
    md_line::{self, LineRecord},
    settings::{OutputMode, Settings},
};

// =============================================================================
// Crate-Public Interface
// =============================================================================

pub(crate) struct SessionContext {
    pub settings: Settings,
    pub cursor: DumpCursor,
    pub link: Box<dyn DeviceLink>,
    /// Previous resume log, moved into the `Replaying` state when it starts.
    pub replay_source: Option<Box<dyn BufRead>>,
    pub resume_log: Option<Box<dyn Write>>,
    pub output_sink: Option<Box<dyn Write>>,
    /// Accepted 16-byte chunks, in address order.
    pub output: Vec<u8>,
    pub progress: ProgressBar,
    pub commands_sent: u32,
    pub reset_sent: bool,
}

impl SessionContext {
    pub fn new(settings: Settings, link: Box<dyn DeviceLink>) -> Self {
        let cursor = DumpCursor::new(
            settings.start_address,
            settings.end_address,
            settings.discard_policy,
        );
        let progress = if settings.progress {
            let pb = ProgressBar::new(settings.range_len());
            pb.set_style(ProgressStyle::default_bar()
                .template("[MD] ⏬ Dumping [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                .progress_chars("=>-"));
            pb
        } else {
            ProgressBar::hidden()
        };
        SessionContext {
            settings,
            cursor,
            link,
            replay_source: None,
            resume_log: None,
            output_sink: None,
            output: Vec::new(),
            progress,
            commands_sent: 0,
            reset_sent: false,
        }
    }

    /// Open the previous and resume logs named in the settings, unless a
    /// reader or writer was already attached to the session.
    ///
    /// A resume log that is also the previous log is appended to, and
    /// `suppress_log` is forced so replayed lines are not written twice.
    /// Any other resume log is truncated.
    pub fn open_logs(&mut self) -> Result<(), DumpError> {
        let previous_log = self.settings.previous_log.clone();
        if self.replay_source.is_none() {
            if let Some(path) = &previous_log {
                let file = File::open(path).map_err(|e| {
                    DumpError::Configuration(format!("cannot open previous log `{}`: {}", path, e))
                })?;
                debug!("replaying previous log `{}`", path);
                self.replay_source = Some(Box::new(BufReader::new(file)));
            }
        }

        if self.resume_log.is_none() {
            if let Some(path) = self.settings.resume_log.clone() {
                let append = previous_log.map_or(false, |previous| same_file(&previous, &path));
                if append {
                    info!("appending to previous log `{}`", path);
                    self.settings.suppress_log = true;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .append(append)
                    .truncate(!append)
                    .open(&path)
                    .map_err(|e| {
                        DumpError::Configuration(format!("cannot open resume log `{}`: {}", path, e))
                    })?;
                self.resume_log = Some(Box::new(file));
            }
        }
        Ok(())
    }

    /// Write `text` to the device.
    pub fn send(&mut self, text: &str) -> Result<(), DumpError> {
        debug!("send: {}", text.escape_debug());
        self.link.write_text(text)
    }

    /// Decode a raw line, check it against the cursor and store it when it
    /// is accepted. `log_line` tells whether the raw line goes to the resume
    /// log.
    pub fn process_line(&mut self, raw: &str, log_line: bool) -> Result<Admission, DumpError> {
        let record = md_line::decode(raw, self.settings.line_size)?;
        let admission = self.cursor.admit(record.address)?;
        match admission {
            Admission::Accept => self.accept(raw, &record, log_line)?,
            Admission::Discard => warn!(
                "line at 0x{:08X} is below the start address 0x{:08X}, discarding",
                record.address, self.settings.start_address
            ),
            Admission::Beyond => info!(
                "line at 0x{:08X} is past the end address 0x{:08X}",
                record.address, self.settings.end_address
            ),
        }
        if self.cursor.is_finished() {
            info!("Reached specified end address");
        }
        Ok(admission)
    }

    /// Print a line on the terminal without garbling the progress bar.
    pub fn echo(&self, text: &str) {
        if self.progress.is_hidden() {
            println!("{}", text);
        } else {
            self.progress.println(text);
        }
    }

    fn accept(&mut self, raw: &str, record: &LineRecord, log_line: bool) -> Result<(), DumpError> {
        self.echo(&record.to_string());
        self.output.extend_from_slice(&record.bytes);

        if self.settings.output_mode == OutputMode::Incremental {
            if let Some(sink) = self.output_sink.as_mut() {
                sink.write_all(&record.bytes)?;
                sink.flush()?;
            }
        }
        if log_line {
            if let Some(log) = self.resume_log.as_mut() {
                log.write_all(raw.as_bytes())?;
                log.flush()?;
            }
        }

        self.progress.inc(record.bytes.len() as u64);
        Ok(())
    }
}

// =============================================================================
// Private stuff
// =============================================================================

fn same_file(a: &str, b: &str) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
