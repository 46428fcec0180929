//! Settings related to the serial port and to the memory dump session.
//!
//! Use the [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
//! pattern to set the configurable values.

use std::time::Duration;

pub use serialport::{DataBits, FlowControl, Parity, StopBits};

use crate::{error::DumpError, md_line::MD_LINE_WIDTH};

// =============================================================================
// Public Interface
// =============================================================================

/// Highest line address an `md` line can carry in its 8 hex digits.
pub const MAX_ADDRESS: u64 = 0xFFFF_FFF0;

/// What to do with the continuity reference when a line below the start
/// address is discarded.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DiscardPolicy {
    /// A discarded line still counts as seen: the next line must follow it.
    AdvanceOnDiscard,
    /// Only accepted lines move the continuity reference.
    AdvanceOnAccept,
}

/// When the accumulated memory is written to the output sink.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OutputMode {
    /// Once, after the session completes.
    AtCompletion,
    /// Chunk by chunk, as soon as each line is accepted.
    Incremental,
}

/// Groups all settings used by `mddump` and acts as a
/// [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
/// for the settings.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Settings {
    /// The port name, usually the device path.
    pub path: Option<String>,
    /// The baud rate in symbols-per-second.
    pub baud_rate: u32,
    /// Number of bits used to represent a character sent on the line.
    pub data_bits: DataBits,
    /// The type of signalling to use for controlling data transfer.
    pub flow_control: FlowControl,
    /// The type of parity to use for error checking.
    pub parity: Parity,
    /// Number of bits to use to signal the end of a character.
    pub stop_bits: StopBits,
    /// How long a read waits for data before the batch is considered
    /// complete.
    pub timeout: Duration,

    /// First address to dump, multiple of 16.
    pub start_address: u64,
    /// Last address to dump (inclusive), multiple of 16, at most
    /// [`MAX_ADDRESS`].
    pub end_address: u64,
    /// Number of `md` lines requested per command.
    pub step: u32,
    /// Expected length of a raw `md` line, terminator included.
    pub line_size: usize,

    /// Resume log of a previous, interrupted session to replay first. The
    /// session opens it unless a replay source was attached directly.
    pub previous_log: Option<String>,
    /// Where accepted raw lines are logged, unless a writer was attached to
    /// the session directly. Appended to when it is also the previous log,
    /// truncated otherwise.
    pub resume_log: Option<String>,
    /// Do not log again the lines accepted while replaying the previous log.
    pub suppress_log: bool,
    /// Send `reset` to the device once, after the first batch.
    pub send_reset: bool,
    /// Dump every raw batch read from the device as a hex table.
    pub debug: bool,
    pub discard_policy: DiscardPolicy,
    pub output_mode: OutputMode,
    /// Show a progress bar while dumping.
    pub progress: bool,

    /// Restrict creation of `Settings` instances unless through the
    /// `SettingsBuilder`.
    #[doc(hidden)]
    _private_use_builder: (),
}

impl Settings {
    /// Check the dump parameters before starting a session.
    pub fn validate(&self) -> Result<(), DumpError> {
        if self.start_address % 16 != 0 {
            return Err(DumpError::Configuration(format!(
                "start address 0x{:x} is not a multiple of 16",
                self.start_address
            )));
        }
        if self.end_address % 16 != 0 {
            return Err(DumpError::Configuration(format!(
                "end address 0x{:x} is not a multiple of 16",
                self.end_address
            )));
        }
        if self.end_address > MAX_ADDRESS {
            return Err(DumpError::Configuration(format!(
                "end address 0x{:x} does not fit in the 32-bit address field of `md` lines",
                self.end_address
            )));
        }
        if self.end_address <= self.start_address {
            return Err(DumpError::Configuration(format!(
                "end address 0x{:x} must be above start address 0x{:x}",
                self.end_address, self.start_address
            )));
        }
        if self.step == 0 {
            return Err(DumpError::Configuration("step must be at least 1".into()));
        }
        if self.line_size == 0 {
            return Err(DumpError::Configuration(
                "line size must be at least 1".into(),
            ));
        }
        if self.timeout == Duration::from_secs(0) {
            return Err(DumpError::Configuration("timeout must not be zero".into()));
        }
        Ok(())
    }

    /// Number of bytes covered by the requested range.
    pub fn range_len(&self) -> u64 {
        self.end_address.saturating_sub(self.start_address) + 16
    }
}

/// The builder for the `Settings` values.
///
/// All values are optional and have default values that will be used if not
/// explicitly set.
///
/// **Example**
///
/// ```ignore
/// let settings = SettingsBuilder::new()
///     .path("/dev/ttyUSB0")
///     .range(0x8000_0000, 0x8000_1000)
///     .finalize();
/// ```
pub struct SettingsBuilder {
    settings: Settings,
}
impl SettingsBuilder {
    /// Start building the settings using default values and no path for the
    /// port.
    pub fn new() -> Self {
        SettingsBuilder {
            settings: Settings {
                path: None,
                baud_rate: 115_200,
                data_bits: DataBits::Eight,
                flow_control: FlowControl::None,
                parity: Parity::None,
                stop_bits: StopBits::One,
                timeout: Duration::from_millis(100),
                start_address: 0,
                end_address: 0,
                step: 64,
                line_size: MD_LINE_WIDTH,
                previous_log: None,
                resume_log: None,
                suppress_log: false,
                send_reset: false,
                debug: false,
                discard_policy: DiscardPolicy::AdvanceOnDiscard,
                output_mode: OutputMode::AtCompletion,
                progress: true,
                _private_use_builder: (),
            },
        }
    }

    /// Set the path to the serial port
    pub fn path<'a>(mut self, path: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.path = Some(path.into().as_ref().to_owned());
        self
    }

    /// Set the baud rate in symbols-per-second
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.settings.baud_rate = baud_rate;
        self
    }

    /// Set the number of bits used to represent a character sent on the line
    pub fn data_bits(mut self, data_bits: DataBits) -> Self {
        self.settings.data_bits = data_bits;
        self
    }

    /// Set the type of signalling to use for controlling data transfer
    pub fn flow_control(mut self, flow_control: FlowControl) -> Self {
        self.settings.flow_control = flow_control;
        self
    }

    /// Set the type of parity to use for error checking
    pub fn parity(mut self, parity: Parity) -> Self {
        self.settings.parity = parity;
        self
    }

    /// Set the number of bits to use to signal the end of a character
    pub fn stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.settings.stop_bits = stop_bits;
        self
    }

    /// Set the read timeout of the serial port
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = timeout;
        self
    }

    /// Set the inclusive memory range to dump
    pub fn range(mut self, start_address: u64, end_address: u64) -> Self {
        self.settings.start_address = start_address;
        self.settings.end_address = end_address;
        self
    }

    /// Set the number of lines requested per `md` command
    pub fn step(mut self, step: u32) -> Self {
        self.settings.step = step;
        self
    }

    /// Set the expected length of a raw line
    pub fn line_size(mut self, line_size: usize) -> Self {
        self.settings.line_size = line_size;
        self
    }

    /// Set the path to the resume log of a previous session
    pub fn previous_log<'a>(mut self, previous_log: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.previous_log = Some(previous_log.into().as_ref().to_owned());
        self
    }

    /// Set the path to the resume log of this session
    pub fn resume_log<'a>(mut self, resume_log: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.resume_log = Some(resume_log.into().as_ref().to_owned());
        self
    }

    pub fn suppress_log(mut self, suppress_log: bool) -> Self {
        self.settings.suppress_log = suppress_log;
        self
    }

    pub fn send_reset(mut self, send_reset: bool) -> Self {
        self.settings.send_reset = send_reset;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.settings.debug = debug;
        self
    }

    pub fn discard_policy(mut self, discard_policy: DiscardPolicy) -> Self {
        self.settings.discard_policy = discard_policy;
        self
    }

    pub fn output_mode(mut self, output_mode: OutputMode) -> Self {
        self.settings.output_mode = output_mode;
        self
    }

    pub fn progress(mut self, progress: bool) -> Self {
        self.settings.progress = progress;
        self
    }

    pub fn finalize(self) -> Settings {
        self.settings
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn all_default() {
    let settings = SettingsBuilder::new().finalize();
    assert_eq!(
        settings,
        Settings {
            path: None,
            baud_rate: 115_200,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
            timeout: Duration::from_millis(100),
            start_address: 0,
            end_address: 0,
            step: 64,
            line_size: 67,
            previous_log: None,
            resume_log: None,
            suppress_log: false,
            send_reset: false,
            debug: false,
            discard_policy: DiscardPolicy::AdvanceOnDiscard,
            output_mode: OutputMode::AtCompletion,
            progress: true,
            _private_use_builder: (),
        }
    )
}

#[test]
fn path() {
    let settings = SettingsBuilder::new().path("/dev/ttyUSB0").finalize();
    assert_eq!(settings.path.unwrap(), "/dev/ttyUSB0");
}

#[test]
fn baud_rate() {
    let baud_rate = 96_000;
    let settings = SettingsBuilder::new().baud_rate(baud_rate).finalize();
    assert_eq!(settings.baud_rate, baud_rate);
}

#[test]
fn range_and_step() {
    let settings = SettingsBuilder::new()
        .range(0x1000, 0x1020)
        .step(2)
        .finalize();
    assert_eq!(settings.start_address, 0x1000);
    assert_eq!(settings.end_address, 0x1020);
    assert_eq!(settings.step, 2);
    assert_eq!(settings.range_len(), 48);
}

#[test]
fn logs() {
    let settings = SettingsBuilder::new()
        .previous_log("old.log")
        .resume_log("new.log")
        .suppress_log(true)
        .finalize();
    assert_eq!(settings.previous_log.unwrap(), "old.log");
    assert_eq!(settings.resume_log.unwrap(), "new.log");
    assert!(settings.suppress_log);
}

#[test]
fn validate_accepts_aligned_range() {
    let settings = SettingsBuilder::new().range(0x1000, 0x2000).finalize();
    assert!(settings.validate().is_ok());
}

#[test]
fn validate_accepts_top_of_32_bit_space() {
    let settings = SettingsBuilder::new()
        .range(0xFFFF_0000, MAX_ADDRESS)
        .finalize();
    assert!(settings.validate().is_ok());
}

#[test]
fn validate_rejects_bad_parameters() {
    let cases = vec![
        SettingsBuilder::new().range(0x1008, 0x2000).finalize(),
        SettingsBuilder::new().range(0x1000, 0x2001).finalize(),
        SettingsBuilder::new().range(0x2000, 0x2000).finalize(),
        SettingsBuilder::new().range(0x2000, 0x1000).finalize(),
        SettingsBuilder::new().range(0x1000, 0x2000).step(0).finalize(),
        SettingsBuilder::new()
            .range(0x1000, 0x2000)
            .line_size(0)
            .finalize(),
        SettingsBuilder::new()
            .range(0x1000, 0x2000)
            .timeout(Duration::from_secs(0))
            .finalize(),
        SettingsBuilder::new()
            .range(0x1000, 0x1_0000_0000)
            .finalize(),
    ];
    for settings in cases {
        assert!(
            matches!(settings.validate(), Err(DumpError::Configuration(_))),
            "{:?} should be rejected",
            settings
        );
    }
}
