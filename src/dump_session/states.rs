//! States for the `mddump` dump session state machine.
//!
//! This modules is private and restricted to the
//! [`dump_session`](crate::dump_session) scope. The public interface of the
//! state machine is provided by [`dump_session`](crate::dump_session).
//!
//! ```ignore
//! use super::states::*;
//! ```
//!
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use std::{collections::VecDeque, fmt, io::BufRead};

use hexplay::HexViewBuilder;
use log::{debug, info};

use super::context::SessionContext;
use super::cursor::Admission;
use super::events::*;
use crate::{
    error::DumpError,
    md_line::{PROMPT, TERMINATOR},
    settings::OutputMode,
};

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Trait adding the ability for a state to be `run` after a transition into it.
pub(crate) trait Runnable {
    /// A state implements this method so it can be `run` after the state
    /// machine transitions into it.
    ///
    /// During this call, the state does its work using the data shared by all
    /// states and, when finished, requests a transition to a `new state` by
    /// returning the appropriate `event`.
    fn run(&mut self, ctx: &mut SessionContext) -> Event;
}

// Idle State ==================================================================

/// The initial state of the dump session.
///
///  * **[`StartReplayEvent`] => [`ReplayingState`]** when a previous log was
///    supplied,
///  * **[`StartLiveEvent`] => [`IssueCommandState`]** otherwise,
///  * **[`FailEvent`] => [`FailedState`]** when the settings are invalid or a
///    log file cannot be opened.
#[derive(Debug)]
pub(crate) struct IdleState {}
impl Runnable for IdleState {
    fn run(&mut self, ctx: &mut SessionContext) -> Event {
        info!("=> Idle");
        if let Err(e) = ctx.settings.validate().and_then(|_| ctx.open_logs()) {
            return Event::fail(e);
        }
        match ctx.replay_source.take() {
            Some(source) => Event::StartReplay(StartReplayEvent { source }),
            None => Event::StartLive(StartLiveEvent {}),
        }
    }
}

// Replaying State =============================================================

/// Feeds the lines of a previous resume log through the decoder and the
/// cursor, exactly as if they came from the device.
///
/// A final line that lost its `\r\n` terminator is normalized before decoding
/// and blank lines are skipped.
///
///  * **[`StartLiveEvent`] => [`IssueCommandState`]** once the log is
///    exhausted before the end address,
///  * **[`CompleteEvent`] => [`CompletedState`]** when the log reaches the end
///    address,
///  * **[`FailEvent`] => [`FailedState`]** on any decoding, continuity or I/O
///    error.
pub(crate) struct ReplayingState {
    pub source: Box<dyn BufRead>,
}
impl Runnable for ReplayingState {
    fn run(&mut self, ctx: &mut SessionContext) -> Event {
        info!("=> Replaying");
        let log_lines = !ctx.settings.suppress_log;
        let mut raw = String::new();
        let mut replayed = 0;
        loop {
            raw.clear();
            match self.source.read_line(&mut raw) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => return Event::fail(e.into()),
            }
            if raw.trim_end_matches(&['\r', '\n'][..]).is_empty() {
                continue;
            }
            let line = normalize_terminator(&raw);
            match ctx.process_line(&line, log_lines) {
                Ok(admission) => {
                    replayed += 1;
                    if admission == Admission::Beyond || ctx.cursor.is_finished() {
                        info!("previous log covers the whole range");
                        return Event::Complete(CompleteEvent {});
                    }
                }
                Err(e) => return Event::fail(e),
            }
        }
        info!(
            "{} lines replayed, resuming at 0x{:08X}",
            replayed,
            ctx.cursor.resume_address()
        );
        Event::StartLive(StartLiveEvent {})
    }
}
impl fmt::Debug for ReplayingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayingState").finish()
    }
}

// IssueCommand State ==========================================================

/// Sends the `md` command for `step` lines at the resume address.
///
///  * **[`ReadBatchEvent`] => [`ReadBatchState`]** once the command is sent,
///  * **[`FailEvent`] => [`FailedState`]** if the write fails.
#[derive(Debug)]
pub(crate) struct IssueCommandState {}
impl Runnable for IssueCommandState {
    fn run(&mut self, ctx: &mut SessionContext) -> Event {
        info!("=> Issue Command");
        let address = ctx.cursor.begin_command();
        let byte_count = u64::from(ctx.settings.step) * 16;
        let command = format!("md 0x{:x} 0x{:x}\n", address, byte_count);
        if let Err(e) = ctx.send(&command) {
            return Event::fail(e);
        }
        ctx.commands_sent += 1;
        Event::ReadBatch(ReadBatchEvent {})
    }
}

// ReadBatch State =============================================================

/// Reads a batch of lines from the device and drops its first line, which is
/// the echo of what was last sent.
///
///  * **[`ProcessLinesEvent`] => [`ProcessLinesState`]** with the remaining
///    lines,
///  * **[`FailEvent`] => [`FailedState`]** when nothing arrived before the
///    timeout or the link failed.
#[derive(Debug)]
pub(crate) struct ReadBatchState {}
impl Runnable for ReadBatchState {
    fn run(&mut self, ctx: &mut SessionContext) -> Event {
        debug!("=> Read Batch");
        let lines = match ctx.link.read_lines() {
            Ok(lines) => lines,
            Err(e) => return Event::fail(e),
        };
        debug!("read {} lines", lines.len());

        // Dump the received data in a hex table for debugging
        if ctx.settings.debug {
            let data = lines.concat();
            let view = HexViewBuilder::new(data.as_bytes())
                .address_offset(0)
                .row_width(16)
                .finish();
            println!("{}", view);
        }

        let mut lines: VecDeque<String> = lines.into();
        match lines.pop_front() {
            Some(echo) => debug!("discarding echo: {}", echo.escape_debug()),
            None => {
                return Event::fail(DumpError::Transport(format!(
                    "no data received within {:?}",
                    ctx.settings.timeout
                )))
            }
        }
        Event::ProcessLines(ProcessLinesEvent { lines })
    }
}

// ProcessLines State ==========================================================

/// Decodes and validates the lines of the current batch, one at a time.
///
///  * **[`PromptEvent`] => [`AwaitingContinuationState`]** when the device
///    prompt shows up, with the rest of the batch,
///  * **[`ResetEvent`] => [`ResetDeviceState`]** at the end of the first batch
///    when a reset was requested,
///  * **[`ReadBatchEvent`] => [`ReadBatchState`]** at the end of any other
///    batch,
///  * **[`CompleteEvent`] => [`CompletedState`]** once the end address is
///    reached,
///  * **[`FailEvent`] => [`FailedState`]** on any decoding or continuity
///    error.
#[derive(Debug)]
pub(crate) struct ProcessLinesState {
    pub lines: VecDeque<String>,
}
impl Runnable for ProcessLinesState {
    fn run(&mut self, ctx: &mut SessionContext) -> Event {
        while let Some(line) = self.lines.pop_front() {
            if line == PROMPT {
                return Event::Prompt(PromptEvent {
                    pending: std::mem::take(&mut self.lines),
                });
            }
            match ctx.process_line(&line, true) {
                Ok(admission) => {
                    if admission == Admission::Beyond || ctx.cursor.is_finished() {
                        return Event::Complete(CompleteEvent {});
                    }
                }
                Err(e) => return Event::fail(e),
            }
        }

        if ctx.settings.send_reset && !ctx.reset_sent && ctx.commands_sent == 1 {
            Event::Reset(ResetEvent {})
        } else {
            Event::ReadBatch(ReadBatchEvent {})
        }
    }
}

// AwaitingContinuation State ==================================================

/// The device reply buffer is full and it waits at its prompt. A newline makes
/// it continue the dump.
///
///  * **[`ProcessLinesEvent`] => [`ProcessLinesState`]** with the lines that
///    followed the prompt,
///  * **[`FailEvent`] => [`FailedState`]** if the write fails.
#[derive(Debug)]
pub(crate) struct AwaitingContinuationState {
    pub pending: VecDeque<String>,
}
impl Runnable for AwaitingContinuationState {
    fn run(&mut self, ctx: &mut SessionContext) -> Event {
        debug!("=> Awaiting Continuation");
        if let Err(e) = ctx.send("\n") {
            return Event::fail(e);
        }
        Event::ProcessLines(ProcessLinesEvent {
            lines: std::mem::take(&mut self.pending),
        })
    }
}

// ResetDevice State ===========================================================

/// Sends `reset` to the device, at most once per session.
///
///  * **[`ReadBatchEvent`] => [`ReadBatchState`]** once the command is sent,
///  * **[`FailEvent`] => [`FailedState`]** if the write fails.
#[derive(Debug)]
pub(crate) struct ResetDeviceState {}
impl Runnable for ResetDeviceState {
    fn run(&mut self, ctx: &mut SessionContext) -> Event {
        info!("=> Reset Device");
        if let Err(e) = ctx.send("reset\n") {
            return Event::fail(e);
        }
        ctx.reset_sent = true;
        Event::ReadBatch(ReadBatchEvent {})
    }
}

// Completed State =============================================================

/// Reached when the whole range was dumped.
///
/// Like [`FailedState`], this state goes into a 2-phase execution. It first
/// runs like any other state to flush the output, then triggers the
/// [`ExitEvent`] to make the event loop terminate.
#[derive(Debug)]
pub(crate) struct CompletedState {
    /// When `true` instructs the event loop to exit.
    pub should_exit: bool,
}
impl Runnable for CompletedState {
    fn run(&mut self, ctx: &mut SessionContext) -> Event {
        info!("=> Completed with {} bytes", ctx.output.len());
        if ctx.settings.output_mode == OutputMode::AtCompletion {
            if let Some(sink) = ctx.output_sink.as_mut() {
                if let Err(e) = sink.write_all(&ctx.output).and_then(|_| sink.flush()) {
                    return Event::fail(e.into());
                }
            }
        }
        ctx.progress.finish_with_message("[MD] Memory dumped");
        Event::Exit(ExitEvent { error: None })
    }
}

// Failed State ================================================================

/// Reached from any state when an unrecoverable error occurred. Everything
/// accepted so far stays in the resume log, which can be replayed by a new
/// session.
#[derive(Debug)]
pub(crate) struct FailedState {
    pub error: Option<DumpError>,
    /// When `true` instructs the event loop to exit.
    pub should_exit: bool,
}
impl Runnable for FailedState {
    fn run(&mut self, ctx: &mut SessionContext) -> Event {
        ctx.progress.abandon();
        if let Some(e) = &self.error {
            info!("=> Failed: {}", e);
        }
        Event::Exit(ExitEvent {
            error: self.error.take(),
        })
    }
}

// =============================================================================
// Private stuff
// =============================================================================

/// Coerce the line ending of a logged line back to the device terminator.
fn normalize_terminator(raw: &str) -> String {
    let body = raw.strip_suffix('\n').unwrap_or(raw);
    let body = body.strip_suffix('\r').unwrap_or(body);
    format!("{}{}", body, TERMINATOR)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn normalize_terminator_variants() {
    assert_eq!(normalize_terminator("abc\r\n"), "abc\r\n");
    assert_eq!(normalize_terminator("abc\n"), "abc\r\n");
    assert_eq!(normalize_terminator("abc"), "abc\r\n");
    assert_eq!(normalize_terminator("abc\r"), "abc\r\n");
}
