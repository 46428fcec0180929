//! Events for the `mddump` dump session state machine.
//!
//! This modules is private and restricted to the
//! [`dump_session`](crate::dump_session) scope. The public interface of the
//! state machine is provided by [`dump_session`](crate::dump_session).
//!
//! ```ignore
//! use super::events::*;
//! ```
//!
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use std::{collections::VecDeque, fmt, io::BufRead};

use crate::error::DumpError;

// =============================================================================
// Crate-Public Interface
// =============================================================================

// StartReplayEvent ============================================================

/// Event fired from the `Idle` state when a previous resume log was supplied.
/// Triggers a transition to the `Replaying` state.
pub(crate) struct StartReplayEvent {
    /// The previous log. Consumed and moved to the next state.
    pub source: Box<dyn BufRead>,
}
impl fmt::Debug for StartReplayEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartReplayEvent").finish()
    }
}

// StartLiveEvent ==============================================================

/// Event fired to start talking to the device, triggering a transition to the
/// `IssueCommand` state.
///
/// This event can happen under one of the following circumstances:
///
///  1. While at the `Idle` state when there is no previous log to replay.
///  2. While at the `Replaying` state after the whole previous log was
///     replayed without reaching the end address.
#[derive(Debug)]
pub(crate) struct StartLiveEvent {}

// ReadBatchEvent ==============================================================

/// Event fired when the device is expected to print a new batch of lines.
#[derive(Debug)]
pub(crate) struct ReadBatchEvent {}

// ProcessLinesEvent ===========================================================

/// Event carrying raw lines still to be decoded, either a freshly read batch
/// (its command echo already removed) or what was left of a batch when the
/// device prompted for more input.
#[derive(Debug)]
pub(crate) struct ProcessLinesEvent {
    pub lines: VecDeque<String>,
}

// PromptEvent =================================================================

/// Event fired when the device printed its prompt in the middle of a batch
/// and waits for a newline before continuing the dump.
#[derive(Debug)]
pub(crate) struct PromptEvent {
    /// Lines of the batch that followed the prompt.
    pub pending: VecDeque<String>,
}

// ResetEvent ==================================================================

/// Event fired once, after the first batch, when a device reset was requested.
#[derive(Debug)]
pub(crate) struct ResetEvent {}

// CompleteEvent ===============================================================

/// Event fired when the end address was reached.
#[derive(Debug)]
pub(crate) struct CompleteEvent {}

// FailEvent ===================================================================

/// Event fired from any state when an unrecoverable error occurs.
#[derive(Debug)]
pub(crate) struct FailEvent {
    pub error: DumpError,
}

// ExitEvent ===================================================================

/// The last event of the dump session. It makes the event loop terminate and
/// hand back the outcome to the caller.
#[derive(Debug)]
pub(crate) struct ExitEvent {
    /// The error that made the session fail, `None` on completion.
    pub error: Option<DumpError>,
}

// Events enum ==================================================================

/// Events that can be triggered within the dump session state machine.
#[derive(Debug)]
pub(crate) enum Event {
    StartReplay(StartReplayEvent),
    StartLive(StartLiveEvent),
    ReadBatch(ReadBatchEvent),
    ProcessLines(ProcessLinesEvent),
    Prompt(PromptEvent),
    Reset(ResetEvent),
    Complete(CompleteEvent),
    Fail(FailEvent),
    Exit(ExitEvent),
}

impl Event {
    /// Shorthand for failing with `error`.
    pub fn fail(error: DumpError) -> Self {
        Event::Fail(FailEvent { error })
    }
}
