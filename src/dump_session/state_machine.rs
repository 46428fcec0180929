//! `mddump` dump session state machine.
//!
//! A session optionally replays the resume log of a previous, interrupted
//! session and then drives the bootloader `md` command until the requested
//! range is covered. Every line, replayed or live, goes through the same
//! decoder and continuity checks.
//!
//! The following state diagram summarizes the different states and
//! transitions of a dump session (any state can also go to `Failed`):
//!
//! ```text
//!                            START
//!                              |
//!                              v
//!                          .-------.
//!                          | Idle  |
//!                          '-------'
//!                              |
//!                 no     .-----------.   yes
//!              .--------( prev. log? )--------.
//!              |         '-----------'        |
//!              |                              v
//!              |                        .-----------.   end
//!              |                        | Replaying |-----------.
//!              |                        '-----------'           |
//!              v                              |                 |
//!      .--------------.       log exhausted   |                 |
//!      | IssueCommand |<----------------------'                 |
//!      '--------------'                                         |
//!              |                                                |
//!              v                                                |
//!       .-----------.<-----------------------.                  |
//!       | ReadBatch |<--------.              |                  |
//!       '-----------'         |        .-------------.          |
//!              |           batch       | ResetDevice |          |
//!              v           done        '-------------'          |
//!      .--------------.-------'              ^                  |
//!      | ProcessLines |----------------------'                  |
//!      '--------------'  first batch, reset requested           |
//!        |        ^                                             |
//!  prompt|        | newline sent                                |
//!        v        |                                             |
//!  .----------------------.                                     |
//!  | AwaitingContinuation |                                     |
//!  '----------------------'                                     |
//!                                                               |
//!      ProcessLines --- end ---> .-----------. <----------------'
//!                                | Completed |
//!                                '-----------'
//!                                      |
//!                                      v
//!                                     END
//! ```

use std::io::{BufRead, Write};

use super::context::SessionContext;
use super::cursor::DumpCursor;
use super::events::*;
use super::states::*;
use crate::{error::DumpError, link::DeviceLink, settings::Settings};

// =============================================================================
// Public Interface
// =============================================================================

/// A memory dump session. Build it with [`DumpSession::new`], attach the
/// optional previous log, resume log and output sink, then call `run()`.
///
/// **Example**
/// ```no_run
/// use mddump::{open_and_setup_port, DumpSession, SerialLink, SettingsBuilder};
///
/// let settings = SettingsBuilder::new()
///     .path("/dev/ttyUSB0")
///     .range(0x8000_0000, 0x8000_0ff0)
///     .finalize();
/// let port = open_and_setup_port(&settings).unwrap();
/// let mut session = DumpSession::new(settings, Box::new(SerialLink::new(port)));
/// let data = session.run().unwrap();
/// println!("{} bytes dumped", data.len());
/// ```
pub struct DumpSession {
    ctx: SessionContext,
    sm: DumpStates,
}
impl DumpSession {
    pub fn new(settings: Settings, link: Box<dyn DeviceLink>) -> Self {
        DumpSession {
            ctx: SessionContext::new(settings, link),
            // The session naturally starts in the `Idle` state.
            sm: DumpStates::Idle(IdleState {}),
        }
    }

    /// Replay the resume log of a previous session before reading the device.
    pub fn replay_from(mut self, source: Box<dyn BufRead>) -> Self {
        self.ctx.replay_source = Some(source);
        self
    }

    /// Append every accepted raw line to `log`.
    pub fn resume_log(mut self, log: Box<dyn Write>) -> Self {
        self.ctx.resume_log = Some(log);
        self
    }

    /// Write the dumped memory to `sink`, once at completion or chunk by chunk
    /// depending on the output mode.
    pub fn output_sink(mut self, sink: Box<dyn Write>) -> Self {
        self.ctx.output_sink = Some(sink);
        self
    }

    pub fn cursor(&self) -> &DumpCursor {
        &self.ctx.cursor
    }

    /// The session event loop runs until the `Completed` or `Failed` state is
    /// reached and its `should_exit` flag is set. It then returns the
    /// accumulated memory, or the error that aborted the session.
    pub fn run(&mut self) -> Result<Vec<u8>, DumpError> {
        loop {
            match &mut self.sm {
                DumpStates::Completed(state) if state.should_exit => {
                    return Ok(self.ctx.output.clone());
                }
                DumpStates::Failed(state) if state.should_exit => {
                    return Err(state.error.take().unwrap_or_else(|| {
                        DumpError::Transport("the session already failed".into())
                    }));
                }
                _ => {}
            }
            self.sm = self.sm.step(&mut self.ctx);
        }
    }
}

// =============================================================================
// Private stuff
// =============================================================================

/// An enum wrapper around the states of the dump session state machine. It
/// provides a simpler and more intuitive model for manipulating states and
/// their transitions.
#[derive(Debug)]
enum DumpStates {
    Idle(IdleState),
    Replaying(ReplayingState),
    IssueCommand(IssueCommandState),
    ReadBatch(ReadBatchState),
    ProcessLines(ProcessLinesState),
    AwaitingContinuation(AwaitingContinuationState),
    ResetDevice(ResetDeviceState),
    Completed(CompletedState),
    Failed(FailedState),
}
impl DumpStates {
    /// The unit of work in the state machine event loop. It runs the current
    /// state and decides the next transition from the returned event. State
    /// transitions from events are implemented using the rust `From`/`Into`
    /// pattern.
    fn step(&mut self, ctx: &mut SessionContext) -> Self {
        match self {
            DumpStates::Idle(state) => {
                let event = state.run(ctx);
                match event {
                    Event::StartReplay(ev) => DumpStates::Replaying(ev.into()),
                    Event::StartLive(ev) => DumpStates::IssueCommand(ev.into()),
                    Event::Fail(ev) => DumpStates::Failed(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, state),
                }
            }
            DumpStates::Replaying(state) => {
                let event = state.run(ctx);
                match event {
                    Event::StartLive(ev) => DumpStates::IssueCommand(ev.into()),
                    Event::Complete(ev) => DumpStates::Completed(ev.into()),
                    Event::Fail(ev) => DumpStates::Failed(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, state),
                }
            }
            DumpStates::IssueCommand(state) => {
                let event = state.run(ctx);
                match event {
                    Event::ReadBatch(ev) => DumpStates::ReadBatch(ev.into()),
                    Event::Fail(ev) => DumpStates::Failed(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, state),
                }
            }
            DumpStates::ReadBatch(state) => {
                let event = state.run(ctx);
                match event {
                    Event::ProcessLines(ev) => DumpStates::ProcessLines(ev.into()),
                    Event::Fail(ev) => DumpStates::Failed(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, state),
                }
            }
            DumpStates::ProcessLines(state) => {
                let event = state.run(ctx);
                match event {
                    Event::Prompt(ev) => DumpStates::AwaitingContinuation(ev.into()),
                    Event::Reset(ev) => DumpStates::ResetDevice(ev.into()),
                    Event::ReadBatch(ev) => DumpStates::ReadBatch(ev.into()),
                    Event::Complete(ev) => DumpStates::Completed(ev.into()),
                    Event::Fail(ev) => DumpStates::Failed(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, state),
                }
            }
            DumpStates::AwaitingContinuation(state) => {
                let event = state.run(ctx);
                match event {
                    Event::ProcessLines(ev) => DumpStates::ProcessLines(ev.into()),
                    Event::Fail(ev) => DumpStates::Failed(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, state),
                }
            }
            DumpStates::ResetDevice(state) => {
                let event = state.run(ctx);
                match event {
                    Event::ReadBatch(ev) => DumpStates::ReadBatch(ev.into()),
                    Event::Fail(ev) => DumpStates::Failed(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, state),
                }
            }
            DumpStates::Completed(state) => {
                let event = state.run(ctx);
                match event {
                    Event::Exit(ev) => DumpStates::Completed(ev.into()),
                    Event::Fail(ev) => DumpStates::Failed(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, state),
                }
            }
            DumpStates::Failed(state) => {
                let event = state.run(ctx);
                match event {
                    Event::Exit(ev) => DumpStates::Failed(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, state),
                }
            }
        }
    }
}

// -----------------------------------------------------------------------------
// State from Event transitions
// -----------------------------------------------------------------------------

impl From<StartReplayEvent> for ReplayingState {
    fn from(event: StartReplayEvent) -> ReplayingState {
        ReplayingState {
            source: event.source,
        }
    }
}

impl From<StartLiveEvent> for IssueCommandState {
    fn from(_: StartLiveEvent) -> IssueCommandState {
        IssueCommandState {}
    }
}

impl From<ReadBatchEvent> for ReadBatchState {
    fn from(_: ReadBatchEvent) -> ReadBatchState {
        ReadBatchState {}
    }
}

impl From<ProcessLinesEvent> for ProcessLinesState {
    fn from(event: ProcessLinesEvent) -> ProcessLinesState {
        ProcessLinesState { lines: event.lines }
    }
}

impl From<PromptEvent> for AwaitingContinuationState {
    fn from(event: PromptEvent) -> AwaitingContinuationState {
        AwaitingContinuationState {
            pending: event.pending,
        }
    }
}

impl From<ResetEvent> for ResetDeviceState {
    fn from(_: ResetEvent) -> ResetDeviceState {
        ResetDeviceState {}
    }
}

impl From<CompleteEvent> for CompletedState {
    fn from(_: CompleteEvent) -> CompletedState {
        CompletedState { should_exit: false }
    }
}
impl From<ExitEvent> for CompletedState {
    fn from(_: ExitEvent) -> CompletedState {
        CompletedState { should_exit: true }
    }
}

impl From<FailEvent> for FailedState {
    fn from(event: FailEvent) -> FailedState {
        FailedState {
            error: Some(event.error),
            should_exit: false,
        }
    }
}
impl From<ExitEvent> for FailedState {
    fn from(event: ExitEvent) -> FailedState {
        FailedState {
            error: event.error,
            should_exit: true,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        collections::VecDeque,
        env, fs,
        io::{self, Cursor},
        path::PathBuf,
        process,
        rc::Rc,
    };

    use super::*;
    use crate::{
        md_line::{LineRecord, BYTES_PER_LINE},
        settings::{DiscardPolicy, OutputMode, SettingsBuilder},
    };

    /// Device link serving pre-recorded batches and recording every write.
    struct ScriptedLink {
        batches: VecDeque<Vec<String>>,
        writes: Rc<RefCell<Vec<String>>>,
    }
    impl DeviceLink for ScriptedLink {
        fn write_text(&mut self, text: &str) -> Result<(), DumpError> {
            self.writes.borrow_mut().push(text.to_owned());
            Ok(())
        }

        fn read_lines(&mut self) -> Result<Vec<String>, DumpError> {
            Ok(self.batches.pop_front().unwrap_or_default())
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);
    impl SharedBuffer {
        fn contents(&self) -> Vec<u8> {
            self.0.borrow().clone()
        }
        fn text(&self) -> String {
            String::from_utf8(self.contents()).unwrap()
        }
    }
    impl io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn record(address: u64) -> LineRecord {
        let mut bytes = [0u8; BYTES_PER_LINE];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = (address as u8).wrapping_add(0x30 + i as u8);
        }
        LineRecord::from_bytes(address, bytes)
    }

    fn line(address: u64) -> String {
        record(address).to_line()
    }

    fn memory(addresses: &[u64]) -> Vec<u8> {
        addresses
            .iter()
            .flat_map(|a| record(*a).bytes.to_vec())
            .collect()
    }

    fn settings(start: u64, end: u64) -> SettingsBuilder {
        SettingsBuilder::new()
            .range(start, end)
            .step(2)
            .progress(false)
    }

    struct Harness {
        session: DumpSession,
        writes: Rc<RefCell<Vec<String>>>,
        log: SharedBuffer,
    }

    fn harness(settings: Settings, batches: Vec<Vec<String>>) -> Harness {
        let writes = Rc::new(RefCell::new(Vec::new()));
        let link = ScriptedLink {
            batches: batches.into(),
            writes: writes.clone(),
        };
        let log = SharedBuffer::default();
        let session = DumpSession::new(settings, Box::new(link)).resume_log(Box::new(log.clone()));
        Harness {
            session,
            writes,
            log,
        }
    }

    fn writes(h: &Harness) -> Vec<String> {
        h.writes.borrow().clone()
    }

    fn temp_log(name: &str) -> PathBuf {
        let path = env::temp_dir().join(format!("mddump-{}-{}.log", process::id(), name));
        let _ = fs::remove_file(&path);
        path
    }

    #[test]
    fn dumps_range_in_two_batches() {
        let mut h = harness(
            settings(0x1000, 0x1020).finalize(),
            vec![
                vec![
                    "md 0x1000 0x20\r\n".into(),
                    line(0x1000),
                    line(0x1010),
                    "=> ".into(),
                ],
                vec!["\r\n".into(), line(0x1020), line(0x1030)],
            ],
        );

        let data = h.session.run().unwrap();
        assert_eq!(data.len(), 48);
        assert_eq!(data, memory(&[0x1000, 0x1010, 0x1020]));
        assert_eq!(h.session.cursor().last_accepted_address(), Some(0x1020));
        assert!(h.session.cursor().is_finished());
        assert_eq!(writes(&h), vec!["md 0x1000 0x20\n", "\n"]);
        assert_eq!(
            h.log.text(),
            [line(0x1000), line(0x1010), line(0x1020)].concat()
        );
    }

    #[test]
    fn prompt_inside_batch_sends_one_newline() {
        let mut h = harness(
            settings(0x1000, 0x1020).finalize(),
            vec![vec![
                "md 0x1000 0x20\r\n".into(),
                line(0x1000),
                "=> ".into(),
                line(0x1010),
                line(0x1020),
            ]],
        );

        let data = h.session.run().unwrap();
        assert_eq!(data, memory(&[0x1000, 0x1010, 0x1020]));
        assert_eq!(writes(&h), vec!["md 0x1000 0x20\n", "\n"]);
    }

    #[test]
    fn batches_without_prompt_keep_reading() {
        let mut h = harness(
            settings(0x1000, 0x1020).finalize(),
            vec![
                vec!["md 0x1000 0x20\r\n".into(), line(0x1000)],
                vec!["\r\n".into(), line(0x1010), line(0x1020)],
            ],
        );

        assert_eq!(h.session.run().unwrap().len(), 48);
        assert_eq!(writes(&h), vec!["md 0x1000 0x20\n"]);
    }

    #[test]
    fn gap_aborts_at_offending_line() {
        let mut h = harness(
            settings(0x1000, 0x1040).finalize(),
            vec![vec![
                "md 0x1000 0x20\r\n".into(),
                line(0x1000),
                line(0x1020),
                line(0x1030),
            ]],
        );

        match h.session.run() {
            Err(DumpError::Continuity { expected, found }) => {
                assert_eq!(expected, 0x1010);
                assert_eq!(found, 0x1020);
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(h.session.cursor().last_accepted_address(), Some(0x1000));
        assert_eq!(h.log.text(), line(0x1000));
    }

    #[test]
    fn duplicate_aborts_at_offending_line() {
        let mut h = harness(
            settings(0x1000, 0x1040).finalize(),
            vec![vec![
                "md 0x1000 0x20\r\n".into(),
                line(0x1000),
                line(0x1010),
                line(0x1010),
            ]],
        );

        assert!(matches!(
            h.session.run(),
            Err(DumpError::Continuity {
                expected: 0x1020,
                found: 0x1010
            })
        ));
        assert_eq!(h.log.text(), [line(0x1000), line(0x1010)].concat());
    }

    #[test]
    fn corrupted_line_aborts() {
        let corrupted = line(0x1010).replacen("    @", "    X", 1);
        let mut h = harness(
            settings(0x1000, 0x1040).finalize(),
            vec![vec!["md 0x1000 0x20\r\n".into(), line(0x1000), corrupted]],
        );

        assert!(matches!(
            h.session.run(),
            Err(DumpError::Corruption {
                address: 0x1010,
                ..
            })
        ));
    }

    #[test]
    fn malformed_line_aborts() {
        let mut h = harness(
            settings(0x1000, 0x1040).finalize(),
            vec![vec![
                "md 0x1000 0x20\r\n".into(),
                "Unknown command 'md' - try 'help'\r\n".into(),
            ]],
        );

        assert!(matches!(h.session.run(), Err(DumpError::Format { .. })));
    }

    #[test]
    fn misaligned_lead_in_line_aborts() {
        let mut h = harness(
            settings(0x1000, 0x1010).finalize(),
            vec![vec![
                "md 0x1000 0x20\r\n".into(),
                line(0x0ff8),
                line(0x1008),
            ]],
        );

        assert!(matches!(h.session.run(), Err(DumpError::Format { .. })));
        assert_eq!(h.session.cursor().last_accepted_address(), None);
        assert!(h.log.text().is_empty());
    }

    #[test]
    fn silent_device_is_a_transport_error() {
        let mut h = harness(settings(0x1000, 0x1040).finalize(), vec![]);
        assert!(matches!(h.session.run(), Err(DumpError::Transport(_))));
        assert_eq!(writes(&h), vec!["md 0x1000 0x20\n"]);
    }

    #[test]
    fn invalid_settings_fail_before_talking_to_device() {
        let mut h = harness(settings(0x1008, 0x1040).finalize(), vec![]);
        assert!(matches!(h.session.run(), Err(DumpError::Configuration(_))));
        assert!(writes(&h).is_empty());
    }

    #[test]
    fn reset_is_sent_once_after_first_batch() {
        let mut h = harness(
            settings(0x1000, 0x1030).send_reset(true).finalize(),
            vec![
                vec!["md 0x1000 0x20\r\n".into(), line(0x1000)],
                vec!["reset\r\n".into(), line(0x1010)],
                vec!["\r\n".into(), line(0x1020)],
                vec!["\r\n".into(), line(0x1030)],
            ],
        );

        assert_eq!(h.session.run().unwrap().len(), 64);
        assert_eq!(writes(&h), vec!["md 0x1000 0x20\n", "reset\n"]);
    }

    #[test]
    fn replay_then_continue_live() {
        // The last logged line lost its terminator.
        let previous = format!("{}{}", line(0x1000), line(0x1010).trim_end());
        let mut h = harness(
            settings(0x1000, 0x1030).finalize(),
            vec![vec![
                "md 0x1020 0x20\r\n".into(),
                line(0x1020),
                line(0x1030),
            ]],
        );
        h.session = h
            .session
            .replay_from(Box::new(Cursor::new(previous.into_bytes())));

        let resumed = h.session.run().unwrap();
        assert_eq!(writes(&h), vec!["md 0x1020 0x20\n"]);
        assert_eq!(
            h.log.text(),
            [line(0x1000), line(0x1010), line(0x1020), line(0x1030)].concat()
        );

        // Same memory as an uninterrupted run over the same range.
        let mut single = harness(
            settings(0x1000, 0x1030).finalize(),
            vec![vec![
                "md 0x1000 0x20\r\n".into(),
                line(0x1000),
                line(0x1010),
                "=> ".into(),
                line(0x1020),
                line(0x1030),
            ]],
        );
        assert_eq!(resumed, single.session.run().unwrap());
    }

    #[test]
    fn replayed_lines_are_not_logged_again_when_suppressed() {
        let previous = [line(0x1000), line(0x1010)].concat();
        let mut h = harness(
            settings(0x1000, 0x1020).suppress_log(true).finalize(),
            vec![vec!["md 0x1020 0x20\r\n".into(), line(0x1020)]],
        );
        h.session = h
            .session
            .replay_from(Box::new(Cursor::new(previous.into_bytes())));

        assert_eq!(h.session.run().unwrap().len(), 48);
        assert_eq!(h.log.text(), line(0x1020));
    }

    #[test]
    fn replay_covering_whole_range_never_talks_to_device() {
        let previous = format!("{}\n{}{}", line(0x1000), line(0x1010), line(0x1020));
        let mut h = harness(settings(0x1000, 0x1010).finalize(), vec![]);
        h.session = h
            .session
            .replay_from(Box::new(Cursor::new(previous.into_bytes())));

        assert_eq!(h.session.run().unwrap(), memory(&[0x1000, 0x1010]));
        assert!(writes(&h).is_empty());
    }

    #[test]
    fn replay_with_gap_aborts() {
        let previous = [line(0x1000), line(0x1020)].concat();
        let mut h = harness(settings(0x1000, 0x1040).finalize(), vec![]);
        h.session = h
            .session
            .replay_from(Box::new(Cursor::new(previous.into_bytes())));

        assert!(matches!(
            h.session.run(),
            Err(DumpError::Continuity {
                expected: 0x1010,
                found: 0x1020
            })
        ));
        assert!(writes(&h).is_empty());
    }

    #[test]
    fn replay_discards_lines_below_start() {
        let previous = [line(0x0fe0), line(0x0ff0), line(0x1000)].concat();
        let mut h = harness(
            settings(0x1000, 0x1010).finalize(),
            vec![vec!["md 0x1010 0x20\r\n".into(), line(0x1010)]],
        );
        h.session = h
            .session
            .replay_from(Box::new(Cursor::new(previous.into_bytes())));

        assert_eq!(h.session.run().unwrap(), memory(&[0x1000, 0x1010]));
        assert_eq!(h.log.text(), [line(0x1000), line(0x1010)].concat());
    }

    #[test]
    fn discarded_line_moves_continuity_by_default() {
        let previous = [line(0x0fc0), line(0x0ff0), line(0x1000)].concat();
        let mut h = harness(settings(0x1000, 0x1010).finalize(), vec![]);
        h.session = h
            .session
            .replay_from(Box::new(Cursor::new(previous.into_bytes())));

        assert!(matches!(
            h.session.run(),
            Err(DumpError::Continuity {
                expected: 0x0fd0,
                found: 0x0ff0
            })
        ));
    }

    #[test]
    fn discarded_line_keeps_continuity_when_advancing_on_accept() {
        let previous = [line(0x0fc0), line(0x0ff0), line(0x1000), line(0x1010)].concat();
        let mut h = harness(
            settings(0x1000, 0x1010)
                .discard_policy(DiscardPolicy::AdvanceOnAccept)
                .finalize(),
            vec![],
        );
        h.session = h
            .session
            .replay_from(Box::new(Cursor::new(previous.into_bytes())));

        assert_eq!(h.session.run().unwrap(), memory(&[0x1000, 0x1010]));
    }

    #[test]
    fn incremental_output_keeps_partial_progress() {
        let sink = SharedBuffer::default();
        let mut h = harness(
            settings(0x1000, 0x1040)
                .output_mode(OutputMode::Incremental)
                .finalize(),
            vec![vec![
                "md 0x1000 0x20\r\n".into(),
                line(0x1000),
                line(0x1010),
                line(0x1030),
            ]],
        );
        h.session = h.session.output_sink(Box::new(sink.clone()));

        assert!(h.session.run().is_err());
        assert_eq!(sink.contents(), memory(&[0x1000, 0x1010]));
    }

    #[test]
    fn output_at_completion_is_written_once_done() {
        let sink = SharedBuffer::default();
        let mut h = harness(
            settings(0x1000, 0x1010).finalize(),
            vec![vec![
                "md 0x1000 0x20\r\n".into(),
                line(0x1000),
                line(0x1010),
            ]],
        );
        h.session = h.session.output_sink(Box::new(sink.clone()));

        let data = h.session.run().unwrap();
        assert_eq!(sink.contents(), data);
    }

    #[test]
    fn previous_log_path_is_replayed() {
        let path = temp_log("replayed");
        fs::write(&path, [line(0x1000), line(0x1010)].concat()).unwrap();
        let mut h = harness(
            settings(0x1000, 0x1010)
                .previous_log(path.to_str().unwrap())
                .finalize(),
            vec![],
        );

        let data = h.session.run().unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(data, memory(&[0x1000, 0x1010]));
        assert!(writes(&h).is_empty());
    }

    #[test]
    fn missing_previous_log_fails_before_talking_to_device() {
        let path = temp_log("missing");
        let mut h = harness(
            settings(0x1000, 0x1010)
                .previous_log(path.to_str().unwrap())
                .finalize(),
            vec![],
        );

        assert!(matches!(h.session.run(), Err(DumpError::Configuration(_))));
        assert!(writes(&h).is_empty());
    }

    #[test]
    fn resume_log_path_is_truncated_then_written() {
        let path = temp_log("fresh");
        fs::write(&path, "stale content\r\n").unwrap();
        let link = ScriptedLink {
            batches: vec![vec!["md 0x1000 0x20\r\n".into(), line(0x1000), line(0x1010)]].into(),
            writes: Rc::new(RefCell::new(Vec::new())),
        };
        let mut session = DumpSession::new(
            settings(0x1000, 0x1010)
                .resume_log(path.to_str().unwrap())
                .finalize(),
            Box::new(link),
        );

        session.run().unwrap();
        let logged = fs::read_to_string(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(logged, [line(0x1000), line(0x1010)].concat());
    }

    #[test]
    fn resume_log_shared_with_previous_log_is_appended() {
        let path = temp_log("shared");
        fs::write(&path, [line(0x1000), line(0x1010)].concat()).unwrap();
        let path_str = path.to_str().unwrap();
        let link = ScriptedLink {
            batches: vec![vec!["md 0x1020 0x20\r\n".into(), line(0x1020)]].into(),
            writes: Rc::new(RefCell::new(Vec::new())),
        };
        let mut session = DumpSession::new(
            settings(0x1000, 0x1020)
                .previous_log(path_str)
                .resume_log(path_str)
                .finalize(),
            Box::new(link),
        );

        assert_eq!(
            session.run().unwrap(),
            memory(&[0x1000, 0x1010, 0x1020])
        );
        let logged = fs::read_to_string(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(
            logged,
            [line(0x1000), line(0x1010), line(0x1020)].concat()
        );
    }
}
