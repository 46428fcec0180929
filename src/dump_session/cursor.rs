//! Address bookkeeping for the dump session.
//!
//! Every decoded line goes through [`DumpCursor::admit`], which enforces that
//! lines follow each other by exactly 16 bytes and decides whether the line is
//! part of the requested range.

use crate::{error::DumpError, md_line::BYTES_PER_LINE, settings::DiscardPolicy};

const LINE_SPAN: u64 = BYTES_PER_LINE as u64;

// =============================================================================
// Public Interface
// =============================================================================

/// The outcome of admitting a line into the cursor.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Admission {
    /// The line is in range and must be stored.
    Accept,
    /// The line is below the start address and must be dropped.
    Discard,
    /// The line is past the end address; the dump is finished.
    Beyond,
}

#[derive(Debug, Clone)]
pub struct DumpCursor {
    start_address: u64,
    end_address: u64,
    last_accepted: Option<u64>,
    /// The line the next one must follow, if any.
    reference: Option<u64>,
    finished: bool,
    policy: DiscardPolicy,
}

impl DumpCursor {
    pub fn new(start_address: u64, end_address: u64, policy: DiscardPolicy) -> Self {
        DumpCursor {
            start_address,
            end_address,
            last_accepted: None,
            reference: None,
            finished: false,
            policy,
        }
    }

    /// Address of the most recently accepted line, `None` before any line is
    /// accepted.
    pub fn last_accepted_address(&self) -> Option<u64> {
        self.last_accepted
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Address where a new `md` command must start to continue the dump.
    pub fn resume_address(&self) -> u64 {
        self.last_accepted
            .map_or(self.start_address, |address| address + LINE_SPAN)
    }

    /// Prepare for a new `md` command and return its start address.
    ///
    /// The device restarts its output at the resume address, so continuity is
    /// checked from the last accepted line again.
    pub fn begin_command(&mut self) -> u64 {
        self.reference = self.last_accepted;
        self.resume_address()
    }

    /// Check `address` against the previous line and classify it.
    pub fn admit(&mut self, address: u64) -> Result<Admission, DumpError> {
        match self.reference {
            Some(previous) if address != previous + LINE_SPAN => {
                return Err(DumpError::Continuity {
                    expected: previous + LINE_SPAN,
                    found: address,
                });
            }
            // Lines preceding the range are tolerated until the first one
            // inside it, which must be the start address.
            None if address >= self.start_address && address != self.start_address => {
                return Err(DumpError::Continuity {
                    expected: self.start_address,
                    found: address,
                });
            }
            _ => {}
        }

        if address > self.end_address {
            self.finished = true;
            return Ok(Admission::Beyond);
        }

        if address < self.start_address {
            if self.policy == DiscardPolicy::AdvanceOnDiscard {
                self.reference = Some(address);
            }
            return Ok(Admission::Discard);
        }

        self.last_accepted = Some(address);
        self.reference = Some(address);
        if address >= self.end_address {
            self.finished = true;
        }
        Ok(Admission::Accept)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn accepts_contiguous_lines_until_end() {
    let mut cursor = DumpCursor::new(0x1000, 0x1020, DiscardPolicy::AdvanceOnDiscard);
    assert_eq!(cursor.last_accepted_address(), None);
    assert_eq!(cursor.resume_address(), 0x1000);

    assert_eq!(cursor.admit(0x1000).unwrap(), Admission::Accept);
    assert_eq!(cursor.admit(0x1010).unwrap(), Admission::Accept);
    assert!(!cursor.is_finished());
    assert_eq!(cursor.admit(0x1020).unwrap(), Admission::Accept);
    assert!(cursor.is_finished());
    assert_eq!(cursor.last_accepted_address(), Some(0x1020));
}

#[test]
fn line_past_end_is_not_accepted() {
    let mut cursor = DumpCursor::new(0x1000, 0x1010, DiscardPolicy::AdvanceOnDiscard);
    cursor.admit(0x1000).unwrap();
    cursor.admit(0x1010).unwrap();
    assert_eq!(cursor.admit(0x1020).unwrap(), Admission::Beyond);
    assert!(cursor.is_finished());
    assert_eq!(cursor.last_accepted_address(), Some(0x1010));
}

#[test]
fn first_line_must_be_start_address() {
    let mut cursor = DumpCursor::new(0x1000, 0x1020, DiscardPolicy::AdvanceOnDiscard);
    match cursor.admit(0x1010) {
        Err(DumpError::Continuity { expected, found }) => {
            assert_eq!(expected, 0x1000);
            assert_eq!(found, 0x1010);
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn gap_and_duplicate_are_rejected() {
    let mut cursor = DumpCursor::new(0x1000, 0x1100, DiscardPolicy::AdvanceOnDiscard);
    cursor.admit(0x1000).unwrap();
    assert!(matches!(
        cursor.admit(0x1020),
        Err(DumpError::Continuity {
            expected: 0x1010,
            found: 0x1020
        })
    ));
    assert!(matches!(
        cursor.admit(0x1000),
        Err(DumpError::Continuity {
            expected: 0x1010,
            found: 0x1000
        })
    ));
}

#[test]
fn discard_advances_reference_by_default() {
    let mut cursor = DumpCursor::new(0x1000, 0x1020, DiscardPolicy::AdvanceOnDiscard);
    assert_eq!(cursor.admit(0x0fc0).unwrap(), Admission::Discard);
    assert!(matches!(
        cursor.admit(0x0ff0),
        Err(DumpError::Continuity {
            expected: 0x0fd0,
            found: 0x0ff0
        })
    ));
    assert_eq!(cursor.last_accepted_address(), None);
}

#[test]
fn discard_keeps_reference_when_advancing_on_accept() {
    let mut cursor = DumpCursor::new(0x1000, 0x1020, DiscardPolicy::AdvanceOnAccept);
    assert_eq!(cursor.admit(0x0fc0).unwrap(), Admission::Discard);
    assert_eq!(cursor.admit(0x0ff0).unwrap(), Admission::Discard);
    assert_eq!(cursor.admit(0x1000).unwrap(), Admission::Accept);
    assert_eq!(cursor.resume_address(), 0x1010);
}

#[test]
fn begin_command_rebases_on_last_accepted() {
    let mut cursor = DumpCursor::new(0x1000, 0x1020, DiscardPolicy::AdvanceOnDiscard);
    cursor.admit(0x0ff0).unwrap();
    assert_eq!(cursor.begin_command(), 0x1000);
    assert_eq!(cursor.admit(0x1000).unwrap(), Admission::Accept);
    assert_eq!(cursor.begin_command(), 0x1010);
    assert_eq!(cursor.admit(0x1010).unwrap(), Admission::Accept);
}
