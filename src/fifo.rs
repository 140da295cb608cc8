//! Fixed-capacity queue of HID reports.

use crate::error::{Error, Result};

/// Largest report a queue slot holds. Matches a full-speed interrupt
/// endpoint's max packet size.
pub const REPORT_MAX_LEN: usize = 64;

/// Default number of slots in a per-endpoint queue.
pub const DEFAULT_FIFO_DEPTH: usize = 20;

/// A single HID report as stored in a queue slot.
pub type Report = heapless::Vec<u8, REPORT_MAX_LEN>;

const EMPTY_SLOT: Report = Report::new();

/// Fixed-capacity FIFO of variable length reports.
///
/// `nr` counts stored reports, `wr` is the next slot to fill and `rd` the
/// next slot to drain. Both cursors wrap at `N`.
///
/// The queue is lossy under backpressure: [`push()`](ReportFifo::push) on a
/// full queue drops the new report, it never evicts an older one.
pub struct ReportFifo<const N: usize = DEFAULT_FIFO_DEPTH> {
    slots: [Report; N],
    nr: usize,
    wr: usize,
    rd: usize,
}

impl<const N: usize> ReportFifo<N> {
    /// Creates an empty queue.
    pub const fn new() -> Self {
        Self {
            slots: [EMPTY_SLOT; N],
            nr: 0,
            wr: 0,
            rd: 0,
        }
    }

    /// Copies `report` into the next free slot.
    ///
    /// Returns [`Error::QueueFull`] and leaves the queue untouched if every
    /// slot is taken. Reports that are empty or longer than
    /// [`REPORT_MAX_LEN`] are refused with [`Error::ReportLength`].
    pub fn push(&mut self, report: &[u8]) -> Result<()> {
        if report.is_empty() || report.len() > REPORT_MAX_LEN {
            return Err(Error::ReportLength(report.len()));
        }
        if self.nr >= N {
            return Err(Error::QueueFull);
        }

        let slot = &mut self.slots[self.wr];
        slot.clear();
        slot.extend_from_slice(report)
            .map_err(|_| Error::ReportLength(report.len()))?;

        self.nr += 1;
        self.wr += 1;
        if self.wr >= N {
            self.wr = 0;
        }
        Ok(())
    }

    /// Removes the oldest report, or returns `None` if the queue is empty.
    pub fn pop(&mut self) -> Option<Report> {
        if self.nr == 0 {
            return None;
        }

        let report = core::mem::take(&mut self.slots[self.rd]);

        self.nr -= 1;
        self.rd += 1;
        if self.rd >= N {
            self.rd = 0;
        }
        Some(report)
    }

    /// Number of queued reports.
    pub fn peek(&self) -> usize {
        self.nr
    }

    /// Drops every queued report and rewinds both cursors.
    pub fn flush(&mut self) {
        self.nr = 0;
        self.rd = 0;
        self.wr = 0;
    }

    /// Total number of slots.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of free slots.
    pub fn unused(&self) -> usize {
        N - self.nr
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.nr == 0
    }

    /// Returns `true` if the next push would be dropped.
    pub fn is_full(&self) -> bool {
        self.nr >= N
    }
}

impl<const N: usize> Default for ReportFifo<N> {
    fn default() -> Self {
        Self::new()
    }
}
