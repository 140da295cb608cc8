//! Per-endpoint transmit dispatch: send now, or queue until the endpoint is free.

use crate::error::{Error, Result};
use crate::fifo::{ReportFifo, DEFAULT_FIFO_DEPTH, REPORT_MAX_LEN};

/// Where a queue or fragmenter hands its packets to.
///
/// One sink stands for one IN endpoint. An empty `packet` requests a
/// Zero-Length Packet.
pub trait PacketSink {
    /// Start a transfer of `packet` on the endpoint.
    fn write_packet(&mut self, packet: &[u8]) -> Result<()>;

    /// Discard whatever the endpoint's hardware FIFO may still hold from a
    /// previous transfer. Called before the next queued report is issued.
    fn flush(&mut self) {}
}

/// Transmit state of one IN endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxState {
    /// Nothing in flight, a report can be written right away.
    Idle,
    /// A transfer is in flight, new reports are queued.
    Busy,
}

/// Per-endpoint transmit dispatcher.
///
/// Writes a report straight to the endpoint when it is idle, queues it
/// otherwise, and drains the queue one report per completed transfer.
/// Reports leave in the order they were accepted, each exactly once.
pub struct TxQueue<const N: usize = DEFAULT_FIFO_DEPTH> {
    state: TxState,
    fifo: ReportFifo<N>,
    dropped: u32,
}

impl<const N: usize> TxQueue<N> {
    /// Creates an idle dispatcher with an empty queue.
    pub const fn new() -> Self {
        Self {
            state: TxState::Idle,
            fifo: ReportFifo::new(),
            dropped: 0,
        }
    }

    /// Current transmit state.
    pub fn state(&self) -> TxState {
        self.state
    }

    /// Number of reports waiting behind the in-flight transfer.
    pub fn queued(&self) -> usize {
        self.fifo.peek()
    }

    /// Read-only view of the queue.
    pub fn fifo(&self) -> &ReportFifo<N> {
        &self.fifo
    }

    /// Number of reports dropped because the queue was full.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Sends `report` now if the endpoint is idle, queues it otherwise.
    ///
    /// A report that finds the queue full is dropped and `Ok(())` is still
    /// returned; see [`dropped()`](TxQueue::dropped). An error is returned
    /// only for a report of invalid length, or when the sink refused the
    /// packet, in which case the report is lost and the endpoint stays idle.
    pub fn send<S: PacketSink>(&mut self, report: &[u8], sink: &mut S) -> Result<()> {
        if report.is_empty() || report.len() > REPORT_MAX_LEN {
            return Err(Error::ReportLength(report.len()));
        }

        match self.state {
            TxState::Idle if self.fifo.is_empty() => {
                sink.write_packet(report)?;
                self.state = TxState::Busy;
                Ok(())
            }
            TxState::Idle => {
                // a previous write failed and left reports behind, keep them first
                self.enqueue(report);
                self.start_next(sink)
            }
            TxState::Busy => {
                self.enqueue(report);
                Ok(())
            }
        }
    }

    /// Handles the endpoint's transfer-complete event.
    ///
    /// Issues the oldest queued report, or marks the endpoint idle if the
    /// queue is empty.
    pub fn transfer_complete<S: PacketSink>(&mut self, sink: &mut S) -> Result<()> {
        sink.flush();
        self.start_next(sink)
    }

    /// Drops every queued report and marks the endpoint idle.
    ///
    /// Used on USB reset, when any transfer in flight is gone.
    pub fn reset(&mut self) {
        self.fifo.flush();
        self.state = TxState::Idle;
    }

    fn enqueue(&mut self, report: &[u8]) {
        if let Err(_e) = self.fifo.push(report) {
            self.dropped = self.dropped.wrapping_add(1);
            #[cfg(feature = "defmt")]
            defmt::warn!("report dropped: {}", _e);
        }
    }

    fn start_next<S: PacketSink>(&mut self, sink: &mut S) -> Result<()> {
        if self.fifo.peek() == 0 {
            self.state = TxState::Idle;
            return Ok(());
        }

        match self.fifo.pop() {
            Some(report) => match sink.write_packet(&report) {
                Ok(()) => {
                    self.state = TxState::Busy;
                    Ok(())
                }
                Err(e) => {
                    self.state = TxState::Idle;
                    Err(e)
                }
            },
            None => {
                self.state = TxState::Idle;
                Ok(())
            }
        }
    }
}

impl<const N: usize> Default for TxQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}
