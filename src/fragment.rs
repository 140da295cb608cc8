//! Chunked transmission of one report over a single endpoint.

use core::cmp::min;

use crate::dispatch::PacketSink;
use crate::error::{Error, Result};

/// Chunk size used for each report tag unless configured otherwise.
///
/// Tag `1` is the 8 byte mouse report, tag `2` the 62 byte touch report.
pub const DEFAULT_CHUNK_SIZES: &[(u8, u16)] = &[(1, 8), (2, 62)];

/// Default size of the fragmenter's source buffer.
pub const DEFAULT_STREAM_BUFFER: usize = 256;

/// State of a fragmented transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamState {
    /// No transfer is running.
    Idle,
    /// A fragment is in flight.
    Busy,
    /// The last fragment filled a whole packet, a Zero-Length Packet follows.
    Zlp,
}

/// Streams one tagged report as a series of packets on a single endpoint.
///
/// The leading byte of the report picks the chunk size. Every transfer
/// carries `min(chunk, remaining)` bytes, written as packets of at most the
/// endpoint's max packet size. A report whose last transfer is exactly one
/// full packet is terminated with a Zero-Length Packet so the host does not
/// wait for more data.
pub struct Fragmenter<const CAP: usize = DEFAULT_STREAM_BUFFER> {
    buffer: [u8; CAP],
    chunk_sizes: &'static [(u8, u16)],
    packet_size: usize,
    state: StreamState,
    read_offset: usize,
    // bytes of the report not yet assigned to a transfer
    remaining: usize,
    // bytes of the current transfer not yet written
    packet_left: usize,
    chunk: usize,
}

impl<const CAP: usize> Fragmenter<CAP> {
    /// Creates a fragmenter for an endpoint with the given max packet size,
    /// using [`DEFAULT_CHUNK_SIZES`].
    ///
    /// A `packet_size` of `0` leaves transfers unsplit.
    pub const fn new(packet_size: u16) -> Self {
        Self::with_chunk_sizes(packet_size, DEFAULT_CHUNK_SIZES)
    }

    /// Creates a fragmenter with a custom `(tag, chunk size)` table.
    pub const fn with_chunk_sizes(packet_size: u16, chunk_sizes: &'static [(u8, u16)]) -> Self {
        Self {
            buffer: [0; CAP],
            chunk_sizes,
            packet_size: packet_size as usize,
            state: StreamState::Idle,
            read_offset: 0,
            remaining: 0,
            packet_left: 0,
            chunk: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Returns `true` if a new report can be triggered.
    pub fn is_idle(&self) -> bool {
        self.state == StreamState::Idle
    }

    /// Bytes of the current report not yet handed to the endpoint.
    pub fn remaining(&self) -> usize {
        self.remaining + self.packet_left
    }

    /// Chunk size for a report tag, if the tag is known.
    pub fn chunk_size(&self, tag: u8) -> Option<usize> {
        self.chunk_sizes
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, size)| *size as usize)
    }

    /// Starts streaming `report` and issues its first fragment.
    ///
    /// Refused with [`Error::EndpointBusy`] while a previous report is still
    /// streaming, and with [`Error::UnknownReportTag`] if the leading byte
    /// does not select a chunk size. Nothing is sent in either case.
    pub fn trigger<S: PacketSink>(&mut self, report: &[u8], sink: &mut S) -> Result<()> {
        if self.state != StreamState::Idle {
            return Err(Error::EndpointBusy);
        }
        if report.is_empty() || report.len() > CAP {
            return Err(Error::ReportLength(report.len()));
        }

        let tag = report[0];
        let chunk = match self.chunk_size(tag) {
            Some(c) if c > 0 => c,
            _ => return Err(Error::UnknownReportTag(tag)),
        };

        self.buffer[..report.len()].copy_from_slice(report);
        self.read_offset = 0;
        self.remaining = report.len();
        self.chunk = chunk;

        self.send_fragment(sink)
    }

    /// Handles the endpoint's transfer-complete event.
    pub fn transfer_complete<S: PacketSink>(&mut self, sink: &mut S) -> Result<()> {
        match self.state {
            StreamState::Busy | StreamState::Zlp if self.packet_left > 0 => self.send_packet(sink),
            StreamState::Busy if self.remaining == 0 => {
                self.finish();
                Ok(())
            }
            StreamState::Busy => self.send_fragment(sink),
            StreamState::Zlp => {
                self.finish();
                sink.write_packet(&[])
            }
            StreamState::Idle => Ok(()),
        }
    }

    /// Forgets the running transfer. Only for USB reset, when the endpoint
    /// has lost whatever was in flight.
    pub(crate) fn reset(&mut self) {
        self.finish();
        self.read_offset = 0;
    }

    fn send_fragment<S: PacketSink>(&mut self, sink: &mut S) -> Result<()> {
        let len = min(self.chunk, self.remaining);

        self.remaining -= len;
        self.packet_left = len;

        self.state = if self.remaining == 0 && len == self.chunk && len == self.packet_size {
            StreamState::Zlp
        } else {
            StreamState::Busy
        };

        #[cfg(feature = "defmt")]
        defmt::debug!("fragment at {} len {}, {} left", self.read_offset, len, self.remaining);

        self.send_packet(sink)
    }

    fn send_packet<S: PacketSink>(&mut self, sink: &mut S) -> Result<()> {
        // read_offset + packet_left never exceeds the report length
        let start = self.read_offset;
        let len = match self.packet_size {
            0 => self.packet_left,
            size => min(self.packet_left, size),
        };

        self.read_offset += len;
        self.packet_left -= len;

        if let Err(e) = sink.write_packet(&self.buffer[start..start + len]) {
            self.finish();
            return Err(e);
        }
        Ok(())
    }

    fn finish(&mut self) {
        self.state = StreamState::Idle;
        self.remaining = 0;
        self.packet_left = 0;
        self.chunk = 0;
    }
}
