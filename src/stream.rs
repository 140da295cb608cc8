use usb_device::class_prelude::*;

use crate::class::{
    get_descriptor, read_output, write_interface, EndpointSink, HidControl, MAX_PACKET_SIZE,
    POLL_INTERVAL_MS,
};
use crate::error::{Error, Result};
use crate::fifo::Report;
use crate::fragment::{Fragmenter, StreamState, DEFAULT_CHUNK_SIZES, DEFAULT_STREAM_BUFFER};
use crate::variant::{BoardVariant, HidInterface, MOUSE_TOUCH_INTERFACE};

static STREAM_INTERFACE: HidInterface = MOUSE_TOUCH_INTERFACE;

/// Single interface HID class that streams one report at a time, split
/// into chunks selected by the report's leading byte.
///
/// There is no queue: [`trigger()`](StreamHidClass::trigger) is refused
/// while the previous report is still going out. Poll
/// [`is_idle()`](StreamHidClass::is_idle) before triggering.
pub struct StreamHidClass<'a, B: UsbBus, const CAP: usize = DEFAULT_STREAM_BUFFER> {
    if_num: InterfaceNumber,
    ep_in: EndpointIn<'a, B>,
    ep_out: EndpointOut<'a, B>,
    fragmenter: Fragmenter<CAP>,
    // trailing ZLP written, completion not seen yet
    zlp_in_flight: bool,
    control: HidControl,
    output: Option<Report>,
}

impl<'a, B: UsbBus, const CAP: usize> StreamHidClass<'a, B, CAP> {
    /// Creates the class with 64 byte endpoints and the default chunk
    /// table.
    pub fn new(alloc: &'a UsbBusAllocator<B>) -> Self {
        Self::with_chunk_sizes(alloc, MAX_PACKET_SIZE, DEFAULT_CHUNK_SIZES)
    }

    /// Creates the class with a custom endpoint size and `(tag, chunk size)`
    /// table.
    pub fn with_chunk_sizes(
        alloc: &'a UsbBusAllocator<B>,
        max_packet_size: u16,
        chunk_sizes: &'static [(u8, u16)],
    ) -> Self {
        let if_num = alloc.interface();
        let ep_in = alloc.interrupt(max_packet_size, POLL_INTERVAL_MS);
        let ep_out = alloc.interrupt(max_packet_size, POLL_INTERVAL_MS);
        let fragmenter = Fragmenter::with_chunk_sizes(ep_in.max_packet_size(), chunk_sizes);

        Self {
            if_num,
            ep_in,
            ep_out,
            fragmenter,
            zlp_in_flight: false,
            control: HidControl::new(),
            output: None,
        }
    }

    /// Starts streaming `report` and writes its first fragment.
    ///
    /// See [`Fragmenter::trigger`] for the refusal cases. Also refused with
    /// [`Error::EndpointBusy`] until the host has taken the trailing ZLP of
    /// the previous report.
    pub fn trigger(&mut self, report: &[u8]) -> Result<()> {
        if self.zlp_in_flight {
            return Err(Error::EndpointBusy);
        }

        self.fragmenter
            .trigger(report, &mut EndpointSink(&self.ep_in))
    }

    /// State of the running transfer.
    ///
    /// Stays [`StreamState::Zlp`] until the trailing ZLP has been taken.
    pub fn state(&self) -> StreamState {
        if self.zlp_in_flight {
            StreamState::Zlp
        } else {
            self.fragmenter.state()
        }
    }

    /// Returns `true` if a new report can be triggered.
    pub fn is_idle(&self) -> bool {
        self.fragmenter.is_idle() && !self.zlp_in_flight
    }

    /// Takes the latest output report received from the host.
    pub fn take_output_report(&mut self) -> Option<Report> {
        self.output.take()
    }

    /// Protocol selected by the host with `SET_PROTOCOL`.
    pub fn protocol(&self) -> u8 {
        self.control.protocol()
    }

    /// Idle rate selected by the host with `SET_IDLE`.
    pub fn idle_rate(&self) -> u8 {
        self.control.idle()
    }
}

impl<B: UsbBus, const CAP: usize> UsbClass<B> for StreamHidClass<'_, B, CAP> {
    fn get_configuration_descriptors(
        &self,
        writer: &mut DescriptorWriter,
    ) -> usb_device::Result<()> {
        write_interface(writer, self.if_num, &STREAM_INTERFACE, &self.ep_in, &self.ep_out)
    }

    fn control_in(&mut self, xfer: ControlIn<B>) {
        let req = *xfer.request();

        if !(req.recipient == control::Recipient::Interface
            && req.index == u8::from(self.if_num) as u16)
        {
            return;
        }

        match req.request_type {
            control::RequestType::Standard => get_descriptor(xfer, &STREAM_INTERFACE),
            control::RequestType::Class => self
                .control
                .control_in(xfer, BoardVariant::Single.feature_report()),
            _ => {}
        }
    }

    fn control_out(&mut self, xfer: ControlOut<B>) {
        let req = *xfer.request();

        if !(req.request_type == control::RequestType::Class
            && req.recipient == control::Recipient::Interface
            && req.index == u8::from(self.if_num) as u16)
        {
            return;
        }

        if let Some(report) = self.control.control_out(xfer) {
            self.output = Some(report);
        }
    }

    fn reset(&mut self) {
        self.fragmenter.reset();
        self.zlp_in_flight = false;
        self.output = None;
    }

    fn endpoint_in_complete(&mut self, addr: EndpointAddress) {
        if addr != self.ep_in.address() {
            return;
        }

        if self.zlp_in_flight {
            self.zlp_in_flight = false;
            return;
        }

        let sending_zlp = self.fragmenter.state() == StreamState::Zlp;
        match self
            .fragmenter
            .transfer_complete(&mut EndpointSink(&self.ep_in))
        {
            Ok(()) => self.zlp_in_flight = sending_zlp && self.fragmenter.is_idle(),
            Err(_e) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("stream aborted: {}", _e);
            }
        }
    }

    fn endpoint_out(&mut self, addr: EndpointAddress) {
        if addr != self.ep_out.address() {
            return;
        }

        if let Some(report) = read_output(&self.ep_out) {
            self.output = Some(report);
        }
    }
}
