use usb_device::class_prelude::*;

use crate::dispatch::{PacketSink, TxQueue, TxState};
use crate::error::Result;
use crate::fifo::{Report, DEFAULT_FIFO_DEPTH, REPORT_MAX_LEN};
use crate::variant::{BoardVariant, HidEndpoint, HidInterface};

const USB_CLASS_HID: u8 = 0x03;

const DESC_DESCTYPE_HID: u8 = 0x21;
const DESC_DESCTYPE_REPORT: u8 = 0x22;

const HID_GET_REPORT: u8 = 0x01;
const HID_GET_IDLE: u8 = 0x02;
const HID_GET_PROTOCOL: u8 = 0x03;
const HID_SET_REPORT: u8 = 0x09;
const HID_SET_IDLE: u8 = 0x0a;
const HID_SET_PROTOCOL: u8 = 0x0b;

/// wMaxPacketSize of every HID endpoint.
pub const MAX_PACKET_SIZE: u16 = 64;

/// bInterval of every HID endpoint, in milliseconds.
pub const POLL_INTERVAL_MS: u8 = 1;

/// HID descriptor body (without bLength/bDescriptorType), HID 1.11,
/// one report descriptor.
pub(crate) fn hid_descriptor(report_descriptor_len: usize) -> [u8; 7] {
    [
        // bcdHID
        0x11,
        0x01,
        // bCountryCode
        0x00,
        // bNumDescriptors
        0x01,
        // bDescriptorType
        DESC_DESCTYPE_REPORT,
        // wDescriptorLength
        (report_descriptor_len & 0xff) as u8,
        ((report_descriptor_len >> 8) & 0xff) as u8,
    ]
}

/// Interface, HID and endpoint descriptors of one HID interface.
pub(crate) fn write_interface<B: UsbBus>(
    writer: &mut DescriptorWriter,
    if_num: InterfaceNumber,
    interface: &HidInterface,
    ep_in: &EndpointIn<'_, B>,
    ep_out: &EndpointOut<'_, B>,
) -> usb_device::Result<()> {
    writer.interface(if_num, USB_CLASS_HID, interface.subclass, interface.protocol)?;
    writer.write(
        DESC_DESCTYPE_HID,
        &hid_descriptor(interface.report_descriptor.len()),
    )?;
    writer.endpoint(ep_in)?;
    writer.endpoint(ep_out)?;
    Ok(())
}

/// Answers standard `GET_DESCRIPTOR` requests addressed to a HID interface.
///
/// Unknown descriptor types are left alone so the device can stall them.
pub(crate) fn get_descriptor<B: UsbBus>(xfer: ControlIn<B>, interface: &HidInterface) {
    let req = *xfer.request();

    if req.request != control::Request::GET_DESCRIPTOR {
        return;
    }

    match (req.value >> 8) as u8 {
        DESC_DESCTYPE_REPORT => {
            xfer.accept_with_static(interface.report_descriptor).ok();
        }
        DESC_DESCTYPE_HID => {
            let body = hid_descriptor(interface.report_descriptor.len());
            let mut desc = [0u8; 9];
            desc[0] = desc.len() as u8;
            desc[1] = DESC_DESCTYPE_HID;
            desc[2..].copy_from_slice(&body);
            xfer.accept_with(&desc).ok();
        }
        _ => {}
    }
}

/// Idle rate and protocol shared by every interface of a class, plus
/// handling of HID class requests.
pub(crate) struct HidControl {
    protocol: u8,
    idle: u8,
}

impl HidControl {
    pub(crate) const fn new() -> Self {
        Self {
            protocol: 0,
            idle: 0,
        }
    }

    pub(crate) fn protocol(&self) -> u8 {
        self.protocol
    }

    pub(crate) fn idle(&self) -> u8 {
        self.idle
    }

    pub(crate) fn control_in<B: UsbBus>(&mut self, xfer: ControlIn<B>, feature_report: &[u8]) {
        let req = *xfer.request();

        match req.request {
            HID_GET_REPORT => {
                xfer.accept_with(feature_report).ok();
            }
            HID_GET_IDLE => {
                xfer.accept_with(&[self.idle]).ok();
            }
            HID_GET_PROTOCOL => {
                xfer.accept_with(&[self.protocol]).ok();
            }
            _ => {
                xfer.reject().ok();
            }
        }
    }

    /// Returns the data of a `SET_REPORT` request.
    pub(crate) fn control_out<B: UsbBus>(&mut self, xfer: ControlOut<B>) -> Option<Report> {
        let req = *xfer.request();

        match req.request {
            HID_SET_IDLE => {
                self.idle = (req.value >> 8) as u8;
                xfer.accept().ok();
                None
            }
            HID_SET_PROTOCOL => {
                self.protocol = (req.value & 0xff) as u8;
                xfer.accept().ok();
                None
            }
            HID_SET_REPORT => {
                let report = Report::from_slice(xfer.data()).ok();
                xfer.accept().ok();
                report
            }
            _ => {
                xfer.reject().ok();
                None
            }
        }
    }
}

/// [`PacketSink`] writing straight into an IN endpoint.
pub(crate) struct EndpointSink<'e, 'a, B: UsbBus>(pub(crate) &'e EndpointIn<'a, B>);

impl<B: UsbBus> PacketSink for EndpointSink<'_, '_, B> {
    fn write_packet(&mut self, packet: &[u8]) -> Result<()> {
        self.0.write(packet)?;
        Ok(())
    }
}

/// Reads one packet from an OUT endpoint.
pub(crate) fn read_output<B: UsbBus>(ep_out: &EndpointOut<'_, B>) -> Option<Report> {
    let mut buf = [0u8; REPORT_MAX_LEN];

    match ep_out.read(&mut buf) {
        Ok(len) => Report::from_slice(&buf[..len]).ok(),
        Err(_e) => {
            #[cfg(feature = "defmt")]
            defmt::debug!("output report read failed: {}", _e);
            None
        }
    }
}

struct HidPort<'a, B: UsbBus, const N: usize> {
    interface: &'static HidInterface,
    if_num: InterfaceNumber,
    ep_in: EndpointIn<'a, B>,
    ep_out: EndpointOut<'a, B>,
    tx: TxQueue<N>,
    output: Option<Report>,
}

/// Composite HID class with up to three interfaces, one transmit queue
/// per interrupt IN endpoint.
///
/// Reports given to [`send_report()`](HidClass::send_report) are written
/// to the endpoint right away when it is idle. Otherwise they wait in a
/// queue of `N` slots and go out one per completed transfer. A report that
/// finds the queue full is dropped.
pub struct HidClass<'a, B: UsbBus, const N: usize = DEFAULT_FIFO_DEPTH> {
    variant: BoardVariant,
    ports: heapless::Vec<HidPort<'a, B, N>, 3>,
    control: HidControl,
}

impl<'a, B: UsbBus, const N: usize> HidClass<'a, B, N> {
    /// Creates the class, allocating one interface and an IN/OUT interrupt
    /// endpoint pair per HID interface of `variant`.
    pub fn new(alloc: &'a UsbBusAllocator<B>, variant: BoardVariant) -> Self {
        let ports = variant
            .interfaces()
            .iter()
            .map(|interface| HidPort {
                interface,
                if_num: alloc.interface(),
                ep_in: alloc.interrupt(MAX_PACKET_SIZE, POLL_INTERVAL_MS),
                ep_out: alloc.interrupt(MAX_PACKET_SIZE, POLL_INTERVAL_MS),
                tx: TxQueue::new(),
                output: None,
            })
            .collect();

        Self {
            variant,
            ports,
            control: HidControl::new(),
        }
    }

    /// Board variant the class was built for.
    pub fn variant(&self) -> BoardVariant {
        self.variant
    }

    /// Queues `report` on `ep`, after routing it according to the board
    /// variant.
    ///
    /// Returns `Ok(())` for reports that were sent, queued, or dropped
    /// because the queue was full. See [`TxQueue::send`].
    pub fn send_report(&mut self, ep: HidEndpoint, report: &[u8]) -> Result<()> {
        let ep = self.variant.route(ep, report);
        let port = &mut self.ports[ep.index()];

        port.tx.send(report, &mut EndpointSink(&port.ep_in))
    }

    /// Transmit state of the endpoint `ep` is routed to.
    pub fn tx_state(&self, ep: HidEndpoint) -> TxState {
        self.port(ep).tx.state()
    }

    /// Reports waiting on the endpoint `ep` is routed to.
    pub fn queued(&self, ep: HidEndpoint) -> usize {
        self.port(ep).tx.queued()
    }

    /// Reports dropped so far on the endpoint `ep` is routed to.
    pub fn dropped(&self, ep: HidEndpoint) -> u32 {
        self.port(ep).tx.dropped()
    }

    /// Returns `true` while no queue is more than half full.
    ///
    /// Producers that would rather wait than lose reports can spin on this
    /// before sending a burst.
    pub fn has_headroom(&self) -> bool {
        self.ports
            .iter()
            .all(|p| p.tx.fifo().peek() <= p.tx.fifo().unused())
    }

    /// Drops every queued report and marks all endpoints idle.
    pub fn flush_all(&mut self) {
        for port in self.ports.iter_mut() {
            port.tx.reset();
        }
    }

    /// Takes the latest output report received on the interface of `ep`,
    /// either on its OUT endpoint or through `SET_REPORT`.
    pub fn take_output_report(&mut self, ep: HidEndpoint) -> Option<Report> {
        let idx = self.variant.route(ep, &[]).index();
        self.ports[idx].output.take()
    }

    /// Protocol selected by the host with `SET_PROTOCOL`.
    pub fn protocol(&self) -> u8 {
        self.control.protocol()
    }

    /// Idle rate selected by the host with `SET_IDLE`.
    pub fn idle_rate(&self) -> u8 {
        self.control.idle()
    }

    fn port(&self, ep: HidEndpoint) -> &HidPort<'a, B, N> {
        &self.ports[self.variant.route(ep, &[]).index()]
    }

    fn port_for_interface(&mut self, index: u16) -> Option<&mut HidPort<'a, B, N>> {
        self.ports
            .iter_mut()
            .find(|p| u8::from(p.if_num) as u16 == index)
    }
}

impl<B: UsbBus, const N: usize> UsbClass<B> for HidClass<'_, B, N> {
    fn get_configuration_descriptors(
        &self,
        writer: &mut DescriptorWriter,
    ) -> usb_device::Result<()> {
        for port in self.ports.iter() {
            write_interface(writer, port.if_num, port.interface, &port.ep_in, &port.ep_out)?;
        }
        Ok(())
    }

    fn control_in(&mut self, xfer: ControlIn<B>) {
        let req = *xfer.request();

        if req.recipient != control::Recipient::Interface {
            return;
        }

        let feature_report = self.variant.feature_report();
        let interface = match self.port_for_interface(req.index) {
            Some(port) => port.interface,
            None => return,
        };

        match req.request_type {
            control::RequestType::Standard => get_descriptor(xfer, interface),
            control::RequestType::Class => self.control.control_in(xfer, feature_report),
            _ => {}
        }
    }

    fn control_out(&mut self, xfer: ControlOut<B>) {
        let req = *xfer.request();

        if req.request_type != control::RequestType::Class {
            return;
        }

        if req.recipient != control::Recipient::Interface {
            return;
        }

        let idx = match self.ports.iter().position(|p| u8::from(p.if_num) as u16 == req.index) {
            Some(idx) => idx,
            None => return,
        };

        if let Some(report) = self.control.control_out(xfer) {
            self.ports[idx].output = Some(report);
        }
    }

    fn reset(&mut self) {
        for port in self.ports.iter_mut() {
            port.tx.reset();
            port.output = None;
        }
    }

    fn endpoint_in_complete(&mut self, addr: EndpointAddress) {
        if let Some(port) = self.ports.iter_mut().find(|p| p.ep_in.address() == addr) {
            if let Err(_e) = port.tx.transfer_complete(&mut EndpointSink(&port.ep_in)) {
                #[cfg(feature = "defmt")]
                defmt::warn!("queued report lost on {}: {}", addr, _e);
            }
        }
    }

    fn endpoint_out(&mut self, addr: EndpointAddress) {
        if let Some(port) = self.ports.iter_mut().find(|p| p.ep_out.address() == addr) {
            if let Some(report) = read_output(&port.ep_out) {
                port.output = Some(report);
            }
        }
    }
}
