#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
//!
//! Queued and fragmented HID report transmission for a `usb-device` device.
//!
//! ## About
//!
//! Firmware that produces HID reports (mouse, keyboard, touch) from a
//! sensor loop usually generates them faster, or more irregularly, than
//! the host polls its interrupt endpoints. This crate sits between the
//! producers and the endpoints and takes care of two transmit strategies:
//!
//! * [`HidClass`] - up to three HID interfaces, each with a queue of
//!   reports in front of its IN endpoint. A report goes out at once when
//!   the endpoint is idle, waits in the queue otherwise, and leaves on the
//!   next completed transfer. A full queue drops the newest report.
//!
//! * [`StreamHidClass`] - one HID interface that streams a single report
//!   at a time as a series of chunks, sized by the report's leading byte,
//!   and ends a transfer with a Zero-Length Packet when the host needs one.
//!
//! Interface layout, report descriptors and routing between channels are
//! picked with [`BoardVariant`].
//!
//! Both classes also answer the HID class requests a host sends during
//! enumeration (`GET_DESCRIPTOR`, `GET_REPORT`, `SET_IDLE`, ...) and keep
//! the latest output report received from the host.
//!
//! ### Concurrency
//!
//! Every operation takes `&mut self`. Producers running in thread mode and
//! the USB interrupt calling `usb_dev.poll()` must therefore share the
//! class through a lock: an RTIC shared resource, or a
//! `critical_section::Mutex<RefCell<_>>`. Sending a report and handling a
//! transfer-complete event never interleave.
//!
//! ### Limitations
//!
//! * A queued report is at most 64 bytes, one full-speed packet.
//!
//! * Reports dropped on a full queue are only counted, the producer is not
//!   told. Use [`HidClass::has_headroom`] to back off before a burst.
//!
//! ## Example
//!
//! The example below focuses on [`HidClass`], parts related to a target
//! controller initialization (USB peripheral, interrupts, clocks) are not in
//! the scope of the example.
//!
//! ```no_run
//! use usb_device::bus::{UsbBus, UsbBusAllocator};
//! use usb_device::prelude::*;
//! use usbd_hid_fifo::*;
//!
//! fn run<B: UsbBus>(usb_bus_alloc: &UsbBusAllocator<B>) {
//!     // One mouse/touch and one keyboard interface.
//!     let mut hid: HidClass<B> = HidClass::new(usb_bus_alloc, BoardVariant::Dual);
//!
//!     let mut usb_dev = UsbDeviceBuilder::new(usb_bus_alloc, UsbVidPid(0x16c0, 0x27dd)).build();
//!
//!     loop {
//!         // Usually called from the USB interrupt handler.
//!         usb_dev.poll(&mut [&mut hid]);
//!
//!         // Mouse report: ID 1, buttons, X, Y, reserved, wheel.
//!         let report = [0x01, 0x00, 0x00, 0x40, 0x00, 0x40, 0x00, 0x00];
//!         if hid.has_headroom() {
//!             hid.send_report(HidEndpoint::Ep1, &report).ok();
//!         }
//!
//!         if let Some(leds) = hid.take_output_report(HidEndpoint::Ep2) {
//!             // update keyboard LEDs
//!             let _ = leds;
//!         }
//!     }
//! }
//! ```
//!

/// HID classes built on report queues
pub mod class;
pub mod dispatch;
pub mod error;
pub mod fifo;
pub mod fragment;
/// Single interface HID class built on the fragmenter
pub mod stream;
pub mod variant;

#[doc(inline)]
pub use crate::class::HidClass;
#[doc(inline)]
pub use crate::dispatch::{PacketSink, TxQueue, TxState};
#[doc(inline)]
pub use crate::error::Error;
#[doc(inline)]
pub use crate::fifo::{Report, ReportFifo};
#[doc(inline)]
pub use crate::fragment::{Fragmenter, StreamState};
#[doc(inline)]
pub use crate::stream::StreamHidClass;
#[doc(inline)]
pub use crate::variant::{BoardVariant, HidEndpoint, HidInterface};
