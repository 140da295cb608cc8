//! Error types

use core::fmt;
use usb_device::UsbError;

/// Result type used by report queues, the fragmenter and the HID classes.
pub type Result<T> = core::result::Result<T, Error>;

/// Reasons a report was not accepted or not transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Report queue has no free slot. The report was dropped.
    QueueFull,
    /// Leading byte of a report does not select a known chunk size.
    UnknownReportTag(u8),
    /// A fragmented transfer is still running on the endpoint.
    EndpointBusy,
    /// Report is empty or does not fit the buffer it was given to.
    ReportLength(usize),
    /// Endpoint refused the packet.
    Usb(UsbError),
}

impl From<UsbError> for Error {
    fn from(e: UsbError) -> Self {
        Error::Usb(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "Report queue full"),
            Self::UnknownReportTag(tag) => write!(f, "Unknown report tag {:#04x}", tag),
            Self::EndpointBusy => write!(f, "Endpoint busy"),
            Self::ReportLength(len) => write!(f, "Invalid report length {}", len),
            Self::Usb(e) => write!(f, "USB error: {:?}", e),
        }
    }
}
