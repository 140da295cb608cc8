//! Board variants: interface layout, report descriptors and report routing.

/// Report ID 1: buttons, absolute X/Y, one reserved byte and a wheel.
/// 8 bytes including the ID.
pub const MOUSE_REPORT_DESCRIPTOR: [u8; 68] = [
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x02, // Usage (Mouse)
    0xa1, 0x01, // Collection (Application)
    0x85, 0x01, //   Report ID (1)
    0x09, 0x01, //   Usage (Pointer)
    0xa1, 0x00, //   Collection (Physical)
    0x05, 0x09, //     Usage Page (Button)
    0x19, 0x01, //     Usage Minimum (1)
    0x29, 0x03, //     Usage Maximum (3)
    0x15, 0x00, //     Logical Minimum (0)
    0x25, 0x01, //     Logical Maximum (1)
    0x95, 0x03, //     Report Count (3)
    0x75, 0x01, //     Report Size (1)
    0x81, 0x02, //     Input (Data, Variable, Absolute)
    0x95, 0x01, //     Report Count (1)
    0x75, 0x05, //     Report Size (5)
    0x81, 0x03, //     Input (Constant)
    0x05, 0x01, //     Usage Page (Generic Desktop)
    0x09, 0x30, //     Usage (X)
    0x09, 0x31, //     Usage (Y)
    0x16, 0x00, 0x00, // Logical Minimum (0)
    0x26, 0xff, 0x7f, // Logical Maximum (32767)
    0x75, 0x10, //     Report Size (16)
    0x95, 0x02, //     Report Count (2)
    0x81, 0x02, //     Input (Data, Variable, Absolute)
    0x75, 0x08, //     Report Size (8)
    0x95, 0x01, //     Report Count (1)
    0x81, 0x03, //     Input (Constant)
    0x09, 0x38, //     Usage (Wheel)
    0x15, 0x81, //     Logical Minimum (-127)
    0x25, 0x7f, //     Logical Maximum (127)
    0x81, 0x06, //     Input (Data, Variable, Relative)
    0xc0, //   End Collection
    0xc0, // End Collection
];

/// Report ID 2: 61 vendor bytes in each direction. 62 bytes including the ID.
pub const TOUCH_REPORT_DESCRIPTOR: [u8; 27] = [
    0x06, 0x00, 0xff, // Usage Page (Vendor Defined 0xFF00)
    0x09, 0x01, // Usage (1)
    0xa1, 0x01, // Collection (Application)
    0x85, 0x02, //   Report ID (2)
    0x15, 0x00, //   Logical Minimum (0)
    0x26, 0xff, 0x00, // Logical Maximum (255)
    0x75, 0x08, //   Report Size (8)
    0x95, 0x3d, //   Report Count (61)
    0x09, 0x02, //   Usage (2)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    0x09, 0x03, //   Usage (3)
    0x91, 0x02, //   Output (Data, Variable, Absolute)
    0xc0, // End Collection
];

/// Boot protocol keyboard without a report ID.
pub const KEYBOARD_REPORT_DESCRIPTOR: [u8; 63] = [
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x06, // Usage (Keyboard)
    0xa1, 0x01, // Collection (Application)
    0x05, 0x07, //   Usage Page (Key Codes)
    0x19, 0xe0, //   Usage Minimum (224)
    0x29, 0xe7, //   Usage Maximum (231)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x75, 0x01, //   Report Size (1)
    0x95, 0x08, //   Report Count (8)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    0x95, 0x01, //   Report Count (1)
    0x75, 0x08, //   Report Size (8)
    0x81, 0x01, //   Input (Constant)
    0x95, 0x05, //   Report Count (5)
    0x75, 0x01, //   Report Size (1)
    0x05, 0x08, //   Usage Page (LEDs)
    0x19, 0x01, //   Usage Minimum (1)
    0x29, 0x05, //   Usage Maximum (5)
    0x91, 0x02, //   Output (Data, Variable, Absolute)
    0x95, 0x01, //   Report Count (1)
    0x75, 0x03, //   Report Size (3)
    0x91, 0x01, //   Output (Constant)
    0x95, 0x06, //   Report Count (6)
    0x75, 0x08, //   Report Size (8)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x65, //   Logical Maximum (101)
    0x05, 0x07, //   Usage Page (Key Codes)
    0x19, 0x00, //   Usage Minimum (0)
    0x29, 0x65, //   Usage Maximum (101)
    0x81, 0x00, //   Input (Data, Array)
    0xc0, // End Collection
];

const fn concat<const A: usize, const B: usize, const C: usize>(a: &[u8; A], b: &[u8; B]) -> [u8; C] {
    assert!(A + B == C);

    let mut out = [0u8; C];
    let mut i = 0;
    while i < A {
        out[i] = a[i];
        i += 1;
    }
    while i < C {
        out[i] = b[i - A];
        i += 1;
    }
    out
}

/// Mouse and touch collections behind one interface.
pub const MOUSE_TOUCH_REPORT_DESCRIPTOR: [u8; 95] =
    concat(&MOUSE_REPORT_DESCRIPTOR, &TOUCH_REPORT_DESCRIPTOR);

// bInterfaceSubClass
const SUBCLASS_NONE: u8 = 0x00;
const SUBCLASS_BOOT: u8 = 0x01;

// bInterfaceProtocol
const PROTOCOL_NONE: u8 = 0x00;
const PROTOCOL_KEYBOARD: u8 = 0x01;

/// One HID interface: what the host sees in its interface and HID
/// descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HidInterface {
    /// bInterfaceSubClass, `1` for boot interfaces.
    pub subclass: u8,
    /// bInterfaceProtocol: `0` none, `1` keyboard, `2` mouse.
    pub protocol: u8,
    /// Report descriptor served on `GET_DESCRIPTOR(Report)`.
    pub report_descriptor: &'static [u8],
}

// Report IDs and 16 bit absolute axes do not follow the boot mouse layout.
pub(crate) const MOUSE_TOUCH_INTERFACE: HidInterface = HidInterface {
    subclass: SUBCLASS_NONE,
    protocol: PROTOCOL_NONE,
    report_descriptor: &MOUSE_TOUCH_REPORT_DESCRIPTOR,
};

const KEYBOARD_INTERFACE: HidInterface = HidInterface {
    subclass: SUBCLASS_BOOT,
    protocol: PROTOCOL_KEYBOARD,
    report_descriptor: &KEYBOARD_REPORT_DESCRIPTOR,
};

const VENDOR_INTERFACE: HidInterface = HidInterface {
    subclass: SUBCLASS_NONE,
    protocol: PROTOCOL_NONE,
    report_descriptor: &TOUCH_REPORT_DESCRIPTOR,
};

static ONE_INTERFACE: [HidInterface; 1] = [MOUSE_TOUCH_INTERFACE];
static TWO_INTERFACES: [HidInterface; 2] = [MOUSE_TOUCH_INTERFACE, KEYBOARD_INTERFACE];
static THREE_INTERFACES: [HidInterface; 3] =
    [MOUSE_TOUCH_INTERFACE, KEYBOARD_INTERFACE, VENDOR_INTERFACE];

/// Identifies one of the three report channels of
/// [`HidClass`](crate::HidClass). Channel `n` is the IN endpoint of the
/// `n`-th HID interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HidEndpoint {
    /// First interface.
    Ep1,
    /// Second interface.
    Ep2,
    /// Third interface.
    Ep3,
}

impl HidEndpoint {
    /// Zero based interface position.
    pub fn index(self) -> usize {
        match self {
            HidEndpoint::Ep1 => 0,
            HidEndpoint::Ep2 => 1,
            HidEndpoint::Ep3 => 2,
        }
    }
}

/// Board build variant.
///
/// Selects how many HID interfaces the device exposes, which report
/// descriptors they carry and how reports are routed between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BoardVariant {
    /// One mouse/touch interface. Every report goes to EP1.
    Single,
    /// Mouse/touch and keyboard interfaces. EP3 reports go to EP1.
    Dual,
    /// Mouse/touch, keyboard and vendor interfaces.
    Triple,
    /// Like [`Triple`](BoardVariant::Triple), and EP1 reports whose first
    /// byte equals `tag` are moved to EP2.
    Redirect {
        /// Report tag to move.
        tag: u8,
    },
}

impl BoardVariant {
    /// HID interfaces of this variant, in interface number order.
    pub fn interfaces(self) -> &'static [HidInterface] {
        match self {
            BoardVariant::Single => &ONE_INTERFACE,
            BoardVariant::Dual => &TWO_INTERFACES,
            BoardVariant::Triple | BoardVariant::Redirect { .. } => &THREE_INTERFACES,
        }
    }

    /// Value returned for `GET_REPORT` requests.
    pub fn feature_report(self) -> &'static [u8] {
        match self {
            BoardVariant::Redirect { .. } => &[0x07, 10],
            _ => &[0x03, 10],
        }
    }

    /// Endpoint a report asked for `requested` is actually sent on.
    ///
    /// Channels the variant does not have fall back to EP1.
    pub fn route(self, requested: HidEndpoint, report: &[u8]) -> HidEndpoint {
        let ep = match self {
            BoardVariant::Redirect { tag }
                if requested == HidEndpoint::Ep1 && report.first() == Some(&tag) =>
            {
                HidEndpoint::Ep2
            }
            _ => requested,
        };

        if ep.index() < self.interfaces().len() {
            ep
        } else {
            HidEndpoint::Ep1
        }
    }
}
