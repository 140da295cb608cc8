#![allow(dead_code)]

use std::{cell::RefCell, cmp::min, rc::Rc};

use usb_device::bus::PollResult;
use usb_device::bus::{UsbBus, UsbBusAllocator};
use usb_device::class::UsbClass;
use usb_device::device::UsbDevice;
use usb_device::endpoint::{EndpointAddress, EndpointType};
use usb_device::prelude::*;
use usb_device::{Result, UsbDirection};

pub const NUM_ENDPOINTS: usize = 4;

// usb-device default for the control endpoint
pub const EP0_SIZE: usize = 8;

#[derive(Debug, PartialEq, Eq)]
pub enum EPErr {
    Stalled,
}

struct EP {
    alloc: bool,
    stall: bool,
    read_len: usize,
    read: [u8; 1024],
    read_ready: bool,
    write_len: usize,
    write: [u8; 1024],
    // a packet is waiting for the host, only used by non-control IN endpoints
    write_pending: bool,
    write_done: bool,
    setup: bool,
    max_size: usize,
}

impl EP {
    fn new() -> Self {
        EP {
            alloc: false,
            stall: false,
            read_len: 0,
            read: [0; 1024],
            read_ready: false,
            write_len: 0,
            write: [0; 1024],
            write_pending: false,
            write_done: false,
            setup: false,
            max_size: 0,
        }
    }

    fn set_read(&mut self, data: &[u8], setup: bool) {
        self.read_len = data.len();
        self.read[..data.len()].copy_from_slice(data);
        self.setup = setup;
        self.read_ready = true;
    }

    fn get_write(&mut self, data: &mut [u8]) -> usize {
        let res = self.write_len;
        self.write_len = 0;
        data[..res].clone_from_slice(&self.write[..res]);
        self.write_done = true;
        res
    }

    fn take_packet(&mut self) -> Option<Vec<u8>> {
        if !self.write_pending {
            return None;
        }
        let packet = self.write[..self.write_len].to_vec();
        self.write_len = 0;
        self.write_pending = false;
        self.write_done = true;
        Some(packet)
    }

    fn clear(&mut self) {
        self.write_len = 0;
        self.write_pending = false;
        self.write_done = false;
        self.read_len = 0;
        self.read_ready = false;
    }
}

/// Host side of the emulated bus.
pub struct TestBusIO {
    ep_i: [RefCell<EP>; NUM_ENDPOINTS],
    ep_o: [RefCell<EP>; NUM_ENDPOINTS],
    reset_pending: RefCell<bool>,
}

unsafe impl Sync for TestBusIO {}

impl TestBusIO {
    fn new() -> Self {
        Self {
            ep_i: core::array::from_fn(|_| RefCell::new(EP::new())),
            ep_o: core::array::from_fn(|_| RefCell::new(EP::new())),
            reset_pending: RefCell::new(false),
        }
    }

    fn epidx(&self, ep_addr: EndpointAddress) -> &RefCell<EP> {
        match ep_addr.direction() {
            UsbDirection::In => self.ep_i.get(ep_addr.index()).unwrap(),
            UsbDirection::Out => self.ep_o.get(ep_addr.index()).unwrap(),
        }
    }

    fn get_write(&self, ep_addr: EndpointAddress, data: &mut [u8]) -> usize {
        let mut ep = self.epidx(ep_addr).borrow_mut();
        ep.get_write(data)
    }

    fn set_read(&self, ep_addr: EndpointAddress, data: &[u8], setup: bool) {
        let mut ep = self.epidx(ep_addr).borrow_mut();
        if setup && ep_addr.index() == 0 && ep_addr.direction() == UsbDirection::Out {
            // setup packet on EP0OUT removes stall condition
            ep.stall = false;
            let mut ep0in = self.ep_i.get(0).unwrap().borrow_mut();
            ep0in.stall = false;
        }
        ep.set_read(data, setup)
    }

    fn stalled0(&self) -> bool {
        let in0 = EndpointAddress::from_parts(0, UsbDirection::In);
        let out0 = EndpointAddress::from_parts(0, UsbDirection::Out);

        self.epidx(in0).borrow().stall || self.epidx(out0).borrow().stall
    }

    /// Packet written to IN endpoint `index` and not yet picked up.
    pub fn pending_in(&self, index: usize) -> Option<Vec<u8>> {
        let ep = self.ep_i[index].borrow();
        if ep.write_pending {
            Some(ep.write[..ep.write_len].to_vec())
        } else {
            None
        }
    }

    /// Max packet size IN endpoint `index` was allocated with.
    pub fn in_max_size(&self, index: usize) -> usize {
        self.ep_i[index].borrow().max_size
    }
}

pub struct TestBus {
    rrio: Rc<RefCell<TestBusIO>>,
}

unsafe impl Sync for TestBus {}

impl TestBus {
    fn new(rrio: &Rc<RefCell<TestBusIO>>) -> Self {
        Self { rrio: rrio.clone() }
    }
    fn io(&self) -> &RefCell<TestBusIO> {
        self.rrio.as_ref()
    }
}

impl usb_device::bus::UsbBus for TestBus {
    fn alloc_ep(
        &mut self,
        ep_dir: UsbDirection,
        ep_addr: Option<EndpointAddress>,
        _ep_type: EndpointType,
        max_packet_size: u16,
        _interval: u8,
    ) -> Result<EndpointAddress> {
        let io = self.io().borrow();

        let ea = match ep_addr {
            Some(ea) => ea,
            None => {
                let eps = match ep_dir {
                    UsbDirection::In => &io.ep_i,
                    UsbDirection::Out => &io.ep_o,
                };
                let index = (1..NUM_ENDPOINTS)
                    .find(|i| !eps[*i].borrow().alloc)
                    .ok_or(UsbError::EndpointOverflow)?;
                EndpointAddress::from_parts(index as _, ep_dir)
            }
        };

        let mut sep = io.epidx(ea).borrow_mut();
        assert!(!sep.alloc);
        sep.alloc = true;
        sep.stall = false;
        sep.max_size = max_packet_size as usize;

        Ok(ea)
    }
    fn enable(&mut self) {}
    fn force_reset(&self) -> Result<()> {
        Ok(())
    }
    fn poll(&self) -> PollResult {
        let io = self.io().borrow();

        if io.reset_pending.replace(false) {
            return PollResult::Reset;
        }

        let mut ep_in_complete = 0u16;
        let mut ep_out = 0u16;
        let mut ep_setup = 0u16;

        for i in 0..NUM_ENDPOINTS {
            let mut epi = io.ep_i[i].borrow_mut();
            let epo = io.ep_o[i].borrow();

            if epi.write_done {
                ep_in_complete |= 1 << i;
            }
            epi.write_done = false;

            if epo.read_ready || (i == 0 && epi.read_ready) {
                ep_out |= 1 << i;
            }
            if i == 0 && epo.setup {
                ep_setup |= 1;
            }
        }

        if ep_in_complete != 0 || ep_out != 0 || ep_setup != 0 {
            PollResult::Data {
                ep_in_complete,
                ep_out,
                ep_setup,
            }
        } else {
            PollResult::None
        }
    }
    fn read(&self, ep_addr: EndpointAddress, buf: &mut [u8]) -> Result<usize> {
        let io = self.io().borrow();
        let mut ep = io.epidx(ep_addr).borrow_mut();
        let len = min(buf.len(), min(ep.read_len, ep.max_size));

        if len == 0 {
            return Err(UsbError::WouldBlock);
        }

        buf[..len].clone_from_slice(&ep.read[..len]);

        ep.read_len -= len;
        ep.read.copy_within(len.., 0);

        if ep.read_len == 0 {
            ep.setup = false;
        }

        ep.read_ready = ep.read_len > 0;

        Ok(len)
    }
    fn reset(&self) {
        let io = self.io().borrow();
        for i in 1..NUM_ENDPOINTS {
            io.ep_i[i].borrow_mut().clear();
            io.ep_o[i].borrow_mut().clear();
        }
    }
    fn resume(&self) {}
    fn suspend(&self) {}
    fn set_device_address(&self, addr: u8) {
        assert_eq!(addr, 5);
    }
    fn is_stalled(&self, ep_addr: EndpointAddress) -> bool {
        let io = self.io().borrow();
        let ep = io.epidx(ep_addr).borrow();
        ep.stall
    }
    fn set_stalled(&self, ep_addr: EndpointAddress, stalled: bool) {
        let io = self.io().borrow();
        let mut ep = io.epidx(ep_addr).borrow_mut();
        ep.stall = stalled;
    }
    fn write(&self, ep_addr: EndpointAddress, buf: &[u8]) -> Result<usize> {
        let io = self.io().borrow();
        let mut ep = io.epidx(ep_addr).borrow_mut();

        if buf.len() > ep.max_size {
            return Err(UsbError::BufferOverflow);
        }

        if ep_addr.index() != 0 {
            // one packet buffer, like the hardware
            if ep.write_pending {
                return Err(UsbError::WouldBlock);
            }
            ep.write[..buf.len()].copy_from_slice(buf);
            ep.write_len = buf.len();
            ep.write_pending = true;
            ep.write_done = false;
            return Ok(buf.len());
        }

        let offset = ep.write_len;
        let mut len = 0;

        for (i, e) in ep.write[offset..].iter_mut().enumerate() {
            if i >= buf.len() {
                break;
            }
            *e = buf[i];
            len += 1;
        }

        ep.write_len += len;
        ep.write_done = false;
        Ok(len)
    }
}

pub fn new_bus() -> (Rc<RefCell<TestBusIO>>, UsbBusAllocator<TestBus>) {
    let io = Rc::new(RefCell::new(TestBusIO::new()));
    let alloc = UsbBusAllocator::new(TestBus::new(&io));
    (io, alloc)
}

/// Emulated host talking to one device.
pub struct TestDevice<'a> {
    io: Rc<RefCell<TestBusIO>>,
    dev: UsbDevice<'a, TestBus>,
}

impl<'a> TestDevice<'a> {
    /// Builds the device. Classes must be created from `alloc` before this.
    pub fn new(io: &Rc<RefCell<TestBusIO>>, alloc: &'a UsbBusAllocator<TestBus>) -> Self {
        let dev = UsbDeviceBuilder::new(alloc, UsbVidPid(0x1234, 0x1234)).build();

        Self {
            io: io.clone(),
            dev,
        }
    }

    pub fn io(&self) -> std::cell::Ref<'_, TestBusIO> {
        self.io.borrow()
    }

    pub fn poll<C: UsbClass<TestBus>>(&mut self, cls: &mut C) -> bool {
        self.dev.poll(&mut [cls])
    }

    /// Sets address and configuration, leaving the device configured.
    pub fn enumerate<C: UsbClass<TestBus>>(&mut self, cls: &mut C) {
        let mut buf = [0; 8];
        let mut len;

        self.poll(cls);

        // set address
        len = self
            .transact(cls, &[0, 0x5, 5, 0, 0, 0, 0, 0], None, &mut buf)
            .expect("len");
        assert_eq!(len, 0);

        // set configuration
        len = self
            .transact(cls, &[0, 0x9, 1, 0, 0, 0, 0, 0], None, &mut buf)
            .expect("len");
        assert_eq!(len, 0);

        assert_eq!(self.dev.state(), UsbDeviceState::Configured);
    }

    /// Runs one control transfer: setup, optional OUT data stage, then
    /// collects the IN data (or status) stage into `out`.
    pub fn transact<C: UsbClass<TestBus>>(
        &mut self,
        cls: &mut C,
        setup: &[u8],
        data: Option<&[u8]>,
        out: &mut [u8],
    ) -> core::result::Result<usize, EPErr> {
        let out0 = EndpointAddress::from_parts(0, UsbDirection::Out);
        let in0 = EndpointAddress::from_parts(0, UsbDirection::In);

        self.io.borrow().set_read(out0, setup, true);
        self.poll(cls);
        if self.io.borrow().stalled0() {
            return Err(EPErr::Stalled);
        }

        if let Some(val) = data {
            self.io.borrow().set_read(out0, val, false);
            for i in 1..100 {
                let res = self.poll(cls);
                if !res {
                    break;
                }
                if i >= 99 {
                    panic!("read too much");
                }
            }
            if self.io.borrow().stalled0() {
                return Err(EPErr::Stalled);
            }
        };

        let mut len = 0;

        loop {
            let one = self.io.borrow().get_write(in0, &mut out[len..]);
            self.poll(cls);
            if self.io.borrow().stalled0() {
                return Err(EPErr::Stalled);
            }

            len += one;
            if one < EP0_SIZE {
                // short read - last block
                break;
            }
        }

        Ok(len)
    }

    /// Host picks up the packet waiting on IN endpoint `index`, the device
    /// then sees the transfer complete.
    pub fn take_in<C: UsbClass<TestBus>>(&mut self, cls: &mut C, index: usize) -> Option<Vec<u8>> {
        let packet = self.io.borrow().ep_i[index].borrow_mut().take_packet();
        if packet.is_some() {
            self.poll(cls);
        }
        packet
    }

    /// Host keeps polling IN endpoint `index` until nothing more arrives.
    pub fn drain_in<C: UsbClass<TestBus>>(&mut self, cls: &mut C, index: usize) -> Vec<Vec<u8>> {
        let mut packets = Vec::new();
        while let Some(p) = self.take_in(cls, index) {
            packets.push(p);
            assert!(packets.len() < 10_000);
        }
        packets
    }

    /// Host sends `data` to OUT endpoint `index`.
    pub fn send_out<C: UsbClass<TestBus>>(&mut self, cls: &mut C, index: usize, data: &[u8]) {
        let ep = EndpointAddress::from_parts(index as _, UsbDirection::Out);
        self.io.borrow().set_read(ep, data, false);
        self.poll(cls);
    }

    /// Host drives a bus reset, then enumerates again.
    pub fn bus_reset<C: UsbClass<TestBus>>(&mut self, cls: &mut C) {
        self.io.borrow().reset_pending.replace(true);
        self.poll(cls);
        self.enumerate(cls);
    }
}
