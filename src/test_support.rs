//! Scripted transport doubles for the unit tests

extern crate std;

use core::convert::Infallible;
use std::collections::VecDeque;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin};

use crate::{Interface, Pn5180};

/// Records every transmitted frame and serves queued replies to reads
pub struct MockBus {
    pub sent: Vec<Vec<u8>>,
    pub replies: VecDeque<Vec<u8>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self {
            sent: Vec::new(),
            replies: VecDeque::new(),
        }
    }

    pub fn push_reply(&mut self, bytes: &[u8]) {
        self.replies.push_back(bytes.to_vec());
    }
}

impl Interface for MockBus {
    type Error = Infallible;

    fn transmit(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        self.sent.push(frame.to_vec());
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        let reply = self
            .replies
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted read of {} bytes", buf.len()));
        assert_eq!(
            reply.len(),
            buf.len(),
            "scripted reply length does not match the requested read"
        );
        buf.copy_from_slice(&reply);
        Ok(())
    }
}

/// Busy line double; `ready()` never asserts, `stuck_high()` never deasserts
pub struct BusyPin {
    high: bool,
}

impl BusyPin {
    pub fn ready() -> Self {
        Self { high: false }
    }

    pub fn stuck_high() -> Self {
        Self { high: true }
    }
}

impl ErrorType for BusyPin {
    type Error = Infallible;
}

impl InputPin for BusyPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.high)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.high)
    }
}

pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

pub fn new_driver(bus: MockBus) -> Pn5180<MockBus, BusyPin, NoDelay> {
    Pn5180::new(bus, BusyPin::ready(), NoDelay)
}
