//! A platform agnostic driver for the NXP PN5180 contactless transceiver,
//! built on the [`embedded-hal`](https://docs.rs/embedded-hal/1) traits.
//!
//! The driver discovers nearby proximity cards and reports their UIDs. Two
//! discovery state machines are implemented: the ISO15693 16-slot inventory
//! round and the ISO14443A cascade anticollision sequence. Everything else
//! the chip can do (EEPROM access, card authentication, data read/write)
//! is out of scope.
//!
//! The caller supplies the SPI device (bus, chip select and clock speed are
//! picked when constructing it), the busy-line input pin and a delay
//! provider:
//!
//! ```ignore
//! let mut reader = Pn5180::new(SpiInterface::new(spi), busy_pin, delay);
//! let cards = reader.inventory(Protocol::Iso15693)?;
//! for uid in &cards {
//!     println!("card: {}", uid.to_hex());
//! }
//! ```
//!
//! One `Pn5180` value owns one physical chip. Every operation is a blocking
//! round-trip; callers wanting periodic scanning loop externally and
//! serialize access themselves.

#![no_std]

// This mod MUST go first, so that the others see its macros.
mod fmt;

pub mod commands;
pub mod interface;
pub mod iso14443a;
pub mod iso15693;
pub mod registers;
pub mod uid;

#[cfg(test)]
mod test_support;

use embedded_hal::{delay::DelayNs, digital::InputPin};
use fugit::MicrosDurationU32;

use commands::FrameError;
use registers::{IrqStatus, RxStatus};

pub use interface::{Interface, SpiInterface};
pub use iso14443a::Iso14443aInitiator;
pub use iso15693::Iso15693Initiator;
pub use uid::{Uid, UidHex, UID_MAX_LEN};

/// Most UIDs a single round can produce (one per ISO15693 inventory slot)
pub const MAX_CARDS_PER_ROUND: usize = 16;

/// UIDs resolved in one round, in slot order
pub type ScanResult = heapless::Vec<Uid, MAX_CARDS_PER_ROUND>;

/// Driver errors
///
/// `NoResponse`, `Collision`, `Bcc`, `IncompleteFrame` and `UidFormat` are
/// expected protocol outcomes; [`Pn5180::inventory`] recovers them into an
/// empty round. The remaining variants indicate a broken link or a defect
/// and propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Error<E, PE> {
    /// SPI bus error
    Interface(E),
    /// Busy line read error
    Pin(PE),
    /// Busy line never deasserted within the configured timeout
    Timeout,
    /// A polled step received no bytes from any card
    NoResponse,
    /// Bit collision during anticollision, at the reported bit position
    ///
    /// Collisions are reported, not resolved: the round ends without a UID
    /// for the colliding branch.
    Collision { position: u8 },
    /// Anticollision reply failed its block check character
    Bcc,
    /// Reply length does not match the protocol step
    IncompleteFrame,
    /// Cascade tag present at the deepest cascade level
    UidFormat,
    /// Reception buffer reports more bytes than the protocol step allows
    BufferOverflow,
    /// A frame violated its opcode's payload length contract
    InvalidFrameLength,
    /// No discovery state machine for the requested protocol
    UnsupportedProtocol,
}

impl<E, PE> From<FrameError> for Error<E, PE> {
    fn from(_: FrameError) -> Self {
        Error::InvalidFrameLength
    }
}

pub type Result<T, I, P> = core::result::Result<
    T,
    Error<<I as Interface>::Error, <P as embedded_hal::digital::ErrorType>::Error>,
>;

/// Protocol variant to run a discovery round for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Protocol {
    /// ISO15693 vicinity cards, 16-slot inventory
    Iso15693,
    /// ISO14443A proximity cards at 106 kbit/s, cascade anticollision
    Iso14443a,
    /// ISO14443B; the chip supports it but no state machine does yet
    Iso14443b,
}

/// Timing configuration
///
/// The busy-line timeout and poll interval are deliberately visible here
/// rather than being hidden constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// How long the busy line may stay high before [`Error::Timeout`]
    pub busy_timeout: MicrosDurationU32,
    /// Sleep between busy-line polls
    pub busy_poll_interval: MicrosDurationU32,
    /// RF settle delay before REQA and around anticollision polling
    pub guard_time: MicrosDurationU32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            busy_timeout: MicrosDurationU32::millis(10),
            busy_poll_interval: MicrosDurationU32::micros(50),
            guard_time: MicrosDurationU32::millis(5),
        }
    }
}

/// PN5180 driver
///
/// Owns the byte transport, the busy line and a delay provider for the
/// lifetime of the chip instance.
pub struct Pn5180<I, P, D> {
    dev: I,
    busy: P,
    delay: D,
    config: Config,
}

impl<I: Interface, P: InputPin, D: DelayNs> Pn5180<I, P, D> {
    pub fn new(dev: I, busy: P, delay: D) -> Self {
        Self::with_config(dev, busy, delay, Config::default())
    }

    pub fn with_config(dev: I, busy: P, delay: D, config: Config) -> Self {
        Self {
            dev,
            busy,
            delay,
            config,
        }
    }

    /// Gives the transport, busy pin and delay back to the caller
    pub fn release(self) -> (I, P, D) {
        (self.dev, self.busy, self.delay)
    }

    /// Runs one discovery round and returns the raw UIDs found
    ///
    /// Always returns a (possibly empty) sequence for "no cards present";
    /// the RF field is switched off before returning, on every path.
    pub fn inventory(&mut self, protocol: Protocol) -> Result<ScanResult, I, P> {
        match protocol {
            Protocol::Iso15693 => Iso15693Initiator::new(self).inventory(),
            Protocol::Iso14443a => Iso14443aInitiator::new(self).inventory(),
            Protocol::Iso14443b => Err(Error::UnsupportedProtocol),
        }
    }

    /// Like [`inventory`](Self::inventory), but renders each UID as
    /// lowercase hex
    pub fn inventory_hex(
        &mut self,
        protocol: Protocol,
    ) -> Result<heapless::Vec<UidHex, MAX_CARDS_PER_ROUND>, I, P> {
        Ok(self.inventory(protocol)?.iter().map(Uid::to_hex).collect())
    }

    /// Per-protocol entry point for ISO15693 rounds
    pub fn iso15693(&mut self) -> Iso15693Initiator<'_, I, P, D> {
        Iso15693Initiator::new(self)
    }

    /// Per-protocol entry point for ISO14443A rounds
    pub fn iso14443a(&mut self) -> Iso14443aInitiator<'_, I, P, D> {
        Iso14443aInitiator::new(self)
    }

    /// Blocks until the busy line is low
    ///
    /// The chip asserts busy while processing a command; the next frame may
    /// only go out once it deasserts.
    fn wait_ready(&mut self) -> Result<(), I, P> {
        let mut waited = MicrosDurationU32::micros(0);
        while self.busy.is_high().map_err(Error::Pin)? {
            if waited >= self.config.busy_timeout {
                warn!("busy line stuck high for {=u32}us", waited.to_micros());
                return Err(Error::Timeout);
            }
            self.delay.delay_us(self.config.busy_poll_interval.to_micros());
            waited += self.config.busy_poll_interval;
        }
        Ok(())
    }

    /// Transmits one frame, bracketed by ready waits
    pub(crate) fn send(&mut self, frame: &[u8]) -> Result<(), I, P> {
        self.wait_ready()?;
        self.dev.transmit(frame).map_err(Error::Interface)?;
        self.wait_ready()
    }

    /// Reads exactly `buf.len()` bytes; no handshake around reads
    pub(crate) fn receive(&mut self, buf: &mut [u8]) -> Result<(), I, P> {
        self.dev.receive(buf).map_err(Error::Interface)
    }

    /// RF settle delay
    pub(crate) fn settle(&mut self) {
        self.delay.delay_us(self.config.guard_time.to_micros());
    }

    pub(crate) fn write_register(&mut self, addr: u8, value: [u8; 4]) -> Result<(), I, P> {
        self.send(&commands::write_register(addr, value))
    }

    pub(crate) fn write_register_or_mask(&mut self, addr: u8, mask: [u8; 4]) -> Result<(), I, P> {
        self.send(&commands::write_register_or_mask(addr, mask))
    }

    pub(crate) fn write_register_and_mask(&mut self, addr: u8, mask: [u8; 4]) -> Result<(), I, P> {
        self.send(&commands::write_register_and_mask(addr, mask))
    }

    pub fn read_register(&mut self, addr: u8) -> Result<u32, I, P> {
        self.send(&commands::read_register(addr))?;
        let mut buf = [0u8; 4];
        self.receive(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    pub fn read_rx_status(&mut self) -> Result<RxStatus, I, P> {
        self.read_register(registers::RX_STATUS).map(RxStatus::from)
    }

    pub(crate) fn read_irq_status(&mut self) -> Result<IrqStatus, I, P> {
        self.read_register(registers::IRQ_STATUS).map(IrqStatus::from)
    }

    /// Polls RX_STATUS once; `Some` iff the reception buffer is non-empty
    ///
    /// Also reads IRQ_STATUS for diagnostics. That read is non-authoritative
    /// and only feeds the trace log.
    pub(crate) fn card_has_responded(&mut self) -> Result<Option<RxStatus>, I, P> {
        let status = self.read_rx_status()?;
        let irq = self.read_irq_status()?;
        trace!(
            "RX_STATUS count={=u16} IRQ_STATUS={=u32:08x}",
            status.byte_count(),
            u32::from(irq)
        );
        if status.byte_count() > 0 {
            Ok(Some(status))
        } else {
            Ok(None)
        }
    }

    pub(crate) fn load_rf_config(&mut self, tx_config: u8, rx_config: u8) -> Result<(), I, P> {
        self.send(&commands::load_rf_config(tx_config, rx_config))
    }

    pub(crate) fn rf_on(&mut self) -> Result<(), I, P> {
        debug!("RF field on");
        self.send(&commands::rf_on())
    }

    pub(crate) fn rf_off(&mut self) -> Result<(), I, P> {
        debug!("RF field off");
        self.send(&commands::rf_off())
    }

    pub(crate) fn send_data(&mut self, valid_bits: u8, payload: &[u8]) -> Result<(), I, P> {
        let frame = commands::send_data(valid_bits, payload)?;
        self.send(&frame)
    }

    /// Pulls `buf.len()` bytes from the reception buffer
    pub(crate) fn read_data(&mut self, buf: &mut [u8]) -> Result<(), I, P> {
        self.send(&commands::read_data())?;
        self.receive(buf)
    }

    pub(crate) fn clear_irq(&mut self) -> Result<(), I, P> {
        self.write_register(registers::IRQ_CLEAR, registers::IRQ_CLEAR_ALL)
    }

    pub(crate) fn enter_idle(&mut self) -> Result<(), I, P> {
        self.write_register_and_mask(registers::SYSTEM_CONFIG, registers::SYSTEM_CONFIG_IDLE)
    }

    pub(crate) fn enter_transceive(&mut self) -> Result<(), I, P> {
        self.write_register_or_mask(registers::SYSTEM_CONFIG, registers::SYSTEM_CONFIG_TRANSCEIVE)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use crate::test_support::{new_driver, BusyPin, MockBus, NoDelay};

    #[test]
    fn send_brackets_the_frame_with_ready_waits() {
        let mut drv = new_driver(MockBus::new());
        drv.send(&[0x16, 0x00]).unwrap();
        assert_eq!(drv.dev.sent, [std::vec![0x16, 0x00]]);
    }

    #[test]
    fn wait_ready_times_out_on_a_stuck_busy_line() {
        let bus = MockBus::new();
        let mut drv = Pn5180::new(bus, BusyPin::stuck_high(), NoDelay);
        assert_eq!(drv.send(&[0x16, 0x00]), Err(Error::Timeout));
        // nothing was put on the bus
        assert!(drv.dev.sent.is_empty());
    }

    #[test]
    fn read_register_is_a_little_endian_quadruple() {
        let mut bus = MockBus::new();
        bus.push_reply(&[0x78, 0x56, 0x34, 0x12]);
        let mut drv = new_driver(bus);
        let value = drv.read_register(registers::RX_STATUS).unwrap();
        assert_eq!(value, 0x1234_5678);
        assert_eq!(drv.dev.sent, [std::vec![0x04, 0x13]]);
    }

    #[test]
    fn card_has_responded_requires_a_nonzero_byte_count() {
        let mut bus = MockBus::new();
        bus.push_reply(&[0x00, 0x00, 0x00, 0x00]); // RX_STATUS
        bus.push_reply(&[0x00, 0x00, 0x00, 0x00]); // IRQ_STATUS, diagnostics
        let mut drv = new_driver(bus);
        assert!(drv.card_has_responded().unwrap().is_none());

        let mut bus = MockBus::new();
        bus.push_reply(&[0x02, 0x00, 0x00, 0x00]);
        bus.push_reply(&[0x01, 0x00, 0x00, 0x00]);
        let mut drv = new_driver(bus);
        let status = drv.card_has_responded().unwrap().unwrap();
        assert_eq!(status.byte_count(), 2);
    }

    #[test]
    fn unimplemented_protocols_are_rejected() {
        let mut drv = new_driver(MockBus::new());
        assert_eq!(
            drv.inventory(Protocol::Iso14443b),
            Err(Error::UnsupportedProtocol)
        );
    }
}
