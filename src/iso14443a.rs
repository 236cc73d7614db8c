//! ISO14443A cascade anticollision
//!
//! One round sends REQA and, if any card answers, walks the cascade levels
//! to assemble a single UID. Bit collisions are reported but not resolved
//! by splitting on the colliding bit; with several cards in the field a
//! round will often end without a UID. That is deliberate best-effort
//! behaviour, not a defect.

use embedded_hal::{delay::DelayNs, digital::InputPin};

use crate::{registers, Error, Interface, Pn5180, Result, ScanResult, Uid};

/// LOAD_RF_CONFIG transmitter setting: ISO14443A, 106 kbit/s
const TX_RF_CONFIG: u8 = 0x00;
/// LOAD_RF_CONFIG receiver setting: ISO14443A, 106 kbit/s
const RX_RF_CONFIG: u8 = 0x80;

/// REQA, a 7-bit short frame
const REQA: u8 = 0x26;
/// First UID byte announcing a continuation at the next cascade level
const CASCADE_TAG: u8 = 0x88;
/// NVB for a full anticollision frame (2 bytes, 0 bits known)
const NVB_ANTICOLLISION: u8 = 0x20;
/// NVB for a SELECT frame (7 bytes known)
const NVB_SELECT: u8 = 0x70;
/// Cascade level select codes, in resolution order
const SEL_CODES: [u8; 3] = [0x93, 0x95, 0x97];

/// Runs ISO14443A discovery rounds on a borrowed driver
pub struct Iso14443aInitiator<'a, I, P, D> {
    drv: &'a mut Pn5180<I, P, D>,
}

impl<'a, I: Interface, P: InputPin, D: DelayNs> Iso14443aInitiator<'a, I, P, D> {
    pub fn new(drv: &'a mut Pn5180<I, P, D>) -> Self {
        Self { drv }
    }

    /// Runs one REQA/anticollision round, resolving at most one UID
    ///
    /// Protocol-level failures (silence, collisions, malformed replies) end
    /// the round with an empty result instead of an error. The RF field is
    /// switched off before returning, on every path.
    pub fn inventory(&mut self) -> Result<ScanResult, I, P> {
        let res = self.run_round();
        self.drv.rf_off()?;

        let mut cards = ScanResult::new();
        match res {
            Ok(uid) => {
                let _ = cards.push(uid);
                Ok(cards)
            }
            Err(
                Error::NoResponse
                | Error::Collision { .. }
                | Error::Bcc
                | Error::IncompleteFrame
                | Error::UidFormat
                | Error::BufferOverflow,
            ) => {
                debug!("round ended without a resolved card");
                Ok(cards)
            }
            Err(e) => Err(e),
        }
    }

    fn run_round(&mut self) -> Result<Uid, I, P> {
        self.drv.load_rf_config(TX_RF_CONFIG, RX_RF_CONFIG)?;
        self.drv.rf_on()?;
        // anticollision frames travel without CRC
        self.set_crc(false)?;
        self.drv.clear_irq()?;
        self.drv.enter_idle()?;
        self.drv.enter_transceive()?;
        // the chip needs roughly 5 ms of field before REQA
        self.drv.settle();
        self.drv.send_data(7, &[REQA])?;

        let Some(status) = self.drv.card_has_responded()? else {
            return Err(Error::NoResponse);
        };
        let count = status.byte_count() as usize;
        let mut atqa = [0u8; 4];
        if count > atqa.len() {
            return Err(Error::BufferOverflow);
        }
        self.drv.read_data(&mut atqa[..count])?;
        trace!("ATQA {=[u8]:02x}", &atqa[..count]);

        self.select()
    }

    /// Walks the cascade levels, accumulating the UID prefix
    ///
    /// Each level contributes 4 bytes, or 3 plus a cascade tag pointing at
    /// the next level; a card finishing at level 1/2/3 yields a 4/7/10 byte
    /// UID.
    fn select(&mut self) -> Result<Uid, I, P> {
        let mut uid = [0u8; 10];
        let mut len = 0;

        for &sel in &SEL_CODES {
            let part = self.anticollision_frame(sel)?;
            let sak = self.select_frame(sel, part)?;
            debug!("cascade {=u8:#x}: SAK {=u8:#x}", sel, sak);

            if part[0] == CASCADE_TAG {
                uid[len..len + 3].copy_from_slice(&part[1..4]);
                len += 3;
            } else {
                uid[len..len + 4].copy_from_slice(&part[..4]);
                len += 4;
                return Uid::from_bytes(&uid[..len]).ok_or(Error::UidFormat);
            }
        }
        // a cascade tag at the deepest level never belongs to a valid card
        Err(Error::UidFormat)
    }

    /// Sends `[sel, 0x20]` and reads the 4 UID bytes plus BCC
    fn anticollision_frame(&mut self, sel: u8) -> Result<[u8; 5], I, P> {
        self.set_crc(false)?;
        self.drv.enter_idle()?;
        self.drv.enter_transceive()?;
        self.drv.clear_irq()?;
        self.drv.send_data(0, &[sel, NVB_ANTICOLLISION])?;
        self.drv.settle();

        let Some(status) = self.drv.card_has_responded()? else {
            return Err(Error::NoResponse);
        };
        if status.collision_detected() {
            let position = status.collision_pos().value();
            warn!("collision at bit {=u8}, dropping the branch", position);
            return Err(Error::Collision { position });
        }
        if status.byte_count() != 5 {
            return Err(Error::IncompleteFrame);
        }

        let mut part = [0u8; 5];
        self.drv.read_data(&mut part)?;
        let bcc = part[0] ^ part[1] ^ part[2] ^ part[3];
        if bcc != part[4] {
            warn!("BCC mismatch, got {=u8:#x} expected {=u8:#x}", part[4], bcc);
            return Err(Error::Bcc);
        }
        Ok(part)
    }

    /// Selects the card with the echoed UID bytes, returning its SAK
    fn select_frame(&mut self, sel: u8, part: [u8; 5]) -> Result<u8, I, P> {
        self.set_crc(true)?;
        self.drv.enter_idle()?;
        self.drv.enter_transceive()?;
        self.drv.clear_irq()?;

        let mut frame = [0u8; 7];
        frame[0] = sel;
        frame[1] = NVB_SELECT;
        frame[2..].copy_from_slice(&part);
        self.drv.send_data(0, &frame)?;
        self.drv.settle();

        let Some(status) = self.drv.card_has_responded()? else {
            return Err(Error::NoResponse);
        };
        if status.byte_count() != 3 {
            return Err(Error::IncompleteFrame);
        }
        // SAK plus CRC_A
        let mut sak = [0u8; 3];
        self.drv.read_data(&mut sak)?;
        Ok(sak[0])
    }

    fn set_crc(&mut self, enabled: bool) -> Result<(), I, P> {
        let mask = if enabled {
            registers::CRC_ENABLE
        } else {
            registers::CRC_DISABLE
        };
        if enabled {
            self.drv.write_register_or_mask(registers::CRC_TX_CONFIG, mask)?;
            self.drv.write_register_or_mask(registers::CRC_RX_CONFIG, mask)
        } else {
            self.drv.write_register_and_mask(registers::CRC_TX_CONFIG, mask)?;
            self.drv.write_register_and_mask(registers::CRC_RX_CONFIG, mask)
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::vec::Vec;

    use super::*;
    use crate::test_support::{new_driver, MockBus};

    const IRQ_QUIET: [u8; 4] = [0, 0, 0, 0];

    fn script_poll_raw(bus: &mut MockBus, rx_status: u32) {
        bus.push_reply(&rx_status.to_le_bytes());
        bus.push_reply(&IRQ_QUIET);
    }

    fn script_poll(bus: &mut MockBus, byte_count: u8) {
        script_poll_raw(bus, byte_count as u32);
    }

    fn script_atqa(bus: &mut MockBus) {
        script_poll(bus, 2);
        bus.push_reply(&[0x44, 0x00]);
    }

    fn script_cascade_level(bus: &mut MockBus, part: &[u8; 4], sak: u8) {
        let bcc = part[0] ^ part[1] ^ part[2] ^ part[3];
        script_poll(bus, 5);
        bus.push_reply(&[part[0], part[1], part[2], part[3], bcc]);
        script_poll(bus, 3);
        bus.push_reply(&[sak, 0xAA, 0xBB]);
    }

    fn rf_off_frames(sent: &[Vec<u8>]) -> usize {
        sent.iter().filter(|f| f.as_slice() == [0x17, 0x00]).count()
    }

    #[test]
    fn silent_field_yields_an_empty_round() {
        let mut bus = MockBus::new();
        script_poll(&mut bus, 0); // no ATQA
        let mut drv = new_driver(bus);

        let cards = drv.iso14443a().inventory().unwrap();
        assert!(cards.is_empty());
        assert_eq!(rf_off_frames(&drv.dev.sent), 1);
        assert_eq!(drv.dev.sent.last().unwrap().as_slice(), [0x17, 0x00]);
        // REQA went out as a 7-bit short frame
        assert!(drv.dev.sent.iter().any(|f| f.as_slice() == [0x09, 0x07, 0x26]));
    }

    #[test]
    fn single_level_card_resolves_a_four_byte_uid() {
        let mut bus = MockBus::new();
        script_atqa(&mut bus);
        script_cascade_level(&mut bus, &[0x04, 0xAB, 0x12, 0x7E], 0x08);
        let mut drv = new_driver(bus);

        let cards = drv.iso14443a().inventory().unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].bytes(), [0x04, 0xAB, 0x12, 0x7E]);
        assert_eq!(cards[0].to_hex().as_str(), "04ab127e");

        let sent = &drv.dev.sent;
        assert!(sent.iter().any(|f| f.as_slice() == [0x09, 0x00, 0x93, 0x20]));
        let bcc = 0x04 ^ 0xAB ^ 0x12 ^ 0x7E;
        let select = [0x09, 0x00, 0x93, 0x70, 0x04, 0xAB, 0x12, 0x7E, bcc];
        assert!(sent.iter().any(|f| f.as_slice() == select));
        assert_eq!(rf_off_frames(sent), 1);
    }

    #[test]
    fn cascade_tag_continues_at_the_next_level() {
        let mut bus = MockBus::new();
        script_atqa(&mut bus);
        script_cascade_level(&mut bus, &[CASCADE_TAG, 0x04, 0xAB, 0x12], 0x04);
        script_cascade_level(&mut bus, &[0x7E, 0x55, 0x66, 0x77], 0x00);
        let mut drv = new_driver(bus);

        let cards = drv.iso14443a().inventory().unwrap();
        assert_eq!(cards.len(), 1);
        // 3 bytes from level 1 (tag dropped) + 4 from level 2
        assert_eq!(cards[0].bytes(), [0x04, 0xAB, 0x12, 0x7E, 0x55, 0x66, 0x77]);
        assert!(drv
            .dev
            .sent
            .iter()
            .any(|f| f.as_slice() == [0x09, 0x00, 0x95, 0x20]));
    }

    #[test]
    fn collisions_are_reported_not_resolved() {
        let mut bus = MockBus::new();
        script_atqa(&mut bus);
        // 5 bytes received, collision flag set, colliding bit 0x0C
        script_poll_raw(&mut bus, 5 | (1 << 18) | (0x0C << 19));
        let mut drv = new_driver(bus);

        let cards = drv.iso14443a().inventory().unwrap();
        assert!(cards.is_empty());
        assert_eq!(rf_off_frames(&drv.dev.sent), 1);
    }

    #[test]
    fn bad_bcc_drops_the_round() {
        let mut bus = MockBus::new();
        script_atqa(&mut bus);
        script_poll(&mut bus, 5);
        bus.push_reply(&[0x04, 0xAB, 0x12, 0x7E, 0x00]); // wrong checksum
        let mut drv = new_driver(bus);

        let cards = drv.iso14443a().inventory().unwrap();
        assert!(cards.is_empty());
        assert_eq!(rf_off_frames(&drv.dev.sent), 1);
    }

    #[test]
    fn cascade_tag_at_the_deepest_level_is_rejected() {
        let mut bus = MockBus::new();
        script_atqa(&mut bus);
        for _ in 0..3 {
            script_cascade_level(&mut bus, &[CASCADE_TAG, 0x01, 0x02, 0x03], 0x04);
        }
        let mut drv = new_driver(bus);

        let cards = drv.iso14443a().inventory().unwrap();
        assert!(cards.is_empty());
        assert_eq!(rf_off_frames(&drv.dev.sent), 1);
    }
}
