//! ISO15693 slotted inventory
//!
//! One round probes the 16 anticollision time slots of an inventory
//! command and harvests one UID per responding slot. The loop runs all 16
//! slots unconditionally; ISO15693 exposes no collision signalling at this
//! layer, so a silent or garbled slot simply contributes nothing.

use embedded_hal::{delay::DelayNs, digital::InputPin};

use crate::{registers, Interface, Pn5180, Result, ScanResult, Uid, UID_MAX_LEN};

/// LOAD_RF_CONFIG transmitter setting: ISO15693 ASK 100%, 26 kbit/s
const TX_RF_CONFIG: u8 = 0x0D;
/// LOAD_RF_CONFIG receiver setting: ISO15693, 26 kbit/s single subcarrier
const RX_RF_CONFIG: u8 = 0x8D;

/// An inventory round always spans exactly this many time slots
pub const SLOT_COUNT: usize = 16;

/// Inventory request: 16-slot flags (0x06), INVENTORY command (0x01),
/// zero-length mask
const INVENTORY_REQUEST: [u8; 3] = [0x06, 0x01, 0x00];

/// Runs ISO15693 discovery rounds on a borrowed driver
pub struct Iso15693Initiator<'a, I, P, D> {
    drv: &'a mut Pn5180<I, P, D>,
}

impl<'a, I: Interface, P: InputPin, D: DelayNs> Iso15693Initiator<'a, I, P, D> {
    pub fn new(drv: &'a mut Pn5180<I, P, D>) -> Self {
        Self { drv }
    }

    /// Runs one 16-slot inventory round
    ///
    /// Returns the harvested UIDs in slot order. The RF field is switched
    /// off exactly once before returning, error paths included.
    pub fn inventory(&mut self) -> Result<ScanResult, I, P> {
        let res = self.run_round();
        self.drv.rf_off()?;
        res
    }

    fn run_round(&mut self) -> Result<ScanResult, I, P> {
        self.drv.load_rf_config(TX_RF_CONFIG, RX_RF_CONFIG)?;
        self.drv.rf_on()?;
        self.drv.clear_irq()?;
        self.drv.enter_idle()?;
        self.drv.enter_transceive()?;
        self.drv.send_data(0, &INVENTORY_REQUEST)?;

        let mut cards = ScanResult::new();
        for slot in 0..SLOT_COUNT {
            if let Some(status) = self.drv.card_has_responded()? {
                self.collect_slot(slot, status.byte_count() as usize, &mut cards)?;
            }
            self.advance_slot()?;
        }
        debug!("inventory round done, {=usize} card(s)", cards.len());
        Ok(cards)
    }

    /// Pulls one slot's reply out of the reception buffer
    fn collect_slot(
        &mut self,
        slot: usize,
        count: usize,
        cards: &mut ScanResult,
    ) -> Result<(), I, P> {
        if count > UID_MAX_LEN {
            // not a valid inventory reply, leave it in the buffer
            warn!("slot {=usize}: oversized reply of {=usize} bytes", slot, count);
            return Ok(());
        }
        let mut buf = [0u8; UID_MAX_LEN];
        self.drv.read_data(&mut buf[..count])?;
        if let Some(uid) = Uid::from_bytes(&buf[..count]) {
            debug!("slot {=usize}: card responded", slot);
            let _ = cards.push(uid);
        }
        Ok(())
    }

    /// Moves the round to the next slot by transmitting an EOF-only frame
    fn advance_slot(&mut self) -> Result<(), I, P> {
        self.drv
            .write_register_and_mask(registers::TX_CONFIG, registers::TX_CONFIG_EOF_ONLY)?;
        self.drv.enter_idle()?;
        self.drv.enter_transceive()?;
        self.drv.clear_irq()?;
        self.drv.send_data(0, &[])
    }
}
