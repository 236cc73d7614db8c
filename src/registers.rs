//! Register addresses and status register layouts
//!
//! Addresses from the PN5180 register table. All registers are 32 bits wide
//! and travel over the host interface as little-endian byte quadruples.

use bilge::prelude::*;

pub const SYSTEM_CONFIG: u8 = 0x00;
pub const IRQ_ENABLE: u8 = 0x01;
pub const IRQ_STATUS: u8 = 0x02;
pub const IRQ_CLEAR: u8 = 0x03;
pub const TRANSCEIVE_CONTROL: u8 = 0x04;
pub const TIMER1_RELOAD: u8 = 0x0C;
pub const TIMER1_CONFIG: u8 = 0x0F;
pub const RX_WAIT_CONFIG: u8 = 0x11;
pub const CRC_RX_CONFIG: u8 = 0x12;
pub const RX_STATUS: u8 = 0x13;
pub const TX_CONFIG: u8 = 0x18;
pub const CRC_TX_CONFIG: u8 = 0x19;
pub const RF_STATUS: u8 = 0x1D;
pub const SYSTEM_STATUS: u8 = 0x24;
pub const TEMP_CONTROL: u8 = 0x25;

/// Reception status
///
/// Reports how many bytes the last RF exchange put into the reception
/// buffer, and whether (and where) a bit collision was observed.
#[bitsize(32)]
#[derive(FromBits, DebugBits, Clone, Copy, PartialEq, Eq)]
pub struct RxStatus {
    /// Bytes waiting in the reception buffer
    pub num_bytes_received: u9,
    reserved: u9,
    /// A collision was detected during reception
    pub collision_detected: bool,
    /// Bit position of the first detected collision
    pub collision_pos: u6,
    reserved: u7,
}

impl RxStatus {
    /// Number of bytes to pull with READ_DATA; zero means no card answered
    pub fn byte_count(&self) -> u16 {
        self.num_bytes_received().value()
    }
}

/// Interrupt status
///
/// Read for diagnostics only; discovery polls [`RxStatus`] instead of
/// waiting on interrupt lines.
#[bitsize(32)]
#[derive(FromBits, DebugBits, Clone, Copy, PartialEq, Eq)]
pub struct IrqStatus {
    pub rx: bool,
    pub tx: bool,
    pub idle: bool,
    pub mode_detected: bool,
    pub card_activated: bool,
    pub state_change: bool,
    pub rf_off_det: bool,
    pub rf_on_det: bool,
    pub tx_rf_off: bool,
    pub tx_rf_on: bool,
    pub rf_active_error: bool,
    pub timer0: bool,
    pub timer1: bool,
    pub timer2: bool,
    pub rx_sof_det: bool,
    pub rx_sc_det: bool,
    pub temp_error: bool,
    pub general_error: bool,
    pub hv_error: bool,
    pub lpcd: bool,
    reserved: u12,
}

/// Mask written to IRQ_CLEAR to acknowledge every interrupt source
pub const IRQ_CLEAR_ALL: [u8; 4] = [0xFF, 0xFF, 0x0F, 0x00];

/// AND-mask over SYSTEM_CONFIG clearing the command field, i.e. IDLE
pub const SYSTEM_CONFIG_IDLE: [u8; 4] = [0xF8, 0xFF, 0xFF, 0xFF];

/// OR-mask over SYSTEM_CONFIG starting the TRANSCEIVE routine
pub const SYSTEM_CONFIG_TRANSCEIVE: [u8; 4] = [0x03, 0x00, 0x00, 0x00];

/// AND-mask over TX_CONFIG so the next transmission is an EOF-only frame
pub const TX_CONFIG_EOF_ONLY: [u8; 4] = [0x3F, 0xFB, 0xFF, 0xFF];

/// OR-mask enabling the CRC block of CRC_TX_CONFIG / CRC_RX_CONFIG
pub const CRC_ENABLE: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

/// AND-mask disabling the CRC block of CRC_TX_CONFIG / CRC_RX_CONFIG
pub const CRC_DISABLE: [u8; 4] = [0xFE, 0xFF, 0xFF, 0xFF];
