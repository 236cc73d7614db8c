//! Host interface commands
//!
//! Opcodes from the [datasheet](https://www.nxp.com/docs/en/data-sheet/PN5180.pdf),
//! section 11.4.3.3 (Host Interface Command List).

/// Direct commands
///
/// Every host exchange starts with one of these opcodes, followed by an
/// opcode-specific payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[repr(u8)]
pub enum DirectCommand {
    /// Writes one 32-bit register
    WriteRegister = 0x00,
    /// ORs a 32-bit mask into a register
    WriteRegisterOrMask = 0x01,
    /// ANDs a 32-bit mask into a register
    WriteRegisterAndMask = 0x02,
    /// Reads one 32-bit register
    ReadRegister = 0x04,
    WriteEeprom = 0x06,
    ReadEeprom = 0x07,
    /// Writes data into the transmission buffer and starts transmission
    SendData = 0x09,
    /// Reads the reception buffer
    ReadData = 0x0A,
    SwitchMode = 0x0B,
    /// Loads a TX/RX protocol configuration pair into the RF registers
    LoadRfConfig = 0x11,
    /// Switches the RF field on
    RfOn = 0x16,
    /// Switches the RF field off
    RfOff = 0x17,
}

/// Size of the chip's transmission buffer, bounds SEND_DATA payloads
pub const TX_BUFFER_LEN: usize = 260;

/// Largest frame the encoder produces: SEND_DATA opcode, valid-bit count
/// and a full transmission buffer
pub const MAX_FRAME_LEN: usize = 2 + TX_BUFFER_LEN;

/// A host interface frame, ready for transmission
pub type Frame = heapless::Vec<u8, MAX_FRAME_LEN>;

/// Frame construction errors, always caller bugs rather than runtime
/// conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum FrameError {
    /// Payload does not fit the opcode's length contract
    InvalidLength,
}

pub fn write_register(addr: u8, value: [u8; 4]) -> [u8; 6] {
    register_frame(DirectCommand::WriteRegister, addr, value)
}

pub fn write_register_or_mask(addr: u8, mask: [u8; 4]) -> [u8; 6] {
    register_frame(DirectCommand::WriteRegisterOrMask, addr, mask)
}

pub fn write_register_and_mask(addr: u8, mask: [u8; 4]) -> [u8; 6] {
    register_frame(DirectCommand::WriteRegisterAndMask, addr, mask)
}

fn register_frame(cmd: DirectCommand, addr: u8, bytes: [u8; 4]) -> [u8; 6] {
    [cmd as u8, addr, bytes[0], bytes[1], bytes[2], bytes[3]]
}

pub fn read_register(addr: u8) -> [u8; 2] {
    [DirectCommand::ReadRegister as u8, addr]
}

pub fn load_rf_config(tx_config: u8, rx_config: u8) -> [u8; 3] {
    [DirectCommand::LoadRfConfig as u8, tx_config, rx_config]
}

pub fn rf_on() -> [u8; 2] {
    [DirectCommand::RfOn as u8, 0x00]
}

pub fn rf_off() -> [u8; 2] {
    [DirectCommand::RfOff as u8, 0x00]
}

pub fn read_data() -> [u8; 2] {
    [DirectCommand::ReadData as u8, 0x00]
}

/// Builds a SEND_DATA frame
///
/// `valid_bits` is the number of valid bits in the last payload byte,
/// 0 meaning all eight. An empty payload transmits an EOF-only frame.
pub fn send_data(valid_bits: u8, payload: &[u8]) -> Result<Frame, FrameError> {
    if valid_bits > 7 || payload.len() > TX_BUFFER_LEN {
        return Err(FrameError::InvalidLength);
    }
    let mut frame = Frame::new();
    // capacity checked above
    frame
        .extend_from_slice(&[DirectCommand::SendData as u8, valid_bits])
        .map_err(|()| FrameError::InvalidLength)?;
    frame
        .extend_from_slice(payload)
        .map_err(|()| FrameError::InvalidLength)?;
    Ok(frame)
}
