//! Card unique identifiers

use core::fmt::{self, Write};

use heapless::String;

/// Longest UID the supported protocols produce: triple-cascade ISO14443A
/// and ISO15693 inventory replies both top out at 10 bytes
pub const UID_MAX_LEN: usize = 10;

/// Hex rendering of a [`Uid`], two lowercase digits per byte
pub type UidHex = String<{ 2 * UID_MAX_LEN }>;

/// A card UID as received over the air
///
/// ISO14443A UIDs are 4, 7 or 10 bytes depending on cascade depth;
/// ISO15693 inventory replies carry a protocol-defined fixed length.
/// Bytes are kept in received order for both protocols.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Uid {
    bytes: [u8; UID_MAX_LEN],
    len: u8,
}

impl Uid {
    /// Returns `None` for an empty or oversized byte sequence
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes.len() {
            1..=UID_MAX_LEN => {
                let mut b = [0u8; UID_MAX_LEN];
                b[..bytes.len()].copy_from_slice(bytes);
                Some(Self {
                    bytes: b,
                    len: bytes.len() as u8,
                })
            }
            _ => None,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Renders the UID as lowercase hex in received byte order
    pub fn to_hex(&self) -> UidHex {
        let mut out = UidHex::new();
        for byte in self.bytes() {
            // capacity is two characters per stored byte
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for byte in self.bytes() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Uid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Uid({self})")
    }
}
