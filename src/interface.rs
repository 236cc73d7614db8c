use embedded_hal::spi::SpiDevice;

/// Byte transport to the chip
///
/// The only seam that touches the physical bus. The busy-line handshake
/// lives in the driver, which brackets every [`transmit`](Interface::transmit)
/// with ready waits; reads carry no handshake.
pub trait Interface {
    type Error;
    /// Write one host interface frame
    fn transmit(&mut self, frame: &[u8]) -> Result<(), Self::Error>;
    /// Read exactly `buf.len()` bytes
    fn receive(&mut self, buf: &mut [u8]) -> Result<(), Self::Error>;
}

pub struct SpiInterface<S: SpiDevice> {
    dev: S,
}

impl<S: SpiDevice> SpiInterface<S> {
    pub fn new(dev: S) -> Self {
        Self { dev }
    }

    pub fn release(self) -> S {
        self.dev
    }
}

impl<S: SpiDevice> Interface for SpiInterface<S> {
    type Error = S::Error;

    fn transmit(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        trace!("TX frame {=[u8]:02x}", frame);
        self.dev.write(frame)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.dev.read(buf)?;
        trace!("RX bytes {=[u8]:02x}", buf);
        Ok(())
    }
}
