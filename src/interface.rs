//! Bus interface for dSPIN daisy chains
//!
//! One "frame" is one byte-cycle across the chain: a full-duplex exchange
//! of exactly one byte per chained device, with chip select asserted for
//! the whole frame and released afterwards so every chip latches its byte.
//! A register transfer is a sequence of such frames, one per payload byte.
//!
//! The trait is the crate's only hardware seam; anything that can exchange
//! a frame — an SPI peripheral, a bit-banged port, a test double — can
//! drive a chain.

use embedded_hal::spi::{Mode, SpiDevice, MODE_3};

/// SPI mode required by the dSPIN serial interface
pub const MODE: Mode = MODE_3;

/// A full-duplex frame exchange with one daisy-chained dSPIN group
///
/// Implementations must assert chip select for the duration of one call and
/// release it between calls; the chips latch their command bytes on the
/// release edge. Exchanges are synchronous and must run to completion —
/// a frame cut short desynchronizes every shift register on the chain.
pub trait ChainInterface {
    /// Bus error type
    type Error;

    /// Exchange one frame: write each byte of `frame` in order, replacing
    /// it with the byte clocked back out of the chain at that slot
    fn transfer_frame(&mut self, frame: &mut [u8]) -> Result<(), Self::Error>;
}

/// SPI interface for a dSPIN chain
///
/// # Note on Chip Select
///
/// Uses the `SpiDevice` trait from `embedded-hal`, which owns the chip
/// select pin and asserts it around each transfer — exactly the per-frame
/// framing the chips require. The whole chain shares one chip select, so
/// one `SpiDevice` represents the whole chain, however many chips are on
/// it. If several unrelated devices share the SPI bus, a bus-sharing
/// `SpiDevice` implementation (e.g. from `embedded-hal-bus`) also provides
/// the one-transaction-at-a-time discipline the chain needs.
pub struct SpiInterface<SPI> {
    spi: SPI,
}

impl<SPI> SpiInterface<SPI> {
    /// Create a new SPI interface from a device configured for [`MODE`]
    pub const fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Consume the interface and return the SPI device
    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI, E> ChainInterface for SpiInterface<SPI>
where
    SPI: SpiDevice<Error = E>,
{
    type Error = E;

    fn transfer_frame(&mut self, frame: &mut [u8]) -> Result<(), Self::Error> {
        self.spi.transfer_in_place(frame)
    }
}
