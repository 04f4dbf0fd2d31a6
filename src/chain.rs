//! Chain transaction engine
//!
//! Drives one logical register operation across all devices on the shared
//! bus. Each byte-cycle shifts one frame through the chain: the target
//! position's slot carries the real command or data byte, every other slot
//! carries [`NOP`](crate::NOP), and the byte echoed back in the target slot
//! is captured for getters.
//!
//! All validation — position bounds, registry lookup, width and access
//! checks — happens before the first byte reaches the bus, so a rejected
//! operation leaves the chain untouched. Once shifting starts, the
//! transaction runs to completion; chained devices cannot resynchronize to
//! a partial shift. The engine takes `&mut self` for every operation,
//! which is the whole concurrency story: one transaction in flight, ever.

use crate::command::opcode;
use crate::interface::ChainInterface;
use crate::registers::Register;
use crate::{codec, Error, MAX_CHAIN, NOP};

/// Transaction engine for one daisy chain of 1–8 dSPIN devices
///
/// A chain of length 1 is the plain non-chained case: every frame is one
/// byte and the only slot is the target.
pub struct Chain<IF> {
    interface: IF,
    devices: usize,
}

impl<IF> Chain<IF>
where
    IF: ChainInterface,
{
    /// Create an engine for `devices` chips sharing one bus
    ///
    /// The length is fixed for the life of the chain; device positions are
    /// `0..devices`, counted from the chip whose data input is wired to
    /// the host.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidChainLength`] if `devices` is zero or
    /// exceeds [`MAX_CHAIN`].
    pub fn new(interface: IF, devices: usize) -> Result<Self, Error<IF::Error>> {
        if devices == 0 || devices > MAX_CHAIN {
            return Err(Error::InvalidChainLength(devices));
        }
        Ok(Self { interface, devices })
    }

    /// Number of devices on the chain
    #[must_use]
    pub fn devices(&self) -> usize {
        self.devices
    }

    /// Consume the engine and return the bus interface
    pub fn release(self) -> IF {
        self.interface
    }

    fn check_position(&self, position: usize) -> Result<(), Error<IF::Error>> {
        if position >= self.devices {
            return Err(Error::InvalidPosition {
                position,
                devices: self.devices,
            });
        }
        Ok(())
    }

    /// Shift one byte-cycle through the chain
    ///
    /// `byte` goes to `position`, NOP to everyone else. Returns the byte
    /// echoed back in the target slot.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidPosition`] before any bus activity, or a bus error.
    pub fn transfer_byte(&mut self, position: usize, byte: u8) -> Result<u8, Error<IF::Error>> {
        self.check_position(position)?;
        let mut frame = [NOP; MAX_CHAIN];
        frame[position] = byte;
        self.interface.transfer_frame(&mut frame[..self.devices])?;
        Ok(frame[position])
    }

    /// Shift a `bits`-wide value through the chain, MSB first
    ///
    /// Runs `ceil(bits / 8)` byte-cycles and returns the value the target
    /// device echoed back (meaningful after a `GetParam` or `GetStatus`
    /// command byte; garbage otherwise).
    pub fn transfer_value(
        &mut self,
        position: usize,
        value: u32,
        bits: u8,
    ) -> Result<u32, Error<IF::Error>> {
        self.check_position(position)?;
        let mut buf = [0u8; 3];
        let len = codec::encode(value, bits, &mut buf)?.len();
        let mut echoed = [0u8; 3];
        for (out, echo) in buf[..len].iter().zip(echoed[..len].iter_mut()) {
            *echo = self.transfer_byte(position, *out)?;
        }
        codec::decode(&echoed[..len], bits)
    }

    /// Write a parameter register on the device at `position`
    ///
    /// # Errors
    ///
    /// [`Error::InvalidPosition`], [`Error::ReadOnlyRegister`], or
    /// [`Error::ValueOutOfRange`] — all rejected before any bus activity —
    /// or a bus error.
    pub fn set_param(
        &mut self,
        position: usize,
        register: Register,
        value: u32,
    ) -> Result<(), Error<IF::Error>> {
        self.check_position(position)?;
        if !register.is_writable() {
            return Err(Error::ReadOnlyRegister(register));
        }
        if value & !codec::mask(register.bits()) != 0 {
            return Err(Error::ValueOutOfRange {
                value,
                bits: register.bits(),
            });
        }
        self.transfer_byte(position, opcode::SET_PARAM | register.addr())?;
        self.transfer_value(position, value, register.bits())?;
        Ok(())
    }

    /// Read a parameter register from the device at `position`
    pub fn get_param(&mut self, position: usize, register: Register) -> Result<u32, Error<IF::Error>> {
        self.check_position(position)?;
        self.transfer_byte(position, opcode::GET_PARAM | register.addr())?;
        self.transfer_value(position, 0, register.bits())
    }

    /// Issue a one-byte command to the device at `position`
    pub fn command(&mut self, position: usize, op: u8) -> Result<(), Error<IF::Error>> {
        self.transfer_byte(position, op)?;
        Ok(())
    }

    /// Issue a command followed by a `bits`-wide argument
    pub fn command_with_value(
        &mut self,
        position: usize,
        op: u8,
        value: u32,
        bits: u8,
    ) -> Result<(), Error<IF::Error>> {
        self.check_position(position)?;
        self.transfer_byte(position, op)?;
        self.transfer_value(position, value, bits)?;
        Ok(())
    }

    /// Issue `GetStatus`, returning the 16-bit STATUS value
    ///
    /// Unlike reading the STATUS register via `get_param`, this clears the
    /// chip's latched error flags.
    pub fn get_status(&mut self, position: usize) -> Result<u16, Error<IF::Error>> {
        self.check_position(position)?;
        self.transfer_byte(position, opcode::GET_STATUS)?;
        let value = self.transfer_value(position, 0, 16)?;
        Ok(value as u16)
    }
}
