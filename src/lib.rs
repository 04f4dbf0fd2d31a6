#![no_std]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod chain;
pub mod codec;
pub mod command;
pub mod device;
pub mod interface;
pub mod motion;
pub mod registers;
pub mod status;

// Re-export main types
pub use chain::Chain;
pub use command::{Direction, SwitchAction};
pub use device::{Microsteps, Motor, NoBusy, SlewRate};
pub use interface::{ChainInterface, SpiInterface};
pub use registers::{Access, Field, Register};
pub use status::{MotorState, Status};

/// Filler byte shifted through every non-target chain slot.
///
/// The dSPIN command decoder treats `0x00` as NOP, so padding a frame with
/// it leaves the other chips on the chain untouched.
pub const NOP: u8 = 0x00;

/// Widest parameter field in the dSPIN family.
///
/// `ABS_POS` and `MARK` are 22 bits; no register exceeds that.
pub const MAX_PARAM_BITS: u8 = 22;

/// Longest daisy chain the driver supports.
///
/// Bounds the frame buffer used for one byte-cycle (the crate carries no
/// allocator). Eight matches the deepest stack of evaluation boards the
/// vendor documents on one bus.
pub const MAX_CHAIN: usize = 8;

/// Driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Communication error on the shared bus
    Bus(E),
    /// Reading the dedicated busy/flag line failed
    Pin,
    /// Parameter address is not in the register table
    UnknownRegister(u8),
    /// Field width of zero or beyond [`MAX_PARAM_BITS`]
    ///
    /// Widths come from the static registry, so hitting this outside the
    /// raw codec API indicates a registry bug rather than a caller error.
    InvalidWidth(u8),
    /// Chain position outside the configured chain length
    ///
    /// Rejected before any bus activity; no partial transaction occurs.
    InvalidPosition {
        /// Position that was requested
        position: usize,
        /// Number of devices on the chain
        devices: usize,
    },
    /// Value does not fit the register's declared bit width
    ValueOutOfRange {
        /// Value that was passed
        value: u32,
        /// Declared width of the register
        bits: u8,
    },
    /// Attempted to write a read-only register
    ReadOnlyRegister(Register),
    /// Chain length of zero or beyond [`MAX_CHAIN`]
    InvalidChainLength(usize),
}

impl<E> From<E> for Error<E> {
    fn from(error: E) -> Self {
        Self::Bus(error)
    }
}
