//! Physical-unit conversions
//!
//! The dSPIN stores motion quantities as fixed-point integers derived from
//! its 250 ns internal tick. Each conversion here is a pure function with a
//! documented scale factor; forward conversions round half away from zero
//! and saturate at the register's maximum representable value, so a running
//! profile never fails on an oversized request — it pins at the limit
//! instead.
//!
//! Saturation doubles as the acceleration sentinel: requesting more than
//! [`ACC_INFINITE_THRESHOLD`] steps/s² produces the all-ones encoding, which
//! the chip interprets as "no acceleration limiting".

use libm::roundf;

/// Register LSBs per step/s² for ACC and DEC (tick-derived)
pub const ACC_SCALE: f32 = 0.137438;
/// Register LSBs per step/s for MAX_SPEED and FS_SPD (tick × 2^18)
pub const MAX_SPEED_SCALE: f32 = 0.065536;
/// Register LSBs per step/s for MIN_SPEED and INT_SPEED (tick × 2^24)
pub const MIN_SPEED_SCALE: f32 = 4.1943;
/// Register LSBs per step/s for the 20-bit SPEED readout and the RUN
/// command argument (tick × 2^28)
pub const SPEED_SCALE: f32 = 67.106;

/// Accelerations at or above this saturate ACC/DEC at the all-ones
/// encoding, which disables acceleration limiting entirely
pub const ACC_INFINITE_THRESHOLD: f32 = 29802.0;

/// Overcurrent threshold step size in milliamps
pub const OCD_STEP_MA: f32 = 375.0;
/// Stall threshold step size in milliamps
pub const STALL_STEP_MA: f32 = 31.25;

/// Round half away from zero, clamp to `0..=max`
fn to_reg(value: f32, scale: f32, max: u32) -> u32 {
    let raw = roundf(value * scale);
    if raw <= 0.0 {
        0
    } else if raw >= max as f32 {
        max
    } else {
        raw as u32
    }
}

/// Convert an acceleration in steps/s² to the 12-bit ACC/DEC encoding
///
/// Values at or above [`ACC_INFINITE_THRESHOLD`] yield `0xFFF`, the
/// infinite-acceleration sentinel.
#[must_use]
pub fn acc_to_reg(steps_per_s2: f32) -> u32 {
    to_reg(steps_per_s2, ACC_SCALE, 0xFFF)
}

/// Inverse of [`acc_to_reg`]
#[must_use]
pub fn acc_from_reg(reg: u32) -> f32 {
    reg as f32 / ACC_SCALE
}

/// Convert a speed in steps/s to the 10-bit MAX_SPEED encoding
#[must_use]
pub fn max_speed_to_reg(steps_per_s: f32) -> u32 {
    to_reg(steps_per_s, MAX_SPEED_SCALE, 0x3FF)
}

/// Inverse of [`max_speed_to_reg`]
#[must_use]
pub fn max_speed_from_reg(reg: u32) -> f32 {
    reg as f32 / MAX_SPEED_SCALE
}

/// Convert a speed in steps/s to the 12-bit speed part of MIN_SPEED
///
/// The LSPD_OPT flag (bit 12) is a separate sub-field and is not part of
/// this conversion.
#[must_use]
pub fn min_speed_to_reg(steps_per_s: f32) -> u32 {
    to_reg(steps_per_s, MIN_SPEED_SCALE, 0xFFF)
}

/// Inverse of [`min_speed_to_reg`]
#[must_use]
pub fn min_speed_from_reg(reg: u32) -> f32 {
    (reg & 0xFFF) as f32 / MIN_SPEED_SCALE
}

/// Convert a speed in steps/s to the 10-bit FS_SPD encoding
///
/// The datasheet threshold formula carries an intrinsic −0.5 LSB offset:
/// the chip leaves microstepping when speed exceeds `(FS_SPD + 0.5)` LSBs.
#[must_use]
pub fn fs_speed_to_reg(steps_per_s: f32) -> u32 {
    let raw = roundf(steps_per_s * MAX_SPEED_SCALE - 0.5);
    if raw <= 0.0 {
        0
    } else if raw >= 0x3FF as f32 {
        0x3FF
    } else {
        raw as u32
    }
}

/// Inverse of [`fs_speed_to_reg`]
#[must_use]
pub fn fs_speed_from_reg(reg: u32) -> f32 {
    (reg as f32 + 0.5) / MAX_SPEED_SCALE
}

/// Convert a speed in steps/s to the 14-bit INT_SPEED encoding
#[must_use]
pub fn int_speed_to_reg(steps_per_s: f32) -> u32 {
    to_reg(steps_per_s, MIN_SPEED_SCALE, 0x3FFF)
}

/// Inverse of [`int_speed_to_reg`]
#[must_use]
pub fn int_speed_from_reg(reg: u32) -> f32 {
    reg as f32 / MIN_SPEED_SCALE
}

/// Convert a speed in steps/s to the 20-bit SPEED/RUN encoding
#[must_use]
pub fn speed_to_reg(steps_per_s: f32) -> u32 {
    to_reg(steps_per_s, SPEED_SCALE, 0xF_FFFF)
}

/// Inverse of [`speed_to_reg`]; decodes the read-only SPEED register
#[must_use]
pub fn speed_from_reg(reg: u32) -> f32 {
    reg as f32 / SPEED_SCALE
}

/// Convert an output-voltage fraction (0.0–1.0 of the supply) to the
/// 8-bit KVAL encoding
#[must_use]
pub fn kval_to_reg(fraction: f32) -> u32 {
    to_reg(fraction, 255.0, 0xFF)
}

/// Inverse of [`kval_to_reg`]
#[must_use]
pub fn kval_from_reg(reg: u32) -> f32 {
    reg as f32 / 255.0
}

/// Convert an overcurrent threshold in milliamps to the 4-bit OCD_TH
/// encoding (375 mA per step, first step at 375 mA)
#[must_use]
pub fn ocd_threshold_to_reg(milliamps: f32) -> u32 {
    let steps = roundf(milliamps / OCD_STEP_MA) as i32 - 1;
    steps.clamp(0, 0xF) as u32
}

/// Inverse of [`ocd_threshold_to_reg`]
#[must_use]
pub fn ocd_threshold_from_reg(reg: u32) -> f32 {
    (reg + 1) as f32 * OCD_STEP_MA
}

/// Convert a stall threshold in milliamps to the 7-bit STALL_TH encoding
/// (31.25 mA per step, first step at 31.25 mA)
#[must_use]
pub fn stall_threshold_to_reg(milliamps: f32) -> u32 {
    let steps = roundf(milliamps / STALL_STEP_MA) as i32 - 1;
    steps.clamp(0, 0x7F) as u32
}

/// Inverse of [`stall_threshold_to_reg`]
#[must_use]
pub fn stall_threshold_from_reg(reg: u32) -> f32 {
    (reg + 1) as f32 * STALL_STEP_MA
}

/// Convert a signed microstep position to the 22-bit two's-complement
/// ABS_POS/MARK/GOTO encoding
///
/// Positions outside ±2^21 wrap, matching the chip's own position counter.
#[must_use]
pub const fn position_to_reg(position: i32) -> u32 {
    (position as u32) & 0x3F_FFFF
}

/// Inverse of [`position_to_reg`]: sign-extend a 22-bit register value
#[must_use]
pub const fn position_from_reg(reg: u32) -> i32 {
    ((reg << 10) as i32) >> 10
}
