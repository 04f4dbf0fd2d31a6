//! High-level per-device API
//!
//! A [`Motor`] stands for one chip on the chain: it owns its (immutable)
//! chain position and, optionally, the chip's dedicated BUSY/SYNC input
//! line. The shared [`Chain`] engine is borrowed per call, so the borrow
//! checker enforces the one-transaction-in-flight rule at compile time.
//!
//! Configuration setters speak physical units and go through the
//! [`motion`] conversions; option setters splice named sub-fields into
//! `STEP_MODE`/`CONFIG` via a read-splice-write of the whole register.
//! Motion commands are one-shot framings of the vendor opcodes.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::chain::Chain;
use crate::command::{opcode, Direction, SwitchAction};
use crate::interface::ChainInterface;
use crate::registers::{fields, Field, Register};
use crate::status::Status;
use crate::{motion, Error};

/// Hold time for each level of the reset pulse, in milliseconds
const RESET_PULSE_MS: u32 = 5;

/// Microstep resolution, STEP_SEL values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Microsteps {
    /// Full step
    Full = 0,
    /// Half step
    Half = 1,
    /// 1/4 microstep
    Quarter = 2,
    /// 1/8 microstep
    Eighth = 3,
    /// 1/16 microstep
    Sixteenth = 4,
    /// 1/32 microstep
    ThirtySecond = 5,
    /// 1/64 microstep
    SixtyFourth = 6,
    /// 1/128 microstep
    OneTwentyEighth = 7,
}

/// Power bridge output slew rate, POW_SR values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlewRate {
    /// 180 V/µs
    VPerUs180 = 0,
    /// 290 V/µs
    VPerUs290 = 2,
    /// 530 V/µs
    VPerUs530 = 3,
}

/// Placeholder pin type for motors without a dedicated busy line
///
/// Never constructed by the driver; it only satisfies the `BUSY` type
/// parameter of [`Motor::new`] so busy state falls back to the STATUS
/// register.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NoBusy;

impl embedded_hal::digital::ErrorType for NoBusy {
    type Error = core::convert::Infallible;
}

impl InputPin for NoBusy {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(true)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(false)
    }
}

/// One dSPIN device on a chain
pub struct Motor<BUSY> {
    position: usize,
    busy: Option<BUSY>,
}

impl Motor<NoBusy> {
    /// Create a handle for the device at `position`, without a dedicated
    /// busy line
    ///
    /// Busy state is derived from STATUS bit 1, which costs a full
    /// get-parameter transaction per poll.
    #[must_use]
    pub const fn new(position: usize) -> Self {
        Self {
            position,
            busy: None,
        }
    }
}

impl<BUSY> Motor<BUSY> {
    /// Create a handle for the device at `position` with its BUSY/SYNC
    /// line wired to `busy`
    ///
    /// The line is open-drain, active low: low means a command is running.
    #[must_use]
    pub const fn with_busy_pin(position: usize, busy: BUSY) -> Self {
        Self {
            position,
            busy: Some(busy),
        }
    }

    /// Chain position of this device
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }
}

impl<BUSY> Motor<BUSY>
where
    BUSY: InputPin,
{
    /// Whether the device is executing a command
    ///
    /// Reads the dedicated busy line when one is configured; otherwise
    /// falls back to STATUS bit 1 via a get-parameter transaction (which,
    /// unlike `GetStatus`, leaves latched flags alone).
    ///
    /// Busy-waiting on this is the caller's policy, not the driver's.
    pub fn is_busy<IF>(&mut self, chain: &mut Chain<IF>) -> Result<bool, Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        match &mut self.busy {
            Some(pin) => pin.is_low().map_err(|_| Error::Pin),
            None => {
                let raw = chain.get_param(self.position, Register::Status)?;
                Ok(Status::from_raw(raw as u16).is_busy())
            }
        }
    }

    // ---- raw register access -------------------------------------------

    /// Write a parameter register on this device
    pub fn set_param<IF>(
        &self,
        chain: &mut Chain<IF>,
        register: Register,
        value: u32,
    ) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.set_param(self.position, register, value)
    }

    /// Read a parameter register from this device
    pub fn get_param<IF>(
        &self,
        chain: &mut Chain<IF>,
        register: Register,
    ) -> Result<u32, Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.get_param(self.position, register)
    }

    /// Read a named sub-field of a register
    pub fn read_field<IF>(&self, chain: &mut Chain<IF>, field: Field) -> Result<u32, Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        let reg = chain.get_param(self.position, field.register)?;
        Ok(field.extract(reg))
    }

    /// Replace a named sub-field of a register, leaving the rest untouched
    ///
    /// The value's low `field.width` bits replace the field's bits; the
    /// other options packed into the register keep their current settings.
    pub fn write_field<IF>(
        &self,
        chain: &mut Chain<IF>,
        field: Field,
        value: u32,
    ) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        let reg = chain.get_param(self.position, field.register)?;
        chain.set_param(self.position, field.register, field.insert(reg, value))
    }

    // ---- motion profile ------------------------------------------------

    /// Set the profile speed ceiling in steps/s (saturates at the register
    /// maximum, ~15 610 steps/s)
    pub fn set_max_speed<IF>(
        &self,
        chain: &mut Chain<IF>,
        steps_per_s: f32,
    ) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.set_param(
            self.position,
            Register::MaxSpeed,
            motion::max_speed_to_reg(steps_per_s),
        )
    }

    /// Read back the profile speed ceiling in steps/s
    pub fn max_speed<IF>(&self, chain: &mut Chain<IF>) -> Result<f32, Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        Ok(motion::max_speed_from_reg(
            chain.get_param(self.position, Register::MaxSpeed)?,
        ))
    }

    /// Set the profile speed floor in steps/s
    ///
    /// Only the 12-bit speed part is written; the LSPD_OPT flag keeps its
    /// setting.
    pub fn set_min_speed<IF>(
        &self,
        chain: &mut Chain<IF>,
        steps_per_s: f32,
    ) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        let reg = chain.get_param(self.position, Register::MinSpeed)?;
        let lspd_opt = fields::LSPD_OPT.extract(reg);
        let spliced = fields::LSPD_OPT.insert(motion::min_speed_to_reg(steps_per_s), lspd_opt);
        chain.set_param(self.position, Register::MinSpeed, spliced)
    }

    /// Set the microstepping-to-full-step switchover speed in steps/s
    pub fn set_full_speed<IF>(
        &self,
        chain: &mut Chain<IF>,
        steps_per_s: f32,
    ) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.set_param(
            self.position,
            Register::FsSpd,
            motion::fs_speed_to_reg(steps_per_s),
        )
    }

    /// Set the acceleration in steps/s²
    ///
    /// Values of [`motion::ACC_INFINITE_THRESHOLD`] or more disable
    /// acceleration limiting.
    pub fn set_acceleration<IF>(
        &self,
        chain: &mut Chain<IF>,
        steps_per_s2: f32,
    ) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.set_param(self.position, Register::Acc, motion::acc_to_reg(steps_per_s2))
    }

    /// Set the deceleration in steps/s² (same rules as
    /// [`set_acceleration`](Self::set_acceleration))
    pub fn set_deceleration<IF>(
        &self,
        chain: &mut Chain<IF>,
        steps_per_s2: f32,
    ) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.set_param(self.position, Register::Dec, motion::acc_to_reg(steps_per_s2))
    }

    /// Current motor speed in steps/s, from the read-only SPEED register
    pub fn speed<IF>(&self, chain: &mut Chain<IF>) -> Result<f32, Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        Ok(motion::speed_from_reg(
            chain.get_param(self.position, Register::Speed)?,
        ))
    }

    // ---- power and protection ------------------------------------------

    /// Set the holding output voltage as a fraction of the supply (0.0–1.0)
    pub fn set_kval_hold<IF>(&self, chain: &mut Chain<IF>, fraction: f32) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.set_param(self.position, Register::KvalHold, motion::kval_to_reg(fraction))
    }

    /// Set the constant-speed output voltage fraction
    pub fn set_kval_run<IF>(&self, chain: &mut Chain<IF>, fraction: f32) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.set_param(self.position, Register::KvalRun, motion::kval_to_reg(fraction))
    }

    /// Set the acceleration output voltage fraction
    pub fn set_kval_acc<IF>(&self, chain: &mut Chain<IF>, fraction: f32) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.set_param(self.position, Register::KvalAcc, motion::kval_to_reg(fraction))
    }

    /// Set the deceleration output voltage fraction
    pub fn set_kval_dec<IF>(&self, chain: &mut Chain<IF>, fraction: f32) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.set_param(self.position, Register::KvalDec, motion::kval_to_reg(fraction))
    }

    /// Set the overcurrent shutdown threshold in milliamps (375 mA steps)
    pub fn set_ocd_threshold<IF>(
        &self,
        chain: &mut Chain<IF>,
        milliamps: f32,
    ) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.set_param(
            self.position,
            Register::OcdTh,
            motion::ocd_threshold_to_reg(milliamps),
        )
    }

    /// Set the stall detection threshold in milliamps (31.25 mA steps)
    pub fn set_stall_threshold<IF>(
        &self,
        chain: &mut Chain<IF>,
        milliamps: f32,
    ) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.set_param(
            self.position,
            Register::StallTh,
            motion::stall_threshold_to_reg(milliamps),
        )
    }

    // ---- packed options ------------------------------------------------

    /// Select the microstep resolution
    ///
    /// Replaces STEP_SEL (STEP_MODE 2:0) only; the SYNC output options are
    /// untouched. Changing the resolution resets the chip's electrical
    /// position, so do this while stopped.
    pub fn set_step_mode<IF>(
        &self,
        chain: &mut Chain<IF>,
        microsteps: Microsteps,
    ) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        self.write_field(chain, fields::STEP_SEL, microsteps as u32)
    }

    /// Read the current microstep resolution
    pub fn step_mode<IF>(&self, chain: &mut Chain<IF>) -> Result<Microsteps, Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        Ok(match self.read_field(chain, fields::STEP_SEL)? {
            0 => Microsteps::Full,
            1 => Microsteps::Half,
            2 => Microsteps::Quarter,
            3 => Microsteps::Eighth,
            4 => Microsteps::Sixteenth,
            5 => Microsteps::ThirtySecond,
            6 => Microsteps::SixtyFourth,
            _ => Microsteps::OneTwentyEighth,
        })
    }

    /// Configure the BUSY/SYNC pin as a SYNC output at `divider` ticks per
    /// step (`enable` = false reverts it to BUSY)
    pub fn set_sync_output<IF>(
        &self,
        chain: &mut Chain<IF>,
        enable: bool,
        divider: u8,
    ) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        let reg = chain.get_param(self.position, Register::StepMode)?;
        let reg = fields::SYNC_EN.insert(reg, enable as u32);
        let reg = fields::SYNC_SEL.insert(reg, u32::from(divider));
        chain.set_param(self.position, Register::StepMode, reg)
    }

    /// Set the oscillator configuration (CONFIG 3:0, vendor encoding)
    pub fn set_oscillator<IF>(&self, chain: &mut Chain<IF>, osc_sel: u8) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        self.write_field(chain, fields::OSC_SEL, u32::from(osc_sel))
    }

    /// Set the microstepping PWM frequency factors (CONFIG 15:13 integer
    /// division, 12:10 multiplication; vendor encodings)
    pub fn set_pwm_frequency<IF>(
        &self,
        chain: &mut Chain<IF>,
        divisor: u8,
        multiplier: u8,
    ) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        let reg = chain.get_param(self.position, Register::Config)?;
        let reg = fields::F_PWM_INT.insert(reg, u32::from(divisor));
        let reg = fields::F_PWM_DEC.insert(reg, u32::from(multiplier));
        chain.set_param(self.position, Register::Config, reg)
    }

    /// Set the power bridge output slew rate
    pub fn set_slew_rate<IF>(&self, chain: &mut Chain<IF>, rate: SlewRate) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        self.write_field(chain, fields::POW_SR, rate as u32)
    }

    /// Enable or disable bridge shutdown on overcurrent
    pub fn set_oc_shutdown<IF>(&self, chain: &mut Chain<IF>, enable: bool) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        self.write_field(chain, fields::OC_SD, enable as u32)
    }

    /// Enable or disable motor supply voltage compensation
    pub fn set_voltage_comp<IF>(
        &self,
        chain: &mut Chain<IF>,
        enable: bool,
    ) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        self.write_field(chain, fields::EN_VSCOMP, enable as u32)
    }

    /// Choose what the external switch input does: `false` = hard stop,
    /// `true` = user event only
    pub fn set_switch_mode<IF>(
        &self,
        chain: &mut Chain<IF>,
        user_event: bool,
    ) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        self.write_field(chain, fields::SW_MODE, user_event as u32)
    }

    // ---- position ------------------------------------------------------

    /// Current absolute position in microsteps
    pub fn abs_pos<IF>(&self, chain: &mut Chain<IF>) -> Result<i32, Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        Ok(motion::position_from_reg(
            chain.get_param(self.position, Register::AbsPos)?,
        ))
    }

    /// Overwrite the absolute position counter
    pub fn set_abs_pos<IF>(&self, chain: &mut Chain<IF>, microsteps: i32) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.set_param(
            self.position,
            Register::AbsPos,
            motion::position_to_reg(microsteps),
        )
    }

    /// Read the MARK position in microsteps
    pub fn mark<IF>(&self, chain: &mut Chain<IF>) -> Result<i32, Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        Ok(motion::position_from_reg(
            chain.get_param(self.position, Register::Mark)?,
        ))
    }

    /// Set the MARK position in microsteps
    pub fn set_mark<IF>(&self, chain: &mut Chain<IF>, microsteps: i32) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.set_param(self.position, Register::Mark, motion::position_to_reg(microsteps))
    }

    // ---- motion commands -----------------------------------------------

    /// Spin at `steps_per_s` until told otherwise
    pub fn run<IF>(
        &self,
        chain: &mut Chain<IF>,
        direction: Direction,
        steps_per_s: f32,
    ) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.command_with_value(
            self.position,
            opcode::RUN | direction.bit(),
            motion::speed_to_reg(steps_per_s),
            20,
        )
    }

    /// Switch to step-clock mode, stepping once per STCK edge
    pub fn step_clock<IF>(
        &self,
        chain: &mut Chain<IF>,
        direction: Direction,
    ) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.command(self.position, opcode::STEP_CLOCK | direction.bit())
    }

    /// Move `microsteps` in `direction`, then stop
    pub fn move_steps<IF>(
        &self,
        chain: &mut Chain<IF>,
        direction: Direction,
        microsteps: u32,
    ) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.command_with_value(self.position, opcode::MOVE | direction.bit(), microsteps, 22)
    }

    /// Go to an absolute position via the shortest path
    pub fn goto<IF>(&self, chain: &mut Chain<IF>, microsteps: i32) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.command_with_value(
            self.position,
            opcode::GOTO,
            motion::position_to_reg(microsteps),
            22,
        )
    }

    /// Go to an absolute position in a forced direction
    pub fn goto_dir<IF>(
        &self,
        chain: &mut Chain<IF>,
        direction: Direction,
        microsteps: i32,
    ) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.command_with_value(
            self.position,
            opcode::GOTO_DIR | direction.bit(),
            motion::position_to_reg(microsteps),
            22,
        )
    }

    /// Run at `steps_per_s` until the external switch closes
    pub fn go_until<IF>(
        &self,
        chain: &mut Chain<IF>,
        action: SwitchAction,
        direction: Direction,
        steps_per_s: f32,
    ) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.command_with_value(
            self.position,
            opcode::GO_UNTIL | action.bit() | direction.bit(),
            motion::speed_to_reg(steps_per_s),
            20,
        )
    }

    /// Creep at minimum speed until the external switch opens
    pub fn release_switch<IF>(
        &self,
        chain: &mut Chain<IF>,
        action: SwitchAction,
        direction: Direction,
    ) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.command(self.position, opcode::RELEASE_SW | action.bit() | direction.bit())
    }

    /// Go to the zero position
    pub fn go_home<IF>(&self, chain: &mut Chain<IF>) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.command(self.position, opcode::GO_HOME)
    }

    /// Go to the MARK position
    pub fn go_mark<IF>(&self, chain: &mut Chain<IF>) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.command(self.position, opcode::GO_MARK)
    }

    /// Zero the absolute position counter
    pub fn reset_position<IF>(&self, chain: &mut Chain<IF>) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.command(self.position, opcode::RESET_POS)
    }

    /// Reset the chip to its power-up state
    pub fn reset_device<IF>(&self, chain: &mut Chain<IF>) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.command(self.position, opcode::RESET_DEVICE)
    }

    /// Decelerate to a stop, keeping the bridges energized
    pub fn soft_stop<IF>(&self, chain: &mut Chain<IF>) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.command(self.position, opcode::SOFT_STOP)
    }

    /// Stop immediately, keeping the bridges energized
    pub fn hard_stop<IF>(&self, chain: &mut Chain<IF>) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.command(self.position, opcode::HARD_STOP)
    }

    /// Decelerate to a stop, then release the bridges
    pub fn soft_hiz<IF>(&self, chain: &mut Chain<IF>) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.command(self.position, opcode::SOFT_HIZ)
    }

    /// Release the bridges immediately
    pub fn hard_hiz<IF>(&self, chain: &mut Chain<IF>) -> Result<(), Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        chain.command(self.position, opcode::HARD_HIZ)
    }

    /// Read STATUS via `GetStatus`, clearing the latched flags
    pub fn get_status<IF>(&self, chain: &mut Chain<IF>) -> Result<Status, Error<IF::Error>>
    where
        IF: ChainInterface,
    {
        Ok(Status::from_raw(chain.get_status(self.position)?))
    }
}

/// Pulse the shared STBY/RESET line to bring the chip(s) out of reset
///
/// Holds the line low for 5 ms, then high for 5 ms, per the power-up
/// sequence. The line is usually shared by the whole chain, which is why
/// this is a free function rather than a [`Motor`] method.
pub fn hard_reset<RST, D, E>(reset: &mut RST, delay: &mut D) -> Result<(), E>
where
    RST: OutputPin<Error = E>,
    D: DelayNs,
{
    reset.set_low()?;
    delay.delay_ms(RESET_PULSE_MS);
    reset.set_high()?;
    delay.delay_ms(RESET_PULSE_MS);
    Ok(())
}
