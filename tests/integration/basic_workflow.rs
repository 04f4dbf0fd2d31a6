//! Integration test: full bring-up and motion workflow on a chain

use crate::common::test_utils::{MockDelay, MockResetPin};
use crate::common::create_mock_chain;
use l6470::registers::fields;
use l6470::{device, motion, Direction, Microsteps, Motor, Register, Status};

#[test]
fn test_reset_pulse_shape() {
    let mut reset = MockResetPin::new();
    let log = reset.clone();

    device::hard_reset(&mut reset, &mut MockDelay).unwrap();

    // Low then high, nothing else.
    assert_eq!(log.transitions(), vec![false, true]);
}

#[test]
fn test_three_motor_bring_up_and_move() {
    let (mut chain, mock) = create_mock_chain(3);
    let motors = [Motor::new(0), Motor::new(1), Motor::new(2)];

    // Power-up status is clean on every device.
    for motor in &motors {
        let status = motor.get_status(&mut chain).unwrap();
        assert!(!status.has_fault());
        assert!(status.hiz());
    }

    // Per-device motion profiles.
    for (i, motor) in motors.iter().enumerate() {
        let speed = 200.0 * (i + 1) as f32;
        motor.set_max_speed(&mut chain, speed).unwrap();
        motor.set_acceleration(&mut chain, 1000.0).unwrap();
        motor.set_deceleration(&mut chain, 1000.0).unwrap();
        motor.set_kval_run(&mut chain, 0.25).unwrap();
        motor.set_step_mode(&mut chain, Microsteps::Sixteenth).unwrap();
    }

    // Each chip holds its own profile; nothing leaked across slots.
    assert_eq!(mock.register(0, Register::MaxSpeed), motion::max_speed_to_reg(200.0));
    assert_eq!(mock.register(1, Register::MaxSpeed), motion::max_speed_to_reg(400.0));
    assert_eq!(mock.register(2, Register::MaxSpeed), motion::max_speed_to_reg(600.0));
    for i in 0..3 {
        assert_eq!(mock.register(i, Register::KvalRun), 64);
        assert_eq!(
            fields::STEP_SEL.extract(mock.register(i, Register::StepMode)),
            Microsteps::Sixteenth as u32
        );
    }

    // Move the middle motor only.
    mock.set_busy(1, true);
    motors[1].move_steps(&mut chain, Direction::Forward, 3200).unwrap();
    assert_eq!(mock.commands(1).last(), Some(&(0x41, 3200)));

    let mut busy_motor = Motor::new(1);
    assert!(busy_motor.is_busy(&mut chain).unwrap());
    mock.set_busy(1, false);
    assert!(!busy_motor.is_busy(&mut chain).unwrap());

    // Sibling devices never decoded a motion command.
    assert!(mock.commands(0).iter().all(|&(op, _)| op & 0xE0 == 0x20 || op == 0xD0));
    assert!(mock.commands(2).iter().all(|&(op, _)| op & 0xE0 == 0x20 || op == 0xD0));
}

#[test]
fn test_position_workflow() {
    let (mut chain, mock) = create_mock_chain(2);
    let motor = Motor::new(0);

    motor.reset_position(&mut chain).unwrap();
    assert_eq!(mock.commands(0).last(), Some(&(0xD8, 0)));

    // The chip tracks position; simulate a completed move and read back.
    mock.set_register(0, Register::AbsPos, motion::position_to_reg(-12_800));
    assert_eq!(motor.abs_pos(&mut chain).unwrap(), -12_800);

    motor.set_mark(&mut chain, -12_800).unwrap();
    assert_eq!(motor.mark(&mut chain).unwrap(), -12_800);

    motor.goto(&mut chain, 0).unwrap();
    assert_eq!(mock.commands(0).last(), Some(&(0x60, 0)));

    motor.soft_stop(&mut chain).unwrap();
    motor.hard_hiz(&mut chain).unwrap();
}

#[test]
fn test_status_after_fault_and_clear() {
    let (mut chain, mock) = create_mock_chain(1);
    let motor = Motor::new(0);

    // Simulate an overcurrent event (active-low latch pulled down).
    mock.set_status(0, 0x7E03 & !(1 << 12));

    let status = motor.get_status(&mut chain).unwrap();
    assert!(status.overcurrent());
    assert!(status.has_fault());

    // GetStatus cleared the latch; the next read is clean.
    let status = motor.get_status(&mut chain).unwrap();
    assert_eq!(status, Status::from_raw(0x7E03));
    assert!(!status.has_fault());
}
