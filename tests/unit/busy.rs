//! Unit tests for busy-state polling
//!
//! Busy can come from a dedicated BUSY line or from STATUS bit 1; the two
//! paths must agree whenever they model the same physical state.

use crate::common::test_utils::MockBusyPin;
use crate::common::create_mock_chain;
use l6470::{Error, Motor, Register};

#[test]
fn test_busy_from_status_register() {
    let (mut chain, mock) = create_mock_chain(2);
    let mut motor = Motor::new(1);

    mock.set_busy(1, true);
    assert!(motor.is_busy(&mut chain).unwrap());

    mock.set_busy(1, false);
    assert!(!motor.is_busy(&mut chain).unwrap());
}

#[test]
fn test_busy_from_dedicated_line() {
    let (mut chain, mock) = create_mock_chain(1);
    let (pin, handle) = MockBusyPin::new();
    let mut motor = Motor::with_busy_pin(0, pin);

    handle.set_busy(true);
    assert!(motor.is_busy(&mut chain).unwrap());

    handle.set_busy(false);
    assert!(!motor.is_busy(&mut chain).unwrap());

    // The dedicated line answers without touching the bus.
    assert!(mock.frames().is_empty());
}

#[test]
fn test_busy_paths_agree() {
    let (mut chain, mock) = create_mock_chain(1);
    let (pin, handle) = MockBusyPin::new();

    let mut with_line = Motor::with_busy_pin(0, pin);
    let mut without_line = Motor::new(0);

    for busy in [true, false] {
        // One physical state, reflected on both the line and the register.
        handle.set_busy(busy);
        mock.set_busy(0, busy);

        assert_eq!(with_line.is_busy(&mut chain).unwrap(), busy);
        assert_eq!(without_line.is_busy(&mut chain).unwrap(), busy);
    }
}

#[test]
fn test_status_path_costs_a_transaction() {
    let (mut chain, mock) = create_mock_chain(3);
    let mut motor = Motor::new(2);

    motor.is_busy(&mut chain).unwrap();

    // GET_PARAM opcode frame plus two data frames for the 16-bit STATUS.
    let frames = mock.frames();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0][2], 0x20 | Register::Status.addr());
}

#[test]
fn test_status_poll_leaves_latches_alone() {
    let (mut chain, mock) = create_mock_chain(1);
    let mut motor = Motor::new(0);

    mock.set_status(0, 0x7E03 | (1 << 8));
    motor.is_busy(&mut chain).unwrap();

    assert_ne!(
        mock.register(0, Register::Status) & (1 << 8),
        0,
        "polling busy must not clear latched flags"
    );
}

#[test]
fn test_busy_pin_failure_reported() {
    let (mut chain, _mock) = create_mock_chain(1);
    let (pin, handle) = MockBusyPin::new();
    let mut motor = Motor::with_busy_pin(0, pin);

    handle.fail_next_read();
    assert_eq!(motor.is_busy(&mut chain), Err(Error::Pin));

    // A single failure does not poison the handle.
    assert!(motor.is_busy(&mut chain).is_ok());
}
