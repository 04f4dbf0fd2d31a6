//! Test utilities and helper functions

use crate::common::mock_interface::MockChain;
use l6470::Chain;
use std::cell::Cell;
use std::rc::Rc;

/// Mock delay implementation for testing
///
/// No-op delay implementing the embedded-hal `DelayNs` trait for tests
/// where actual waiting is pointless.
#[derive(Debug, Clone, Copy)]
pub struct MockDelay;

impl embedded_hal::delay::DelayNs for MockDelay {
    fn delay_ns(&mut self, _ns: u32) {}

    fn delay_us(&mut self, _us: u32) {}

    fn delay_ms(&mut self, _ms: u32) {}
}

/// Mock digital input used as a dedicated BUSY line
///
/// The pin's level is shared through a handle so tests can toggle it while
/// the motor owns the pin.
#[derive(Debug, Clone)]
pub struct MockBusyPin {
    level_high: Rc<Cell<bool>>,
    fail: Rc<Cell<bool>>,
}

/// Control handle for a [`MockBusyPin`]
#[derive(Debug, Clone)]
pub struct MockBusyHandle {
    level_high: Rc<Cell<bool>>,
    fail: Rc<Cell<bool>>,
}

impl MockBusyPin {
    /// Create a pin (idle high, i.e. not busy) and its control handle
    pub fn new() -> (Self, MockBusyHandle) {
        let level_high = Rc::new(Cell::new(true));
        let fail = Rc::new(Cell::new(false));
        (
            Self {
                level_high: level_high.clone(),
                fail: fail.clone(),
            },
            MockBusyHandle { level_high, fail },
        )
    }
}

impl MockBusyHandle {
    /// Drive the line: busy pulls it low (active-low convention)
    pub fn set_busy(&self, busy: bool) {
        self.level_high.set(!busy);
    }

    /// Make the next read fail
    pub fn fail_next_read(&self) {
        self.fail.set(true);
    }
}

/// Mock pin error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPinError;

impl embedded_hal::digital::Error for MockPinError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

impl embedded_hal::digital::ErrorType for MockBusyPin {
    type Error = MockPinError;
}

impl embedded_hal::digital::InputPin for MockBusyPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        if self.fail.replace(false) {
            return Err(MockPinError);
        }
        Ok(self.level_high.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

/// Mock digital output used as the STBY/RESET line
///
/// Records every level transition so tests can check the pulse shape.
#[derive(Debug, Clone, Default)]
pub struct MockResetPin {
    transitions: Rc<RefCellVec>,
}

type RefCellVec = std::cell::RefCell<Vec<bool>>;

impl MockResetPin {
    /// Create a pin with an empty transition log
    pub fn new() -> Self {
        Self::default()
    }

    /// Levels the pin was driven to, oldest first (`true` = high)
    pub fn transitions(&self) -> Vec<bool> {
        self.transitions.borrow().clone()
    }
}

impl embedded_hal::digital::ErrorType for MockResetPin {
    type Error = core::convert::Infallible;
}

impl embedded_hal::digital::OutputPin for MockResetPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.transitions.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.transitions.borrow_mut().push(true);
        Ok(())
    }
}

/// Create a chain engine of `devices` simulated chips
///
/// Returns (chain, mock) where the mock is a handle sharing state with the
/// interface the chain owns.
pub fn create_mock_chain(devices: usize) -> (Chain<MockChain>, MockChain) {
    let mock = MockChain::new(devices);
    let handle = mock.clone();
    let chain = Chain::new(mock, devices).expect("failed to create mock chain");
    (chain, handle)
}
