//! Common test utilities and mock implementations

pub mod test_utils;

pub use mock_interface::{MockChain, MockError};
pub use test_utils::{create_mock_chain, MockBusyPin, MockDelay, MockResetPin};
