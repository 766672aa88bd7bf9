pub mod chain_mock;

pub use chain_mock::{MockChainReader, PairBehavior, ReservesBehavior, SubmissionBehavior, SupplyBehavior};

use std::env;

/// Check if mock mode is enabled
pub fn is_mock_mode() -> bool {
    env::var("API_MODE").unwrap_or_default() == "mock"
}
