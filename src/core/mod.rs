pub mod block_ingestor;
pub mod liquidity_monitor;
pub mod sniper_core;
pub mod token_classifier;
pub mod token_registry;
pub mod trade_executor;

pub use block_ingestor::BlockIngestor;
pub use liquidity_monitor::{LiquidityMonitor, SweepOutcome};
pub use sniper_core::{SniperCore, SniperStatus};
pub use token_classifier::TokenClassifier;
pub use token_registry::{EvictionReport, TokenRegistry};
pub use trade_executor::TradeExecutor;
