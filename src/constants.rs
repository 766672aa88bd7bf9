use anyhow::{anyhow, Result};
use ethers::types::{Address, U256};
use std::str::FromStr;

// Time constants (in seconds)
pub const BLOCK_TIME: u64 = 12;
pub const DEFAULT_SWEEP_INTERVAL: u64 = 60;
pub const DEFAULT_MAX_TRACKED_AGE: u64 = 86_400; // 24 hours
pub const DEFAULT_TRADE_DEADLINE: u64 = 1_200; // 20 minutes
pub const DEFAULT_MAX_CONFIRMATION_WAIT: u64 = 600;
pub const DEFAULT_CONFIRMATION_POLL_INTERVAL: u64 = 15;
pub const DEFAULT_TERMINAL_RETENTION: u64 = 3_600;

// Gas limits
pub const DEFAULT_SWAP_GAS_LIMIT: u64 = 200_000;

// Base asset + Uniswap V2 addresses (mainnet, checksummed)
pub const WETH: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";
pub const UNISWAP_V2_FACTORY: &str = "0x5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f";
pub const UNISWAP_V2_ROUTER: &str = "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D";

// Function selectors — ERC-20 capability probes
pub const SEL_TOTAL_SUPPLY: &str = "0x18160ddd";
pub const SEL_BALANCE_OF: &str = "0x70a08231";
pub const SEL_TRANSFER: &str = "0xa9059cbb";
pub const SEL_APPROVE: &str = "0x095ea7b3";

// Function selectors — Uniswap V2
pub const SEL_SWAP_EXACT_ETH_FOR_TOKENS: &str = "0x7ff36ab5";
pub const SEL_GET_PAIR: &str = "0xe6a43905";
pub const SEL_GET_RESERVES: &str = "0x0902f1ac";

/// Parse a well-known address constant. Panics only on a malformed literal,
/// which is a programming error, so this is restricted to the consts above.
pub fn known_address(s: &str) -> Address {
    Address::from_str(s).expect("invalid built-in address constant")
}

pub fn weth_address() -> Address {
    known_address(WETH)
}

pub fn uniswap_v2_factory() -> Address {
    known_address(UNISWAP_V2_FACTORY)
}

pub fn uniswap_v2_router() -> Address {
    known_address(UNISWAP_V2_ROUTER)
}

// Helper to format native-asset amounts for logs
pub fn format_eth_amount(wei: U256) -> String {
    format!("{} ETH", ethers::utils::format_ether(wei))
}

// Helper to parse native-asset amounts from config strings
pub fn parse_eth_amount(eth_str: &str) -> Result<U256> {
    ethers::utils::parse_ether(eth_str).map_err(|e| anyhow!("invalid ETH amount '{}': {}", eth_str, e))
}
