pub mod contracts;
pub mod rpc;

pub use contracts::{Erc20Contract, FactoryContract, PairContract, RouterContract};
pub use rpc::{BlockchainClient, ChainReader};
