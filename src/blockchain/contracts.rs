use std::sync::Arc;

use anyhow::Result;
use ethers::{
    abi::Abi,
    contract::Contract,
    middleware::SignerMiddleware,
    providers::{Http, Provider},
    signers::LocalWallet,
    types::{Address, H256, U256},
};
use once_cell::sync::Lazy;

use crate::types::TradeIntent;

/// 서명 가능한 미들웨어 (제출 경로 전용)
pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

static ERC20_ABI: Lazy<Abi> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../abi/erc20.json")).expect("invalid erc20 ABI")
});

static FACTORY_ABI: Lazy<Abi> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../abi/uniswap_v2_factory.json"))
        .expect("invalid factory ABI")
});

static PAIR_ABI: Lazy<Abi> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../abi/uniswap_v2_pair.json")).expect("invalid pair ABI")
});

static ROUTER_ABI: Lazy<Abi> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../abi/uniswap_v2_router.json"))
        .expect("invalid router ABI")
});

/// ERC-20 읽기 전용 래퍼 — 분류 프로브에 사용
pub struct Erc20Contract {
    contract: Contract<Provider<Http>>,
}

impl Erc20Contract {
    pub fn new(address: Address, provider: Arc<Provider<Http>>) -> Self {
        Self {
            contract: Contract::new(address, ERC20_ABI.clone(), provider),
        }
    }

    /// 총 공급량 프로브. 리버트 또는 빈 반환(코드 없는 주소)이면 에러
    pub async fn total_supply(&self) -> Result<U256> {
        let supply: U256 = self.contract.method("totalSupply", ())?.call().await?;
        Ok(supply)
    }

    pub async fn balance_of(&self, owner: Address) -> Result<U256> {
        let balance: U256 = self.contract.method("balanceOf", owner)?.call().await?;
        Ok(balance)
    }
}

/// Uniswap V2 팩토리 래퍼
pub struct FactoryContract {
    contract: Contract<Provider<Http>>,
}

impl FactoryContract {
    pub fn new(address: Address, provider: Arc<Provider<Http>>) -> Self {
        Self {
            contract: Contract::new(address, FACTORY_ABI.clone(), provider),
        }
    }

    /// 두 토큰의 페어 주소 조회. 페어 미존재 시 제로 주소 반환
    pub async fn get_pair(&self, token_a: Address, token_b: Address) -> Result<Address> {
        let pair: Address = self
            .contract
            .method("getPair", (token_a, token_b))?
            .call()
            .await?;
        Ok(pair)
    }
}

/// Uniswap V2 페어 래퍼
pub struct PairContract {
    contract: Contract<Provider<Http>>,
}

impl PairContract {
    pub fn new(address: Address, provider: Arc<Provider<Http>>) -> Self {
        Self {
            contract: Contract::new(address, PAIR_ABI.clone(), provider),
        }
    }

    /// 리저브 조회. 반환 순서는 토큰 주소 정렬 기준(token0, token1)
    pub async fn get_reserves(&self) -> Result<(U256, U256)> {
        let (reserve0, reserve1, _ts): (U256, U256, u32) =
            self.contract.method("getReserves", ())?.call().await?;
        Ok((reserve0, reserve1))
    }
}

/// Uniswap V2 라우터 래퍼 — 매수 제출 경로
pub struct RouterContract {
    contract: Contract<SignerClient>,
}

impl RouterContract {
    pub fn new(address: Address, client: Arc<SignerClient>) -> Self {
        Self {
            contract: Contract::new(address, ROUTER_ABI.clone(), client),
        }
    }

    /// swapExactETHForTokens 제출. 의도의 다섯 필드를 그대로 인코딩한다
    pub async fn swap_exact_eth_for_tokens(
        &self,
        intent: &TradeIntent,
        gas_limit: u64,
    ) -> Result<H256> {
        let call = self
            .contract
            .method::<_, Vec<U256>>(
                "swapExactETHForTokens",
                (
                    intent.amount_out_min,
                    intent.path.clone(),
                    intent.recipient,
                    U256::from(intent.deadline),
                ),
            )?
            .value(intent.amount_in)
            .gas(gas_limit);

        let pending = call.send().await?;
        Ok(*pending)
    }
}
