use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers::{
    contract::ContractError,
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{Address, BlockNumber, H256, U256, U64},
};
use tracing::{debug, info, warn};

use crate::blockchain::contracts::{Erc20Contract, FactoryContract, PairContract, RouterContract};
use crate::config::Config;
use crate::types::{ChainError, TradeIntent, TxStatus};

/// 코어가 소비하는 체인 접근 계약
///
/// 모든 호출은 일시적으로 실패할 수 있다. 타임아웃과 노드 장애는
/// ChainError::Rpc로, 컨트랙트 리버트는 ChainError::Revert로 구분된다.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// 최신 블록 높이
    async fn latest_block_number(&self) -> Result<u64, ChainError>;

    /// 블록의 트랜잭션 해시 목록. 아직 없는 블록이면 None
    async fn block_transactions(&self, height: u64) -> Result<Option<Vec<H256>>, ChainError>;

    /// 영수증에서 생성된 컨트랙트 주소. 컨트랙트 생성 트랜잭션이 아니면 None
    async fn created_contract(&self, tx_hash: H256) -> Result<Option<Address>, ChainError>;

    /// ERC-20 totalSupply 프로브
    async fn token_total_supply(&self, token: Address) -> Result<U256, ChainError>;

    /// 팩토리 getPair 조회. 페어 미존재(제로 주소)면 None
    async fn pair_for(
        &self,
        token_a: Address,
        token_b: Address,
    ) -> Result<Option<Address>, ChainError>;

    /// 페어 리저브 (token0, token1 순)
    async fn pair_reserves(&self, pair: Address) -> Result<(U256, U256), ChainError>;

    /// 매수 제출. 실패는 해당 토큰에 대해 종결적 (재시도 없음 — 이중 지출 방지)
    async fn submit_swap(&self, intent: &TradeIntent) -> Result<H256, ChainError>;

    /// 제출된 트랜잭션의 확정 상태
    async fn transaction_status(&self, tx_hash: H256) -> Result<TxStatus, ChainError>;
}

/// 블록체인 RPC 클라이언트
///
/// 실제 노드에 대한 ChainReader 구현. 읽기는 HTTP Provider, 제출은
/// SignerMiddleware 경로를 쓴다.
pub struct BlockchainClient {
    provider: Arc<Provider<Http>>,
    factory: FactoryContract,
    router: Option<RouterContract>,
    wallet_address: Option<Address>,
    gas_limit: u64,
    rpc_timeout: Duration,
    chain_id: u64,
}

impl BlockchainClient {
    /// 새로운 블록체인 클라이언트 생성
    pub async fn new(config: &Config) -> Result<Self> {
        info!("🔌 블록체인 RPC 클라이언트 초기화: {}", config.network.rpc_url);

        let provider = Provider::<Http>::try_from(config.network.rpc_url.as_str())?;
        let provider = Arc::new(provider);

        let chain_id = provider.get_chainid().await?.as_u64();
        info!("🔗 체인 ID: {}", chain_id);

        let current_block = provider.get_block_number().await?.as_u64();
        info!("📦 현재 블록: {}", current_block);

        // Wallet이 있으면 제출 경로 구성, 없으면 읽기 전용
        let (router, wallet_address) = match &config.execution.private_key {
            Some(pk) if !pk.is_empty() => {
                let wallet: LocalWallet = pk
                    .parse()
                    .map_err(|e| anyhow!("Invalid private key: {}", e))?;
                let wallet = wallet.with_chain_id(chain_id);
                let address = wallet.address();
                info!("🔑 Wallet 초기화 완료: {}", address);

                let client = Arc::new(SignerMiddleware::new(provider.as_ref().clone(), wallet));
                (
                    Some(RouterContract::new(config.dex.router, client)),
                    Some(address),
                )
            }
            _ => {
                warn!("⚠️ Private key 없음 - 매수 제출 불가 (읽기 전용 모드)");
                (None, None)
            }
        };

        let factory = FactoryContract::new(config.dex.factory, Arc::clone(&provider));

        Ok(Self {
            provider,
            factory,
            router,
            wallet_address,
            gas_limit: config.execution.gas_limit,
            rpc_timeout: Duration::from_millis(config.execution.rpc_timeout_ms),
            chain_id,
        })
    }

    pub fn wallet_address(&self) -> Option<Address> {
        self.wallet_address
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// RPC 호출에 타임아웃을 씌운다. 초과 시 Rpc 오류로 표면화 —
    /// 파이프라인을 무한정 붙잡지 않는다.
    async fn timed<T, Fut>(&self, fut: Fut) -> Result<T, ChainError>
    where
        Fut: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.rpc_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(map_call_error(e)),
            Err(_) => Err(ChainError::Rpc(format!(
                "request timed out after {:?}",
                self.rpc_timeout
            ))),
        }
    }
}

/// 컨트랙트 호출 오류를 분류한다.
///
/// 리버트와 디코딩 실패(실행 코드 없는 주소 포함)는 판정, 그 외는 일시적.
fn map_call_error(err: anyhow::Error) -> ChainError {
    if let Some(ce) = err.downcast_ref::<ContractError<Provider<Http>>>() {
        match ce {
            ContractError::Revert(data) => {
                return ChainError::Revert(format!("execution reverted ({} bytes)", data.len()))
            }
            ContractError::DecodingError(e) => {
                return ChainError::Revert(format!("malformed call result: {}", e))
            }
            ContractError::DetokenizationError(e) => {
                return ChainError::Revert(format!("malformed call result: {}", e))
            }
            _ => {}
        }
    }

    // 다운캐스트가 안 되는 경로의 리버트 문자열 휴리스틱
    let text = err.to_string();
    if text.contains("revert") {
        ChainError::Revert(text)
    } else {
        ChainError::Rpc(text)
    }
}

#[async_trait]
impl ChainReader for BlockchainClient {
    async fn latest_block_number(&self) -> Result<u64, ChainError> {
        let provider = Arc::clone(&self.provider);
        self.timed(async move {
            let number = provider.get_block_number().await?;
            Ok(number.as_u64())
        })
        .await
    }

    async fn block_transactions(&self, height: u64) -> Result<Option<Vec<H256>>, ChainError> {
        let provider = Arc::clone(&self.provider);
        self.timed(async move {
            let block = provider
                .get_block(BlockNumber::Number(height.into()))
                .await?;
            Ok(block.map(|b| b.transactions))
        })
        .await
    }

    async fn created_contract(&self, tx_hash: H256) -> Result<Option<Address>, ChainError> {
        let provider = Arc::clone(&self.provider);
        self.timed(async move {
            let receipt = provider.get_transaction_receipt(tx_hash).await?;
            Ok(receipt.and_then(|r| r.contract_address))
        })
        .await
    }

    async fn token_total_supply(&self, token: Address) -> Result<U256, ChainError> {
        let erc20 = Erc20Contract::new(token, Arc::clone(&self.provider));
        self.timed(async move { erc20.total_supply().await }).await
    }

    async fn pair_for(
        &self,
        token_a: Address,
        token_b: Address,
    ) -> Result<Option<Address>, ChainError> {
        let pair = self
            .timed(self.factory.get_pair(token_a, token_b))
            .await?;
        if pair == Address::zero() {
            Ok(None)
        } else {
            Ok(Some(pair))
        }
    }

    async fn pair_reserves(&self, pair: Address) -> Result<(U256, U256), ChainError> {
        let pair_contract = PairContract::new(pair, Arc::clone(&self.provider));
        self.timed(async move { pair_contract.get_reserves().await })
            .await
    }

    async fn submit_swap(&self, intent: &TradeIntent) -> Result<H256, ChainError> {
        let router = self
            .router
            .as_ref()
            .ok_or_else(|| ChainError::Submission("signer not configured".to_string()))?;

        debug!("📤 매수 제출: {}", intent);

        // 제출 경로의 모든 실패는 Submission으로 종결 처리한다.
        // 타임아웃조차 재시도하지 않는다 — 이미 전파됐을 수 있는 트랜잭션을
        // 다시 보내면 이중 지출이 된다.
        match tokio::time::timeout(
            self.rpc_timeout,
            router.swap_exact_eth_for_tokens(intent, self.gas_limit),
        )
        .await
        {
            Ok(Ok(tx_hash)) => Ok(tx_hash),
            Ok(Err(e)) => Err(ChainError::Submission(e.to_string())),
            Err(_) => Err(ChainError::Submission(format!(
                "submission timed out after {:?}",
                self.rpc_timeout
            ))),
        }
    }

    async fn transaction_status(&self, tx_hash: H256) -> Result<TxStatus, ChainError> {
        let provider = Arc::clone(&self.provider);
        let receipt = self
            .timed(async move {
                let receipt = provider.get_transaction_receipt(tx_hash).await?;
                Ok(receipt)
            })
            .await?;

        match receipt {
            None => Ok(TxStatus::Pending),
            Some(r) => {
                if r.status == Some(U64::one()) {
                    Ok(TxStatus::Confirmed)
                } else {
                    Ok(TxStatus::Reverted)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_call_error_revert_heuristic() {
        let err = anyhow!("execution reverted: TRANSFER_FROM_FAILED");
        assert!(matches!(map_call_error(err), ChainError::Revert(_)));

        let err = anyhow!("connection refused");
        assert!(matches!(map_call_error(err), ChainError::Rpc(_)));
    }
}
