use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::blockchain::ChainReader;
use crate::types::{ChainError, TradeIntent, TxStatus};

/// Scripted behavior for the totalSupply probe of one address
#[derive(Debug, Clone)]
pub enum SupplyBehavior {
    /// Probe succeeds with this supply
    Supply(U256),
    /// Probe reverts (definitive: not a token)
    Revert,
    /// Probe always fails at the transport level
    RpcError,
    /// First n probes fail at the transport level, then succeed
    RpcErrorsThenSupply(u32, U256),
}

#[derive(Debug, Clone)]
pub enum PairBehavior {
    /// Factory knows this pair address
    Pair(Address),
    /// Factory lookup fails at the transport level
    RpcError,
}

#[derive(Debug, Clone)]
pub enum ReservesBehavior {
    Reserves(U256, U256),
    RpcError,
}

#[derive(Debug, Clone)]
pub enum SubmissionBehavior {
    /// Submission accepted, returns this tx hash
    Accept(H256),
    /// Node rejects the transaction outright
    Reject(String),
}

#[derive(Default)]
struct MockState {
    latest_block: u64,
    blocks: HashMap<u64, Vec<H256>>,
    receipts: HashMap<H256, Option<Address>>,
    supplies: HashMap<Address, SupplyBehavior>,
    pairs: HashMap<Address, PairBehavior>,
    reserves: HashMap<Address, ReservesBehavior>,
    submission: Option<SubmissionBehavior>,
    /// Scripted confirmation sequence per tx hash; the last entry repeats
    statuses: HashMap<H256, Vec<TxStatus>>,
    status_cursor: HashMap<H256, usize>,
    probe_calls: HashMap<Address, u32>,
    /// Every intent that reached submit_swap, accepted or not
    submission_attempts: Vec<TradeIntent>,
    /// Intents the mock node accepted
    accepted: Vec<TradeIntent>,
}

/// 체인 리더 목 구현
///
/// 테스트가 블록/영수증/프로브/리저브/제출/확정 응답을 시나리오별로
/// 스크립트할 수 있다. 네트워크 호출 흉내로 약간의 지연을 섞는다.
pub struct MockChainReader {
    state: RwLock<MockState>,
    latency: Duration,
}

impl MockChainReader {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MockState::default()),
            latency: Duration::from_millis(1),
        }
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    pub async fn set_latest_block(&self, height: u64) {
        self.state.write().await.latest_block = height;
    }

    pub async fn add_block(&self, height: u64, txs: Vec<H256>) {
        let mut state = self.state.write().await;
        state.blocks.insert(height, txs);
        if height > state.latest_block {
            state.latest_block = height;
        }
    }

    pub async fn set_receipt(&self, tx: H256, created: Option<Address>) {
        self.state.write().await.receipts.insert(tx, created);
    }

    pub async fn set_supply(&self, token: Address, behavior: SupplyBehavior) {
        self.state.write().await.supplies.insert(token, behavior);
    }

    pub async fn set_pair(&self, token: Address, behavior: PairBehavior) {
        self.state.write().await.pairs.insert(token, behavior);
    }

    pub async fn set_reserves(&self, pair: Address, behavior: ReservesBehavior) {
        self.state.write().await.reserves.insert(pair, behavior);
    }

    pub async fn set_submission(&self, behavior: SubmissionBehavior) {
        self.state.write().await.submission = Some(behavior);
    }

    pub async fn set_status_sequence(&self, tx: H256, sequence: Vec<TxStatus>) {
        let mut state = self.state.write().await;
        state.statuses.insert(tx, sequence);
        state.status_cursor.insert(tx, 0);
    }

    /// 해당 주소에 대한 프로브 호출 횟수
    pub async fn probe_count(&self, token: Address) -> u32 {
        *self.state.read().await.probe_calls.get(&token).unwrap_or(&0)
    }

    /// submit_swap까지 도달한 의도 수 (거부 포함)
    pub async fn submission_attempts(&self, token: Address) -> usize {
        self.state
            .read()
            .await
            .submission_attempts
            .iter()
            .filter(|i| i.token == token)
            .count()
    }

    /// 노드가 수락한 제출 수
    pub async fn accepted_submissions(&self, token: Address) -> usize {
        self.state
            .read()
            .await
            .accepted
            .iter()
            .filter(|i| i.token == token)
            .count()
    }

    /// 마지막으로 수락된 의도 (필드 왕복 검증용)
    pub async fn last_accepted(&self) -> Option<TradeIntent> {
        self.state.read().await.accepted.last().cloned()
    }

    /// 데모용 블록 생성기 — 주기마다 새 블록을 만들고 확률적으로
    /// 토큰 배포와 유동성 공급을 흉내낸다 (API_MODE=mock 실행 경로)
    pub fn start_block_generation(self: &Arc<Self>, block_time: Duration) {
        let mock = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(block_time);
            let mut tracked: Vec<Address> = Vec::new();

            loop {
                interval.tick().await;
                let mut state = mock.state.write().await;
                state.latest_block += 1;
                let height = state.latest_block;

                let mut txs = Vec::new();

                // ~30% 확률로 새 컨트랙트 배포
                if rand::random::<f64>() < 0.3 {
                    let tx = H256::random();
                    let contract = Address::random();
                    state.receipts.insert(tx, Some(contract));

                    // 60%는 토큰, 40%는 리버트하는 잡컨트랙트
                    if rand::random::<f64>() < 0.6 {
                        state.supplies.insert(
                            contract,
                            SupplyBehavior::Supply(U256::from(rand::random::<u64>())),
                        );
                        tracked.push(contract);
                    } else {
                        state.supplies.insert(contract, SupplyBehavior::Revert);
                    }
                    txs.push(tx);
                }

                // 추적 토큰 중 아직 풀 없는 것에 20% 확률로 유동성 공급
                for token in &tracked {
                    if !state.pairs.contains_key(token) && rand::random::<f64>() < 0.2 {
                        let pair = Address::random();
                        state.pairs.insert(*token, PairBehavior::Pair(pair));
                        state.reserves.insert(
                            pair,
                            ReservesBehavior::Reserves(
                                U256::from(rand::random::<u32>() as u64 + 1),
                                U256::from(rand::random::<u32>() as u64 + 1),
                            ),
                        );
                    }
                }

                if state.submission.is_none() {
                    state.submission = Some(SubmissionBehavior::Accept(H256::random()));
                }

                state.blocks.insert(height, txs.clone());
                debug!("🎭 [MOCK] 블록 {} 생성 ({}개 트랜잭션)", height, txs.len());
            }
        });
        info!("🎭 MockChainReader 블록 생성 시작");
    }
}

impl Default for MockChainReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn latest_block_number(&self) -> Result<u64, ChainError> {
        self.simulate_latency().await;
        Ok(self.state.read().await.latest_block)
    }

    async fn block_transactions(&self, height: u64) -> Result<Option<Vec<H256>>, ChainError> {
        self.simulate_latency().await;
        Ok(self.state.read().await.blocks.get(&height).cloned())
    }

    async fn created_contract(&self, tx_hash: H256) -> Result<Option<Address>, ChainError> {
        self.simulate_latency().await;
        Ok(self
            .state
            .read()
            .await
            .receipts
            .get(&tx_hash)
            .cloned()
            .unwrap_or(None))
    }

    async fn token_total_supply(&self, token: Address) -> Result<U256, ChainError> {
        self.simulate_latency().await;
        let mut state = self.state.write().await;
        let calls = state.probe_calls.entry(token).or_insert(0);
        *calls += 1;
        let attempt = *calls;

        match state.supplies.get(&token) {
            Some(SupplyBehavior::Supply(supply)) => Ok(*supply),
            Some(SupplyBehavior::Revert) | None => {
                Err(ChainError::Revert("execution reverted".to_string()))
            }
            Some(SupplyBehavior::RpcError) => {
                Err(ChainError::Rpc("mock transport failure".to_string()))
            }
            Some(SupplyBehavior::RpcErrorsThenSupply(failures, supply)) => {
                if attempt <= *failures {
                    Err(ChainError::Rpc("mock transport failure".to_string()))
                } else {
                    Ok(*supply)
                }
            }
        }
    }

    async fn pair_for(
        &self,
        _token_a: Address,
        token_b: Address,
    ) -> Result<Option<Address>, ChainError> {
        self.simulate_latency().await;
        match self.state.read().await.pairs.get(&token_b) {
            None => Ok(None),
            Some(PairBehavior::Pair(pair)) => Ok(Some(*pair)),
            Some(PairBehavior::RpcError) => {
                Err(ChainError::Rpc("mock factory failure".to_string()))
            }
        }
    }

    async fn pair_reserves(&self, pair: Address) -> Result<(U256, U256), ChainError> {
        self.simulate_latency().await;
        match self.state.read().await.reserves.get(&pair) {
            None => Ok((U256::zero(), U256::zero())),
            Some(ReservesBehavior::Reserves(r0, r1)) => Ok((*r0, *r1)),
            Some(ReservesBehavior::RpcError) => {
                Err(ChainError::Rpc("mock pair failure".to_string()))
            }
        }
    }

    async fn submit_swap(&self, intent: &TradeIntent) -> Result<H256, ChainError> {
        self.simulate_latency().await;
        let mut state = self.state.write().await;
        state.submission_attempts.push(intent.clone());

        match state.submission.clone() {
            Some(SubmissionBehavior::Accept(tx_hash)) => {
                state.accepted.push(intent.clone());
                Ok(tx_hash)
            }
            Some(SubmissionBehavior::Reject(reason)) => Err(ChainError::Submission(reason)),
            None => Err(ChainError::Submission("no submission behavior scripted".to_string())),
        }
    }

    async fn transaction_status(&self, tx_hash: H256) -> Result<TxStatus, ChainError> {
        self.simulate_latency().await;
        let mut state = self.state.write().await;

        let Some(sequence) = state.statuses.get(&tx_hash).cloned() else {
            return Ok(TxStatus::Pending);
        };
        if sequence.is_empty() {
            return Ok(TxStatus::Pending);
        }

        let cursor = state.status_cursor.entry(tx_hash).or_insert(0);
        let status = sequence[(*cursor).min(sequence.len() - 1)];
        if *cursor < sequence.len() - 1 {
            *cursor += 1;
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_supply_behaviors() {
        let mock = MockChainReader::new();
        let token = Address::random();
        let flaky = Address::random();

        mock.set_supply(token, SupplyBehavior::Supply(U256::from(1000u64))).await;
        mock.set_supply(flaky, SupplyBehavior::RpcErrorsThenSupply(2, U256::from(7u64))).await;

        assert_eq!(mock.token_total_supply(token).await.unwrap(), U256::from(1000u64));

        // 두 번 실패 후 성공
        assert!(mock.token_total_supply(flaky).await.is_err());
        assert!(mock.token_total_supply(flaky).await.is_err());
        assert_eq!(mock.token_total_supply(flaky).await.unwrap(), U256::from(7u64));
        assert_eq!(mock.probe_count(flaky).await, 3);

        // 스크립트 없는 주소는 리버트 (코드 없는 주소와 동일 취급)
        let unknown = Address::random();
        assert!(matches!(
            mock.token_total_supply(unknown).await,
            Err(ChainError::Revert(_))
        ));
    }

    #[test]
    fn test_unscripted_chain_starts_empty() {
        tokio_test::block_on(async {
            let mock = MockChainReader::new();
            assert_eq!(mock.latest_block_number().await.unwrap(), 0);
            assert_eq!(mock.block_transactions(1).await.unwrap(), None);
            assert_eq!(
                mock.created_contract(H256::random()).await.unwrap(),
                None
            );
        });
    }

    #[tokio::test]
    async fn test_status_sequence_repeats_last() {
        let mock = MockChainReader::new();
        let tx = H256::random();
        mock.set_status_sequence(tx, vec![TxStatus::Pending, TxStatus::Confirmed]).await;

        assert_eq!(mock.transaction_status(tx).await.unwrap(), TxStatus::Pending);
        assert_eq!(mock.transaction_status(tx).await.unwrap(), TxStatus::Confirmed);
        // 마지막 상태 반복
        assert_eq!(mock.transaction_status(tx).await.unwrap(), TxStatus::Confirmed);
    }
}
