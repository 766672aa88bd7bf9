use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use ethers::types::{Address, H256, U256};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::blockchain::ChainReader;
use crate::common::time::deadline_after;
use crate::config::Config;
use crate::constants::format_eth_amount;
use crate::core::token_registry::TokenRegistry;
use crate::types::{SniperStats, TokenState, TradeIntent, TransitionResult, TxStatus};

/// 매수 실행기
///
/// LiquidityConfirmed로 승격된 토큰에 대해 정확히 한 번 호출된다 —
/// 레지스트리의 전이 가드가 동시 중복 호출을 막는다. 제출 실패는
/// TradeSubmitted를 거치지 않고 곧바로 TradeFailed로 기록한다.
pub struct TradeExecutor {
    chain: Arc<dyn ChainReader>,
    registry: Arc<TokenRegistry>,
    stats: Arc<RwLock<SniperStats>>,
    /// 토큰당 매수 금액 (wei)
    amount_in: U256,
    /// 슬리피지 하한 (토큰 기본 단위)
    amount_out_min: U256,
    base_asset: Address,
    recipient: Address,
    deadline_window_secs: u64,
    max_confirmation_wait: Duration,
    poll_interval: Duration,
    dry_run: bool,
}

impl TradeExecutor {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        registry: Arc<TokenRegistry>,
        stats: Arc<RwLock<SniperStats>>,
        config: &Config,
        recipient: Address,
    ) -> Result<Self> {
        let amount_in = config.purchase_amount_wei()?;
        let amount_out_min = config.min_output_wei()?;

        if amount_out_min.is_zero() {
            warn!("⚠️ 슬리피지 하한이 0 - 임의의 슬리피지를 수용합니다");
        }

        Ok(Self {
            chain,
            registry,
            stats,
            amount_in,
            amount_out_min,
            base_asset: config.dex.weth,
            recipient,
            deadline_window_secs: config.sniper.trade_deadline_secs,
            max_confirmation_wait: Duration::from_secs(config.sniper.max_confirmation_wait_secs),
            poll_interval: Duration::from_secs(config.sniper.confirmation_poll_interval_secs),
            dry_run: config.execution.dry_run,
        })
    }

    /// 제출 직전에 의도를 만든다. 다섯 필드는 제출까지 그대로 간다.
    pub fn build_intent(&self, token: Address) -> TradeIntent {
        TradeIntent::new(
            token,
            self.amount_in,
            self.amount_out_min,
            self.base_asset,
            self.recipient,
            deadline_after(self.deadline_window_secs),
        )
    }

    /// 매수 실행. 종결 상태를 반환한다.
    pub async fn execute(&self, token: Address) -> TokenState {
        let intent = self.build_intent(token);
        info!(
            "🎯 매수 시도: {:?} ({})",
            token,
            format_eth_amount(self.amount_in)
        );

        if self.dry_run {
            info!("🧪 시뮬레이션 모드 - 제출 생략: {}", intent);
            self.registry.transition(
                token,
                TokenState::LiquidityConfirmed,
                TokenState::TradeSubmitted,
            );
            self.finalize(token, TokenState::TradeSubmitted, TokenState::TradeConfirmed)
                .await;
            return TokenState::TradeConfirmed;
        }

        match self.chain.submit_swap(&intent).await {
            Ok(tx_hash) => {
                if self.registry.transition(
                    token,
                    TokenState::LiquidityConfirmed,
                    TokenState::TradeSubmitted,
                ) != TransitionResult::Applied
                {
                    // 승격 가드가 있으므로 정상 경로에서는 나올 수 없다
                    warn!("⚠️ TradeSubmitted 전이 충돌: {:?}", token);
                }
                self.registry.update(&token, |record| {
                    record.trade_tx = Some(tx_hash);
                });
                self.stats.write().await.trades_submitted += 1;
                info!("📤 매수 제출됨: {:?} tx={:?}", token, tx_hash);

                self.await_confirmation(token, tx_hash).await
            }
            Err(e) => {
                error!("❌ 매수 제출 실패: {:?} - {}", token, e);
                self.finalize(token, TokenState::LiquidityConfirmed, TokenState::TradeFailed)
                    .await;
                TokenState::TradeFailed
            }
        }
    }

    /// 확정 폴링. 고정 주기로 상태를 조회해 확정/리버트/대기 상한 중
    /// 먼저 오는 것으로 종결한다. 폴링 중 일시 장애는 상한까지 무시한다.
    pub async fn await_confirmation(&self, token: Address, tx_hash: H256) -> TokenState {
        let started = Instant::now();

        loop {
            tokio::time::sleep(self.poll_interval).await;

            match self.chain.transaction_status(tx_hash).await {
                Ok(TxStatus::Confirmed) => {
                    info!("✅ 매수 확정: {:?} tx={:?}", token, tx_hash);
                    self.finalize(token, TokenState::TradeSubmitted, TokenState::TradeConfirmed)
                        .await;
                    return TokenState::TradeConfirmed;
                }
                Ok(TxStatus::Reverted) => {
                    warn!("❌ 매수 리버트: {:?} tx={:?}", token, tx_hash);
                    self.finalize(token, TokenState::TradeSubmitted, TokenState::TradeFailed)
                        .await;
                    return TokenState::TradeFailed;
                }
                Ok(TxStatus::Pending) => {}
                Err(e) => {
                    warn!("⚠️ 확정 폴링 실패: {:?} - {} (재시도)", token, e);
                }
            }

            if started.elapsed() >= self.max_confirmation_wait {
                warn!(
                    "⌛ 확정 대기 상한 초과: {:?} tx={:?} ({}초)",
                    token,
                    tx_hash,
                    self.max_confirmation_wait.as_secs()
                );
                self.finalize(token, TokenState::TradeSubmitted, TokenState::TradeFailed)
                    .await;
                return TokenState::TradeFailed;
            }
        }
    }

    async fn finalize(&self, token: Address, from: TokenState, to: TokenState) {
        self.registry.transition(token, from, to);
        let mut stats = self.stats.write().await;
        match to {
            TokenState::TradeConfirmed => stats.trades_confirmed += 1,
            TokenState::TradeFailed => stats.trades_failed += 1,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockChainReader, SubmissionBehavior};
    use crate::types::TokenRecord;
    use chrono::Utc;

    struct Harness {
        mock: Arc<MockChainReader>,
        registry: Arc<TokenRegistry>,
        stats: Arc<RwLock<SniperStats>>,
        executor: TradeExecutor,
    }

    fn harness() -> Harness {
        let mut config = Config::load_test_config();
        config.execution.dry_run = false;

        let mock = Arc::new(MockChainReader::new());
        let registry = Arc::new(TokenRegistry::new(86_400, 3_600));
        let stats = Arc::new(RwLock::new(SniperStats::default()));
        let mut executor = TradeExecutor::new(
            Arc::clone(&mock) as Arc<dyn ChainReader>,
            Arc::clone(&registry),
            Arc::clone(&stats),
            &config,
            Address::random(),
        )
        .unwrap();
        // 테스트에서는 밀리초 단위로 폴링
        executor.poll_interval = Duration::from_millis(10);
        executor.max_confirmation_wait = Duration::from_millis(60);

        Harness {
            mock,
            registry,
            stats,
            executor,
        }
    }

    fn promoted_token(registry: &TokenRegistry) -> Address {
        let token = Address::random();
        registry.insert_if_absent(TokenRecord::discovered(token, 1, Utc::now()));
        registry.transition(token, TokenState::Discovered, TokenState::LiquidityConfirmed);
        token
    }

    #[tokio::test]
    async fn test_intent_carries_configured_fields() {
        let h = harness();
        let token = Address::random();
        let intent = h.executor.build_intent(token);

        assert_eq!(intent.amount_in, U256::from(100_000_000_000_000_000u64));
        assert_eq!(intent.amount_out_min, U256::zero());
        assert_eq!(intent.path.len(), 2);
        assert_eq!(intent.path[1], token);
    }

    #[tokio::test]
    async fn test_confirmed_trade() {
        let h = harness();
        let token = promoted_token(&h.registry);
        let tx = H256::random();

        h.mock.set_submission(SubmissionBehavior::Accept(tx)).await;
        h.mock
            .set_status_sequence(tx, vec![TxStatus::Pending, TxStatus::Confirmed])
            .await;

        let outcome = h.executor.execute(token).await;
        assert_eq!(outcome, TokenState::TradeConfirmed);

        let record = h.registry.get(&token).unwrap();
        assert_eq!(record.state, TokenState::TradeConfirmed);
        assert_eq!(record.trade_tx, Some(tx));
        assert!(record.finalized_at.is_some());

        let stats = h.stats.read().await;
        assert_eq!(stats.trades_submitted, 1);
        assert_eq!(stats.trades_confirmed, 1);
    }

    #[tokio::test]
    async fn test_submission_failure_never_reaches_submitted() {
        let h = harness();
        let token = promoted_token(&h.registry);

        h.mock
            .set_submission(SubmissionBehavior::Reject("insufficient funds".to_string()))
            .await;

        let outcome = h.executor.execute(token).await;
        assert_eq!(outcome, TokenState::TradeFailed);

        let record = h.registry.get(&token).unwrap();
        assert_eq!(record.state, TokenState::TradeFailed);
        // TradeSubmitted를 거치지 않았으므로 트랜잭션 해시가 없다
        assert!(record.trade_tx.is_none());

        let stats = h.stats.read().await;
        assert_eq!(stats.trades_submitted, 0);
        assert_eq!(stats.trades_failed, 1);
    }

    #[tokio::test]
    async fn test_reverted_trade_fails() {
        let h = harness();
        let token = promoted_token(&h.registry);
        let tx = H256::random();

        h.mock.set_submission(SubmissionBehavior::Accept(tx)).await;
        h.mock.set_status_sequence(tx, vec![TxStatus::Reverted]).await;

        let outcome = h.executor.execute(token).await;
        assert_eq!(outcome, TokenState::TradeFailed);
        assert_eq!(h.registry.get(&token).unwrap().state, TokenState::TradeFailed);
    }

    #[tokio::test]
    async fn test_confirmation_timeout_fails_without_resubmission() {
        let h = harness();
        let token = promoted_token(&h.registry);
        let tx = H256::random();

        h.mock.set_submission(SubmissionBehavior::Accept(tx)).await;
        // 영원히 Pending — 대기 상한에 걸려야 한다
        h.mock.set_status_sequence(tx, vec![TxStatus::Pending]).await;

        let outcome = h.executor.execute(token).await;
        assert_eq!(outcome, TokenState::TradeFailed);
        assert_eq!(h.registry.get(&token).unwrap().state, TokenState::TradeFailed);

        // 제출은 정확히 한 번 — 타임아웃 후 재제출 없음
        assert_eq!(h.mock.accepted_submissions(token).await, 1);
    }

    #[tokio::test]
    async fn test_dry_run_skips_submission() {
        let mut h = harness();
        h.executor.dry_run = true;
        let token = promoted_token(&h.registry);

        let outcome = h.executor.execute(token).await;
        assert_eq!(outcome, TokenState::TradeConfirmed);
        assert_eq!(h.mock.submission_attempts(token).await, 0);
    }

    #[tokio::test]
    async fn test_intent_roundtrips_to_submission() {
        let h = harness();
        let token = promoted_token(&h.registry);
        let tx = H256::random();

        h.mock.set_submission(SubmissionBehavior::Accept(tx)).await;
        h.mock.set_status_sequence(tx, vec![TxStatus::Confirmed]).await;

        h.executor.execute(token).await;

        // 제출 경계를 넘어 의도 필드가 그대로 도착했는지
        let submitted = h.mock.last_accepted().await.unwrap();
        assert_eq!(submitted.token, token);
        assert_eq!(submitted.amount_in, U256::from(100_000_000_000_000_000u64));
        assert_eq!(submitted.path[1], token);
        assert_eq!(submitted.recipient, h.executor.recipient);
    }
}
