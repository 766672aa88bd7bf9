use std::sync::Arc;

use chrono::Utc;
use ethers::types::Address;
use futures_util::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::blockchain::ChainReader;
use crate::core::token_registry::TokenRegistry;
use crate::types::{TokenState, TransitionResult};

/// 유동성 모니터
///
/// 고정 주기로 레지스트리의 대기 토큰들을 훑으며 기축 자산 페어의
/// 리저브를 조회한다. 스윕 비용은 O(추적 토큰 수)다 — 지금 규모에서는
/// 충분하고, 추적 집합이 커지면 샤딩/레이트리밋이 필요하다.
pub struct LiquidityMonitor {
    chain: Arc<dyn ChainReader>,
    registry: Arc<TokenRegistry>,
    /// 풀 탐색의 반대편 — 네트워크의 래핑된 기축 자산
    base_asset: Address,
    /// 동시 스윕 방지 가드. 진행 중이면 새 요청은 큐잉하지 않고 버린다 —
    /// 노드가 느릴 때 스윕이 쌓이는 대신 유효 주기가 늘어진다.
    sweep_guard: Mutex<()>,
}

/// 스윕 한 번의 결과
#[derive(Debug, Default)]
pub struct SweepOutcome {
    /// 이번 스윕에서 LiquidityConfirmed로 승격된 주소들
    pub promoted: Vec<Address>,
    /// 점검한 대기 토큰 수
    pub checked: usize,
    /// 이전 스윕이 진행 중이라 버려졌는가
    pub skipped: bool,
}

impl LiquidityMonitor {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        registry: Arc<TokenRegistry>,
        base_asset: Address,
    ) -> Self {
        Self {
            chain,
            registry,
            base_asset,
            sweep_guard: Mutex::new(()),
        }
    }

    /// 대기 토큰 전체를 한 번 점검한다.
    ///
    /// 토큰 하나의 RPC 실패는 그 토큰만 다음 스윕으로 미루고 나머지는
    /// 계속 진행한다.
    pub async fn sweep(&self) -> SweepOutcome {
        let _guard = match self.sweep_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("⏳ 이전 스윕이 아직 진행 중 - 이번 요청은 버립니다");
                return SweepOutcome {
                    skipped: true,
                    ..SweepOutcome::default()
                };
            }
        };

        let pending = self.registry.list_pending();
        let checked = pending.len();
        if checked == 0 {
            return SweepOutcome::default();
        }

        debug!("🔍 유동성 점검: {}개 토큰", checked);

        let checks = pending.into_iter().map(|token| self.check_token(token));
        let promoted: Vec<Address> = join_all(checks).await.into_iter().flatten().collect();

        SweepOutcome {
            promoted,
            checked,
            skipped: false,
        }
    }

    /// 토큰 하나의 풀 상태 점검. 승격 승자면 Some을 반환한다.
    async fn check_token(&self, token: Address) -> Option<Address> {
        let now = Utc::now();
        self.registry.update(&token, |record| {
            record.last_checked_at = Some(now);
        });

        let pair = match self.chain.pair_for(self.base_asset, token).await {
            Ok(Some(pair)) => pair,
            Ok(None) => {
                debug!("풀 없음: {:?}", token);
                return None;
            }
            Err(e) => {
                warn!("⚠️ 풀 조회 실패: {:?} - {} (다음 스윕에 재시도)", token, e);
                return None;
            }
        };

        let (reserve0, reserve1) = match self.chain.pair_reserves(pair).await {
            Ok(reserves) => reserves,
            Err(e) => {
                warn!("⚠️ 리저브 조회 실패: {:?} - {} (다음 스윕에 재시도)", token, e);
                return None;
            }
        };

        // 양쪽 모두 엄격히 양수여야 거래 가능한 유동성
        if reserve0.is_zero() || reserve1.is_zero() {
            debug!(
                "유동성 미충족: {:?} reserves=({}, {})",
                token, reserve0, reserve1
            );
            return None;
        }

        match self
            .registry
            .transition(token, TokenState::Discovered, TokenState::LiquidityConfirmed)
        {
            TransitionResult::Applied => {
                self.registry.update(&token, |record| {
                    record.pair = Some(pair);
                });
                info!(
                    "💧 유동성 확인: {:?} pair={:?} reserves=({}, {})",
                    token, pair, reserve0, reserve1
                );
                Some(token)
            }
            // 다른 스윕이 먼저 승격시켰거나 레코드가 퇴출됨
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockChainReader, PairBehavior, ReservesBehavior};
    use crate::types::TokenRecord;
    use ethers::types::U256;

    fn setup() -> (Arc<MockChainReader>, Arc<TokenRegistry>, LiquidityMonitor) {
        let mock = Arc::new(MockChainReader::new());
        let registry = Arc::new(TokenRegistry::new(86_400, 3_600));
        let monitor = LiquidityMonitor::new(
            Arc::clone(&mock) as Arc<dyn ChainReader>,
            Arc::clone(&registry),
            Address::random(),
        );
        (mock, registry, monitor)
    }

    fn track(registry: &TokenRegistry, token: Address) {
        registry.insert_if_absent(TokenRecord::discovered(token, 1, Utc::now()));
    }

    #[tokio::test]
    async fn test_no_pool_leaves_state_unchanged() {
        let (_mock, registry, monitor) = setup();
        let token = Address::random();
        track(&registry, token);

        let outcome = monitor.sweep().await;
        assert!(outcome.promoted.is_empty());
        assert_eq!(outcome.checked, 1);
        assert_eq!(
            registry.get(&token).unwrap().state,
            TokenState::Discovered
        );
    }

    #[tokio::test]
    async fn test_zero_reserve_boundaries_do_not_promote() {
        let (mock, registry, monitor) = setup();
        let token_a = Address::random();
        let token_b = Address::random();
        let pair_a = Address::random();
        let pair_b = Address::random();
        track(&registry, token_a);
        track(&registry, token_b);

        // (0, X)와 (X, 0)은 승격 금지
        mock.set_pair(token_a, PairBehavior::Pair(pair_a)).await;
        mock.set_reserves(pair_a, ReservesBehavior::Reserves(U256::zero(), U256::from(10u64)))
            .await;
        mock.set_pair(token_b, PairBehavior::Pair(pair_b)).await;
        mock.set_reserves(pair_b, ReservesBehavior::Reserves(U256::from(10u64), U256::zero()))
            .await;

        let outcome = monitor.sweep().await;
        assert!(outcome.promoted.is_empty());
        assert_eq!(registry.get(&token_a).unwrap().state, TokenState::Discovered);
        assert_eq!(registry.get(&token_b).unwrap().state, TokenState::Discovered);
    }

    #[tokio::test]
    async fn test_positive_reserves_promote() {
        let (mock, registry, monitor) = setup();
        let token = Address::random();
        let pair = Address::random();
        track(&registry, token);

        mock.set_pair(token, PairBehavior::Pair(pair)).await;
        mock.set_reserves(pair, ReservesBehavior::Reserves(U256::from(1u64), U256::from(1u64)))
            .await;

        let outcome = monitor.sweep().await;
        assert_eq!(outcome.promoted, vec![token]);

        let record = registry.get(&token).unwrap();
        assert_eq!(record.state, TokenState::LiquidityConfirmed);
        assert_eq!(record.pair, Some(pair));
        assert!(record.last_checked_at.is_some());
    }

    #[tokio::test]
    async fn test_per_token_failure_does_not_block_batch() {
        let (mock, registry, monitor) = setup();
        let failing = Address::random();
        let healthy = Address::random();
        let pair = Address::random();
        track(&registry, failing);
        track(&registry, healthy);

        mock.set_pair(failing, PairBehavior::RpcError).await;
        mock.set_pair(healthy, PairBehavior::Pair(pair)).await;
        mock.set_reserves(pair, ReservesBehavior::Reserves(U256::from(5u64), U256::from(10u64)))
            .await;

        let outcome = monitor.sweep().await;
        // 실패한 토큰은 미뤄지고 건강한 토큰은 승격
        assert_eq!(outcome.promoted, vec![healthy]);
        assert_eq!(registry.get(&failing).unwrap().state, TokenState::Discovered);
    }

    #[tokio::test]
    async fn test_promoted_token_not_promoted_again() {
        let (mock, registry, monitor) = setup();
        let token = Address::random();
        let pair = Address::random();
        track(&registry, token);

        mock.set_pair(token, PairBehavior::Pair(pair)).await;
        mock.set_reserves(pair, ReservesBehavior::Reserves(U256::from(5u64), U256::from(10u64)))
            .await;

        let first = monitor.sweep().await;
        assert_eq!(first.promoted, vec![token]);

        // 승격된 토큰은 더 이상 대기 목록에 없다
        let second = monitor.sweep().await;
        assert!(second.promoted.is_empty());
        assert_eq!(second.checked, 0);
    }

    #[tokio::test]
    async fn test_overlapping_sweeps_share_registry_single_promotion() {
        // 가드가 분리된 두 모니터 인스턴스 = 겹치는 스윕 시뮬레이션.
        // 레지스트리 CAS가 이중 승격을 막아야 한다.
        let mock = Arc::new(MockChainReader::new());
        let registry = Arc::new(TokenRegistry::new(86_400, 3_600));
        let base = Address::random();
        let token = Address::random();
        let pair = Address::random();

        registry.insert_if_absent(TokenRecord::discovered(token, 1, Utc::now()));
        mock.set_pair(token, PairBehavior::Pair(pair)).await;
        mock.set_reserves(pair, ReservesBehavior::Reserves(U256::from(5u64), U256::from(10u64)))
            .await;

        let monitor_a = Arc::new(LiquidityMonitor::new(
            Arc::clone(&mock) as Arc<dyn ChainReader>,
            Arc::clone(&registry),
            base,
        ));
        let monitor_b = Arc::new(LiquidityMonitor::new(
            Arc::clone(&mock) as Arc<dyn ChainReader>,
            Arc::clone(&registry),
            base,
        ));

        let (a, b) = tokio::join!(monitor_a.sweep(), monitor_b.sweep());
        let total_promoted = a.promoted.len() + b.promoted.len();
        assert_eq!(total_promoted, 1);
    }
}
