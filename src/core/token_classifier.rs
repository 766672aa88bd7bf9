use std::sync::Arc;
use std::time::Duration;

use ethers::types::Address;
use tracing::{debug, warn};

use crate::blockchain::ChainReader;
use crate::config::SniperConfig;
use crate::types::{ChainError, Classification};

/// 토큰 분류기
///
/// 새로 배포된 컨트랙트에 고정된 읽기 전용 능력 프로브(totalSupply)를
/// 한 번 날려 ERC-20 여부를 판정한다. 리버트는 판정 신호이므로 절대
/// 재시도하지 않는다. 전송 장애만 바운디드 재시도 대상이다.
pub struct TokenClassifier {
    chain: Arc<dyn ChainReader>,
    max_probe_attempts: u32,
    probe_retry_delay: Duration,
}

impl TokenClassifier {
    pub fn new(chain: Arc<dyn ChainReader>, config: &SniperConfig) -> Self {
        Self {
            chain,
            max_probe_attempts: config.max_probe_attempts.max(1),
            probe_retry_delay: Duration::from_millis(config.probe_retry_delay_ms),
        }
    }

    /// 단발 프로브 판정.
    ///
    /// Ok(Token): 프로브가 숫자 결과로 성공.
    /// Ok(Rejected): 리버트 또는 실행 코드 없음 — 종결 판정.
    /// Err: 전송 장애 — 판정 불가, 호출자가 재시도를 결정.
    pub async fn classify(&self, address: Address) -> Result<Classification, ChainError> {
        match self.chain.token_total_supply(address).await {
            Ok(supply) => {
                debug!("프로브 성공: {:?} totalSupply={}", address, supply);
                Ok(Classification::Token)
            }
            Err(e) if !e.is_transient() => {
                debug!("프로브 리버트: {:?} ({})", address, e);
                Ok(Classification::Rejected)
            }
            Err(e) => Err(e),
        }
    }

    /// 바운디드 재시도 판정.
    ///
    /// 전송 장애가 max_probe_attempts회 연속되면 None — 후보는 확정도
    /// 거부도 아닌 채로 드롭된다.
    pub async fn classify_with_retry(&self, address: Address) -> Option<Classification> {
        for attempt in 1..=self.max_probe_attempts {
            match self.classify(address).await {
                Ok(verdict) => return Some(verdict),
                Err(e) => {
                    warn!(
                        "⚠️ 프로브 일시 실패 ({}/{}): {:?} - {}",
                        attempt, self.max_probe_attempts, address, e
                    );
                    if attempt < self.max_probe_attempts {
                        // 선형 백오프
                        tokio::time::sleep(self.probe_retry_delay * attempt).await;
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::mocks::{MockChainReader, SupplyBehavior};
    use ethers::types::U256;

    fn classifier_with(mock: Arc<MockChainReader>) -> TokenClassifier {
        let config = Config::load_test_config();
        TokenClassifier::new(mock, &config.sniper)
    }

    #[tokio::test]
    async fn test_successful_probe_confirms_token() {
        let mock = Arc::new(MockChainReader::new());
        let token = Address::random();
        mock.set_supply(token, SupplyBehavior::Supply(U256::from(1_000_000u64))).await;

        let classifier = classifier_with(Arc::clone(&mock));
        assert_eq!(
            classifier.classify_with_retry(token).await,
            Some(Classification::Token)
        );
        assert_eq!(mock.probe_count(token).await, 1);
    }

    #[tokio::test]
    async fn test_revert_rejects_without_retry() {
        let mock = Arc::new(MockChainReader::new());
        let contract = Address::random();
        mock.set_supply(contract, SupplyBehavior::Revert).await;

        let classifier = classifier_with(Arc::clone(&mock));
        assert_eq!(
            classifier.classify_with_retry(contract).await,
            Some(Classification::Rejected)
        );
        // 리버트는 판정이므로 단 한 번만 프로브
        assert_eq!(mock.probe_count(contract).await, 1);
    }

    #[tokio::test]
    async fn test_transport_failure_bounded_then_dropped() {
        let mock = Arc::new(MockChainReader::new());
        let contract = Address::random();
        mock.set_supply(contract, SupplyBehavior::RpcError).await;

        let classifier = classifier_with(Arc::clone(&mock));
        // 판정 없이 드롭 — Rejected도 Token도 아니다
        assert_eq!(classifier.classify_with_retry(contract).await, None);
        assert_eq!(mock.probe_count(contract).await, 3);
    }

    #[tokio::test]
    async fn test_transient_failure_then_success() {
        let mock = Arc::new(MockChainReader::new());
        let token = Address::random();
        mock.set_supply(token, SupplyBehavior::RpcErrorsThenSupply(1, U256::from(5u64))).await;

        let classifier = classifier_with(Arc::clone(&mock));
        assert_eq!(
            classifier.classify_with_retry(token).await,
            Some(Classification::Token)
        );
        assert_eq!(mock.probe_count(token).await, 2);
    }
}
