use chrono::{DateTime, Utc};
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 토큰 레코드 상태 머신
///
/// Discovered는 "유동성 대기" 상태를 겸한다 (별도 LiquidityPending 상태 없음).
/// TradeConfirmed / TradeFailed / Expired는 종결 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenState {
    /// 분류 완료, 유동성 풀 대기 중
    Discovered,
    /// 양쪽 리저브가 모두 양수인 풀 관측됨
    LiquidityConfirmed,
    /// 매수 트랜잭션 제출됨, 확정 대기 중
    TradeSubmitted,
    /// 매수 트랜잭션 온체인 확정 (종결)
    TradeConfirmed,
    /// 제출 거부, 리버트 또는 확정 타임아웃 (종결)
    TradeFailed,
    /// 추적 최대 수명 초과로 퇴출됨 (종결)
    Expired,
}

impl TokenState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TokenState::TradeConfirmed | TokenState::TradeFailed | TokenState::Expired
        )
    }

    /// 유동성 스윕 대상인가
    pub fn is_pending(&self) -> bool {
        matches!(self, TokenState::Discovered)
    }
}

impl std::fmt::Display for TokenState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TokenState::Discovered => "Discovered",
            TokenState::LiquidityConfirmed => "LiquidityConfirmed",
            TokenState::TradeSubmitted => "TradeSubmitted",
            TokenState::TradeConfirmed => "TradeConfirmed",
            TokenState::TradeFailed => "TradeFailed",
            TokenState::Expired => "Expired",
        };
        write!(f, "{}", s)
    }
}

/// 추적 중인 토큰 하나의 레코드
///
/// 불변식: 레지스트리에는 주소당 최대 한 개의 레코드만 존재한다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    /// 토큰 컨트랙트 주소
    pub address: Address,
    /// 발견 시각
    pub discovered_at: DateTime<Utc>,
    /// 발견된 블록 높이
    pub discovered_block: u64,
    /// 현재 상태
    pub state: TokenState,
    /// 마지막 유동성 점검 시각
    pub last_checked_at: Option<DateTime<Utc>>,
    /// 관측된 페어 컨트랙트 주소 (유동성 확인 후)
    pub pair: Option<Address>,
    /// 제출된 매수 트랜잭션 해시
    pub trade_tx: Option<H256>,
    /// 종결 상태 도달 시각 (보존 기간 계산용)
    pub finalized_at: Option<DateTime<Utc>>,
}

impl TokenRecord {
    pub fn discovered(address: Address, block: u64, now: DateTime<Utc>) -> Self {
        Self {
            address,
            discovered_at: now,
            discovered_block: block,
            state: TokenState::Discovered,
            last_checked_at: None,
            pair: None,
            trade_tx: None,
            finalized_at: None,
        }
    }

    /// 발견 이후 경과 시간(초)
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.discovered_at).num_seconds()
    }
}

/// 매수 의도 — 제출 직전에 만들어지는 일회용 값 객체
///
/// 다섯 필드(입력 금액, 최소 출력, 경로, 수신자, 데드라인)가 제출 호출까지
/// 그대로 전달되어야 한다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeIntent {
    pub id: Uuid,
    /// 매수 대상 토큰
    pub token: Address,
    /// 입력 금액 (네이티브 자산, wei)
    pub amount_in: U256,
    /// 최소 허용 출력 (토큰 기본 단위). 0이면 슬리피지 보호 없음
    pub amount_out_min: U256,
    /// 스왑 경로: [기축 자산, 토큰]
    pub path: Vec<Address>,
    /// 매수 토큰 수신 주소
    pub recipient: Address,
    /// 유닉스 초 데드라인
    pub deadline: u64,
}

impl TradeIntent {
    pub fn new(
        token: Address,
        amount_in: U256,
        amount_out_min: U256,
        base_asset: Address,
        recipient: Address,
        deadline: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            token,
            amount_in,
            amount_out_min,
            path: vec![base_asset, token],
            recipient,
            deadline,
        }
    }
}

impl std::fmt::Display for TradeIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TradeIntent {{ token: {:?}, in: {}, min_out: {}, deadline: {} }}",
            self.token, self.amount_in, self.amount_out_min, self.deadline
        )
    }
}

/// 제출된 트랜잭션의 확정 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Pending,
    Confirmed,
    Reverted,
}

/// 분류 판정 — 리버트는 판정이지 오류가 아니다
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// 최소 ERC-20 능력 집합 구현 확인
    Token,
    /// 프로브 리버트 또는 실행 코드 없음
    Rejected,
}

/// 레지스트리 상태 전이 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionResult {
    /// 전이 적용됨 (호출자가 승자)
    Applied,
    /// 현재 상태가 from과 달라 거부됨
    Conflict,
    /// 해당 주소의 레코드 없음
    Missing,
}

/// 파이프라인 누적 통계
#[derive(Debug, Clone, Default, Serialize)]
pub struct SniperStats {
    pub blocks_processed: u64,
    pub contracts_seen: u64,
    pub tokens_discovered: u64,
    pub candidates_rejected: u64,
    pub candidates_dropped: u64,
    pub sweeps_completed: u64,
    pub sweeps_skipped: u64,
    pub liquidity_confirmed: u64,
    pub trades_submitted: u64,
    pub trades_confirmed: u64,
    pub trades_failed: u64,
    pub tokens_expired: u64,
}

/// 체인 접근 오류 분류
///
/// Rpc는 일시적(재시도 대상), Revert는 컨트랙트 수준 판정,
/// Submission은 해당 토큰에 대해 종결적.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("contract call reverted: {0}")]
    Revert(String),

    #[error("transaction rejected by node: {0}")]
    Submission(String),
}

impl ChainError {
    /// 일시적 장애인가 (바운디드 백오프로 재시도)
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainError::Rpc(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!TokenState::Discovered.is_terminal());
        assert!(!TokenState::LiquidityConfirmed.is_terminal());
        assert!(!TokenState::TradeSubmitted.is_terminal());
        assert!(TokenState::TradeConfirmed.is_terminal());
        assert!(TokenState::TradeFailed.is_terminal());
        assert!(TokenState::Expired.is_terminal());
    }

    #[test]
    fn test_pending_states() {
        assert!(TokenState::Discovered.is_pending());
        assert!(!TokenState::LiquidityConfirmed.is_pending());
        assert!(!TokenState::TradeSubmitted.is_pending());
    }

    #[test]
    fn test_token_record_age() {
        let now = Utc::now();
        let record = TokenRecord::discovered(Address::random(), 100, now);
        assert_eq!(record.state, TokenState::Discovered);
        assert_eq!(record.age_secs(now + chrono::Duration::seconds(90)), 90);
        assert!(record.pair.is_none());
        assert!(record.trade_tx.is_none());
    }

    #[test]
    fn test_trade_intent_shape() {
        let token = Address::random();
        let weth = Address::random();
        let recipient = Address::random();
        let intent = TradeIntent::new(
            token,
            U256::from(100_000_000_000_000_000u64), // 0.1 ETH
            U256::zero(),
            weth,
            recipient,
            1_700_000_000 + 1200,
        );

        // 경로는 항상 [기축 자산, 토큰]
        assert_eq!(intent.path, vec![weth, token]);
        assert_eq!(intent.recipient, recipient);
        assert_eq!(intent.deadline, 1_700_000_000 + 1200);
    }

    #[test]
    fn test_trade_intent_roundtrip() {
        // 제출 경계를 넘어 다섯 필드가 그대로 보존되는지
        let intent = TradeIntent::new(
            Address::random(),
            U256::from(1u64),
            U256::from(2u64),
            Address::random(),
            Address::random(),
            42,
        );
        let json = serde_json::to_string(&intent).unwrap();
        let back: TradeIntent = serde_json::from_str(&json).unwrap();
        assert_eq!(intent, back);
    }

    #[test]
    fn test_chain_error_transience() {
        assert!(ChainError::Rpc("timeout".into()).is_transient());
        assert!(!ChainError::Revert("execution reverted".into()).is_transient());
        assert!(!ChainError::Submission("nonce too low".into()).is_transient());
    }
}
