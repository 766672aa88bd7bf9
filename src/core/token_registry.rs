use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ethers::types::Address;
use tracing::debug;

use crate::types::{TokenRecord, TokenState, TransitionResult};

/// 추적 토큰 레지스트리
///
/// 주소를 키로 하는 공유 저장소. 엔트리 단위 잠금(DashMap) 위에서
/// insert_if_absent와 transition이 원자적으로 동작하므로, 블록 인제스트와
/// 유동성 스윕이 같은 주소를 두고 경합해도 중복 삽입/중복 실행이 없다.
/// 잠금은 인메모리 변경 동안만 유지되며 RPC 호출을 가로지르지 않는다.
pub struct TokenRegistry {
    tokens: DashMap<Address, TokenRecord>,
    /// 비종결 레코드의 최대 추적 수명
    max_tracked_age: Duration,
    /// 종결 레코드 보존 기간 (finalized_at 기준)
    terminal_retention: Duration,
}

/// 퇴출 패스 결과
#[derive(Debug, Default)]
pub struct EvictionReport {
    /// 수명 초과로 Expired 처리 후 제거된 주소들
    pub expired: Vec<Address>,
    /// 보존 기간이 끝나 정리된 종결 레코드들
    pub purged: Vec<Address>,
}

impl TokenRegistry {
    pub fn new(max_tracked_age_secs: u64, terminal_retention_secs: u64) -> Self {
        Self {
            tokens: DashMap::new(),
            max_tracked_age: Duration::seconds(max_tracked_age_secs as i64),
            terminal_retention: Duration::seconds(terminal_retention_secs as i64),
        }
    }

    /// 주소가 없을 때만 삽입. 이미 있으면 no-op으로 false 반환 —
    /// 주소당 레코드 하나 불변식의 시행 지점이며, 재시작 후 재발견도
    /// 이 경로로 멱등 처리된다.
    pub fn insert_if_absent(&self, record: TokenRecord) -> bool {
        match self.tokens.entry(record.address) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(record);
                true
            }
        }
    }

    pub fn get(&self, address: &Address) -> Option<TokenRecord> {
        self.tokens.get(address).map(|r| r.value().clone())
    }

    /// 유동성 대기 중인 주소들 (Discovered 상태)
    pub fn list_pending(&self) -> Vec<Address> {
        self.tokens
            .iter()
            .filter(|entry| entry.value().state.is_pending())
            .map(|entry| *entry.key())
            .collect()
    }

    /// 상태 전이 CAS. 현재 상태가 from일 때만 to로 바꾼다.
    ///
    /// 엔트리 잠금 아래에서 비교와 교체가 한 번에 일어나므로, 겹치는
    /// 스윕/인제스트 중 정확히 하나만 Applied를 받는다.
    pub fn transition(
        &self,
        address: Address,
        from: TokenState,
        to: TokenState,
    ) -> TransitionResult {
        match self.tokens.get_mut(&address) {
            None => TransitionResult::Missing,
            Some(mut record) => {
                if record.state != from {
                    return TransitionResult::Conflict;
                }
                record.state = to;
                if to.is_terminal() {
                    record.finalized_at = Some(Utc::now());
                }
                debug!("상태 전이: {:?} {} -> {}", address, from, to);
                TransitionResult::Applied
            }
        }
    }

    /// 전이 승자만 호출하는 필드 갱신 (페어 주소, 트랜잭션 해시 등)
    pub fn update<F>(&self, address: &Address, f: F) -> bool
    where
        F: FnOnce(&mut TokenRecord),
    {
        match self.tokens.get_mut(address) {
            None => false,
            Some(mut record) => {
                f(&mut record);
                true
            }
        }
    }

    /// 퇴출 패스.
    ///
    /// 비종결 레코드는 발견 후 max_tracked_age를 넘기면 상태와 무관하게
    /// Expired로 표시하고 제거한다 (유동성이 영영 생기지 않는 토큰에 대한
    /// 메모리 상한). 종결 레코드(TradeConfirmed/TradeFailed)는 finalized_at
    /// 기준 보존 기간 동안 유지한 뒤 정리한다.
    pub fn evict(&self, now: DateTime<Utc>) -> EvictionReport {
        let mut report = EvictionReport::default();

        self.tokens.retain(|address, record| {
            if record.state.is_terminal() {
                let finalized = record.finalized_at.unwrap_or(record.discovered_at);
                if now - finalized > self.terminal_retention {
                    report.purged.push(*address);
                    return false;
                }
                return true;
            }

            if now - record.discovered_at > self.max_tracked_age {
                record.state = TokenState::Expired;
                report.expired.push(*address);
                return false;
            }

            true
        });

        report
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// 현재 레코드들의 스냅샷 (상태 API용)
    pub fn snapshot(&self) -> Vec<TokenRecord> {
        self.tokens.iter().map(|e| e.value().clone()).collect()
    }
}
