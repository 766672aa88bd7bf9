use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::blockchain::ChainReader;
use crate::core::token_classifier::TokenClassifier;
use crate::core::token_registry::TokenRegistry;
use crate::types::{ChainError, Classification, SniperStats, TokenRecord};

/// 연속 블록 조회 실패가 이 횟수에 이르면 파이프라인 치명으로 본다
const MAX_CONSECUTIVE_FAILURES: u32 = 10;

/// 영수증 하나당 일시 장애 재시도 횟수
const RECEIPT_ATTEMPTS: u32 = 3;

/// 블록 인제스터
///
/// 블록 커서를 단독 소유한다. 커서는 단조 증가하며, 최신 높이까지
/// 빠짐없이 순서대로 처리한다 — 처리 속도가 생산 속도에 뒤지면 블록은
/// 커서 뒤에 쌓일 뿐 버려지지 않는다.
pub struct BlockIngestor {
    chain: Arc<dyn ChainReader>,
    classifier: TokenClassifier,
    registry: Arc<TokenRegistry>,
    stats: Arc<RwLock<SniperStats>>,
    poll_interval: Duration,
    is_running: Arc<AtomicBool>,
}

impl BlockIngestor {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        classifier: TokenClassifier,
        registry: Arc<TokenRegistry>,
        stats: Arc<RwLock<SniperStats>>,
        block_time_secs: u64,
        is_running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            chain,
            classifier,
            registry,
            stats,
            poll_interval: Duration::from_secs(block_time_secs),
            is_running,
        }
    }

    /// 인제스트 루프.
    ///
    /// 새 블록 자체를 계속 얻지 못하는 것만이 파이프라인 치명 오류다 —
    /// 그 경우 Err를 반환해 운영자 수준의 재시작/백오프에 맡긴다.
    pub async fn run(&self) -> Result<()> {
        // 시작 커서: 다음에 생산될 블록부터
        let mut cursor = self
            .chain
            .latest_block_number()
            .await
            .map_err(|e| anyhow!("initial block number unavailable: {}", e))?
            + 1;

        info!("👁️ 블록 인제스트 시작: cursor={}", cursor);

        let mut interval = tokio::time::interval(self.poll_interval);
        let mut consecutive_failures = 0u32;

        while self.is_running.load(Ordering::SeqCst) {
            interval.tick().await;

            let latest = match self.chain.latest_block_number().await {
                Ok(latest) => {
                    consecutive_failures = 0;
                    latest
                }
                Err(e) => {
                    consecutive_failures += 1;
                    warn!(
                        "⚠️ 최신 블록 조회 실패 ({}/{}): {}",
                        consecutive_failures, MAX_CONSECUTIVE_FAILURES, e
                    );
                    if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                        return Err(anyhow!("persistent block feed failure: {}", e));
                    }
                    self.backoff(consecutive_failures).await;
                    continue;
                }
            };

            // 커서부터 최신까지 순서대로, 하나도 건너뛰지 않는다
            while cursor <= latest && self.is_running.load(Ordering::SeqCst) {
                match self.process_block(cursor).await {
                    Ok(()) => {
                        consecutive_failures = 0;
                        cursor += 1;
                    }
                    Err(e) => {
                        // 같은 높이를 바운디드 백오프 후 재시도
                        consecutive_failures += 1;
                        warn!(
                            "⚠️ 블록 {} 처리 실패 ({}/{}): {}",
                            cursor, consecutive_failures, MAX_CONSECUTIVE_FAILURES, e
                        );
                        if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                            return Err(anyhow!(
                                "persistent failure at block {}: {}",
                                cursor,
                                e
                            ));
                        }
                        self.backoff(consecutive_failures).await;
                    }
                }
            }
        }

        info!("🛑 블록 인제스트 중지됨: cursor={}", cursor);
        Ok(())
    }

    async fn backoff(&self, failures: u32) {
        let delay = Duration::from_millis((500 * failures as u64).min(10_000));
        tokio::time::sleep(delay).await;
    }

    /// 블록 하나를 처리한다.
    ///
    /// 트랜잭션 단위 실패(영수증 조회 등)는 그 트랜잭션만 건너뛰고
    /// 블록의 나머지를 계속 처리한다. 블록 자체를 못 읽었을 때만 Err.
    pub async fn process_block(&self, height: u64) -> Result<(), ChainError> {
        let txs = match self.chain.block_transactions(height).await? {
            Some(txs) => txs,
            None => {
                return Err(ChainError::Rpc(format!(
                    "block {} not yet available",
                    height
                )))
            }
        };

        info!("🧱 새 블록: {} ({}개 트랜잭션)", height, txs.len());

        for tx_hash in txs {
            let created = match self.receipt_with_retry(tx_hash).await {
                Some(created) => created,
                None => continue,
            };
            let Some(address) = created else { continue };

            self.stats.write().await.contracts_seen += 1;
            info!("📄 컨트랙트 배포 감지: {:?} (block {})", address, height);

            match self.classifier.classify_with_retry(address).await {
                Some(Classification::Token) => {
                    let record = TokenRecord::discovered(address, height, Utc::now());
                    if self.registry.insert_if_absent(record) {
                        self.stats.write().await.tokens_discovered += 1;
                        info!("🪙 새 토큰 발견: {:?}", address);
                    } else {
                        debug!("이미 추적 중: {:?}", address);
                    }
                }
                Some(Classification::Rejected) => {
                    self.stats.write().await.candidates_rejected += 1;
                    debug!("ERC-20 아님: {:?}", address);
                }
                None => {
                    self.stats.write().await.candidates_dropped += 1;
                    warn!("⚠️ 판정 불가로 후보 드롭: {:?}", address);
                }
            }
        }

        self.stats.write().await.blocks_processed += 1;
        Ok(())
    }

    /// 영수증 조회. 일시 장애는 짧게 재시도하고, 끝내 실패하면 그
    /// 트랜잭션만 포기한다 — 블록의 다른 트랜잭션을 막지 않는다.
    async fn receipt_with_retry(&self, tx_hash: ethers::types::H256) -> Option<Option<ethers::types::Address>> {
        for attempt in 1..=RECEIPT_ATTEMPTS {
            match self.chain.created_contract(tx_hash).await {
                Ok(created) => return Some(created),
                Err(e) => {
                    warn!(
                        "⚠️ 영수증 조회 실패 ({}/{}): {:?} - {}",
                        attempt, RECEIPT_ATTEMPTS, tx_hash, e
                    );
                    if attempt < RECEIPT_ATTEMPTS {
                        tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
                    }
                }
            }
        }
        None
    }
}
