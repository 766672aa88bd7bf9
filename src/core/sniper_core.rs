use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use ethers::types::Address;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::blockchain::ChainReader;
use crate::config::Config;
use crate::core::{
    BlockIngestor, LiquidityMonitor, TokenClassifier, TokenRegistry, TradeExecutor,
};
use crate::types::SniperStats;

#[derive(Debug, Clone)]
pub struct SniperStatus {
    pub is_running: bool,
    pub tracked_tokens: usize,
    pub stats: SniperStats,
    pub uptime_seconds: u64,
}

/// 파이프라인 코디네이터
///
/// 두 개의 독립 케이던스를 구동한다: 블록 단위 인제스트(발견)와 고정 주기
/// 유동성 스윕(승격 → 실행). 두 케이던스가 공유하는 것은 레지스트리뿐이고,
/// 레지스트리의 원자적 삽입/전이가 유일 실행 불변식을 지킨다.
pub struct SniperCore {
    config: Arc<Config>,
    registry: Arc<TokenRegistry>,
    pub(crate) ingestor: Arc<BlockIngestor>,
    pub(crate) monitor: Arc<LiquidityMonitor>,
    pub(crate) executor: Arc<TradeExecutor>,
    stats: Arc<RwLock<SniperStats>>,
    is_running: Arc<AtomicBool>,
    started_at: Instant,
}

impl SniperCore {
    pub fn new(
        config: Arc<Config>,
        chain: Arc<dyn ChainReader>,
        recipient: Address,
    ) -> Result<Self> {
        info!("🔧 SniperCore 초기화 중...");

        let registry = Arc::new(TokenRegistry::new(
            config.sniper.max_tracked_age_secs,
            config.sniper.terminal_retention_secs,
        ));
        let stats = Arc::new(RwLock::new(SniperStats::default()));
        let is_running = Arc::new(AtomicBool::new(false));

        let classifier = TokenClassifier::new(Arc::clone(&chain), &config.sniper);
        let ingestor = Arc::new(BlockIngestor::new(
            Arc::clone(&chain),
            classifier,
            Arc::clone(&registry),
            Arc::clone(&stats),
            config.network.block_time,
            Arc::clone(&is_running),
        ));
        let monitor = Arc::new(LiquidityMonitor::new(
            Arc::clone(&chain),
            Arc::clone(&registry),
            config.dex.weth,
        ));
        let executor = Arc::new(TradeExecutor::new(
            Arc::clone(&chain),
            Arc::clone(&registry),
            Arc::clone(&stats),
            &config,
            recipient,
        )?);

        info!("✅ SniperCore 초기화 완료");

        Ok(Self {
            config,
            registry,
            ingestor,
            monitor,
            executor,
            stats,
            is_running,
            started_at: Instant::now(),
        })
    }

    pub fn registry(&self) -> Arc<TokenRegistry> {
        Arc::clone(&self.registry)
    }

    /// 파이프라인 시작. 태스크들을 띄우고 즉시 반환한다.
    pub fn start(&self) -> Result<()> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            warn!("⚠️ SniperCore가 이미 실행 중입니다");
            return Ok(());
        }

        info!("🚀 SniperCore 시작 중...");

        // 1. 블록 인제스트 태스크 — 새 블록을 얻지 못하는 것이 지속되면
        //    파이프라인 치명이므로 전체를 내린다
        let ingestor = Arc::clone(&self.ingestor);
        let is_running = Arc::clone(&self.is_running);
        tokio::spawn(async move {
            if let Err(e) = ingestor.run().await {
                error!("💀 블록 인제스트 치명 오류: {} - 파이프라인을 내립니다", e);
                is_running.store(false, Ordering::SeqCst);
            }
        });

        // 2. 유동성 스윕 태스크 — 승격된 토큰마다 실행기를 분리 태스크로
        //    띄워서 확정 폴링이 다음 스윕을 막지 않게 한다
        let monitor = Arc::clone(&self.monitor);
        let executor = Arc::clone(&self.executor);
        let stats = Arc::clone(&self.stats);
        let is_running = Arc::clone(&self.is_running);
        let sweep_interval = Duration::from_secs(self.config.sniper.sweep_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            loop {
                interval.tick().await;
                if !is_running.load(Ordering::SeqCst) {
                    break;
                }

                let outcome = monitor.sweep().await;
                {
                    let mut stats = stats.write().await;
                    if outcome.skipped {
                        stats.sweeps_skipped += 1;
                    } else {
                        stats.sweeps_completed += 1;
                        stats.liquidity_confirmed += outcome.promoted.len() as u64;
                    }
                }

                for token in outcome.promoted {
                    let executor = Arc::clone(&executor);
                    tokio::spawn(async move {
                        let final_state = executor.execute(token).await;
                        debug!("실행 종결: {:?} -> {}", token, final_state);
                    });
                }
            }
        });

        // 3. 퇴출 패스 태스크
        let registry = Arc::clone(&self.registry);
        let stats = Arc::clone(&self.stats);
        let is_running = Arc::clone(&self.is_running);
        let eviction_interval = Duration::from_secs(self.config.sniper.eviction_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(eviction_interval);
            loop {
                interval.tick().await;
                if !is_running.load(Ordering::SeqCst) {
                    break;
                }

                let report = registry.evict(chrono::Utc::now());
                if !report.expired.is_empty() {
                    stats.write().await.tokens_expired += report.expired.len() as u64;
                    for address in &report.expired {
                        info!("⌛ 추적 수명 초과로 퇴출: {:?}", address);
                    }
                }
                if !report.purged.is_empty() {
                    debug!("🧹 종결 레코드 {}개 정리됨", report.purged.len());
                }
            }
        });

        // 4. 상태 리포트 태스크
        let stats = Arc::clone(&self.stats);
        let registry = Arc::clone(&self.registry);
        let is_running = Arc::clone(&self.is_running);
        let report_interval =
            Duration::from_secs(self.config.monitoring.status_report_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(report_interval);
            // 첫 틱(즉시)은 건너뛴다
            interval.tick().await;
            loop {
                interval.tick().await;
                if !is_running.load(Ordering::SeqCst) {
                    break;
                }

                let stats = stats.read().await.clone();
                info!("📊 스나이퍼 상태:");
                info!("  🧱 처리된 블록: {}", stats.blocks_processed);
                info!("  📄 감지된 배포: {}", stats.contracts_seen);
                info!(
                    "  🪙 발견 토큰: {} (거부 {}, 드롭 {})",
                    stats.tokens_discovered, stats.candidates_rejected, stats.candidates_dropped
                );
                info!(
                    "  🔍 스윕: {}회 완료, {}회 건너뜀",
                    stats.sweeps_completed, stats.sweeps_skipped
                );
                info!("  💧 유동성 확인: {}", stats.liquidity_confirmed);
                info!(
                    "  🎯 매수: {}건 제출, {}건 확정, {}건 실패",
                    stats.trades_submitted, stats.trades_confirmed, stats.trades_failed
                );
                info!("  ⌛ 수명 퇴출: {}", stats.tokens_expired);
                info!("  📒 현재 추적 중: {}개", registry.len());
            }
        });

        info!("🎯 스나이퍼가 성공적으로 시작되었습니다!");
        Ok(())
    }

    /// 실행 중인 동안 대기한다 (ctrl-c 핸들러가 stop을 호출할 때까지)
    pub async fn wait_until_stopped(&self) {
        while self.is_running.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    pub fn stop(&self) {
        info!("🛑 SniperCore 중지 중...");
        self.is_running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub async fn get_status(&self) -> SniperStatus {
        SniperStatus {
            is_running: self.is_running(),
            tracked_tokens: self.registry.len(),
            stats: self.stats.read().await.clone(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
        }
    }
}

impl Clone for SniperCore {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            registry: Arc::clone(&self.registry),
            ingestor: Arc::clone(&self.ingestor),
            monitor: Arc::clone(&self.monitor),
            executor: Arc::clone(&self.executor),
            stats: Arc::clone(&self.stats),
            is_running: Arc::clone(&self.is_running),
            started_at: self.started_at,
        }
    }
}

impl std::fmt::Debug for SniperCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SniperCore")
            .field("is_running", &self.is_running())
            .field("tracked_tokens", &self.registry.len())
            .finish()
    }
}
