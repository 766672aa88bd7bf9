use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Arg, Command};
use ethers::types::Address;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod blockchain;
mod common;
mod config;
mod constants;
mod core;
mod mocks;
mod types;

use crate::api::ApiServer;
use crate::blockchain::{BlockchainClient, ChainReader};
use crate::config::Config;
use crate::core::SniperCore;
use crate::mocks::{is_mock_mode, MockChainReader};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("xcrack-token-sniper")
        .version("0.1.0")
        .author("xCrack Team <team@xcrack.dev>")
        .about("🦀 신규 토큰 유동성 스나이퍼 봇")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("설정 파일 경로")
                .default_value("config/default.toml"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("로그 레벨 (trace, debug, info, warn, error)")
                .default_value("info"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("시뮬레이션 모드 (실제 매수를 제출하지 않음)")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    // .env 로드 (있으면)
    dotenvy::dotenv().ok();

    // 로깅 초기화
    let log_level = matches.get_one::<String>("log-level").unwrap();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    // 설정 파일 로드
    let config_path = matches.get_one::<String>("config").unwrap();
    info!("📋 설정 파일 로드 중: {}", config_path);
    let mut config = Config::load(config_path).await?;

    // 명령줄 옵션 적용
    if matches.get_flag("dry-run") {
        warn!("🧪 시뮬레이션 모드 활성화 - 실제 매수를 제출하지 않습니다");
        config.execution.dry_run = true;
    }

    // 환경 변수에서 민감한 정보 로드
    load_environment_variables(&mut config);

    // 설정 검증
    if let Err(e) = config.validate() {
        error!("❌ 설정 검증 실패: {}", e);
        std::process::exit(1);
    }
    info!("✅ 설정 로드 완료");

    let config = Arc::new(config);

    // 체인 리더 구성 (mock 또는 real)
    let (chain, recipient): (Arc<dyn ChainReader>, Address) = if is_mock_mode() {
        info!("🎭 Mock 모드 - 가짜 체인에서 실행합니다");
        let mock = Arc::new(MockChainReader::new());
        mock.start_block_generation(Duration::from_secs(config.network.block_time));
        let recipient = config.execution.recipient.unwrap_or_else(Address::random);
        (mock, recipient)
    } else {
        let client = Arc::new(BlockchainClient::new(&config).await?);
        let recipient = config
            .execution
            .recipient
            .or_else(|| client.wallet_address())
            .or_else(|| config.execution.dry_run.then(Address::zero))
            .ok_or_else(|| {
                anyhow!("recipient 없음 - 서명 키 또는 execution.recipient를 설정하세요")
            })?;
        (client, recipient)
    };

    // 코어 초기화 및 시작
    let sniper = SniperCore::new(Arc::clone(&config), chain, recipient)?;
    sniper.start()?;

    // 상태 API (옵션)
    if config.monitoring.enable_api {
        let api = ApiServer::new(Arc::clone(&config), sniper.clone());
        api.start().await?;
    }

    // 종료 신호 처리
    let sniper_for_signal = sniper.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                warn!("🛑 종료 신호 수신됨, 안전하게 종료 중...");
                sniper_for_signal.stop();
            }
            Err(err) => {
                error!("❌ 신호 처리 오류: {}", err);
                std::process::exit(1);
            }
        }
    });

    // 파이프라인이 내려갈 때까지 대기
    sniper.wait_until_stopped().await;

    info!("✅ 스나이퍼가 안전하게 종료되었습니다.");
    Ok(())
}

fn print_banner() {
    println!(
        r#"
    ╔══════════════════════════════════════════════════════════════╗
    ║                                                              ║
    ║  🦀 xCrack Token Sniper v0.1.0                               ║
    ║                                                              ║
    ║  신규 토큰 유동성 스나이퍼 - Rust로 구축                      ║
    ║                                                              ║
    ║  🎯 파이프라인:                                              ║
    ║     • 블록 인제스트 (배포 감지 → ERC-20 분류)                ║
    ║     • 유동성 스윕 (풀 리저브 감시)                           ║
    ║     • 매수 실행 (제출 → 확정 추적)                           ║
    ║                                                              ║
    ║  🛡️ 안전 장치:                                              ║
    ║     • 시뮬레이션 모드                                        ║
    ║     • 토큰당 단일 실행 보장                                  ║
    ║     • 추적 수명 상한 (메모리 바운드)                         ║
    ║                                                              ║
    ╚══════════════════════════════════════════════════════════════╝
    "#
    );
}

fn load_environment_variables(config: &mut Config) {
    if let Ok(private_key) = env::var("PRIVATE_KEY") {
        config.execution.private_key = Some(private_key);
        info!("🔑 Private key loaded from environment");
    }

    if let Ok(rpc_url) = env::var("RPC_URL") {
        config.network.rpc_url = rpc_url;
        info!("🌐 RPC URL loaded from environment");
    }

    if let Ok(ws_url) = env::var("WS_URL") {
        config.network.ws_url = Some(ws_url);
        info!("🔌 WebSocket URL loaded from environment");
    }
}
