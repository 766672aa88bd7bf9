use anyhow::Result;
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::constants;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws_url: Option<String>,
    /// 블록 생성 주기(초) — 인제스트 폴링 주기로 사용
    pub block_time: u64,
}

/// 스나이퍼 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SniperConfig {
    /// 토큰당 매수 금액 (ETH 단위 문자열)
    pub purchase_amount_eth: String,
    /// 최소 허용 출력 (토큰 기본 단위, 10진 문자열). "0"이면 슬리피지 보호 없음
    #[serde(default = "default_min_output")]
    pub min_output_tokens: String,
    /// 유동성 스윕 주기(초)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// 토큰 최대 추적 수명(초) — 초과 시 상태와 무관하게 퇴출
    #[serde(default = "default_max_tracked_age")]
    pub max_tracked_age_secs: u64,
    /// 매수 데드라인 윈도우(초)
    #[serde(default = "default_trade_deadline")]
    pub trade_deadline_secs: u64,
    /// 확정 대기 상한(초)
    #[serde(default = "default_max_confirmation_wait")]
    pub max_confirmation_wait_secs: u64,
    /// 확정 폴링 주기(초)
    #[serde(default = "default_confirmation_poll_interval")]
    pub confirmation_poll_interval_secs: u64,
    /// 분류 프로브 최대 시도 횟수 (일시적 장애 한정)
    #[serde(default = "default_max_probe_attempts")]
    pub max_probe_attempts: u32,
    /// 프로브 재시도 기본 지연(밀리초), 시도마다 선형 증가
    #[serde(default = "default_probe_retry_delay_ms")]
    pub probe_retry_delay_ms: u64,
    /// 종결 상태 레코드 보존 기간(초)
    #[serde(default = "default_terminal_retention")]
    pub terminal_retention_secs: u64,
    /// 퇴출 패스 주기(초)
    #[serde(default = "default_eviction_interval")]
    pub eviction_interval_secs: u64,
}

/// DEX 주소 설정 (Uniswap V2 호환)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DexConfig {
    pub name: String,
    pub router: Address,
    pub factory: Address,
    /// 기축 자산 (래핑된 네이티브 토큰) — 풀 탐색과 스왑 경로의 반대편
    pub weth: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// 서명 키 (환경 변수 PRIVATE_KEY로 덮어쓰기 가능)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    /// 매수 토큰 수신 주소 (없으면 서명 지갑 주소)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<Address>,
    /// 스왑 가스 한도
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    /// RPC 호출 타임아웃(밀리초)
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
    /// 시뮬레이션 모드 — 실제 트랜잭션을 제출하지 않음
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
    #[serde(default = "default_status_interval")]
    pub status_report_interval_secs: u64,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default)]
    pub enable_api: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub sniper: SniperConfig,
    pub dex: DexConfig,
    pub execution: ExecutionConfig,
    pub monitoring: MonitoringConfig,
}

// 기본값 함수들
fn default_min_output() -> String {
    "0".to_string()
}

fn default_sweep_interval() -> u64 {
    constants::DEFAULT_SWEEP_INTERVAL
}

fn default_max_tracked_age() -> u64 {
    constants::DEFAULT_MAX_TRACKED_AGE
}

fn default_trade_deadline() -> u64 {
    constants::DEFAULT_TRADE_DEADLINE
}

fn default_max_confirmation_wait() -> u64 {
    constants::DEFAULT_MAX_CONFIRMATION_WAIT
}

fn default_confirmation_poll_interval() -> u64 {
    constants::DEFAULT_CONFIRMATION_POLL_INTERVAL
}

fn default_max_probe_attempts() -> u32 {
    3
}

fn default_probe_retry_delay_ms() -> u64 {
    500
}

fn default_terminal_retention() -> u64 {
    constants::DEFAULT_TERMINAL_RETENTION
}

fn default_eviction_interval() -> u64 {
    300
}

fn default_gas_limit() -> u64 {
    constants::DEFAULT_SWAP_GAS_LIMIT
}

fn default_rpc_timeout_ms() -> u64 {
    10_000
}

fn default_status_interval() -> u64 {
    60
}

fn default_api_port() -> u16 {
    8080
}

impl Config {
    pub async fn load(path: &str) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub async fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// 매수 금액을 wei로
    pub fn purchase_amount_wei(&self) -> Result<U256> {
        constants::parse_eth_amount(&self.sniper.purchase_amount_eth)
    }

    /// 슬리피지 하한을 토큰 기본 단위로
    pub fn min_output_wei(&self) -> Result<U256> {
        U256::from_dec_str(&self.sniper.min_output_tokens).map_err(|e| {
            anyhow::anyhow!(
                "invalid min_output_tokens '{}': {}",
                self.sniper.min_output_tokens,
                e
            )
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.network.rpc_url.is_empty() {
            return Err(anyhow::anyhow!("Network RPC URL cannot be empty"));
        }

        if self.network.block_time == 0 {
            return Err(anyhow::anyhow!("Block time must be greater than 0"));
        }

        let purchase = self.purchase_amount_wei()?;
        if purchase.is_zero() {
            return Err(anyhow::anyhow!("Purchase amount must be positive"));
        }

        self.min_output_wei()?;

        if self.sniper.sweep_interval_secs == 0 {
            return Err(anyhow::anyhow!("Sweep interval must be greater than 0"));
        }

        if self.sniper.max_tracked_age_secs == 0 {
            return Err(anyhow::anyhow!("Max tracked age must be greater than 0"));
        }

        if self.sniper.max_probe_attempts == 0 {
            return Err(anyhow::anyhow!("Max probe attempts must be at least 1"));
        }

        if self.dex.weth == Address::zero() {
            return Err(anyhow::anyhow!(
                "Base asset (weth) must be the canonical wrapped token, not the zero address"
            ));
        }

        // 실제 제출 모드에서는 서명 키가 필수
        if !self.execution.dry_run {
            match &self.execution.private_key {
                Some(pk) if !pk.is_empty() && pk != "your_private_key_here" => {}
                _ => {
                    return Err(anyhow::anyhow!(
                        "Signer private key must be configured (or enable dry_run)"
                    ))
                }
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig {
                chain_id: 1,
                name: "mainnet".to_string(),
                rpc_url: "https://eth-mainnet.g.alchemy.com/v2/YOUR_API_KEY".to_string(),
                ws_url: Some("wss://eth-mainnet.g.alchemy.com/v2/YOUR_API_KEY".to_string()),
                block_time: constants::BLOCK_TIME,
            },
            sniper: SniperConfig {
                purchase_amount_eth: "0.1".to_string(),
                min_output_tokens: default_min_output(),
                sweep_interval_secs: default_sweep_interval(),
                max_tracked_age_secs: default_max_tracked_age(),
                trade_deadline_secs: default_trade_deadline(),
                max_confirmation_wait_secs: default_max_confirmation_wait(),
                confirmation_poll_interval_secs: default_confirmation_poll_interval(),
                max_probe_attempts: default_max_probe_attempts(),
                probe_retry_delay_ms: default_probe_retry_delay_ms(),
                terminal_retention_secs: default_terminal_retention(),
                eviction_interval_secs: default_eviction_interval(),
            },
            dex: DexConfig {
                name: "uniswap_v2".to_string(),
                router: constants::uniswap_v2_router(),
                factory: constants::uniswap_v2_factory(),
                weth: constants::weth_address(),
            },
            execution: ExecutionConfig {
                private_key: None,
                recipient: None,
                gas_limit: default_gas_limit(),
                rpc_timeout_ms: default_rpc_timeout_ms(),
                dry_run: false,
            },
            monitoring: MonitoringConfig {
                log_level: "info".to_string(),
                status_report_interval_secs: default_status_interval(),
                api_port: default_api_port(),
                enable_api: false,
            },
        }
    }
}

#[cfg(test)]
impl Config {
    /// 테스트용 설정 — 서명 없이 검증을 통과하도록 dry_run 활성화
    pub fn load_test_config() -> Self {
        let mut config = Self::default();
        config.execution.dry_run = true;
        config.network.block_time = 1;
        config.sniper.sweep_interval_secs = 1;
        config.sniper.eviction_interval_secs = 1;
        config.sniper.probe_retry_delay_ms = 1;
        config.sniper.confirmation_poll_interval_secs = 1;
        config.sniper.max_confirmation_wait_secs = 2;
        config.monitoring.status_report_interval_secs = 3600;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.network.chain_id, 1);
        assert_eq!(config.network.name, "mainnet");
        assert_eq!(config.sniper.purchase_amount_eth, "0.1");
        assert_eq!(config.sniper.sweep_interval_secs, 60);
        assert_eq!(config.sniper.max_tracked_age_secs, 86_400);
        assert_eq!(config.sniper.trade_deadline_secs, 1_200);
        assert_eq!(config.execution.gas_limit, 200_000);
        assert_eq!(config.dex.weth, crate::constants::weth_address());
    }

    #[test]
    fn test_purchase_amount_wei() {
        let config = Config::default();
        assert_eq!(
            config.purchase_amount_wei().unwrap(),
            U256::from(100_000_000_000_000_000u64)
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.execution.private_key = Some(
            "0x1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef".to_string(),
        );
        assert!(config.validate().is_ok());

        // 빈 RPC URL은 실패
        config.network.rpc_url = String::new();
        assert!(config.validate().is_err());

        // 서명 키 없는 실제 제출 모드는 실패
        let mut config = Config::default();
        config.execution.private_key = None;
        config.execution.dry_run = false;
        assert!(config.validate().is_err());

        // dry_run이면 서명 키 없이 통과
        config.execution.dry_run = true;
        assert!(config.validate().is_ok());

        // 매수 금액 0은 실패
        let mut config = Config::load_test_config();
        config.sniper.purchase_amount_eth = "0".to_string();
        assert!(config.validate().is_err());

        // 기축 자산이 0 주소면 실패 (제로 주소 페어 조회 결함 방지)
        let mut config = Config::load_test_config();
        config.dex.weth = Address::zero();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.network.chain_id, back.network.chain_id);
        assert_eq!(config.sniper.sweep_interval_secs, back.sniper.sweep_interval_secs);
        assert_eq!(config.dex.router, back.dex.router);
        assert_eq!(config.execution.gas_limit, back.execution.gas_limit);
    }

    #[tokio::test]
    async fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sniper.toml");
        let path_str = path.to_str().unwrap();

        let config = Config::default();
        config.save(path_str).await.unwrap();

        let loaded = Config::load(path_str).await.unwrap();
        assert_eq!(loaded.sniper.purchase_amount_eth, "0.1");
        assert_eq!(loaded.dex.factory, config.dex.factory);
    }

    #[test]
    fn test_defaults_applied_on_sparse_toml() {
        // 최소 섹션만 있는 TOML에서 serde 기본값이 채워지는지
        let toml_str = r#"
            [network]
            chain_id = 1
            name = "mainnet"
            rpc_url = "http://localhost:8545"
            block_time = 12

            [sniper]
            purchase_amount_eth = "0.05"

            [dex]
            name = "uniswap_v2"
            router = "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D"
            factory = "0x5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f"
            weth = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"

            [execution]

            [monitoring]
            log_level = "info"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.sniper.purchase_amount_eth, "0.05");
        assert_eq!(config.sniper.sweep_interval_secs, 60);
        assert_eq!(config.sniper.max_tracked_age_secs, 86_400);
        assert_eq!(config.execution.gas_limit, 200_000);
        assert!(!config.execution.dry_run);
    }
}
