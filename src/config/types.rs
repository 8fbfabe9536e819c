use std::time::Duration;

use serde::{Deserialize, Serialize};
use solana_commitment_config::CommitmentConfig;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub protocols: ProtocolsConfig,
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub enum Network {
    #[serde(rename = "mainnet-beta", alias = "mainnet")]
    MainnetBeta,
    #[serde(rename = "testnet")]
    Testnet,
    #[serde(rename = "devnet")]
    Devnet,
}

impl Default for Network {
    fn default() -> Self {
        Self::MainnetBeta
    }
}

impl Network {
    pub fn as_str(self) -> &'static str {
        match self {
            Network::MainnetBeta => "mainnet-beta",
            Network::Testnet => "testnet",
            Network::Devnet => "devnet",
        }
    }

    pub fn default_rpc_url(self) -> &'static str {
        match self {
            Network::MainnetBeta => "https://api.mainnet-beta.solana.com",
            Network::Testnet => "https://api.testnet.solana.com",
            Network::Devnet => "https://api.devnet.solana.com",
        }
    }
}

/// 账本确认等级。
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Default for Commitment {
    fn default() -> Self {
        Self::Confirmed
    }
}

impl Commitment {
    pub fn to_config(self) -> CommitmentConfig {
        match self {
            Commitment::Processed => CommitmentConfig::processed(),
            Commitment::Confirmed => CommitmentConfig::confirmed(),
            Commitment::Finalized => CommitmentConfig::finalized(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub network: Network,
    #[serde(default)]
    pub rpc_url: Option<String>,
    #[serde(default)]
    pub commitment: Commitment,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GlobalConfig {
    pub fn resolved_rpc_url(&self) -> String {
        self.rpc_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.network.default_rpc_url())
            .to_string()
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoggingProfile {
    Lean,
    Verbose,
}

impl Default for LoggingProfile {
    fn default() -> Self {
        Self::Lean
    }
}

impl LoggingProfile {
    pub fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "super::default_logging_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    #[serde(default = "super::default_logging_profile")]
    pub profile: LoggingProfile,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "super::default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "super::default_confirm_timeout_ms")]
    pub confirm_timeout_ms: u64,
    #[serde(default = "super::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "super::default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default)]
    pub skip_preflight: bool,
}

impl PipelineConfig {
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// 第 `attempt` 次重试前的退避时长，指数增长并封顶 8 倍。
    pub fn backoff(&self, attempt: usize) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(3);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "super::default_pool_ttl_secs")]
    pub pool_ttl_secs: u64,
    #[serde(default = "super::default_quote_ttl_secs")]
    pub quote_ttl_secs: u64,
    #[serde(default = "super::default_message_ttl_secs")]
    pub message_ttl_secs: u64,
}

impl CacheConfig {
    pub fn pool_ttl(&self) -> Duration {
        Duration::from_secs(self.pool_ttl_secs)
    }

    pub fn quote_ttl(&self) -> Duration {
        Duration::from_secs(self.quote_ttl_secs)
    }

    pub fn message_ttl(&self) -> Duration {
        Duration::from_secs(self.message_ttl_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProtocolsConfig {
    #[serde(default)]
    pub jupiter: JupiterConfig,
    #[serde(default)]
    pub raydium: RaydiumConfig,
    #[serde(default)]
    pub jito: JitoConfig,
    #[serde(default)]
    pub kamino: KaminoConfig,
    #[serde(default)]
    pub pumpfun: PumpFunConfig,
    #[serde(default)]
    pub layerzero: LayerZeroConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JupiterConfig {
    #[serde(default = "super::default_true")]
    pub enabled: bool,
    #[serde(default = "super::default_slippage_bps")]
    pub default_slippage_bps: u16,
    #[serde(default = "super::default_max_slippage_bps")]
    pub max_slippage_bps: u16,
    #[serde(default = "super::default_jupiter_quote_url")]
    pub quote_url: String,
    #[serde(default = "super::default_jupiter_pools_url")]
    pub pools_url: String,
    #[serde(default = "super::default_http_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RaydiumConfig {
    #[serde(default = "super::default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JitoConfig {
    #[serde(default = "super::default_true")]
    pub enabled: bool,
    #[serde(default = "super::default_min_stake_lamports")]
    pub min_stake_lamports: u64,
    #[serde(default = "super::default_max_stake_lamports")]
    pub max_stake_lamports: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KaminoConfig {
    #[serde(default = "super::default_true")]
    pub enabled: bool,
    #[serde(default = "super::default_max_ltv")]
    pub max_ltv: f64,
    #[serde(default = "super::default_min_collateral_lamports")]
    pub min_collateral_lamports: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PumpFunConfig {
    #[serde(default = "super::default_true")]
    pub enabled: bool,
    #[serde(default = "super::default_min_token_amount")]
    pub min_token_amount: u64,
    #[serde(default = "super::default_max_token_amount")]
    pub max_token_amount: u64,
    #[serde(default = "super::default_max_decimals")]
    pub max_decimals: u8,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LayerZeroConfig {
    #[serde(default = "super::default_true")]
    pub enabled: bool,
    #[serde(default = "super::default_delivery_window_secs")]
    pub delivery_window_secs: u64,
}

impl LayerZeroConfig {
    pub fn delivery_window(&self) -> Duration {
        Duration::from_secs(self.delivery_window_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrometheusConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "super::default_prometheus_listen")]
    pub listen: String,
}
