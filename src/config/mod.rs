pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

use self::types as cfg;

const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn default_logging_level() -> String {
    "info".to_string()
}

pub(crate) fn default_logging_profile() -> cfg::LoggingProfile {
    cfg::LoggingProfile::Lean
}

pub(crate) fn default_max_retries() -> usize {
    3
}

pub(crate) fn default_confirm_timeout_ms() -> u64 {
    60_000
}

pub(crate) fn default_poll_interval_ms() -> u64 {
    400
}

pub(crate) fn default_retry_backoff_ms() -> u64 {
    250
}

pub(crate) fn default_pool_ttl_secs() -> u64 {
    300
}

pub(crate) fn default_quote_ttl_secs() -> u64 {
    10
}

pub(crate) fn default_message_ttl_secs() -> u64 {
    30
}

pub(crate) fn default_slippage_bps() -> u16 {
    50
}

pub(crate) fn default_max_slippage_bps() -> u16 {
    1_000
}

pub(crate) fn default_jupiter_quote_url() -> String {
    "https://lite-api.jup.ag/swap/v1/quote".to_string()
}

pub(crate) fn default_jupiter_pools_url() -> String {
    "https://lite-api.jup.ag/pools/v1/list".to_string()
}

pub(crate) fn default_http_timeout_ms() -> u64 {
    5_000
}

pub(crate) fn default_min_stake_lamports() -> u64 {
    LAMPORTS_PER_SOL / 10
}

pub(crate) fn default_max_stake_lamports() -> u64 {
    100_000 * LAMPORTS_PER_SOL
}

pub(crate) fn default_max_ltv() -> f64 {
    0.75
}

pub(crate) fn default_min_collateral_lamports() -> u64 {
    LAMPORTS_PER_SOL / 10
}

pub(crate) fn default_min_token_amount() -> u64 {
    1_000
}

pub(crate) fn default_max_token_amount() -> u64 {
    1_000_000_000
}

pub(crate) fn default_max_decimals() -> u8 {
    9
}

pub(crate) fn default_delivery_window_secs() -> u64 {
    30 * 60
}

pub(crate) fn default_prometheus_listen() -> String {
    "0.0.0.0:9898".to_string()
}

impl Default for cfg::AppConfig {
    fn default() -> Self {
        Self {
            global: cfg::GlobalConfig::default(),
            pipeline: cfg::PipelineConfig::default(),
            cache: cfg::CacheConfig::default(),
            protocols: cfg::ProtocolsConfig::default(),
            prometheus: cfg::PrometheusConfig::default(),
        }
    }
}

impl Default for cfg::GlobalConfig {
    fn default() -> Self {
        Self {
            network: cfg::Network::default(),
            rpc_url: None,
            commitment: cfg::Commitment::default(),
            logging: cfg::LoggingConfig::default(),
        }
    }
}

impl Default for cfg::LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_logging_level(),
            json: false,
            profile: default_logging_profile(),
        }
    }
}

impl Default for cfg::PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            confirm_timeout_ms: default_confirm_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
            skip_preflight: false,
        }
    }
}

impl Default for cfg::CacheConfig {
    fn default() -> Self {
        Self {
            pool_ttl_secs: default_pool_ttl_secs(),
            quote_ttl_secs: default_quote_ttl_secs(),
            message_ttl_secs: default_message_ttl_secs(),
        }
    }
}

impl Default for cfg::JupiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_slippage_bps: default_slippage_bps(),
            max_slippage_bps: default_max_slippage_bps(),
            quote_url: default_jupiter_quote_url(),
            pools_url: default_jupiter_pools_url(),
            timeout_ms: default_http_timeout_ms(),
        }
    }
}

impl Default for cfg::RaydiumConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for cfg::JitoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_stake_lamports: default_min_stake_lamports(),
            max_stake_lamports: default_max_stake_lamports(),
        }
    }
}

impl Default for cfg::KaminoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_ltv: default_max_ltv(),
            min_collateral_lamports: default_min_collateral_lamports(),
        }
    }
}

impl Default for cfg::PumpFunConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_token_amount: default_min_token_amount(),
            max_token_amount: default_max_token_amount(),
            max_decimals: default_max_decimals(),
        }
    }
}

impl Default for cfg::LayerZeroConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delivery_window_secs: default_delivery_window_secs(),
        }
    }
}

impl Default for cfg::PrometheusConfig {
    fn default() -> Self {
        Self {
            enable: false,
            listen: default_prometheus_listen(),
        }
    }
}
