//! Prometheus exporter 安装。所有指标以 `chainpilot_` 开头，并带上 `service` 与 `network` 全局标签。

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use once_cell::sync::OnceCell;
use tracing::info;

use crate::config::{Network, PrometheusConfig};

pub const METRIC_PREFIX: &str = "chainpilot_";

/// 从缓存刷新（几十毫秒）覆盖到交易确认超时（一分钟）。
const LATENCY_BUCKETS_MS: &[f64] = &[
    5.0, 25.0, 100.0, 250.0, 500.0, 1_000.0, 2_500.0, 5_000.0, 15_000.0, 30_000.0, 60_000.0,
];
const ATTEMPT_BUCKETS: &[f64] = &[1.0, 2.0, 3.0, 4.0, 6.0, 8.0];

static EXPORTER: OnceCell<SocketAddr> = OnceCell::new();
static PROMETHEUS_ENABLED: AtomicBool = AtomicBool::new(false);

fn listen_addr(config: &PrometheusConfig) -> Result<SocketAddr> {
    config
        .listen
        .trim()
        .parse()
        .with_context(|| format!("Prometheus 监听地址无效: {}", config.listen))
}

fn exporter_builder(addr: SocketAddr, network: Network) -> Result<PrometheusBuilder> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", "chainpilot")
        .add_global_label("network", network.as_str())
        .set_buckets_for_metric(Matcher::Suffix("_latency_ms".to_string()), LATENCY_BUCKETS_MS)
        .context("延迟直方图分桶配置无效")?
        .set_buckets_for_metric(
            Matcher::Full(format!("{METRIC_PREFIX}tx_attempts")),
            ATTEMPT_BUCKETS,
        )
        .context("尝试次数直方图分桶配置无效")
}

/// 未启用时返回 `Ok(false)`。进程内只安装一次，之后的调用复用首次结果。
pub fn try_init_prometheus(config: &PrometheusConfig, network: Network) -> Result<bool> {
    if !config.enable {
        return Ok(false);
    }
    EXPORTER.get_or_try_init(|| {
        let addr = listen_addr(config)?;
        exporter_builder(addr, network)?
            .install()
            .context("安装 Prometheus exporter 失败")?;
        PROMETHEUS_ENABLED.store(true, Ordering::Relaxed);
        info!(
            target: "monitoring::metrics",
            listen = %addr,
            network = network.as_str(),
            "Prometheus 指标已启用"
        );
        Ok::<_, anyhow::Error>(addr)
    })?;
    Ok(true)
}

pub fn prometheus_enabled() -> bool {
    PROMETHEUS_ENABLED.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(enable: bool, listen: &str) -> PrometheusConfig {
        PrometheusConfig {
            enable,
            listen: listen.to_string(),
        }
    }

    #[test]
    fn disabled_exporter_is_a_no_op() {
        let installed =
            try_init_prometheus(&config(false, "not an address"), Network::Devnet).expect("no-op");
        assert!(!installed);
        assert!(!prometheus_enabled());
    }

    #[test]
    fn invalid_listen_address_is_reported_before_install() {
        let err = try_init_prometheus(&config(true, "localhost"), Network::Devnet)
            .expect_err("missing port");
        assert!(err.to_string().contains("localhost"));
        assert!(!prometheus_enabled());
        assert!(EXPORTER.get().is_none());
    }

    #[test]
    fn default_listen_address_builds_an_exporter() {
        let addr = listen_addr(&PrometheusConfig::default()).expect("default listen");
        assert_eq!(addr.port(), 9898);
        exporter_builder(addr, Network::MainnetBeta).expect("builder");
    }
}
