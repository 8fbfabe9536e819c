use std::time::Duration;

use metrics::{counter, histogram};
use solana_sdk::signature::Signature;
use tracing::{debug, info};

use crate::error::Error;
use crate::messaging::{Chain, MessageStatus};

use super::metrics::prometheus_enabled;

pub fn transaction_submitted(attempt: usize, signature: &Signature) {
    debug!(
        target: "monitoring::pipeline",
        event = "submitted",
        attempt,
        signature = %signature,
        "交易已发送，等待确认"
    );
    if prometheus_enabled() {
        counter!("chainpilot_tx_submitted_total").increment(1);
    }
}

pub fn transaction_retry(attempt: usize, reason: &str) {
    debug!(
        target: "monitoring::pipeline",
        event = "retry",
        attempt,
        reason,
        "交易重试"
    );
    if prometheus_enabled() {
        counter!("chainpilot_tx_retry_total").increment(1);
    }
}

pub fn transaction_confirmed(signature: &Signature, attempts: usize, elapsed: Duration) {
    let elapsed_ms = elapsed.as_secs_f64() * 1_000.0;
    info!(
        target: "monitoring::pipeline",
        event = "confirmed",
        signature = %signature,
        attempts,
        elapsed_ms = format_args!("{elapsed_ms:.3}"),
        "交易确认完成"
    );
    if prometheus_enabled() {
        counter!("chainpilot_tx_confirmed_total").increment(1);
        histogram!("chainpilot_tx_confirm_latency_ms").record(elapsed_ms);
        histogram!("chainpilot_tx_attempts").record(attempts as f64);
    }
}

pub fn transaction_failed(reason: &Error, attempts: usize) {
    if prometheus_enabled() {
        counter!("chainpilot_tx_failed_total", "kind" => reason.kind()).increment(1);
        histogram!("chainpilot_tx_attempts").record(attempts as f64);
    }
}

pub fn cache_lookup(cache: &'static str, hit: bool) {
    if prometheus_enabled() {
        let outcome = if hit { "hit" } else { "miss" };
        counter!("chainpilot_cache_lookup_total", "cache" => cache, "outcome" => outcome)
            .increment(1);
    }
}

pub fn cache_refresh(cache: &'static str, error: Option<&Error>, elapsed: Duration) {
    let elapsed_ms = elapsed.as_secs_f64() * 1_000.0;
    match error {
        None => debug!(
            target: "monitoring::cache",
            event = "refresh",
            cache,
            elapsed_ms = format_args!("{elapsed_ms:.3}"),
            "缓存刷新完成"
        ),
        Some(err) => info!(
            target: "monitoring::cache",
            event = "refresh_failed",
            cache,
            kind = err.kind(),
            error = %err,
            elapsed_ms = format_args!("{elapsed_ms:.3}"),
            "缓存刷新失败"
        ),
    }
    if prometheus_enabled() {
        let outcome = if error.is_some() { "error" } else { "ok" };
        counter!("chainpilot_cache_refresh_total", "cache" => cache, "outcome" => outcome)
            .increment(1);
        histogram!("chainpilot_cache_refresh_latency_ms", "cache" => cache).record(elapsed_ms);
    }
}

pub fn message_minted(message_hash: &str, destination: Chain) {
    info!(
        target: "monitoring::messaging",
        event = "minted",
        message_hash,
        destination = destination.name(),
        "跨链消息回执已创建"
    );
    if prometheus_enabled() {
        counter!("chainpilot_message_minted_total", "destination" => destination.name())
            .increment(1);
    }
}

pub fn message_transition(message_hash: &str, from: MessageStatus, to: MessageStatus) {
    info!(
        target: "monitoring::messaging",
        event = "transition",
        message_hash,
        from = from.as_str(),
        to = to.as_str(),
        "跨链消息状态变更"
    );
    if prometheus_enabled() {
        counter!("chainpilot_message_transition_total", "to" => to.as_str()).increment(1);
    }
}
