use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::Level;

#[derive(Debug, Clone, Default)]
pub struct LatencyMetadata {
    fields: Arc<BTreeMap<String, String>>,
}

impl LatencyMetadata {
    pub fn new(fields: BTreeMap<String, String>) -> Self {
        Self {
            fields: Arc::new(fields),
        }
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    fn summary(&self) -> Option<String> {
        if self.fields.is_empty() {
            return None;
        }
        Some(
            self.fields
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(" "),
        )
    }
}

/// 耗时守卫：`finish` 或 drop 时只记录一次。
#[derive(Debug)]
pub struct LatencyGuard {
    operation: Cow<'static, str>,
    start: Instant,
    level: Level,
    metadata: LatencyMetadata,
    ended: AtomicBool,
}

impl LatencyGuard {
    pub fn new(
        operation: impl Into<Cow<'static, str>>,
        level: Level,
        metadata: LatencyMetadata,
    ) -> Self {
        Self {
            operation: operation.into(),
            start: Instant::now(),
            level,
            metadata,
            ended: AtomicBool::new(false),
        }
    }

    pub fn finish(&self) -> Duration {
        let elapsed = self.start.elapsed();
        if !self.ended.swap(true, Ordering::SeqCst) {
            log_latency(self.level, &self.operation, elapsed, &self.metadata);
        }
        elapsed
    }
}

impl Drop for LatencyGuard {
    fn drop(&mut self) {
        if !self.ended.swap(true, Ordering::SeqCst) {
            log_latency(
                self.level,
                &self.operation,
                self.start.elapsed(),
                &self.metadata,
            );
        }
    }
}

pub fn guard_with_level(
    operation: impl Into<Cow<'static, str>>,
    level: Level,
    metadata: LatencyMetadata,
) -> LatencyGuard {
    LatencyGuard::new(operation, level, metadata)
}

fn log_latency(level: Level, operation: &str, elapsed: Duration, metadata: &LatencyMetadata) {
    let elapsed_ms = format!("{:.3}", elapsed.as_secs_f64() * 1_000.0);
    let metadata = metadata.summary().unwrap_or_default();

    macro_rules! log_event {
        ($macro:ident) => {
            tracing::$macro!(
                target: "latency",
                %operation,
                elapsed_ms = %elapsed_ms,
                metadata = %metadata,
                "耗时统计"
            )
        };
    }

    match level {
        Level::ERROR => log_event!(error),
        Level::WARN => log_event!(warn),
        Level::INFO => log_event!(info),
        Level::DEBUG => log_event!(debug),
        _ => log_event!(trace),
    }
}
