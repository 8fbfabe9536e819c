//! 行情数据：池子与报价的数据模型，以及上游行情源抽象。

pub mod jupiter;
pub mod serde_helpers;
mod types;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::error::Error;

pub use jupiter::JupiterApiClient;
pub use types::{
    Fee, MarketInfo, PoolInfo, PoolStats, PoolToken, PriceQuote, QuoteParams, Route,
};

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("行情 API 请求失败: {0}")]
    Http(#[from] reqwest::Error),
    #[error("请求 {endpoint} 超时（{timeout_ms}ms）")]
    Timeout {
        endpoint: String,
        timeout_ms: u64,
        #[source]
        source: reqwest::Error,
    },
    #[error("响应解析失败: {0}")]
    Json(#[from] serde_json::Error),
    #[error("请求 {endpoint} 返回状态 {status}: {body}")]
    ApiStatus {
        endpoint: String,
        status: StatusCode,
        body: String,
    },
    #[error("请求 {endpoint} 被限流，状态 {status}: {body}")]
    RateLimited {
        endpoint: String,
        status: StatusCode,
        body: String,
    },
    #[error("行情响应结构不符合预期: {0}")]
    Schema(String),
}

impl MarketError {
    /// 把 source 链拼成一行，去掉相邻的重复描述。
    pub fn describe(&self) -> String {
        use std::error::Error as _;
        let mut parts = vec![self.to_string()];
        let mut current = self.source();
        while let Some(err) = current {
            let text = err.to_string();
            if parts.last().map(|last| last != &text).unwrap_or(true) {
                parts.push(text);
            }
            current = err.source();
        }
        parts.join(" | caused by: ")
    }
}

impl From<MarketError> for Error {
    fn from(err: MarketError) -> Self {
        Error::UpstreamUnavailable(err.describe())
    }
}

/// 上游行情源。调用方把它视为无副作用的只读接口，两次调用之间没有顺序保证。
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn list_pools(&self) -> Result<Vec<PoolInfo>, MarketError>;

    async fn quote(&self, params: &QuoteParams) -> Result<PriceQuote, MarketError>;
}
