use thiserror::Error;

/// 对外暴露的统一错误分类。
///
/// 需要在 single-flight 等待者之间共享，也会被放进 `TransactionResult::Failure`，
/// 因此只携带可克隆的文本信息。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("交易请求非法: {0}")]
    InvalidRequest(String),
    #[error("参数校验失败: {0}")]
    InvalidParameters(String),
    #[error("上游不可用: {0}")]
    UpstreamUnavailable(String),
    #[error("账本拒绝交易: {0}")]
    LedgerRejected(String),
    #[error("等待签名 {signature} 确认超时（{timeout_ms}ms），需按签名重新查询结果")]
    ConfirmationTimeout { signature: String, timeout_ms: u64 },
    #[error("提交重试 {attempts} 次后仍失败: {last_error}")]
    RetriesExhausted { attempts: usize, last_error: String },
    #[error("流动性不足: {0}")]
    InsufficientLiquidity(String),
    #[error("不支持的链: {0}")]
    UnsupportedChain(String),
    #[error("未找到: {0}")]
    NotFound(String),
    #[error("协议未启用: {0}")]
    ProtocolDisabled(&'static str),
}

impl Error {
    pub fn invalid_params(reason: impl Into<String>) -> Self {
        Self::InvalidParameters(reason.into())
    }

    pub fn upstream(reason: impl std::fmt::Display) -> Self {
        Self::UpstreamUnavailable(reason.to_string())
    }

    /// 供日志与指标使用的稳定标签。
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidRequest(_) => "invalid_request",
            Error::InvalidParameters(_) => "invalid_parameters",
            Error::UpstreamUnavailable(_) => "upstream_unavailable",
            Error::LedgerRejected(_) => "ledger_rejected",
            Error::ConfirmationTimeout { .. } => "confirmation_timeout",
            Error::RetriesExhausted { .. } => "retries_exhausted",
            Error::InsufficientLiquidity(_) => "insufficient_liquidity",
            Error::UnsupportedChain(_) => "unsupported_chain",
            Error::NotFound(_) => "not_found",
            Error::ProtocolDisabled(_) => "protocol_disabled",
        }
    }

    /// 结果不确定：交易可能已经上链，调用方需要按签名复查。
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Error::ConfirmationTimeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
