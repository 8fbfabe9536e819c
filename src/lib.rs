//! Solana 多协议交易代理核心：交易管线、行情缓存、跨链消息跟踪与协议适配器。

pub mod agent;
pub mod cache;
pub mod config;
pub mod error;
pub mod ledger;
pub mod market;
pub mod messaging;
pub mod monitoring;
pub mod pipeline;
pub mod protocols;

#[cfg(test)]
mod testing;

pub use agent::{AgentStatus, WalletAction, WalletAgent, WalletOutcome};
pub use error::{Error, Result};
pub use pipeline::{SharedSigner, TransactionPipeline, TransactionRequest, TransactionResult};
