//! 账本客户端抽象：管线与适配器只通过该 trait 访问链上状态。

mod rpc;

use async_trait::async_trait;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use thiserror::Error;

pub use rpc::RpcLedger;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// 网络或节点暂时不可用，可以重试。
    #[error("账本传输失败: {0}")]
    Transport(String),
    /// 账本明确拒绝了交易（余额不足、程序错误等），不可重试。
    #[error("账本拒绝: {0}")]
    Rejected(String),
    /// 交易引用的 blockhash 已不被账本识别，换一个新的区块引用重建后可以再发。
    #[error("区块引用已过期: {0}")]
    Expired(String),
}

impl LedgerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Transport(_) | LedgerError::Expired(_))
    }
}

/// 构建交易时获取的近期区块引用，账本高度越过 `last_valid_block_height` 后失效。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockReference {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

impl BlockReference {
    pub fn new(blockhash: Hash, last_valid_block_height: u64) -> Self {
        Self {
            blockhash,
            last_valid_block_height,
        }
    }

    pub fn expired_at(&self, block_height: u64) -> bool {
        block_height > self.last_valid_block_height
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStatus {
    pub slot: u64,
    /// `None` 表示已经 rooted（finalized）。
    pub confirmations: Option<usize>,
    pub err: Option<String>,
    /// 是否已达到查询时要求的确认等级。
    pub reached_commitment: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationOutcome {
    pub err: Option<String>,
    pub logs: Vec<String>,
    pub units_consumed: Option<u64>,
}

impl SimulationOutcome {
    pub fn succeeded(&self) -> bool {
        self.err.is_none()
    }
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn latest_block_reference(
        &self,
        commitment: CommitmentConfig,
    ) -> Result<BlockReference, LedgerError>;

    async fn submit(&self, transaction: &VersionedTransaction) -> Result<Signature, LedgerError>;

    async fn signature_status(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> Result<Option<SignatureStatus>, LedgerError>;

    async fn simulate(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<SimulationOutcome, LedgerError>;

    async fn balance(&self, address: &Pubkey) -> Result<u64, LedgerError>;

    async fn block_height(&self, commitment: CommitmentConfig) -> Result<u64, LedgerError>;

    async fn lamports_per_signature(&self) -> Result<u64, LedgerError>;

    async fn block_time(&self, slot: u64) -> Result<Option<i64>, LedgerError>;
}
