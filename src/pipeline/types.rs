use std::fmt;
use std::sync::Arc;

use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Signature, Signer};
use solana_sdk::transaction::VersionedTransaction;

use crate::error::Error;
use crate::ledger::BlockReference;

/// 钱包/签名协作方：只需要 `pubkey` 与 `sign_message` 能力。
pub type SharedSigner = Arc<dyn Signer + Send + Sync>;

/// 已绑定 blockhash 且完成签名的交易请求。
#[derive(Clone)]
pub struct TransactionRequest {
    pub(crate) instructions: Vec<Instruction>,
    pub(crate) signers: Vec<SharedSigner>,
    pub(crate) fee_payer: Pubkey,
    pub(crate) block_reference: BlockReference,
    pub(crate) transaction: VersionedTransaction,
}

impl TransactionRequest {
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn fee_payer(&self) -> &Pubkey {
        &self.fee_payer
    }

    pub fn signer_keys(&self) -> Vec<Pubkey> {
        self.signers.iter().map(|signer| signer.pubkey()).collect()
    }

    pub fn block_reference(&self) -> &BlockReference {
        &self.block_reference
    }

    pub fn transaction(&self) -> &VersionedTransaction {
        &self.transaction
    }

    /// 首个签名即交易签名。
    pub fn signature(&self) -> Option<&Signature> {
        self.transaction.signatures.first()
    }
}

impl fmt::Debug for TransactionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionRequest")
            .field("instructions", &self.instructions.len())
            .field("signers", &self.signer_keys())
            .field("fee_payer", &self.fee_payer)
            .field("block_reference", &self.block_reference)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransactionResult {
    Success {
        signature: Signature,
        /// 已 finalized 时为 `None`。
        confirmations: Option<usize>,
        block_time: Option<i64>,
    },
    Failure {
        reason: Error,
    },
}

impl TransactionResult {
    pub fn failure(reason: Error) -> Self {
        Self::Failure { reason }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn signature(&self) -> Option<&Signature> {
        match self {
            Self::Success { signature, .. } => Some(signature),
            Self::Failure { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&Error> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { reason } => Some(reason),
        }
    }
}

impl From<Error> for TransactionResult {
    fn from(reason: Error) -> Self {
        Self::failure(reason)
    }
}
