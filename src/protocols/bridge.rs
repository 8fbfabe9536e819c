use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use tracing::info;

use crate::error::{Error, Result};
use crate::messaging::{AdapterParams, Chain, MessageFee, MessageTracker};
use crate::pipeline::{SharedSigner, TransactionResult};

use super::{ProtocolAction, submit_action};

/// 代币跨链载荷的固定部分：mint（32 字节）+ 数量（8 字节）。
const TRANSFER_HEADER_LEN: usize = 32 + 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeParams {
    pub source_chain: String,
    pub destination_chain: String,
    pub token: Pubkey,
    pub amount: u64,
    /// 目标链上的接收地址，格式由目标链决定。
    pub recipient: String,
    pub adapter: AdapterParams,
}

impl BridgeParams {
    pub fn payload_len(&self) -> usize {
        TRANSFER_HEADER_LEN + self.recipient.len()
    }

    /// 返回解析后的目标链。源链只能是 solana，目标链不能与源链相同。
    pub fn validate(&self) -> Result<Chain> {
        if self.source_chain.trim().is_empty() || self.destination_chain.trim().is_empty() {
            return Err(Error::invalid_params("必须提供源链与目标链"));
        }
        if self.amount == 0 {
            return Err(Error::invalid_params("跨链数量必须大于 0"));
        }
        if self.recipient.trim().is_empty() {
            return Err(Error::invalid_params("接收地址不能为空"));
        }
        self.adapter.validate()?;
        let source: Chain = self.source_chain.parse()?;
        if source != Chain::Solana {
            return Err(Error::invalid_params(format!(
                "源链必须是 solana，实际为 {source}"
            )));
        }
        let destination: Chain = self.destination_chain.parse()?;
        if destination == source {
            return Err(Error::invalid_params("源链与目标链相同"));
        }
        Ok(destination)
    }
}

/// LayerZero 代币跨链。成功提交后像普通消息一样登记回执，由 [`MessageTracker`] 跟踪投递。
pub struct LayerZeroBridge {
    tracker: Arc<MessageTracker>,
}

impl LayerZeroBridge {
    pub fn new(tracker: Arc<MessageTracker>) -> Self {
        Self { tracker }
    }

    pub fn tracker(&self) -> &Arc<MessageTracker> {
        &self.tracker
    }

    pub async fn bridge_tokens(
        &self,
        params: &BridgeParams,
        signer: SharedSigner,
    ) -> TransactionResult {
        let dst_chain = match self.tracker.ensure_enabled().and_then(|_| params.validate()) {
            Ok(chain) => chain,
            Err(err) => return TransactionResult::failure(err),
        };

        let action = ProtocolAction::LayerZeroBridge {
            dst_chain,
            token: params.token,
            amount: params.amount,
            recipient: params.recipient.clone(),
            adapter: params.adapter.clone(),
        };
        let result = submit_action(
            self.tracker.pipeline(),
            self.tracker.composer(),
            action,
            signer,
        )
        .await;
        if let TransactionResult::Success { signature, .. } = &result {
            let receipt = self.tracker.register(signature, dst_chain);
            info!(
                target: "protocols::bridge",
                message_hash = %receipt.message_hash,
                token = %params.token,
                amount = params.amount,
                dst_chain = %dst_chain,
                "跨链转账已提交"
            );
        }
        result
    }

    pub async fn estimate_fees(&self, params: &BridgeParams) -> Result<MessageFee> {
        self.tracker.ensure_enabled()?;
        let dst_chain = params.validate()?;
        self.tracker
            .oracle()
            .quote_fee(dst_chain, params.payload_len(), &params.adapter)
            .await
    }
}
