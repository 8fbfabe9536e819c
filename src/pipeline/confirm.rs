use std::time::Duration;

use solana_commitment_config::CommitmentConfig;
use solana_sdk::signature::Signature;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::ledger::{BlockReference, LedgerClient};

/// 单次确认轮询的结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Confirmation {
    Confirmed {
        slot: u64,
        confirmations: Option<usize>,
    },
    Rejected(String),
    /// 签名从未出现且 blockhash 已过期，交易不可能再落地。
    Expired,
    /// 超时：交易可能之后仍会确认。
    TimedOut,
}

pub(crate) async fn await_confirmation(
    ledger: &dyn LedgerClient,
    signature: &Signature,
    block_reference: &BlockReference,
    commitment: CommitmentConfig,
    timeout: Duration,
    poll_interval: Duration,
) -> Confirmation {
    let deadline = Instant::now() + timeout;

    loop {
        match ledger.signature_status(signature, commitment).await {
            Ok(Some(status)) => {
                if let Some(err) = status.err {
                    return Confirmation::Rejected(err);
                }
                if status.reached_commitment {
                    return Confirmation::Confirmed {
                        slot: status.slot,
                        confirmations: status.confirmations,
                    };
                }
                debug!(
                    target: "pipeline::confirm",
                    signature = %signature,
                    slot = status.slot,
                    confirmations = ?status.confirmations,
                    "交易已落地，等待达到目标确认等级"
                );
            }
            Ok(None) => match ledger.block_height(commitment).await {
                Ok(height) if block_reference.expired_at(height) => {
                    warn!(
                        target: "pipeline::confirm",
                        signature = %signature,
                        block_height = height,
                        last_valid_block_height = block_reference.last_valid_block_height,
                        "blockhash 已过期且签名未出现"
                    );
                    return Confirmation::Expired;
                }
                Ok(_) => {}
                Err(err) => {
                    debug!(
                        target: "pipeline::confirm",
                        error = %err,
                        "查询区块高度失败，继续轮询"
                    );
                }
            },
            Err(err) => {
                debug!(
                    target: "pipeline::confirm",
                    signature = %signature,
                    error = %err,
                    "查询签名状态失败，继续轮询"
                );
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Confirmation::TimedOut;
        }
        tokio::time::sleep(poll_interval.min(deadline - now)).await;
    }
}
