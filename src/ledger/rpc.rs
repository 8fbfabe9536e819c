use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use solana_client::client_error::ClientError;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use solana_transaction_error::TransactionError;
use tracing::{debug, info};

use super::{BlockReference, LedgerClient, LedgerError, SignatureStatus, SimulationOutcome};

/// 基于 `solana-client` 非阻塞 RPC 客户端的账本实现。
#[derive(Clone)]
pub struct RpcLedger {
    client: Arc<RpcClient>,
    config: RpcSendTransactionConfig,
}

impl fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcLedger")
            .field("endpoint", &self.client.url())
            .field("skip_preflight", &self.config.skip_preflight)
            .finish()
    }
}

impl RpcLedger {
    pub fn new(client: Arc<RpcClient>, skip_preflight: bool, commitment: CommitmentConfig) -> Self {
        let config = RpcSendTransactionConfig {
            skip_preflight,
            preflight_commitment: Some(commitment.commitment),
            // 重发由管线自己负责，节点侧不再重复广播。
            max_retries: Some(0),
            ..RpcSendTransactionConfig::default()
        };
        Self { client, config }
    }

    pub fn from_url(url: String, skip_preflight: bool, commitment: CommitmentConfig) -> Self {
        let client = Arc::new(RpcClient::new_with_commitment(url, commitment));
        Self::new(client, skip_preflight, commitment)
    }

    pub fn endpoint(&self) -> String {
        self.client.url()
    }
}

/// 区分账本拒绝与传输错误。预检阶段报 `BlockhashNotFound` 说明区块引用已失效，
/// 归为可重建的 `Expired`；其余能解析出 `TransactionError` 的视为拒绝。
fn classify(err: ClientError) -> LedgerError {
    classify_transaction_error(err.get_transaction_error(), || err.to_string())
}

fn classify_transaction_error(
    tx_err: Option<TransactionError>,
    describe: impl FnOnce() -> String,
) -> LedgerError {
    match tx_err {
        Some(tx_err @ TransactionError::BlockhashNotFound) => {
            LedgerError::Expired(tx_err.to_string())
        }
        Some(tx_err) => LedgerError::Rejected(tx_err.to_string()),
        None => LedgerError::Transport(describe()),
    }
}

#[async_trait]
impl LedgerClient for RpcLedger {
    async fn latest_block_reference(
        &self,
        commitment: CommitmentConfig,
    ) -> Result<BlockReference, LedgerError> {
        let (blockhash, last_valid_block_height) = self
            .client
            .get_latest_blockhash_with_commitment(commitment)
            .await
            .map_err(classify)?;
        debug!(
            target: "ledger::rpc",
            blockhash = %blockhash,
            last_valid_block_height,
            "获取最新 blockhash"
        );
        Ok(BlockReference::new(blockhash, last_valid_block_height))
    }

    async fn submit(&self, transaction: &VersionedTransaction) -> Result<Signature, LedgerError> {
        let signature = self
            .client
            .send_transaction_with_config(transaction, self.config.clone())
            .await
            .map_err(classify)?;
        info!(
            target: "ledger::rpc",
            signature = %signature,
            endpoint = %self.client.url(),
            skip_preflight = self.config.skip_preflight,
            "交易已通过 RPC 发送"
        );
        Ok(signature)
    }

    async fn signature_status(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> Result<Option<SignatureStatus>, LedgerError> {
        let response = self
            .client
            .get_signature_statuses(&[*signature])
            .await
            .map_err(|err| LedgerError::Transport(err.to_string()))?;
        let status = response.value.into_iter().next().flatten();
        Ok(status.map(|status| SignatureStatus {
            slot: status.slot,
            confirmations: status.confirmations,
            err: status.err.as_ref().map(|err| err.to_string()),
            reached_commitment: status.satisfies_commitment(commitment),
        }))
    }

    async fn simulate(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<SimulationOutcome, LedgerError> {
        let response = self
            .client
            .simulate_transaction(transaction)
            .await
            .map_err(|err| LedgerError::Transport(err.to_string()))?;
        let result = response.value;
        Ok(SimulationOutcome {
            err: result.err.map(|err| format!("{err:?}")),
            logs: result.logs.unwrap_or_default(),
            units_consumed: result.units_consumed,
        })
    }

    async fn balance(&self, address: &Pubkey) -> Result<u64, LedgerError> {
        self.client.get_balance(address).await.map_err(classify)
    }

    async fn block_height(&self, commitment: CommitmentConfig) -> Result<u64, LedgerError> {
        self.client
            .get_block_height_with_commitment(commitment)
            .await
            .map_err(classify)
    }

    async fn lamports_per_signature(&self) -> Result<u64, LedgerError> {
        // 单签名、无指令消息的费用即为每个签名的基础费用。
        let blockhash = self.client.get_latest_blockhash().await.map_err(classify)?;
        let payer = Pubkey::default();
        let message = Message::new_with_blockhash(&[], Some(&payer), &blockhash);
        self.client
            .get_fee_for_message(&message)
            .await
            .map_err(classify)
    }

    async fn block_time(&self, slot: u64) -> Result<Option<i64>, LedgerError> {
        match self.client.get_block_time(slot).await {
            Ok(timestamp) => Ok(Some(timestamp)),
            Err(err) => {
                debug!(
                    target: "ledger::rpc",
                    slot,
                    error = %err,
                    "区块时间暂不可用"
                );
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_blockhash_is_expired_not_rejected() {
        let expired =
            classify_transaction_error(Some(TransactionError::BlockhashNotFound), String::new);
        assert!(matches!(expired, LedgerError::Expired(_)));
        assert!(expired.is_transient());

        let rejected = classify_transaction_error(
            Some(TransactionError::InsufficientFundsForFee),
            String::new,
        );
        assert!(matches!(rejected, LedgerError::Rejected(_)));

        let transport = classify_transaction_error(None, || "connection reset".to_string());
        assert_eq!(transport, LedgerError::Transport("connection reset".to_string()));
    }
}
