use std::sync::Arc;
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use solana_sdk::signature::Signature;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::FreshnessCache;
use crate::config::{CacheConfig, LayerZeroConfig};
use crate::error::{Error, Result};
use crate::monitoring::events;
use crate::pipeline::{SharedSigner, TransactionPipeline, TransactionResult};
use crate::protocols::{self, InstructionComposer, ProtocolAction};

use super::{
    Chain, DeliveryOracle, DeliveryRecord, DeliveryState, MessageFee, MessageParams,
    MessageReceipt, MessageStatus,
};

struct Tracked {
    receipt: MessageReceipt,
    minted_at: Instant,
}

/// 跨链消息跟踪器。
///
/// 本进程铸造的回执常驻内存直到进程退出；未见过的 hash 通过目标链 oracle 查询，
/// 查询结果按 `message_ttl` 缓存。
pub struct MessageTracker {
    pipeline: Arc<TransactionPipeline>,
    composer: Arc<dyn InstructionComposer>,
    oracle: Arc<dyn DeliveryOracle>,
    receipts: DashMap<String, Tracked>,
    remote: FreshnessCache<String, Option<DeliveryRecord>>,
    /// oracle 首次报告某个 hash 的时间，作为外部消息回执的 `created_at`。
    first_seen: DashMap<String, SystemTime>,
    delivery_window: Duration,
    enabled: bool,
}

impl MessageTracker {
    pub fn new(
        pipeline: Arc<TransactionPipeline>,
        composer: Arc<dyn InstructionComposer>,
        oracle: Arc<dyn DeliveryOracle>,
        config: &LayerZeroConfig,
        cache: &CacheConfig,
    ) -> Self {
        Self {
            pipeline,
            composer,
            oracle,
            receipts: DashMap::new(),
            remote: FreshnessCache::new("message_receipts", cache.message_ttl()),
            first_seen: DashMap::new(),
            delivery_window: config.delivery_window(),
            enabled: config.enabled,
        }
    }

    pub(crate) fn ensure_enabled(&self) -> Result<()> {
        if self.enabled {
            Ok(())
        } else {
            Err(Error::ProtocolDisabled("layerzero"))
        }
    }

    pub(crate) fn pipeline(&self) -> &TransactionPipeline {
        &self.pipeline
    }

    pub(crate) fn composer(&self) -> &dyn InstructionComposer {
        self.composer.as_ref()
    }

    pub(crate) fn oracle(&self) -> &dyn DeliveryOracle {
        self.oracle.as_ref()
    }

    /// 校验失败在任何网络调用之前返回；只有交易成功才会铸造 `Pending` 回执。
    pub async fn send(&self, params: &MessageParams, signer: SharedSigner) -> TransactionResult {
        let dst_chain = match self.ensure_enabled().and_then(|_| params.validate()) {
            Ok(chain) => chain,
            Err(err) => return TransactionResult::failure(err),
        };

        let action = ProtocolAction::LayerZeroSend {
            dst_chain,
            target_address: params.target_address.clone(),
            payload: params.message.clone(),
            adapter: params.adapter.clone(),
        };
        let result =
            protocols::submit_action(&self.pipeline, self.composer.as_ref(), action, signer).await;
        if let TransactionResult::Success { signature, .. } = &result {
            self.register(signature, dst_chain);
        }
        result
    }

    /// 以交易签名作为消息 hash 铸造回执；重复登记保持首个回执不变。
    pub(crate) fn register(&self, signature: &Signature, dst_chain: Chain) -> MessageReceipt {
        let message_hash = signature.to_string();
        let entry = self.receipts.entry(message_hash.clone()).or_insert_with(|| {
            events::message_minted(&message_hash, dst_chain);
            Tracked {
                receipt: MessageReceipt {
                    message_hash: message_hash.clone(),
                    status: MessageStatus::Pending,
                    src_chain: Chain::Solana,
                    dst_chain,
                    created_at: SystemTime::now(),
                    failure: None,
                },
                minted_at: Instant::now(),
            }
        });
        entry.receipt.clone()
    }

    /// 返回当前已知回执，不推进状态机。
    pub async fn status(&self, message_hash: &str) -> Result<MessageReceipt> {
        if let Some(tracked) = self.receipts.get(message_hash) {
            return Ok(tracked.receipt.clone());
        }

        let oracle = Arc::clone(&self.oracle);
        let record = self
            .remote
            .get_with(&message_hash.to_string(), move |key| async move {
                oracle.delivery(&key).await
            })
            .await?;

        match record.as_ref() {
            Some(record) => Ok(MessageReceipt {
                message_hash: message_hash.to_string(),
                status: record.status(),
                src_chain: record.src_chain,
                dst_chain: record.dst_chain,
                created_at: *self
                    .first_seen
                    .entry(message_hash.to_string())
                    .or_insert_with(SystemTime::now),
                failure: match &record.state {
                    DeliveryState::Failed(reason) => Some(reason.clone()),
                    _ => None,
                },
            }),
            None => Err(Error::NotFound(format!("消息 {message_hash}"))),
        }
    }

    /// 查询目标链并推进状态机：投递成功 ⇒ Delivered，目标链报告失败或超出投递窗口 ⇒ Failed。
    pub async fn poll(&self, message_hash: &str) -> Result<MessageReceipt> {
        let (status, minted_at) = match self.receipts.get(message_hash) {
            Some(tracked) => (tracked.receipt.status, tracked.minted_at),
            None => return self.status(message_hash).await,
        };
        if status.is_terminal() {
            return self.status(message_hash).await;
        }

        let record = self.oracle.delivery(message_hash).await?;
        let next = match record.map(|record| record.state) {
            Some(DeliveryState::Delivered) => Some((MessageStatus::Delivered, None)),
            Some(DeliveryState::Failed(reason)) => Some((MessageStatus::Failed, Some(reason))),
            _ if minted_at.elapsed() > self.delivery_window => Some((
                MessageStatus::Failed,
                Some(format!(
                    "超过投递窗口 {}s 仍未送达",
                    self.delivery_window.as_secs()
                )),
            )),
            _ => None,
        };
        if let Some((to, failure)) = next {
            self.transition(message_hash, to, failure);
        }

        self.receipts
            .get(message_hash)
            .map(|tracked| tracked.receipt.clone())
            .ok_or_else(|| Error::NotFound(format!("消息 {message_hash}")))
    }

    fn transition(&self, message_hash: &str, to: MessageStatus, failure: Option<String>) {
        let Some(mut tracked) = self.receipts.get_mut(message_hash) else {
            return;
        };
        let from = tracked.receipt.status;
        if from.is_terminal() {
            return;
        }
        tracked.receipt.status = to;
        tracked.receipt.failure = failure;
        events::message_transition(message_hash, from, to);
    }

    /// 轮询全部 Pending 回执，返回本轮进入终态的回执。单条查询失败只记录日志。
    pub async fn poll_pending(&self) -> Vec<MessageReceipt> {
        let pending: Vec<String> = self
            .receipts
            .iter()
            .filter(|entry| !entry.receipt.status.is_terminal())
            .map(|entry| entry.key().clone())
            .collect();
        debug!(
            target: "messaging::tracker",
            pending = pending.len(),
            "开始轮询未完成的跨链消息"
        );

        let mut settled = Vec::new();
        for hash in pending {
            match self.poll(&hash).await {
                Ok(receipt) if receipt.status.is_terminal() => settled.push(receipt),
                Ok(_) => {}
                Err(err) => warn!(
                    target: "messaging::tracker",
                    message_hash = %hash,
                    error = %err,
                    "查询跨链消息状态失败"
                ),
            }
        }
        if !settled.is_empty() {
            info!(
                target: "messaging::tracker",
                settled = settled.len(),
                "跨链消息进入终态"
            );
        }
        settled
    }

    pub async fn estimate_fee(&self, params: &MessageParams) -> Result<MessageFee> {
        self.ensure_enabled()?;
        let dst_chain = params.validate()?;
        self.oracle
            .quote_fee(dst_chain, params.message.len(), &params.adapter)
            .await
    }

    pub fn pending_count(&self) -> usize {
        self.receipts
            .iter()
            .filter(|entry| !entry.receipt.status.is_terminal())
            .count()
    }
}
