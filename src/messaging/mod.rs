//! 跨链消息：发送、回执登记与投递状态跟踪。

mod tracker;
mod types;

use async_trait::async_trait;

use crate::error::Result;

pub use tracker::MessageTracker;
pub use types::{
    AdapterParams, Chain, DeliveryRecord, DeliveryState, MessageFee, MessageParams,
    MessageReceipt, MessageStatus,
};

/// 目标链侧的投递证明与费用报价。
#[async_trait]
pub trait DeliveryOracle: Send + Sync {
    /// 目标链尚无任何记录时返回 `None`。
    async fn delivery(&self, message_hash: &str) -> Result<Option<DeliveryRecord>>;

    async fn quote_fee(
        &self,
        dst_chain: Chain,
        payload_len: usize,
        adapter: &AdapterParams,
    ) -> Result<MessageFee>;
}
