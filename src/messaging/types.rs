use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// 支持的链及其固定的数字 id，名称大小写不敏感。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Bsc,
    Avalanche,
    Polygon,
    Solana,
}

impl Chain {
    pub const ALL: [Chain; 5] = [
        Chain::Ethereum,
        Chain::Bsc,
        Chain::Avalanche,
        Chain::Polygon,
        Chain::Solana,
    ];

    pub fn id(self) -> u16 {
        match self {
            Chain::Ethereum => 1,
            Chain::Bsc => 2,
            Chain::Avalanche => 3,
            Chain::Polygon => 4,
            Chain::Solana => 5,
        }
    }

    pub fn from_id(id: u16) -> Option<Chain> {
        Chain::ALL.into_iter().find(|chain| chain.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Bsc => "bsc",
            Chain::Avalanche => "avalanche",
            Chain::Polygon => "polygon",
            Chain::Solana => "solana",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Chain {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        let wanted = raw.trim();
        Chain::ALL
            .into_iter()
            .find(|chain| chain.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::UnsupportedChain(raw.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Delivered,
    Failed,
}

impl MessageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Failed => "failed",
        }
    }

    /// 终态不会再发生迁移。
    pub fn is_terminal(self) -> bool {
        !matches!(self, MessageStatus::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageReceipt {
    pub message_hash: String,
    pub status: MessageStatus,
    pub src_chain: Chain,
    pub dst_chain: Chain,
    pub created_at: SystemTime,
    /// 最近一次失败原因（超出投递窗口或目标链报告失败）。
    pub failure: Option<String>,
}

/// 协议扩展参数：不同版本携带的字段不同，不接受任意结构。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterParams {
    V1 {
        gas_limit: u64,
    },
    V2 {
        gas_limit: u64,
        native_for_dst: u64,
        dst_native_address: String,
    },
}

impl AdapterParams {
    pub fn gas_limit(&self) -> u64 {
        match self {
            AdapterParams::V1 { gas_limit } | AdapterParams::V2 { gas_limit, .. } => *gas_limit,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.gas_limit() == 0 {
            return Err(Error::invalid_params("gas limit 必须大于 0"));
        }
        match self {
            AdapterParams::V2 {
                native_for_dst,
                dst_native_address,
                ..
            } if *native_for_dst > 0 && dst_native_address.trim().is_empty() => Err(
                Error::invalid_params("空投目标链原生币时必须提供 dst_native_address"),
            ),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageParams {
    pub target_chain: String,
    pub target_address: String,
    pub message: Vec<u8>,
    pub adapter: AdapterParams,
}

impl MessageParams {
    pub fn new(
        target_chain: impl Into<String>,
        target_address: impl Into<String>,
        message: Vec<u8>,
        gas_limit: u64,
    ) -> Self {
        Self {
            target_chain: target_chain.into(),
            target_address: target_address.into(),
            message,
            adapter: AdapterParams::V1 { gas_limit },
        }
    }

    pub fn with_adapter(mut self, adapter: AdapterParams) -> Self {
        self.adapter = adapter;
        self
    }

    /// 先做纯本地校验，再解析目标链。
    pub(crate) fn validate(&self) -> Result<Chain> {
        if self.target_chain.trim().is_empty() || self.target_address.trim().is_empty() {
            return Err(Error::invalid_params("必须提供目标链与目标地址"));
        }
        if self.message.is_empty() {
            return Err(Error::invalid_params("消息内容不能为空"));
        }
        self.adapter.validate()?;
        self.target_chain.parse()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MessageFee {
    pub native_fee: u64,
    pub zro_fee: u64,
}

/// 目标链侧观察到的投递状态。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryState {
    Inflight,
    Delivered,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRecord {
    pub src_chain: Chain,
    pub dst_chain: Chain,
    pub state: DeliveryState,
}

impl DeliveryRecord {
    pub fn status(&self) -> MessageStatus {
        match self.state {
            DeliveryState::Inflight => MessageStatus::Pending,
            DeliveryState::Delivered => MessageStatus::Delivered,
            DeliveryState::Failed(_) => MessageStatus::Failed,
        }
    }
}
