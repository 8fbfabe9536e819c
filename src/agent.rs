//! 钱包代理：对单个签名者的动作分发。

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Signature, Signer};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::pipeline::{SharedSigner, TransactionPipeline, TransactionResult};

/// 代理可执行的动作，穷尽匹配。
#[derive(Debug, Clone, PartialEq)]
pub enum WalletAction {
    Sign { message: Vec<u8> },
    Send { instructions: Vec<Instruction> },
    GetBalance,
}

impl WalletAction {
    pub fn name(&self) -> &'static str {
        match self {
            WalletAction::Sign { .. } => "sign",
            WalletAction::Send { .. } => "send",
            WalletAction::GetBalance => "get_balance",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WalletOutcome {
    Signed(Signature),
    Sent(TransactionResult),
    Balance(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentStatus {
    pub initialized: bool,
    pub address: String,
    /// 账本不可达时为 `None`。
    pub balance: Option<u64>,
    pub connected: bool,
}

#[derive(Default)]
struct AgentState {
    initialized: bool,
    last_balance: Option<u64>,
}

pub struct WalletAgent {
    owner: Pubkey,
    signer: SharedSigner,
    pipeline: Arc<TransactionPipeline>,
    state: Mutex<AgentState>,
}

impl WalletAgent {
    pub fn new(pipeline: Arc<TransactionPipeline>, signer: SharedSigner) -> Self {
        Self {
            owner: signer.pubkey(),
            signer,
            pipeline,
            state: Mutex::new(AgentState::default()),
        }
    }

    pub fn address(&self) -> Pubkey {
        self.owner
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    /// 确认账本能看到该钱包；可重复调用。
    pub async fn initialize(&self) -> Result<u64> {
        let balance = self.fetch_balance().await?;
        self.state.lock().initialized = true;
        info!(
            target: "agent::wallet",
            wallet = %self.owner,
            balance,
            "钱包代理已初始化"
        );
        Ok(balance)
    }

    pub async fn execute(&self, action: WalletAction) -> Result<WalletOutcome> {
        if !self.is_initialized() {
            return Err(Error::InvalidRequest(format!(
                "钱包代理尚未初始化，无法执行 {}",
                action.name()
            )));
        }
        match action {
            WalletAction::Sign { message } => {
                let signature = self
                    .signer
                    .try_sign_message(&message)
                    .map_err(|err| Error::InvalidRequest(format!("签名失败: {err}")))?;
                Ok(WalletOutcome::Signed(signature))
            }
            WalletAction::Send { instructions } => {
                let result = self
                    .pipeline
                    .execute(instructions, vec![Arc::clone(&self.signer)], self.owner)
                    .await;
                Ok(WalletOutcome::Sent(result))
            }
            WalletAction::GetBalance => Ok(WalletOutcome::Balance(self.fetch_balance().await?)),
        }
    }

    /// 账本不可达不算错误，体现在 `connected = false`。
    pub async fn status(&self) -> AgentStatus {
        let balance = match self.fetch_balance().await {
            Ok(balance) => Some(balance),
            Err(err) => {
                warn!(
                    target: "agent::wallet",
                    wallet = %self.owner,
                    error = %err,
                    "查询余额失败"
                );
                None
            }
        };
        let initialized = self.state.lock().initialized;
        AgentStatus {
            initialized,
            address: self.owner.to_string(),
            balance,
            connected: balance.is_some(),
        }
    }

    pub fn last_balance(&self) -> Option<u64> {
        self.state.lock().last_balance
    }

    async fn fetch_balance(&self) -> Result<u64> {
        let balance = self.pipeline.ledger().balance(&self.owner).await?;
        self.state.lock().last_balance = Some(balance);
        Ok(balance)
    }
}
