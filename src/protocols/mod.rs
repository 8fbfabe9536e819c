//! 协议适配器：参数校验 → 读缓存或组装指令 → 交给交易管线。
//!
//! 各协议程序的指令编码由 [`InstructionComposer`] 提供，适配器只负责领域校验与编排。

pub mod bridge;
pub mod launch;
pub mod lend;
pub mod pools;
pub mod price;
pub mod raydium;
pub mod stake;
pub mod swap;

use async_trait::async_trait;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signer;
use tracing::{debug, warn};

use crate::error::Result;
use crate::market::Route;
use crate::messaging::{AdapterParams, Chain};
use crate::pipeline::{SharedSigner, TransactionPipeline, TransactionResult};

pub use bridge::{BridgeParams, LayerZeroBridge};
pub use launch::{LaunchParams, PumpFunLauncher};
pub use lend::{BorrowParams, KaminoLending};
pub use pools::{PoolDirectory, PoolFilter};
pub use price::{PriceIndex, RouteKey};
pub use raydium::{CreatePoolParams, PoolFees, RaydiumPool, RaydiumSwap, RaydiumSwapParams};
pub use stake::JitoStaking;
pub use swap::{JupiterSwap, SwapParams};

/// 适配器能提交的全部链上动作。每个变体都是该协议完整的强类型参数。
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolAction {
    JupiterSwap {
        route: Route,
        input_mint: Pubkey,
        output_mint: Pubkey,
        amount: u64,
        min_amount_out: u64,
        slippage_bps: u16,
    },
    RaydiumSwap {
        pool: Pubkey,
        program_id: Pubkey,
        input_mint: Pubkey,
        output_mint: Pubkey,
        amount_in: u64,
        min_amount_out: u64,
    },
    RaydiumCreatePool {
        mint_a: Pubkey,
        mint_b: Pubkey,
        fees: PoolFees,
        initial_a: u64,
        initial_b: u64,
    },
    RaydiumDeposit {
        pool: Pubkey,
        amount_a: u64,
        amount_b: u64,
    },
    RaydiumWithdraw {
        pool: Pubkey,
        lp_amount: u64,
    },
    JitoStake {
        lamports: u64,
    },
    JitoUnstake {
        lamports: u64,
    },
    KaminoDeposit {
        reserve_mint: Pubkey,
        amount: u64,
    },
    KaminoBorrow {
        reserve_mint: Pubkey,
        amount: u64,
    },
    LayerZeroSend {
        dst_chain: Chain,
        target_address: String,
        payload: Vec<u8>,
        adapter: AdapterParams,
    },
    LayerZeroBridge {
        dst_chain: Chain,
        token: Pubkey,
        amount: u64,
        recipient: String,
        adapter: AdapterParams,
    },
    PumpFunLaunch {
        name: String,
        symbol: String,
        total_supply: u64,
        decimals: u8,
    },
}

impl ProtocolAction {
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolAction::JupiterSwap { .. } => "jupiter.swap",
            ProtocolAction::RaydiumSwap { .. } => "raydium.swap",
            ProtocolAction::RaydiumCreatePool { .. } => "raydium.create_pool",
            ProtocolAction::RaydiumDeposit { .. } => "raydium.deposit",
            ProtocolAction::RaydiumWithdraw { .. } => "raydium.withdraw",
            ProtocolAction::JitoStake { .. } => "jito.stake",
            ProtocolAction::JitoUnstake { .. } => "jito.unstake",
            ProtocolAction::KaminoDeposit { .. } => "kamino.deposit",
            ProtocolAction::KaminoBorrow { .. } => "kamino.borrow",
            ProtocolAction::LayerZeroSend { .. } => "layerzero.send",
            ProtocolAction::LayerZeroBridge { .. } => "layerzero.bridge",
            ProtocolAction::PumpFunLaunch { .. } => "pumpfun.launch",
        }
    }
}

/// 组装结果：除了指令，还包括程序要求新建账户（池子状态、LP mint 等）的签名者。
#[derive(Clone, Default)]
pub struct ComposedInstructions {
    pub instructions: Vec<Instruction>,
    pub signers: Vec<SharedSigner>,
}

impl std::fmt::Debug for ComposedInstructions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedInstructions")
            .field("instructions", &self.instructions.len())
            .field(
                "signers",
                &self
                    .signers
                    .iter()
                    .map(|signer| signer.pubkey())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// 协议程序的指令编码协作方。
#[async_trait]
pub trait InstructionComposer: Send + Sync {
    async fn compose(&self, action: &ProtocolAction, owner: &Pubkey)
    -> Result<ComposedInstructions>;
}

/// 组装并通过管线提交；owner 同时是 fee payer。组装失败以 `Failure` 返回。
pub(crate) async fn submit_action(
    pipeline: &TransactionPipeline,
    composer: &dyn InstructionComposer,
    action: ProtocolAction,
    owner: SharedSigner,
) -> TransactionResult {
    let payer = owner.pubkey();
    let composed = match composer.compose(&action, &payer).await {
        Ok(composed) => composed,
        Err(err) => {
            warn!(
                target: "protocols::compose",
                action = action.name(),
                error = %err,
                "指令组装失败"
            );
            return TransactionResult::failure(err);
        }
    };
    debug!(
        target: "protocols::compose",
        action = action.name(),
        instructions = composed.instructions.len(),
        extra_signers = composed.signers.len(),
        "指令组装完成"
    );

    let mut signers = Vec::with_capacity(composed.signers.len() + 1);
    signers.push(owner);
    signers.extend(composed.signers);
    pipeline
        .execute(composed.instructions, signers, payer)
        .await
}
