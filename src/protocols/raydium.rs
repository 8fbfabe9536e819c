use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use tracing::info;

use crate::config::RaydiumConfig;
use crate::error::{Error, Result};
use crate::pipeline::{SharedSigner, TransactionPipeline, TransactionResult};

use super::pools::PoolDirectory;
use super::{InstructionComposer, ProtocolAction, submit_action};

const MAX_FEE_BPS: u16 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaydiumSwapParams {
    pub pool_id: Pubkey,
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub amount_in: u64,
    /// 滑点保护：成交数量低于该值时交易失败。
    pub min_amount_out: u64,
}

/// 池子费率，单位 bps。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolFees {
    pub trade_fee_bps: u16,
    pub withdraw_fee_bps: u16,
    pub admin_trade_fee_bps: u16,
    pub admin_withdraw_fee_bps: u16,
}

impl PoolFees {
    fn validate(&self) -> Result<()> {
        let all = [
            ("trade_fee_bps", self.trade_fee_bps),
            ("withdraw_fee_bps", self.withdraw_fee_bps),
            ("admin_trade_fee_bps", self.admin_trade_fee_bps),
            ("admin_withdraw_fee_bps", self.admin_withdraw_fee_bps),
        ];
        match all.iter().find(|(_, bps)| *bps > MAX_FEE_BPS) {
            Some((name, bps)) => Err(Error::invalid_params(format!(
                "{name} = {bps} 超过 {MAX_FEE_BPS} bps"
            ))),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePoolParams {
    pub mint_a: Pubkey,
    pub mint_b: Pubkey,
    pub fees: PoolFees,
    pub initial_a: u64,
    pub initial_b: u64,
}

fn ensure_enabled(config: &RaydiumConfig) -> Result<()> {
    if config.enabled {
        Ok(())
    } else {
        Err(Error::ProtocolDisabled("raydium"))
    }
}

fn positive(name: &str, value: u64) -> Result<()> {
    if value == 0 {
        Err(Error::invalid_params(format!("{name} 必须大于 0")))
    } else {
        Ok(())
    }
}

/// 直接在指定池子兑换，池子必须同时包含输入与输出 mint。
pub struct RaydiumSwap {
    pools: Arc<PoolDirectory>,
    pipeline: Arc<TransactionPipeline>,
    composer: Arc<dyn InstructionComposer>,
    config: RaydiumConfig,
}

impl RaydiumSwap {
    pub fn new(
        pools: Arc<PoolDirectory>,
        pipeline: Arc<TransactionPipeline>,
        composer: Arc<dyn InstructionComposer>,
        config: &RaydiumConfig,
    ) -> Self {
        Self {
            pools,
            pipeline,
            composer,
            config: config.clone(),
        }
    }

    async fn prepare(&self, params: &RaydiumSwapParams) -> Result<ProtocolAction> {
        ensure_enabled(&self.config)?;
        positive("amount_in", params.amount_in)?;
        if params.input_mint == params.output_mint {
            return Err(Error::invalid_params("输入与输出 mint 不能相同"));
        }

        let pool = self.pools.get_pool(&params.pool_id).await?;
        if !pool.contains_all(&[params.input_mint, params.output_mint]) {
            return Err(Error::invalid_params(format!(
                "池子 {} 不包含 {} / {}",
                params.pool_id, params.input_mint, params.output_mint
            )));
        }
        Ok(ProtocolAction::RaydiumSwap {
            pool: pool.id,
            program_id: pool.program_id,
            input_mint: params.input_mint,
            output_mint: params.output_mint,
            amount_in: params.amount_in,
            min_amount_out: params.min_amount_out,
        })
    }

    pub async fn swap(&self, params: &RaydiumSwapParams, signer: SharedSigner) -> TransactionResult {
        match self.prepare(params).await {
            Ok(action) => {
                submit_action(&self.pipeline, self.composer.as_ref(), action, signer).await
            }
            Err(err) => TransactionResult::failure(err),
        }
    }
}

/// 建池与增减流动性。新建账户（池子状态、LP mint、vault）由组装器连同签名者一起返回。
pub struct RaydiumPool {
    pools: Arc<PoolDirectory>,
    pipeline: Arc<TransactionPipeline>,
    composer: Arc<dyn InstructionComposer>,
    config: RaydiumConfig,
}

impl RaydiumPool {
    pub fn new(
        pools: Arc<PoolDirectory>,
        pipeline: Arc<TransactionPipeline>,
        composer: Arc<dyn InstructionComposer>,
        config: &RaydiumConfig,
    ) -> Self {
        Self {
            pools,
            pipeline,
            composer,
            config: config.clone(),
        }
    }

    async fn submit(&self, action: Result<ProtocolAction>, signer: SharedSigner) -> TransactionResult {
        match action {
            Ok(action) => {
                submit_action(&self.pipeline, self.composer.as_ref(), action, signer).await
            }
            Err(err) => TransactionResult::failure(err),
        }
    }

    pub async fn create_pool(
        &self,
        params: &CreatePoolParams,
        signer: SharedSigner,
    ) -> TransactionResult {
        let action = ensure_enabled(&self.config)
            .and_then(|_| {
                if params.mint_a == params.mint_b {
                    return Err(Error::invalid_params("建池的两个 mint 不能相同"));
                }
                positive("initial_a", params.initial_a)?;
                positive("initial_b", params.initial_b)?;
                params.fees.validate()
            })
            .map(|_| ProtocolAction::RaydiumCreatePool {
                mint_a: params.mint_a,
                mint_b: params.mint_b,
                fees: params.fees,
                initial_a: params.initial_a,
                initial_b: params.initial_b,
            });

        let result = self.submit(action, signer).await;
        if result.is_success() {
            info!(
                target: "protocols::raydium",
                mint_a = %params.mint_a,
                mint_b = %params.mint_b,
                "新池子已创建"
            );
            self.pools.invalidate(None);
        }
        result
    }

    pub async fn enter_pool(
        &self,
        pool_id: &Pubkey,
        amount_a: u64,
        amount_b: u64,
        signer: SharedSigner,
    ) -> TransactionResult {
        let action = async {
            ensure_enabled(&self.config)?;
            positive("amount_a", amount_a)?;
            positive("amount_b", amount_b)?;
            let pool = self.pools.get_pool(pool_id).await?;
            Ok::<_, Error>(ProtocolAction::RaydiumDeposit {
                pool: pool.id,
                amount_a,
                amount_b,
            })
        }
        .await;
        self.submit(action, signer).await
    }

    pub async fn exit_pool(
        &self,
        pool_id: &Pubkey,
        lp_amount: u64,
        signer: SharedSigner,
    ) -> TransactionResult {
        let action = async {
            ensure_enabled(&self.config)?;
            positive("lp_amount", lp_amount)?;
            let pool = self.pools.get_pool(pool_id).await?;
            Ok::<_, Error>(ProtocolAction::RaydiumWithdraw {
                pool: pool.id,
                lp_amount,
            })
        }
        .await;
        self.submit(action, signer).await
    }
}
