use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::config::KaminoConfig;
use crate::error::{Error, Result};
use crate::pipeline::{SharedSigner, TransactionPipeline, TransactionResult};

use super::{InstructionComposer, ProtocolAction, submit_action};

/// 借款请求。`borrow_value` 与 `collateral_value` 以同一计价单位给出。
#[derive(Debug, Clone, PartialEq)]
pub struct BorrowParams {
    pub reserve_mint: Pubkey,
    pub amount: u64,
    pub borrow_value: f64,
    pub collateral_value: f64,
}

impl BorrowParams {
    pub fn loan_to_value(&self) -> f64 {
        self.borrow_value / self.collateral_value
    }
}

pub struct KaminoLending {
    pipeline: Arc<TransactionPipeline>,
    composer: Arc<dyn InstructionComposer>,
    config: KaminoConfig,
}

impl KaminoLending {
    pub fn new(
        pipeline: Arc<TransactionPipeline>,
        composer: Arc<dyn InstructionComposer>,
        config: &KaminoConfig,
    ) -> Self {
        Self {
            pipeline,
            composer,
            config: config.clone(),
        }
    }

    fn ensure_enabled(&self) -> Result<()> {
        if self.config.enabled {
            Ok(())
        } else {
            Err(Error::ProtocolDisabled("kamino"))
        }
    }

    async fn run(&self, action: Result<ProtocolAction>, signer: SharedSigner) -> TransactionResult {
        match action {
            Ok(action) => {
                submit_action(&self.pipeline, self.composer.as_ref(), action, signer).await
            }
            Err(err) => TransactionResult::failure(err),
        }
    }

    pub async fn deposit(
        &self,
        reserve_mint: Pubkey,
        amount: u64,
        signer: SharedSigner,
    ) -> TransactionResult {
        let action = self.ensure_enabled().and_then(|_| {
            if amount < self.config.min_collateral_lamports {
                return Err(Error::invalid_params(format!(
                    "抵押数量 {amount} 低于最小值 {}",
                    self.config.min_collateral_lamports
                )));
            }
            Ok(ProtocolAction::KaminoDeposit {
                reserve_mint,
                amount,
            })
        });
        self.run(action, signer).await
    }

    /// 借款后的 LTV 不得超过 `max_ltv`。
    pub async fn borrow(&self, params: &BorrowParams, signer: SharedSigner) -> TransactionResult {
        let action = self.ensure_enabled().and_then(|_| {
            if params.amount == 0 {
                return Err(Error::invalid_params("借款数量必须大于 0"));
            }
            if !params.collateral_value.is_finite() || params.collateral_value <= 0.0 {
                return Err(Error::invalid_params(format!(
                    "抵押价值必须是大于 0 的有限数，实际为 {}",
                    params.collateral_value
                )));
            }
            if !params.borrow_value.is_finite() || params.borrow_value < 0.0 {
                return Err(Error::invalid_params(format!(
                    "借款价值必须是非负有限数，实际为 {}",
                    params.borrow_value
                )));
            }
            let ltv = params.loan_to_value();
            debug!(
                target: "protocols::lend",
                ltv,
                max_ltv = self.config.max_ltv,
                "借款 LTV 检查"
            );
            if ltv > self.config.max_ltv {
                return Err(Error::invalid_params(format!(
                    "LTV {ltv:.4} 超过上限 {:.4}",
                    self.config.max_ltv
                )));
            }
            Ok(ProtocolAction::KaminoBorrow {
                reserve_mint: params.reserve_mint,
                amount: params.amount,
            })
        });
        self.run(action, signer).await
    }
}
