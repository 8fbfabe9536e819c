use std::sync::Arc;

use crate::config::JitoConfig;
use crate::error::{Error, Result};
use crate::pipeline::{SharedSigner, TransactionPipeline, TransactionResult};

use super::{InstructionComposer, ProtocolAction, submit_action};

/// Jito 流动性质押，数量限制在 `[min_stake, max_stake]` 内。
pub struct JitoStaking {
    pipeline: Arc<TransactionPipeline>,
    composer: Arc<dyn InstructionComposer>,
    config: JitoConfig,
}

impl JitoStaking {
    pub fn new(
        pipeline: Arc<TransactionPipeline>,
        composer: Arc<dyn InstructionComposer>,
        config: &JitoConfig,
    ) -> Self {
        Self {
            pipeline,
            composer,
            config: config.clone(),
        }
    }

    fn check(&self, lamports: u64) -> Result<()> {
        if !self.config.enabled {
            return Err(Error::ProtocolDisabled("jito"));
        }
        if lamports < self.config.min_stake_lamports || lamports > self.config.max_stake_lamports {
            return Err(Error::invalid_params(format!(
                "质押数量 {lamports} 不在 [{}, {}] 范围内",
                self.config.min_stake_lamports, self.config.max_stake_lamports
            )));
        }
        Ok(())
    }

    async fn run(&self, action: Result<ProtocolAction>, signer: SharedSigner) -> TransactionResult {
        match action {
            Ok(action) => {
                submit_action(&self.pipeline, self.composer.as_ref(), action, signer).await
            }
            Err(err) => TransactionResult::failure(err),
        }
    }

    pub async fn stake(&self, lamports: u64, signer: SharedSigner) -> TransactionResult {
        let action = self
            .check(lamports)
            .map(|_| ProtocolAction::JitoStake { lamports });
        self.run(action, signer).await
    }

    pub async fn unstake(&self, lamports: u64, signer: SharedSigner) -> TransactionResult {
        let action = self
            .check(lamports)
            .map(|_| ProtocolAction::JitoUnstake { lamports });
        self.run(action, signer).await
    }
}
