use std::sync::Arc;

use crate::config::PumpFunConfig;
use crate::error::{Error, Result};
use crate::pipeline::{SharedSigner, TransactionPipeline, TransactionResult};

use super::{InstructionComposer, ProtocolAction, submit_action};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchParams {
    pub name: String,
    pub symbol: String,
    pub total_supply: u64,
    pub decimals: u8,
}

/// Pump.fun 发币。供应量在 `[min_token_amount, max_token_amount]` 内。
pub struct PumpFunLauncher {
    pipeline: Arc<TransactionPipeline>,
    composer: Arc<dyn InstructionComposer>,
    config: PumpFunConfig,
}

impl PumpFunLauncher {
    pub fn new(
        pipeline: Arc<TransactionPipeline>,
        composer: Arc<dyn InstructionComposer>,
        config: &PumpFunConfig,
    ) -> Self {
        Self {
            pipeline,
            composer,
            config: config.clone(),
        }
    }

    fn prepare(&self, params: &LaunchParams) -> Result<ProtocolAction> {
        if !self.config.enabled {
            return Err(Error::ProtocolDisabled("pumpfun"));
        }
        let name = params.name.trim();
        let symbol = params.symbol.trim();
        if name.is_empty() || symbol.is_empty() {
            return Err(Error::invalid_params("代币名称和符号不能为空"));
        }
        if params.total_supply < self.config.min_token_amount
            || params.total_supply > self.config.max_token_amount
        {
            return Err(Error::invalid_params(format!(
                "供应量 {} 不在 [{}, {}] 范围内",
                params.total_supply, self.config.min_token_amount, self.config.max_token_amount
            )));
        }
        if params.decimals > self.config.max_decimals {
            return Err(Error::invalid_params(format!(
                "精度 {} 超过上限 {}",
                params.decimals, self.config.max_decimals
            )));
        }
        Ok(ProtocolAction::PumpFunLaunch {
            name: name.to_string(),
            symbol: symbol.to_string(),
            total_supply: params.total_supply,
            decimals: params.decimals,
        })
    }

    pub async fn launch_token(
        &self,
        params: &LaunchParams,
        signer: SharedSigner,
    ) -> TransactionResult {
        match self.prepare(params) {
            Ok(action) => {
                submit_action(&self.pipeline, self.composer.as_ref(), action, signer).await
            }
            Err(err) => TransactionResult::failure(err),
        }
    }
}
