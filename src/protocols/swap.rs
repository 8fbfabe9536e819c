use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use tracing::info;

use crate::error::{Error, Result};
use crate::pipeline::{SharedSigner, TransactionPipeline, TransactionResult};

use super::price::PriceIndex;
use super::{InstructionComposer, ProtocolAction, submit_action};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapParams {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub amount: u64,
    /// 未指定时使用配置的默认滑点。
    pub slippage_bps: Option<u16>,
}

/// 报价 → 按滑点算最少输出 → 组装 → 提交。
pub struct JupiterSwap {
    prices: Arc<PriceIndex>,
    pipeline: Arc<TransactionPipeline>,
    composer: Arc<dyn InstructionComposer>,
}

impl JupiterSwap {
    pub fn new(
        prices: Arc<PriceIndex>,
        pipeline: Arc<TransactionPipeline>,
        composer: Arc<dyn InstructionComposer>,
    ) -> Self {
        Self {
            prices,
            pipeline,
            composer,
        }
    }

    async fn prepare(&self, params: &SwapParams) -> Result<ProtocolAction> {
        let key = self.prices.route_key(
            params.input_mint,
            params.output_mint,
            params.amount,
            params.slippage_bps,
        )?;
        let route = self.prices.get_best_route(&key).await?.ok_or_else(|| {
            Error::InsufficientLiquidity(format!(
                "{} -> {} 数量 {}",
                params.input_mint, params.output_mint, params.amount
            ))
        })?;
        let min_amount_out = route.min_out_amount(key.slippage_bps);
        info!(
            target: "protocols::swap",
            input_mint = %params.input_mint,
            output_mint = %params.output_mint,
            amount = params.amount,
            out_amount = route.out_amount,
            min_amount_out,
            slippage_bps = key.slippage_bps,
            "Jupiter 兑换路线已选定"
        );
        Ok(ProtocolAction::JupiterSwap {
            route,
            input_mint: params.input_mint,
            output_mint: params.output_mint,
            amount: params.amount,
            min_amount_out,
            slippage_bps: key.slippage_bps,
        })
    }

    pub async fn swap(&self, params: &SwapParams, signer: SharedSigner) -> TransactionResult {
        match self.prepare(params).await {
            Ok(action) => {
                submit_action(&self.pipeline, self.composer.as_ref(), action, signer).await
            }
            Err(err) => TransactionResult::failure(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, JupiterConfig};
    use crate::testing::{MockComposer, MockLedger, MockMarketSource, pipeline_for, route, signer};

    fn setup(source: Arc<MockMarketSource>) -> (JupiterSwap, Arc<MockComposer>, Arc<MockLedger>) {
        let ledger = Arc::new(MockLedger::new());
        let composer = Arc::new(MockComposer::new());
        let prices = Arc::new(PriceIndex::new(
            source,
            &JupiterConfig::default(),
            &CacheConfig::default(),
        ));
        let swap = JupiterSwap::new(prices, pipeline_for(ledger.clone()), composer.clone());
        (swap, composer, ledger)
    }

    fn params(slippage_bps: Option<u16>) -> SwapParams {
        SwapParams {
            input_mint: Pubkey::new_unique(),
            output_mint: Pubkey::new_unique(),
            amount: 1_000_000,
            slippage_bps,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn swap_uses_best_route_and_slippage_floor() {
        let source = Arc::new(MockMarketSource::new(Vec::new()));
        source.set_routes(Some(vec![route(9_000), route(10_000)]));
        let (swap, composer, ledger) = setup(source);

        let result = swap.swap(&params(Some(100)), signer()).await;
        assert!(result.is_success(), "{result:?}");
        assert_eq!(ledger.submitted(), 1);
        match composer.actions().as_slice() {
            [ProtocolAction::JupiterSwap {
                route,
                min_amount_out,
                slippage_bps,
                ..
            }] => {
                assert_eq!(route.out_amount, 10_000);
                assert_eq!(*min_amount_out, 9_900);
                assert_eq!(*slippage_bps, 100);
            }
            other => panic!("unexpected actions: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn no_liquidity_fails_without_submitting() {
        let source = Arc::new(MockMarketSource::new(Vec::new()));
        source.set_routes(None);
        let (swap, composer, ledger) = setup(source);

        let result = swap.swap(&params(None), signer()).await;
        assert!(matches!(
            result.failure_reason(),
            Some(Error::InsufficientLiquidity(_))
        ));
        assert!(composer.actions().is_empty());
        assert_eq!(ledger.submitted(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn excessive_slippage_is_rejected_before_quoting() {
        let source = Arc::new(MockMarketSource::new(Vec::new()));
        let (swap, _, _) = setup(source.clone());

        let result = swap.swap(&params(Some(2_000)), signer()).await;
        assert!(matches!(
            result.failure_reason(),
            Some(Error::InvalidParameters(_))
        ));
        assert_eq!(source.quote_calls(), 0);
    }
}
