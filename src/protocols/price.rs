use std::sync::Arc;

use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::cache::FreshnessCache;
use crate::config::{CacheConfig, JupiterConfig};
use crate::error::{Error, Result};
use crate::market::{MarketDataSource, PriceQuote, QuoteParams, Route};

/// 报价按 (input, output, amount, slippage, direct-only) 分别缓存。
pub type RouteKey = QuoteParams;

/// 价格与路线索引。每个 RouteKey 独立 TTL 与 single-flight。
pub struct PriceIndex {
    source: Arc<dyn MarketDataSource>,
    quotes: FreshnessCache<RouteKey, PriceQuote>,
    default_slippage_bps: u16,
    max_slippage_bps: u16,
    enabled: bool,
}

impl PriceIndex {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        config: &JupiterConfig,
        cache: &CacheConfig,
    ) -> Self {
        Self {
            source,
            quotes: FreshnessCache::new("quotes", cache.quote_ttl()),
            default_slippage_bps: config.default_slippage_bps,
            max_slippage_bps: config.max_slippage_bps,
            enabled: config.enabled,
        }
    }

    pub fn default_slippage_bps(&self) -> u16 {
        self.default_slippage_bps
    }

    /// 纯本地校验，未指定滑点时使用默认值。
    pub fn route_key(
        &self,
        input_mint: Pubkey,
        output_mint: Pubkey,
        amount: u64,
        slippage_bps: Option<u16>,
    ) -> Result<RouteKey> {
        if !self.enabled {
            return Err(Error::ProtocolDisabled("jupiter"));
        }
        if amount == 0 {
            return Err(Error::invalid_params("数量必须大于 0"));
        }
        if input_mint == output_mint {
            return Err(Error::invalid_params("输入与输出 mint 不能相同"));
        }
        let slippage_bps = slippage_bps.unwrap_or(self.default_slippage_bps);
        if slippage_bps > self.max_slippage_bps {
            return Err(Error::invalid_params(format!(
                "滑点 {slippage_bps} bps 超过上限 {} bps",
                self.max_slippage_bps
            )));
        }
        Ok(RouteKey {
            input_mint,
            output_mint,
            amount,
            slippage_bps,
            only_direct_routes: false,
        })
    }

    pub async fn get_price(&self, key: &RouteKey) -> Result<Arc<PriceQuote>> {
        let source = Arc::clone(&self.source);
        self.quotes
            .get_with(key, move |key| async move {
                let quote = source.quote(&key).await?;
                debug!(
                    target: "protocols::price",
                    input_mint = %key.input_mint,
                    output_mint = %key.output_mint,
                    amount = key.amount,
                    routes = quote.routes().len(),
                    not_enough_liquidity = quote.not_enough_liquidity(),
                    "报价已刷新"
                );
                Ok(quote)
            })
            .await
    }

    /// 流动性不足时返回 `None` 而不是错误。
    pub async fn get_best_route(&self, key: &RouteKey) -> Result<Option<Route>> {
        Ok(self.get_price(key).await?.best_route().cloned())
    }

    pub async fn get_price_impact(&self, key: &RouteKey) -> Result<Decimal> {
        let quote = self.get_price(key).await?;
        if quote.not_enough_liquidity() {
            return Err(Error::InsufficientLiquidity(format!(
                "{} -> {}",
                key.input_mint, key.output_mint
            )));
        }
        Ok(quote.price_impact_pct())
    }

    pub fn invalidate(&self, key: Option<&RouteKey>) {
        self.quotes.invalidate(key);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::future::join_all;

    use super::*;
    use crate::testing::{MockMarketSource, route};

    fn index(source: Arc<MockMarketSource>) -> PriceIndex {
        PriceIndex::new(source, &JupiterConfig::default(), &CacheConfig::default())
    }

    fn key(index: &PriceIndex) -> RouteKey {
        index
            .route_key(Pubkey::new_unique(), Pubkey::new_unique(), 1_000_000, None)
            .expect("key")
    }

    #[tokio::test(start_paused = true)]
    async fn no_liquidity_yields_absent_best_route() {
        let source = Arc::new(MockMarketSource::new(Vec::new()));
        source.set_routes(None);
        let index = index(source);
        let key = key(&index);

        let quote = index.get_price(&key).await.expect("quote");
        assert!(quote.not_enough_liquidity());
        assert!(quote.routes().is_empty());
        assert!(quote.best_route().is_none());
        assert_eq!(index.get_best_route(&key).await.expect("route"), None);
        assert!(matches!(
            index.get_price_impact(&key).await,
            Err(Error::InsufficientLiquidity(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn best_route_has_highest_output() {
        let source = Arc::new(MockMarketSource::new(Vec::new()));
        source.set_routes(Some(vec![route(10), route(40), route(25)]));
        let index = index(source);
        let key = key(&index);

        let best = index.get_best_route(&key).await.expect("route").expect("some");
        assert_eq!(best.out_amount, 40);
        assert_eq!(
            index.get_price_impact(&key).await.expect("impact"),
            Decimal::new(15, 4)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn quotes_are_cached_per_route_key() {
        let source = Arc::new(MockMarketSource::new(Vec::new()));
        source.set_routes(Some(vec![route(10)]));
        let index = Arc::new(index(source.clone()));
        let key = key(&index);

        let readers = (0..8).map(|_| {
            let index = Arc::clone(&index);
            let key = key.clone();
            tokio::spawn(async move { index.get_price(&key).await })
        });
        for result in join_all(readers).await {
            result.expect("join").expect("quote");
        }
        assert_eq!(source.quote_calls(), 1);

        let mut other = key.clone();
        other.amount += 1;
        index.get_price(&other).await.expect("other quote");
        assert_eq!(source.quote_calls(), 2);

        tokio::time::advance(CacheConfig::default().quote_ttl() + Duration::from_millis(1)).await;
        index.get_price(&key).await.expect("refreshed");
        assert_eq!(source.quote_calls(), 3);
    }

    #[test]
    fn route_key_validation() {
        let index = index(Arc::new(MockMarketSource::new(Vec::new())));
        let mint = Pubkey::new_unique();
        assert!(matches!(
            index.route_key(mint, Pubkey::new_unique(), 0, None),
            Err(Error::InvalidParameters(_))
        ));
        assert!(matches!(
            index.route_key(mint, mint, 1, None),
            Err(Error::InvalidParameters(_))
        ));
        assert!(matches!(
            index.route_key(mint, Pubkey::new_unique(), 1, Some(5_000)),
            Err(Error::InvalidParameters(_))
        ));
        let key = index
            .route_key(mint, Pubkey::new_unique(), 1, None)
            .expect("key");
        assert_eq!(key.slippage_bps, 50);
    }
}
