use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::error::{Error, Result};

use super::serde_helpers::{field_as_string, option_field_as_string};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolToken {
    #[serde(with = "field_as_string")]
    pub mint: Pubkey,
    pub symbol: String,
    pub decimals: u8,
    #[serde(alias = "reserveAmount")]
    pub reserve: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub tvl: f64,
    #[serde(alias = "volume24h")]
    pub volume_24h: f64,
    pub apy: f64,
}

/// 池子快照：整体替换，从不逐字段修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolInfo {
    #[serde(with = "field_as_string")]
    pub id: Pubkey,
    #[serde(default)]
    pub name: String,
    pub tokens: Vec<PoolToken>,
    #[serde(with = "field_as_string", alias = "ammProgram")]
    pub program_id: Pubkey,
    #[serde(with = "field_as_string")]
    pub lp_mint: Pubkey,
    #[serde(default, with = "option_field_as_string")]
    pub market_id: Option<Pubkey>,
    #[serde(default)]
    pub stats: PoolStats,
}

impl PoolInfo {
    pub fn contains_mint(&self, mint: &Pubkey) -> bool {
        self.tokens.iter().any(|token| token.mint == *mint)
    }

    pub fn contains_all(&self, mints: &[Pubkey]) -> bool {
        mints.iter().all(|mint| self.contains_mint(mint))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fee {
    #[serde(with = "field_as_string")]
    pub amount: u64,
    #[serde(with = "field_as_string")]
    pub mint: Pubkey,
    /// 费用占输入的比例（0.0025 表示 25 bps）。
    #[serde(default)]
    pub pct: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketInfo {
    pub id: String,
    pub label: String,
    #[serde(with = "field_as_string")]
    pub input_mint: Pubkey,
    #[serde(with = "field_as_string")]
    pub output_mint: Pubkey,
    #[serde(with = "field_as_string")]
    pub in_amount: u64,
    #[serde(with = "field_as_string")]
    pub out_amount: u64,
    pub lp_fee: Option<Fee>,
    pub platform_fee: Option<Fee>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub market_infos: Vec<MarketInfo>,
    #[serde(with = "field_as_string")]
    pub in_amount: u64,
    #[serde(with = "field_as_string")]
    pub out_amount: u64,
    #[serde(with = "field_as_string")]
    pub other_amount_threshold: u64,
    pub price_impact_pct: Decimal,
    pub slippage_bps: u16,
    pub fee: Option<Fee>,
}

impl Route {
    /// 按滑点计算最少可接受的输出数量。
    pub fn min_out_amount(&self, slippage_bps: u16) -> u64 {
        let keep = 10_000u128.saturating_sub(u128::from(slippage_bps));
        (u128::from(self.out_amount) * keep / 10_000) as u64
    }
}

/// 报价请求，同时作为路由索引的缓存 key。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuoteParams {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub amount: u64,
    pub slippage_bps: u16,
    pub only_direct_routes: bool,
}

/// 报价结果。流动性充足时 `best_route` 一定指向 `routes` 中的某一条。
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    input_mint: Pubkey,
    output_mint: Pubkey,
    not_enough_liquidity: bool,
    price_impact_pct: Decimal,
    routes: Vec<Route>,
    best_route: Option<usize>,
}

impl PriceQuote {
    /// 以输出数量最多的路线作为最优路线。
    pub fn from_routes(
        input_mint: Pubkey,
        output_mint: Pubkey,
        not_enough_liquidity: bool,
        routes: Vec<Route>,
    ) -> Result<Self> {
        let best_route = routes
            .iter()
            .enumerate()
            .max_by_key(|(_, route)| route.out_amount)
            .map(|(index, _)| index);
        if !not_enough_liquidity && best_route.is_none() {
            return Err(Error::upstream(format!(
                "报价 {input_mint} -> {output_mint} 声称流动性充足但没有任何路线"
            )));
        }
        let price_impact_pct = best_route
            .map(|index| routes[index].price_impact_pct)
            .unwrap_or_default();
        Ok(Self {
            input_mint,
            output_mint,
            not_enough_liquidity,
            price_impact_pct,
            routes,
            best_route,
        })
    }

    pub fn no_liquidity(input_mint: Pubkey, output_mint: Pubkey) -> Self {
        Self {
            input_mint,
            output_mint,
            not_enough_liquidity: true,
            price_impact_pct: Decimal::ZERO,
            routes: Vec::new(),
            best_route: None,
        }
    }

    pub fn input_mint(&self) -> &Pubkey {
        &self.input_mint
    }

    pub fn output_mint(&self) -> &Pubkey {
        &self.output_mint
    }

    pub fn not_enough_liquidity(&self) -> bool {
        self.not_enough_liquidity
    }

    pub fn price_impact_pct(&self) -> Decimal {
        self.price_impact_pct
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn best_route(&self) -> Option<&Route> {
        self.best_route.map(|index| &self.routes[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn route(out_amount: u64) -> Route {
        Route {
            market_infos: Vec::new(),
            in_amount: 1_000,
            out_amount,
            other_amount_threshold: out_amount,
            price_impact_pct: Decimal::new(out_amount as i64, 4),
            slippage_bps: 50,
            fee: None,
        }
    }

    #[test]
    fn best_route_is_the_highest_output_member() {
        let quote = PriceQuote::from_routes(
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            false,
            vec![route(10), route(30), route(20)],
        )
        .expect("quote");
        let best = quote.best_route().expect("best route");
        assert_eq!(best.out_amount, 30);
        assert!(quote.routes().contains(best));
        assert_eq!(quote.price_impact_pct(), Decimal::new(30, 4));
    }

    #[test]
    fn liquid_quote_without_routes_is_rejected() {
        let err =
            PriceQuote::from_routes(Pubkey::new_unique(), Pubkey::new_unique(), false, vec![])
                .unwrap_err();
        assert!(matches!(err, Error::UpstreamUnavailable(_)));
    }

    #[test]
    fn illiquid_quote_may_be_empty() {
        let quote =
            PriceQuote::from_routes(Pubkey::new_unique(), Pubkey::new_unique(), true, vec![])
                .expect("quote");
        assert!(quote.not_enough_liquidity());
        assert!(quote.best_route().is_none());
    }

    #[test]
    fn min_out_respects_slippage() {
        assert_eq!(route(10_000).min_out_amount(50), 9_950);
        assert_eq!(route(10_000).min_out_amount(0), 10_000);
        assert_eq!(route(10_000).min_out_amount(10_000), 0);
    }

    #[test]
    fn pool_info_parses_camel_case_payload() {
        let mint_a = Pubkey::new_unique();
        let mint_b = Pubkey::new_unique();
        let raw = serde_json::json!({
            "id": Pubkey::new_unique().to_string(),
            "name": "SOL-USDC",
            "tokens": [
                {"mint": mint_a.to_string(), "symbol": "SOL", "decimals": 9, "reserveAmount": 10.5},
                {"mint": mint_b.to_string(), "symbol": "USDC", "decimals": 6, "reserve": 2000.0}
            ],
            "ammProgram": Pubkey::new_unique().to_string(),
            "lpMint": Pubkey::new_unique().to_string(),
            "stats": {"tvl": 1000000.0, "volume24h": 5.0, "apy": 0.1}
        });
        let pool: PoolInfo = serde_json::from_value(raw).expect("parse pool");
        assert!(pool.contains_all(&[mint_a, mint_b]));
        assert_eq!(pool.tokens[0].reserve, 10.5);
        assert_eq!(pool.stats.volume_24h, 5.0);
        assert!(pool.market_id.is_none());
    }
}
