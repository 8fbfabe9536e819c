//! Jupiter 行情 API（报价 + 池子列表）。

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, trace, warn};

use crate::config::{JupiterConfig, LoggingConfig, LoggingProfile};
use crate::monitoring::metrics::prometheus_enabled;
use crate::monitoring::{LatencyMetadata, guard_with_level};

use super::serde_helpers::{field_as_string, option_field_as_string};
use super::{Fee, MarketDataSource, MarketError, MarketInfo, PoolInfo, PriceQuote, QuoteParams, Route};

/// 上游用这些错误码表示找不到可用路线，对应 `notEnoughLiquidity`。
const NO_ROUTE_CODES: &[&str] = &["COULD_NOT_FIND_ANY_ROUTE", "NO_ROUTES_FOUND", "TOKEN_NOT_TRADABLE"];

#[derive(Clone)]
pub struct JupiterApiClient {
    quote_url: String,
    pools_url: String,
    client: reqwest::Client,
    timeout: Duration,
    log_profile: LoggingProfile,
}

impl fmt::Debug for JupiterApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JupiterApiClient")
            .field("quote_url", &self.quote_url)
            .field("pools_url", &self.pools_url)
            .field("timeout", &self.timeout)
            .field("log_profile", &self.log_profile)
            .finish()
    }
}

impl JupiterApiClient {
    pub fn new(client: reqwest::Client, config: &JupiterConfig, logging: &LoggingConfig) -> Self {
        Self {
            quote_url: config.quote_url.clone(),
            pools_url: config.pools_url.clone(),
            client,
            timeout: Duration::from_millis(config.timeout_ms),
            log_profile: logging.profile,
        }
    }

    async fn fetch(
        &self,
        stage: &'static str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<(StatusCode, String), MarketError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .query(query)
            .send()
            .await
            .map_err(|err| self.transport_error(stage, url, err, None))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| self.transport_error(stage, url, err, Some(status)))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            let summary = summarize_error_body(&body);
            record_metrics(stage, "rate_limited", None, Some(status));
            warn!(
                target: "market::jupiter",
                stage,
                endpoint = %url,
                status = status.as_u16(),
                body = %summary,
                "Jupiter 请求命中限流"
            );
            return Err(MarketError::RateLimited {
                endpoint: url.to_string(),
                status,
                body: summary,
            });
        }
        Ok((status, body))
    }

    fn transport_error(
        &self,
        stage: &'static str,
        url: &str,
        err: reqwest::Error,
        status: Option<StatusCode>,
    ) -> MarketError {
        if err.is_timeout() {
            let timeout_ms = self.timeout.as_millis() as u64;
            record_metrics(stage, "timeout", None, status);
            warn!(
                target: "market::jupiter",
                stage,
                endpoint = %url,
                timeout_ms,
                "Jupiter 请求超时"
            );
            MarketError::Timeout {
                endpoint: url.to_string(),
                timeout_ms,
                source: err,
            }
        } else {
            record_metrics(stage, "transport_error", None, status);
            warn!(
                target: "market::jupiter",
                stage,
                endpoint = %url,
                error = %err,
                "Jupiter 请求发送失败"
            );
            MarketError::from(err)
        }
    }

    fn guard_level(&self) -> tracing::Level {
        if self.log_profile.is_verbose() {
            tracing::Level::INFO
        } else {
            tracing::Level::DEBUG
        }
    }

    fn api_status(&self, stage: &'static str, url: &str, status: StatusCode, body: &str) -> MarketError {
        let summary = summarize_error_body(body);
        record_metrics(stage, "http_error", None, Some(status));
        warn!(
            target: "market::jupiter",
            stage,
            endpoint = %url,
            status = status.as_u16(),
            body = %summary,
            "Jupiter 返回非 200 状态"
        );
        MarketError::ApiStatus {
            endpoint: url.to_string(),
            status,
            body: summary,
        }
    }
}

#[async_trait]
impl MarketDataSource for JupiterApiClient {
    async fn list_pools(&self) -> Result<Vec<PoolInfo>, MarketError> {
        let url = self.pools_url.as_str();
        let metadata = LatencyMetadata::new(
            [
                ("stage".to_string(), "pools".to_string()),
                ("url".to_string(), url.to_string()),
            ]
            .into_iter()
            .collect(),
        );
        let guard = guard_with_level("jupiter.pools", self.guard_level(), metadata);
        let started = Instant::now();

        let (status, body) = self.fetch("pools", url, &[]).await?;
        if !status.is_success() {
            return Err(self.api_status("pools", url, status, &body));
        }

        let pools = parse_pools(&body).inspect_err(|err| {
            record_metrics("pools", "decode_error", None, Some(status));
            warn!(
                target: "market::jupiter",
                endpoint = %url,
                error = %err,
                "池子列表解析失败"
            );
        })?;

        let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
        debug!(
            target: "market::jupiter",
            pools = pools.len(),
            elapsed_ms = format_args!("{elapsed_ms:.3}"),
            "池子列表拉取完成"
        );
        record_metrics("pools", "success", Some(elapsed_ms), Some(status));
        guard.finish();
        Ok(pools)
    }

    async fn quote(&self, params: &QuoteParams) -> Result<PriceQuote, MarketError> {
        let url = self.quote_url.as_str();
        let metadata = LatencyMetadata::new(
            [
                ("stage".to_string(), "quote".to_string()),
                ("url".to_string(), url.to_string()),
            ]
            .into_iter()
            .collect(),
        );
        let guard = guard_with_level("jupiter.quote", self.guard_level(), metadata);
        let started = Instant::now();

        trace!(
            target: "market::jupiter",
            input_mint = %params.input_mint,
            output_mint = %params.output_mint,
            amount = params.amount,
            slippage_bps = params.slippage_bps,
            only_direct_routes = params.only_direct_routes,
            "开始请求 Jupiter 报价"
        );

        let query = [
            ("inputMint", params.input_mint.to_string()),
            ("outputMint", params.output_mint.to_string()),
            ("amount", params.amount.to_string()),
            ("slippageBps", params.slippage_bps.to_string()),
            ("onlyDirectRoutes", params.only_direct_routes.to_string()),
        ];
        let (status, body) = self.fetch("quote", url, &query).await?;

        if !status.is_success() {
            if is_no_route_error(&body) {
                debug!(
                    target: "market::jupiter",
                    input_mint = %params.input_mint,
                    output_mint = %params.output_mint,
                    "Jupiter 找不到可用路线"
                );
                record_metrics("quote", "no_route", None, Some(status));
                guard.finish();
                return Ok(PriceQuote::no_liquidity(params.input_mint, params.output_mint));
            }
            return Err(self.api_status("quote", url, status, &body));
        }

        let quote = parse_quote(&body, params).inspect_err(|err| {
            record_metrics("quote", "decode_error", None, Some(status));
            warn!(
                target: "market::jupiter",
                endpoint = %url,
                error = %err,
                "Jupiter 报价解析失败"
            );
        })?;

        let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
        debug!(
            target: "market::jupiter",
            elapsed_ms = format_args!("{elapsed_ms:.3}"),
            out_amount = quote.best_route().map(|route| route.out_amount),
            "Jupiter 报价完成"
        );
        record_metrics("quote", "success", Some(elapsed_ms), Some(status));
        guard.finish();
        Ok(quote)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PoolsPayload {
    List(Vec<PoolInfo>),
    Wrapped { data: Vec<PoolInfo> },
}

fn parse_pools(body: &str) -> Result<Vec<PoolInfo>, MarketError> {
    let payload: PoolsPayload = serde_json::from_str(body)?;
    Ok(match payload {
        PoolsPayload::List(pools) | PoolsPayload::Wrapped { data: pools } => pools,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorPayload {
    #[serde(default)]
    error_code: Option<String>,
}

fn is_no_route_error(body: &str) -> bool {
    serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .and_then(|payload| payload.error_code)
        .is_some_and(|code| NO_ROUTE_CODES.contains(&code.as_str()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuotePayload {
    #[serde(with = "field_as_string")]
    input_mint: Pubkey,
    #[serde(with = "field_as_string")]
    in_amount: u64,
    #[serde(with = "field_as_string")]
    output_mint: Pubkey,
    #[serde(with = "field_as_string")]
    out_amount: u64,
    #[serde(with = "field_as_string")]
    other_amount_threshold: u64,
    slippage_bps: u16,
    #[serde(default)]
    price_impact_pct: Decimal,
    #[serde(default)]
    route_plan: Vec<RoutePlanStep>,
    #[serde(default)]
    platform_fee: Option<PlatformFee>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoutePlanStep {
    swap_info: SwapInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapInfo {
    amm_key: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(with = "field_as_string")]
    input_mint: Pubkey,
    #[serde(with = "field_as_string")]
    output_mint: Pubkey,
    #[serde(with = "field_as_string")]
    in_amount: u64,
    #[serde(with = "field_as_string")]
    out_amount: u64,
    #[serde(default, with = "option_field_as_string")]
    fee_amount: Option<u64>,
    #[serde(default, with = "option_field_as_string")]
    fee_mint: Option<Pubkey>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlatformFee {
    #[serde(with = "field_as_string")]
    amount: u64,
    fee_bps: u16,
}

/// 基点换算为比例，与 `fee_ratio` 同一单位（20 bps = 0.002）。
fn bps_ratio(bps: u16) -> Decimal {
    Decimal::new(i64::from(bps), 4)
}

fn fee_ratio(fee: u64, base: u64) -> Decimal {
    Decimal::from(fee)
        .checked_div(Decimal::from(base))
        .unwrap_or_default()
}

fn parse_quote(body: &str, params: &QuoteParams) -> Result<PriceQuote, MarketError> {
    let payload: QuotePayload = serde_json::from_str(body)?;
    if payload.input_mint != params.input_mint || payload.output_mint != params.output_mint {
        return Err(MarketError::Schema(format!(
            "报价方向不一致: 请求 {} -> {}，返回 {} -> {}",
            params.input_mint, params.output_mint, payload.input_mint, payload.output_mint
        )));
    }
    if payload.route_plan.is_empty() {
        return Ok(PriceQuote::no_liquidity(payload.input_mint, payload.output_mint));
    }

    let market_infos = payload
        .route_plan
        .into_iter()
        .map(|step| {
            let info = step.swap_info;
            let lp_fee = match (info.fee_amount, info.fee_mint) {
                (Some(amount), Some(mint)) => Some(Fee {
                    amount,
                    mint,
                    pct: fee_ratio(amount, info.in_amount),
                }),
                _ => None,
            };
            MarketInfo {
                label: info.label.unwrap_or_else(|| info.amm_key.clone()),
                id: info.amm_key,
                input_mint: info.input_mint,
                output_mint: info.output_mint,
                in_amount: info.in_amount,
                out_amount: info.out_amount,
                lp_fee,
                platform_fee: None,
            }
        })
        .collect();

    let route = Route {
        market_infos,
        in_amount: payload.in_amount,
        out_amount: payload.out_amount,
        other_amount_threshold: payload.other_amount_threshold,
        price_impact_pct: payload.price_impact_pct,
        slippage_bps: payload.slippage_bps,
        fee: payload.platform_fee.map(|fee| Fee {
            amount: fee.amount,
            mint: payload.output_mint,
            pct: bps_ratio(fee.fee_bps),
        }),
    };

    PriceQuote::from_routes(payload.input_mint, payload.output_mint, false, vec![route])
        .map_err(|err| MarketError::Schema(err.to_string()))
}

fn record_metrics(
    stage: &'static str,
    status: &'static str,
    elapsed_ms: Option<f64>,
    http_status: Option<StatusCode>,
) {
    if !prometheus_enabled() {
        return;
    }
    counter!(
        "chainpilot_market_request_total",
        "stage" => stage,
        "status" => status,
        "http_status" => http_status
            .map(|code| code.as_u16().to_string())
            .unwrap_or_else(|| "none".to_string())
    )
    .increment(1);
    if let Some(value) = elapsed_ms {
        histogram!("chainpilot_market_request_latency_ms", "stage" => stage).record(value);
    }
}

fn summarize_error_body(body: &str) -> String {
    const MAX_CHARS: usize = 512;
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "(empty response body)".to_string();
    }
    let single_line = trimmed.replace(['\n', '\r'], " ");
    match single_line.char_indices().nth(MAX_CHARS) {
        Some((cut, _)) => format!("{}…", &single_line[..cut]),
        None => single_line,
    }
}
