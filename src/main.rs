use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use solana_sdk::pubkey::Pubkey;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use chainpilot::config::{self, AppConfig, ConfigError, load_config};
use chainpilot::ledger::{LedgerClient, RpcLedger};
use chainpilot::market::{JupiterApiClient, MarketDataSource};
use chainpilot::messaging::Chain;
use chainpilot::monitoring;
use chainpilot::protocols::{PoolDirectory, PoolFilter, PriceIndex};

const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

#[derive(Parser, Debug)]
#[command(name = "chainpilot", version, about = "Solana 多协议交易代理")]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径（默认查找 chainpilot.toml 或 config/chainpilot.toml）"
    )]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 初始化配置模版文件
    Init(InitCmd),
    /// 查询地址的 SOL 余额
    Balance(BalanceCmd),
    /// 请求 Jupiter 报价并输出最优路线
    Quote(QuoteCmd),
    /// 按条件列出池子
    Pools(PoolsCmd),
    /// 列出支持的跨链目标
    Chains,
}

#[derive(Args, Debug)]
struct InitCmd {
    #[arg(long, value_name = "DIR", help = "可选输出目录（默认当前目录）")]
    output: Option<PathBuf>,
    #[arg(long, help = "若文件存在则覆盖")]
    force: bool,
}

#[derive(Args, Debug)]
struct BalanceCmd {
    #[arg(help = "钱包地址")]
    address: String,
}

#[derive(Args, Debug)]
struct QuoteCmd {
    #[arg(long, help = "输入代币的 Mint 地址")]
    input: String,
    #[arg(long, help = "输出代币的 Mint 地址")]
    output: String,
    #[arg(long, help = "交易数量（原始单位，lamports/atoms）")]
    amount: u64,
    #[arg(long, help = "允许滑点（基点），缺省使用配置值")]
    slippage_bps: Option<u16>,
    #[arg(long, help = "仅限一跳直连路线")]
    direct_only: bool,
}

#[derive(Args, Debug)]
struct PoolsCmd {
    #[arg(long = "token", value_name = "MINT", help = "池子必须包含的代币，可重复")]
    tokens: Vec<String>,
    #[arg(long = "program", value_name = "PROGRAM", help = "限定 AMM 程序，可重复")]
    programs: Vec<String>,
    #[arg(long, help = "最低 TVL")]
    min_tvl: Option<f64>,
    #[arg(long, help = "最低 24h 成交量")]
    min_volume: Option<f64>,
    #[arg(long, default_value_t = 20, help = "最多输出条数")]
    limit: usize,
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_configuration(cli.config.clone())?;
    init_tracing(&config.global.logging)?;

    monitoring::try_init_prometheus(&config.prometheus, config.global.network)?;

    match cli.command {
        Command::Init(args) => {
            let dir = match args.output {
                Some(dir) => dir,
                None => std::env::current_dir()?,
            };
            std::fs::create_dir_all(&dir)?;
            let path = config::write_template(&dir, args.force)?;
            println!("已写入 {}", path.display());
        }
        Command::Balance(args) => {
            let address = parse_pubkey(&args.address)?;
            let ledger = build_ledger(&config);
            let lamports = ledger.balance(&address).await?;
            println!(
                "{address}: {lamports} lamports ({:.9} SOL)",
                lamports as f64 / LAMPORTS_PER_SOL as f64
            );
        }
        Command::Quote(args) => {
            let index = PriceIndex::new(
                build_market_source(&config)?,
                &config.protocols.jupiter,
                &config.cache,
            );
            let mut key = index.route_key(
                parse_pubkey(&args.input)?,
                parse_pubkey(&args.output)?,
                args.amount,
                args.slippage_bps,
            )?;
            key.only_direct_routes = args.direct_only;
            let quote = index.get_price(&key).await?;
            info!(
                target: "cli::quote",
                routes = quote.routes().len(),
                price_impact_pct = %quote.price_impact_pct(),
                "报价完成"
            );
            match quote.best_route() {
                Some(route) => {
                    println!("{}", serde_json::to_string_pretty(route)?);
                    println!(
                        "最少输出（{} bps 滑点）: {}",
                        key.slippage_bps,
                        route.min_out_amount(key.slippage_bps)
                    );
                }
                None => println!("流动性不足，没有可用路线"),
            }
        }
        Command::Pools(args) => {
            let directory = PoolDirectory::new(build_market_source(&config)?, &config.cache);
            let filter = PoolFilter {
                programs: parse_pubkeys(&args.programs)?,
                tokens: parse_pubkeys(&args.tokens)?,
                min_tvl: args.min_tvl,
                min_volume_24h: args.min_volume,
            };
            let pools = directory.get_pools(&filter).await?;
            println!("共 {} 个池子匹配", pools.len());
            for pool in pools.iter().take(args.limit) {
                println!(
                    "{}  {:<24} tvl={:.2} vol24h={:.2} apy={:.4}",
                    pool.id, pool.name, pool.stats.tvl, pool.stats.volume_24h, pool.stats.apy
                );
            }
        }
        Command::Chains => {
            for chain in Chain::ALL {
                println!("{:>2}  {chain}", chain.id());
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

fn init_tracing(config: &config::LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .try_init()
            .map_err(|err| anyhow!(err))?;
    } else {
        fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|err| anyhow!(err))?;
    }
    Ok(())
}

fn load_configuration(path: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    load_config(path)
}

fn build_ledger(config: &AppConfig) -> RpcLedger {
    let url = config.global.resolved_rpc_url();
    info!(
        target: "cli",
        network = config.global.network.as_str(),
        rpc = %url,
        "连接账本"
    );
    RpcLedger::from_url(
        url,
        config.pipeline.skip_preflight,
        config.global.commitment.to_config(),
    )
}

fn build_market_source(config: &AppConfig) -> Result<Arc<dyn MarketDataSource>> {
    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .build()
        .context("构建 HTTP 客户端失败")?;
    Ok(Arc::new(JupiterApiClient::new(
        http,
        &config.protocols.jupiter,
        &config.global.logging,
    )))
}

fn parse_pubkey(raw: &str) -> Result<Pubkey> {
    raw.trim()
        .parse::<Pubkey>()
        .with_context(|| format!("无效的地址: {raw}"))
}

fn parse_pubkeys(raw: &[String]) -> Result<Option<Vec<Pubkey>>> {
    if raw.is_empty() {
        return Ok(None);
    }
    raw.iter()
        .map(|value| parse_pubkey(value))
        .collect::<Result<Vec<_>>>()
        .map(Some)
}
