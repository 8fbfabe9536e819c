//! 测试替身：可编排的账本、行情源、指令组装器与投递 oracle。

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::VersionedTransaction;

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::ledger::{BlockReference, LedgerClient, LedgerError, SignatureStatus, SimulationOutcome};
use crate::market::{
    MarketDataSource, MarketError, PoolInfo, PoolStats, PoolToken, PriceQuote, QuoteParams, Route,
};
use crate::messaging::{AdapterParams, Chain, DeliveryOracle, DeliveryRecord, DeliveryState, MessageFee};
use crate::pipeline::{SharedSigner, TransactionPipeline};
use crate::protocols::{ComposedInstructions, InstructionComposer, ProtocolAction};

pub(crate) const LAST_VALID_OFFSET: u64 = 150;
pub(crate) const BLOCK_TIME: i64 = 1_700_000_000;

/// 每次 submit 后签名在账本上的表现。
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConfirmMode {
    Immediate,
    Never,
    Reject(String),
    /// 签名一直不出现，同时账本高度越过 last_valid_block_height。
    Expire,
}

#[derive(Default)]
struct LedgerState {
    block_height: u64,
    issued: Vec<BlockReference>,
    reference_failures: VecDeque<LedgerError>,
    submit_failures: VecDeque<LedgerError>,
    confirm_script: VecDeque<ConfirmMode>,
    outcomes: HashMap<Signature, ConfirmMode>,
    submitted: Vec<VersionedTransaction>,
    balances: HashMap<Pubkey, u64>,
    balance_error: Option<LedgerError>,
    simulation_error: Option<String>,
}

pub(crate) struct MockLedger {
    state: Mutex<LedgerState>,
    lamports_per_signature: u64,
}

impl MockLedger {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState {
                block_height: 1_000,
                ..LedgerState::default()
            }),
            lamports_per_signature: 5_000,
        }
    }

    pub(crate) fn fail_submits(&self, count: usize, reason: &str) {
        let mut state = self.state.lock();
        for _ in 0..count {
            state
                .submit_failures
                .push_back(LedgerError::Transport(reason.to_string()));
        }
    }

    pub(crate) fn reject_next_submit(&self, reason: &str) {
        self.state
            .lock()
            .submit_failures
            .push_back(LedgerError::Rejected(reason.to_string()));
    }

    /// 模拟预检阶段返回 `BlockhashNotFound`。
    pub(crate) fn expire_next_submit(&self) {
        self.state
            .lock()
            .submit_failures
            .push_back(LedgerError::Expired("BlockhashNotFound".to_string()));
    }

    pub(crate) fn fail_block_references(&self, count: usize) {
        let mut state = self.state.lock();
        for _ in 0..count {
            state
                .reference_failures
                .push_back(LedgerError::Transport("rpc unavailable".to_string()));
        }
    }

    pub(crate) fn script_confirmations(&self, modes: impl IntoIterator<Item = ConfirmMode>) {
        self.state.lock().confirm_script.extend(modes);
    }

    pub(crate) fn set_balance(&self, address: Pubkey, lamports: u64) {
        self.state.lock().balances.insert(address, lamports);
    }

    pub(crate) fn set_balance_error(&self, err: Option<LedgerError>) {
        self.state.lock().balance_error = err;
    }

    pub(crate) fn set_simulation_error(&self, err: Option<&str>) {
        self.state.lock().simulation_error = err.map(str::to_string);
    }

    pub(crate) fn issued_references(&self) -> Vec<BlockReference> {
        self.state.lock().issued.clone()
    }

    pub(crate) fn block_reference_calls(&self) -> usize {
        self.state.lock().issued.len()
    }

    pub(crate) fn submitted(&self) -> usize {
        self.state.lock().submitted.len()
    }

    pub(crate) fn submitted_transactions(&self) -> Vec<VersionedTransaction> {
        self.state.lock().submitted.clone()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn latest_block_reference(
        &self,
        _commitment: CommitmentConfig,
    ) -> std::result::Result<BlockReference, LedgerError> {
        let mut state = self.state.lock();
        if let Some(err) = state.reference_failures.pop_front() {
            return Err(err);
        }
        let reference =
            BlockReference::new(Hash::new_unique(), state.block_height + LAST_VALID_OFFSET);
        state.issued.push(reference);
        Ok(reference)
    }

    async fn submit(
        &self,
        transaction: &VersionedTransaction,
    ) -> std::result::Result<Signature, LedgerError> {
        let mut state = self.state.lock();
        if let Some(err) = state.submit_failures.pop_front() {
            return Err(err);
        }
        let signature = transaction
            .signatures
            .first()
            .copied()
            .ok_or_else(|| LedgerError::Rejected("missing signature".to_string()))?;
        let mode = state
            .confirm_script
            .pop_front()
            .unwrap_or(ConfirmMode::Immediate);
        state.outcomes.insert(signature, mode);
        state.submitted.push(transaction.clone());
        Ok(signature)
    }

    async fn signature_status(
        &self,
        signature: &Signature,
        _commitment: CommitmentConfig,
    ) -> std::result::Result<Option<SignatureStatus>, LedgerError> {
        let mut state = self.state.lock();
        let mode = state.outcomes.get(signature).cloned();
        Ok(match mode {
            Some(ConfirmMode::Immediate) => Some(SignatureStatus {
                slot: 42,
                confirmations: Some(1),
                err: None,
                reached_commitment: true,
            }),
            Some(ConfirmMode::Reject(reason)) => Some(SignatureStatus {
                slot: 42,
                confirmations: Some(0),
                err: Some(reason),
                reached_commitment: false,
            }),
            Some(ConfirmMode::Expire) => {
                state.block_height += LAST_VALID_OFFSET * 2;
                None
            }
            Some(ConfirmMode::Never) | None => None,
        })
    }

    async fn simulate(
        &self,
        _transaction: &VersionedTransaction,
    ) -> std::result::Result<SimulationOutcome, LedgerError> {
        let state = self.state.lock();
        Ok(SimulationOutcome {
            err: state.simulation_error.clone(),
            logs: vec!["Program log: simulated".to_string()],
            units_consumed: Some(1_400),
        })
    }

    async fn balance(&self, address: &Pubkey) -> std::result::Result<u64, LedgerError> {
        let state = self.state.lock();
        if let Some(err) = &state.balance_error {
            return Err(err.clone());
        }
        Ok(state.balances.get(address).copied().unwrap_or_default())
    }

    async fn block_height(
        &self,
        _commitment: CommitmentConfig,
    ) -> std::result::Result<u64, LedgerError> {
        Ok(self.state.lock().block_height)
    }

    async fn lamports_per_signature(&self) -> std::result::Result<u64, LedgerError> {
        Ok(self.lamports_per_signature)
    }

    async fn block_time(&self, _slot: u64) -> std::result::Result<Option<i64>, LedgerError> {
        Ok(Some(BLOCK_TIME))
    }
}

pub(crate) fn fast_pipeline_config() -> PipelineConfig {
    PipelineConfig {
        max_retries: 3,
        confirm_timeout_ms: 60_000,
        poll_interval_ms: 10,
        retry_backoff_ms: 1,
        skip_preflight: false,
    }
}

pub(crate) fn pipeline_for(ledger: Arc<MockLedger>) -> Arc<TransactionPipeline> {
    Arc::new(TransactionPipeline::new(
        ledger,
        &fast_pipeline_config(),
        CommitmentConfig::confirmed(),
    ))
}

pub(crate) fn signer() -> SharedSigner {
    Arc::new(Keypair::new())
}

pub(crate) fn pool(tvl: f64, mints: [Pubkey; 2]) -> PoolInfo {
    PoolInfo {
        id: Pubkey::new_unique(),
        name: format!("pool-{tvl}"),
        tokens: mints
            .iter()
            .enumerate()
            .map(|(index, mint)| PoolToken {
                mint: *mint,
                symbol: format!("T{index}"),
                decimals: 9,
                reserve: tvl / 2.0,
            })
            .collect(),
        program_id: Pubkey::new_unique(),
        lp_mint: Pubkey::new_unique(),
        market_id: None,
        stats: PoolStats {
            tvl,
            volume_24h: tvl / 10.0,
            apy: 0.05,
        },
    }
}

pub(crate) fn route(out_amount: u64) -> Route {
    Route {
        market_infos: Vec::new(),
        in_amount: 1_000_000,
        out_amount,
        other_amount_threshold: out_amount,
        price_impact_pct: rust_decimal::Decimal::new(15, 4),
        slippage_bps: 50,
        fee: None,
    }
}

/// 计数的行情源；`delay` 用于制造并发窗口。
pub(crate) struct MockMarketSource {
    pools: Mutex<Vec<PoolInfo>>,
    quote: Mutex<Option<Vec<Route>>>,
    failing: Mutex<bool>,
    delay: Duration,
    pool_calls: AtomicUsize,
    quote_calls: AtomicUsize,
}

impl MockMarketSource {
    pub(crate) fn new(pools: Vec<PoolInfo>) -> Self {
        Self {
            pools: Mutex::new(pools),
            quote: Mutex::new(None),
            failing: Mutex::new(false),
            delay: Duration::from_millis(20),
            pool_calls: AtomicUsize::new(0),
            quote_calls: AtomicUsize::new(0),
        }
    }

    /// `None` 表示上游报告流动性不足。
    pub(crate) fn set_routes(&self, routes: Option<Vec<Route>>) {
        *self.quote.lock() = routes;
    }

    pub(crate) fn set_pools(&self, pools: Vec<PoolInfo>) {
        *self.pools.lock() = pools;
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub(crate) fn pool_calls(&self) -> usize {
        self.pool_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn quote_calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataSource for MockMarketSource {
    async fn list_pools(&self) -> std::result::Result<Vec<PoolInfo>, MarketError> {
        self.pool_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if *self.failing.lock() {
            return Err(MarketError::Schema("pool api down".to_string()));
        }
        Ok(self.pools.lock().clone())
    }

    async fn quote(&self, params: &QuoteParams) -> std::result::Result<PriceQuote, MarketError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if *self.failing.lock() {
            return Err(MarketError::Schema("quote api down".to_string()));
        }
        let routes = self.quote.lock().clone();
        match routes {
            Some(routes) => {
                PriceQuote::from_routes(params.input_mint, params.output_mint, false, routes)
                    .map_err(|err| MarketError::Schema(err.to_string()))
            }
            None => Ok(PriceQuote::no_liquidity(params.input_mint, params.output_mint)),
        }
    }
}

/// 记录收到的动作，每个动作产出一条由 owner 签名的指令。
pub(crate) struct MockComposer {
    actions: Mutex<Vec<ProtocolAction>>,
    extra_signers: Vec<SharedSigner>,
    failure: Mutex<Option<Error>>,
    program_id: Pubkey,
}

impl MockComposer {
    pub(crate) fn new() -> Self {
        Self {
            actions: Mutex::new(Vec::new()),
            extra_signers: Vec::new(),
            failure: Mutex::new(None),
            program_id: Pubkey::new_unique(),
        }
    }

    /// 模拟需要新建账户的动作（例如建池时的池子状态账户）。
    pub(crate) fn with_extra_signer(mut self, signer: SharedSigner) -> Self {
        self.extra_signers.push(signer);
        self
    }

    pub(crate) fn fail_with(&self, err: Error) {
        *self.failure.lock() = Some(err);
    }

    pub(crate) fn actions(&self) -> Vec<ProtocolAction> {
        self.actions.lock().clone()
    }
}

#[async_trait]
impl InstructionComposer for MockComposer {
    async fn compose(&self, action: &ProtocolAction, owner: &Pubkey) -> Result<ComposedInstructions> {
        if let Some(err) = self.failure.lock().clone() {
            return Err(err);
        }
        self.actions.lock().push(action.clone());

        let mut accounts = vec![AccountMeta::new(*owner, true)];
        accounts.extend(
            self.extra_signers
                .iter()
                .map(|signer| AccountMeta::new(signer.pubkey(), true)),
        );
        Ok(ComposedInstructions {
            instructions: vec![Instruction::new_with_bytes(
                self.program_id,
                action.name().as_bytes(),
                accounts,
            )],
            signers: self.extra_signers.clone(),
        })
    }
}

/// 可编排的目标链 oracle。
pub(crate) struct MockOracle {
    records: Mutex<HashMap<String, DeliveryRecord>>,
    delivery_calls: AtomicUsize,
}

impl MockOracle {
    pub(crate) fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            delivery_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set(&self, message_hash: &str, dst_chain: Chain, state: DeliveryState) {
        self.records.lock().insert(
            message_hash.to_string(),
            DeliveryRecord {
                src_chain: Chain::Solana,
                dst_chain,
                state,
            },
        );
    }

    pub(crate) fn delivery_calls(&self) -> usize {
        self.delivery_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeliveryOracle for MockOracle {
    async fn delivery(&self, message_hash: &str) -> Result<Option<DeliveryRecord>> {
        self.delivery_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.lock().get(message_hash).cloned())
    }

    async fn quote_fee(
        &self,
        dst_chain: Chain,
        payload_len: usize,
        adapter: &AdapterParams,
    ) -> Result<MessageFee> {
        let extra = match adapter {
            AdapterParams::V1 { .. } => 0,
            AdapterParams::V2 { native_for_dst, .. } => *native_for_dst,
        };
        Ok(MessageFee {
            native_fee: u64::from(dst_chain.id()) * 1_000
                + payload_len as u64 * 10
                + adapter.gas_limit() / 100
                + extra,
            zro_fee: 0,
        })
    }
}
