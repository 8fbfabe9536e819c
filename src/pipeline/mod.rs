//! 交易管线：build → sign → submit → confirm → retry/fail。

mod builder;
mod confirm;
mod types;

use std::sync::Arc;
use std::time::Duration;

use solana_commitment_config::CommitmentConfig;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::{LoggingProfile, PipelineConfig};
use crate::error::{Error, Result};
use crate::ledger::{LedgerClient, LedgerError, SignatureStatus, SimulationOutcome};
use crate::monitoring::{LatencyMetadata, events, guard_with_level};

pub use types::{SharedSigner, TransactionRequest, TransactionResult};

use confirm::Confirmation;

enum Attempt {
    Done(TransactionResult),
    Retry(String),
}

impl From<LedgerError> for Error {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Transport(reason) | LedgerError::Expired(reason) => {
                Error::UpstreamUnavailable(reason)
            }
            LedgerError::Rejected(reason) => Error::LedgerRejected(reason),
        }
    }
}

#[derive(Clone)]
pub struct TransactionPipeline {
    ledger: Arc<dyn LedgerClient>,
    commitment: CommitmentConfig,
    max_retries: usize,
    confirm_timeout: Duration,
    poll_interval: Duration,
    config: PipelineConfig,
    log_profile: LoggingProfile,
}

impl TransactionPipeline {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        config: &PipelineConfig,
        commitment: CommitmentConfig,
    ) -> Self {
        Self {
            ledger,
            commitment,
            max_retries: config.max_retries,
            confirm_timeout: config.confirm_timeout(),
            poll_interval: config.poll_interval(),
            config: config.clone(),
            log_profile: LoggingProfile::default(),
        }
    }

    pub fn with_log_profile(mut self, profile: LoggingProfile) -> Self {
        self.log_profile = profile;
        self
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }

    pub fn commitment(&self) -> CommitmentConfig {
        self.commitment
    }

    /// 获取新的 BlockReference 并签名；指令顺序保持原样。
    pub async fn build(
        &self,
        instructions: Vec<Instruction>,
        signers: Vec<SharedSigner>,
        fee_payer: Pubkey,
    ) -> Result<TransactionRequest> {
        let signers = builder::dedup_signers(signers);
        builder::validate_request(&instructions, &signers, &fee_payer)?;

        let block_reference = self
            .ledger
            .latest_block_reference(self.commitment)
            .await?;
        let transaction =
            builder::compile_and_sign(&instructions, &signers, &fee_payer, &block_reference)?;

        Ok(TransactionRequest {
            instructions,
            signers,
            fee_payer,
            block_reference,
            transaction,
        })
    }

    /// 用新的 BlockReference 重新构建并签名同一组指令。
    async fn rebuild(&self, request: &TransactionRequest) -> Result<TransactionRequest> {
        let block_reference = self
            .ledger
            .latest_block_reference(self.commitment)
            .await?;
        let transaction = builder::compile_and_sign(
            &request.instructions,
            &request.signers,
            &request.fee_payer,
            &block_reference,
        )?;
        Ok(TransactionRequest {
            instructions: request.instructions.clone(),
            signers: request.signers.clone(),
            fee_payer: request.fee_payer,
            block_reference,
            transaction,
        })
    }

    /// 提交并等待确认。只有传输类失败（含 blockhash 过期）会重建重发，
    /// 账本拒绝与确认超时直接返回 `Failure`。
    pub async fn submit(&self, request: TransactionRequest) -> TransactionResult {
        let level = if self.log_profile.is_verbose() {
            tracing::Level::INFO
        } else {
            tracing::Level::DEBUG
        };
        let metadata = LatencyMetadata::new(
            [(
                "instructions".to_string(),
                request.instructions.len().to_string(),
            )]
            .into_iter()
            .collect(),
        );
        let guard = guard_with_level("pipeline.submit", level, metadata);
        let started = Instant::now();

        let max_attempts = self.max_retries + 1;
        let mut current = request;
        let mut attempt = 0usize;

        let result = loop {
            attempt += 1;
            let last_error = match self.attempt(&mut current, attempt, started).await {
                Attempt::Done(result) => break result,
                Attempt::Retry(reason) => reason,
            };

            if attempt >= max_attempts {
                break TransactionResult::failure(Error::RetriesExhausted {
                    attempts: attempt,
                    last_error,
                });
            }

            let backoff = self.config.backoff(attempt);
            warn!(
                target: "pipeline::submit",
                attempt,
                max_attempts,
                backoff_ms = backoff.as_millis() as u64,
                error = %last_error,
                "提交失败，重建交易后重试"
            );
            events::transaction_retry(attempt, &last_error);
            tokio::time::sleep(backoff).await;
        };

        self.finish(&result, attempt);
        guard.finish();
        result
    }

    /// 单次尝试：首次直接发送，之后每次都先用新的 BlockReference 重建。
    async fn attempt(
        &self,
        current: &mut TransactionRequest,
        attempt: usize,
        started: Instant,
    ) -> Attempt {
        if attempt > 1 {
            match self.rebuild(current).await {
                Ok(rebuilt) => *current = rebuilt,
                Err(Error::UpstreamUnavailable(reason)) => return Attempt::Retry(reason),
                Err(err) => return Attempt::Done(TransactionResult::failure(err)),
            }
        }

        let signature = match self.ledger.submit(&current.transaction).await {
            Ok(signature) => signature,
            Err(LedgerError::Rejected(reason)) => {
                return Attempt::Done(TransactionResult::failure(Error::LedgerRejected(reason)));
            }
            Err(LedgerError::Transport(reason)) => return Attempt::Retry(reason),
            // 引用在 build 与 submit 之间过期，下一次尝试会换新引用重建。
            Err(LedgerError::Expired(reason)) => {
                return Attempt::Retry(format!(
                    "blockhash {} 已过期: {reason}",
                    current.block_reference.blockhash
                ));
            }
        };
        events::transaction_submitted(attempt, &signature);

        let confirmation = confirm::await_confirmation(
            self.ledger.as_ref(),
            &signature,
            &current.block_reference,
            self.commitment,
            self.confirm_timeout,
            self.poll_interval,
        )
        .await;

        match confirmation {
            Confirmation::Confirmed {
                slot,
                confirmations,
            } => {
                let block_time = self.ledger.block_time(slot).await.ok().flatten();
                events::transaction_confirmed(&signature, attempt, started.elapsed());
                Attempt::Done(TransactionResult::Success {
                    signature,
                    confirmations,
                    block_time,
                })
            }
            Confirmation::Rejected(reason) => {
                Attempt::Done(TransactionResult::failure(Error::LedgerRejected(reason)))
            }
            Confirmation::TimedOut => {
                Attempt::Done(TransactionResult::failure(Error::ConfirmationTimeout {
                    signature: signature.to_string(),
                    timeout_ms: self.confirm_timeout.as_millis() as u64,
                }))
            }
            Confirmation::Expired => Attempt::Retry(format!(
                "blockhash {} 已过期",
                current.block_reference.blockhash
            )),
        }
    }

    fn finish(&self, result: &TransactionResult, attempts: usize) {
        match result {
            TransactionResult::Success { signature, .. } => {
                info!(
                    target: "pipeline::submit",
                    signature = %signature,
                    attempts,
                    "交易已确认"
                );
            }
            TransactionResult::Failure { reason } => {
                warn!(
                    target: "pipeline::submit",
                    attempts,
                    kind = reason.kind(),
                    error = %reason,
                    "交易失败"
                );
                events::transaction_failed(reason, attempts);
            }
        }
    }

    /// build + submit；构建阶段的错误也以 `Failure` 返回。
    pub async fn execute(
        &self,
        instructions: Vec<Instruction>,
        signers: Vec<SharedSigner>,
        fee_payer: Pubkey,
    ) -> TransactionResult {
        match self.build(instructions, signers, fee_payer).await {
            Ok(request) => self.submit(request).await,
            Err(err) => TransactionResult::failure(err),
        }
    }

    /// 签名数 × 当前每签名费用，不涉及签名。
    pub async fn estimate_fee(&self, instructions: &[Instruction], fee_payer: &Pubkey) -> Result<u64> {
        let signatures = builder::required_signature_count(instructions, fee_payer);
        let per_signature = self.ledger.lamports_per_signature().await?;
        Ok(per_signature.saturating_mul(signatures))
    }

    /// 干跑；模拟未报错时返回 true，请求失败视为 false。
    pub async fn simulate(&self, request: &TransactionRequest) -> bool {
        match self.ledger.simulate(&request.transaction).await {
            Ok(outcome) => outcome.succeeded(),
            Err(err) => {
                warn!(
                    target: "pipeline::simulate",
                    error = %err,
                    "模拟请求失败"
                );
                false
            }
        }
    }

    pub async fn simulate_detailed(&self, request: &TransactionRequest) -> Result<SimulationOutcome> {
        Ok(self.ledger.simulate(&request.transaction).await?)
    }

    /// 确认超时后按签名复查真实结果。
    pub async fn signature_status(&self, signature: &Signature) -> Result<Option<SignatureStatus>> {
        Ok(self
            .ledger
            .signature_status(signature, self.commitment)
            .await?)
    }
}

#[cfg(test)]
mod tests;
