use std::collections::HashSet;
use std::sync::Arc;

use solana_commitment_config::CommitmentConfig;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};

use super::*;
use crate::testing::{BLOCK_TIME, ConfirmMode, MockLedger, fast_pipeline_config, signer};

fn pipeline(ledger: Arc<MockLedger>) -> TransactionPipeline {
    TransactionPipeline::new(ledger, &fast_pipeline_config(), CommitmentConfig::confirmed())
}

fn transfer_like(payer: &Pubkey, tag: u8) -> Instruction {
    Instruction::new_with_bytes(Pubkey::new_unique(), &[tag], vec![AccountMeta::new(*payer, true)])
}

#[tokio::test(start_paused = true)]
async fn confirmed_submit_returns_success_with_block_time() {
    let ledger = Arc::new(MockLedger::new());
    let pipeline = pipeline(ledger.clone());
    let payer = signer();

    let request = pipeline
        .build(vec![transfer_like(&payer.pubkey(), 1)], vec![payer.clone()], payer.pubkey())
        .await
        .expect("build");
    let expected = *request.signature().expect("signed");

    match pipeline.submit(request).await {
        TransactionResult::Success {
            signature,
            confirmations,
            block_time,
        } => {
            assert_eq!(signature, expected);
            assert_eq!(confirmations, Some(1));
            assert_eq!(block_time, Some(BLOCK_TIME));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(ledger.submitted(), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_with_fresh_block_references() {
    let ledger = Arc::new(MockLedger::new());
    ledger.fail_submits(2, "connection reset");
    let pipeline = pipeline(ledger.clone());
    let payer = signer();

    let result = pipeline
        .execute(vec![transfer_like(&payer.pubkey(), 1)], vec![payer.clone()], payer.pubkey())
        .await;
    assert!(result.is_success(), "{result:?}");

    let references = ledger.issued_references();
    assert_eq!(references.len(), 3);
    let distinct: HashSet<_> = references.iter().map(|r| r.blockhash).collect();
    assert_eq!(distinct.len(), 3);

    let submitted = ledger.submitted_transactions();
    assert_eq!(submitted.len(), 1);
    assert_eq!(
        *submitted[0].message.recent_blockhash(),
        references[2].blockhash
    );
}

#[tokio::test(start_paused = true)]
async fn retries_are_bounded() {
    let ledger = Arc::new(MockLedger::new());
    ledger.fail_submits(10, "503 service unavailable");
    let pipeline = pipeline(ledger.clone());
    let payer = signer();

    let result = pipeline
        .execute(vec![transfer_like(&payer.pubkey(), 1)], vec![payer.clone()], payer.pubkey())
        .await;
    match result.failure_reason() {
        Some(Error::RetriesExhausted {
            attempts,
            last_error,
        }) => {
            assert_eq!(*attempts, 4);
            assert!(last_error.contains("503"));
        }
        other => panic!("unexpected failure: {other:?}"),
    }
    assert_eq!(ledger.issued_references().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn ledger_rejection_is_terminal() {
    let ledger = Arc::new(MockLedger::new());
    ledger.reject_next_submit("InsufficientFundsForFee");
    let pipeline = pipeline(ledger.clone());
    let payer = signer();

    let result = pipeline
        .execute(vec![transfer_like(&payer.pubkey(), 1)], vec![payer.clone()], payer.pubkey())
        .await;
    assert_eq!(
        result.failure_reason(),
        Some(&Error::LedgerRejected("InsufficientFundsForFee".into()))
    );
    assert_eq!(ledger.issued_references().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn program_error_during_confirmation_is_terminal() {
    let ledger = Arc::new(MockLedger::new());
    ledger.script_confirmations([ConfirmMode::Reject("custom program error: 0x1".into())]);
    let pipeline = pipeline(ledger.clone());
    let payer = signer();

    let result = pipeline
        .execute(vec![transfer_like(&payer.pubkey(), 1)], vec![payer.clone()], payer.pubkey())
        .await;
    assert!(matches!(
        result.failure_reason(),
        Some(Error::LedgerRejected(reason)) if reason.contains("0x1")
    ));
    assert_eq!(ledger.submitted(), 1);
}

#[tokio::test(start_paused = true)]
async fn confirmation_timeout_is_ambiguous_and_not_retried() {
    let ledger = Arc::new(MockLedger::new());
    ledger.script_confirmations([ConfirmMode::Never]);
    let pipeline = pipeline(ledger.clone());
    let payer = signer();

    let request = pipeline
        .build(vec![transfer_like(&payer.pubkey(), 1)], vec![payer.clone()], payer.pubkey())
        .await
        .expect("build");
    let signature = *request.signature().expect("signed");

    let result = pipeline.submit(request).await;
    let reason = result.failure_reason().expect("failure");
    assert!(reason.is_ambiguous());
    assert_eq!(
        reason,
        &Error::ConfirmationTimeout {
            signature: signature.to_string(),
            timeout_ms: 60_000,
        }
    );
    assert_eq!(ledger.submitted(), 1);
    assert_eq!(
        pipeline.signature_status(&signature).await.expect("status"),
        None
    );
}

#[tokio::test(start_paused = true)]
async fn expired_block_reference_is_rebuilt_and_resent() {
    let ledger = Arc::new(MockLedger::new());
    ledger.script_confirmations([ConfirmMode::Expire, ConfirmMode::Immediate]);
    let pipeline = pipeline(ledger.clone());
    let payer = signer();

    let result = pipeline
        .execute(vec![transfer_like(&payer.pubkey(), 1)], vec![payer.clone()], payer.pubkey())
        .await;
    assert!(result.is_success(), "{result:?}");

    let references = ledger.issued_references();
    assert_eq!(references.len(), 2);
    assert_ne!(references[0].blockhash, references[1].blockhash);
    assert!(references[1].last_valid_block_height > references[0].last_valid_block_height);
    assert_eq!(ledger.submitted(), 2);
}

#[tokio::test(start_paused = true)]
async fn unknown_blockhash_at_submit_is_rebuilt_not_rejected() {
    let ledger = Arc::new(MockLedger::new());
    ledger.expire_next_submit();
    let pipeline = pipeline(ledger.clone());
    let payer = signer();

    let result = pipeline
        .execute(vec![transfer_like(&payer.pubkey(), 1)], vec![payer.clone()], payer.pubkey())
        .await;
    assert!(result.is_success(), "{result:?}");

    let references = ledger.issued_references();
    assert_eq!(references.len(), 2);
    assert_ne!(references[0].blockhash, references[1].blockhash);
    let submitted = ledger.submitted_transactions();
    assert_eq!(submitted.len(), 1);
    assert_eq!(
        *submitted[0].message.recent_blockhash(),
        references[1].blockhash
    );
}

#[tokio::test(start_paused = true)]
async fn build_validates_before_touching_the_ledger() {
    let ledger = Arc::new(MockLedger::new());
    let pipeline = pipeline(ledger.clone());
    let payer = signer();

    let err = pipeline
        .build(Vec::new(), vec![payer.clone()], payer.pubkey())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));

    let stranger = Keypair::new().pubkey();
    let err = pipeline
        .build(vec![transfer_like(&payer.pubkey(), 1)], vec![payer.clone()], stranger)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
    assert_eq!(ledger.block_reference_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn build_keeps_order_and_dedups_signers() {
    let ledger = Arc::new(MockLedger::new());
    let pipeline = pipeline(ledger);
    let payer = signer();
    let instructions = vec![
        transfer_like(&payer.pubkey(), 9),
        transfer_like(&payer.pubkey(), 3),
        transfer_like(&payer.pubkey(), 5),
    ];

    let request = pipeline
        .build(
            instructions.clone(),
            vec![payer.clone(), payer.clone()],
            payer.pubkey(),
        )
        .await
        .expect("build");
    assert_eq!(request.instructions(), instructions.as_slice());
    assert_eq!(request.signer_keys(), vec![payer.pubkey()]);
    let order: Vec<u8> = request
        .transaction()
        .message
        .instructions()
        .iter()
        .map(|ix| ix.data[0])
        .collect();
    assert_eq!(order, vec![9, 3, 5]);
}

#[tokio::test(start_paused = true)]
async fn simulation_is_deterministic_for_a_fixed_request() {
    let ledger = Arc::new(MockLedger::new());
    let pipeline = pipeline(ledger.clone());
    let payer = signer();
    let request = pipeline
        .build(vec![transfer_like(&payer.pubkey(), 1)], vec![payer.clone()], payer.pubkey())
        .await
        .expect("build");

    assert!(pipeline.simulate(&request).await);
    assert!(pipeline.simulate(&request).await);
    assert_eq!(ledger.submitted(), 0);

    ledger.set_simulation_error(Some("InstructionError(0, Custom(1))"));
    assert!(!pipeline.simulate(&request).await);
    let detailed = pipeline.simulate_detailed(&request).await.expect("simulate");
    assert!(!detailed.succeeded());
}

#[tokio::test(start_paused = true)]
async fn fee_estimate_counts_distinct_signers() {
    let ledger = Arc::new(MockLedger::new());
    let pipeline = pipeline(ledger);
    let payer = Keypair::new().pubkey();
    let cosigner = Keypair::new().pubkey();
    let instructions = vec![
        transfer_like(&payer, 1),
        transfer_like(&cosigner, 2),
        transfer_like(&cosigner, 3),
    ];

    let fee = pipeline
        .estimate_fee(&instructions, &payer)
        .await
        .expect("fee");
    assert_eq!(fee, 2 * 5_000);
}

#[tokio::test(start_paused = true)]
async fn block_reference_outage_exhausts_retries_on_rebuild() {
    let ledger = Arc::new(MockLedger::new());
    let pipeline = pipeline(ledger.clone());
    let payer = signer();
    let request = pipeline
        .build(vec![transfer_like(&payer.pubkey(), 1)], vec![payer.clone()], payer.pubkey())
        .await
        .expect("build");

    ledger.fail_submits(1, "timeout");
    ledger.fail_block_references(5);
    let result = pipeline.submit(request).await;
    assert!(matches!(
        result.failure_reason(),
        Some(Error::RetriesExhausted { attempts: 4, .. })
    ));
    assert_eq!(ledger.submitted(), 0);
}
