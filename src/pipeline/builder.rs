use std::collections::HashSet;

use solana_sdk::instruction::Instruction;
use solana_sdk::message::VersionedMessage;
use solana_sdk::message::v0::Message as V0Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signer;
use solana_sdk::transaction::VersionedTransaction;

use crate::error::{Error, Result};
use crate::ledger::BlockReference;

use super::types::SharedSigner;

/// 按公钥去重，保留首次出现的签名者。
pub(crate) fn dedup_signers(signers: Vec<SharedSigner>) -> Vec<SharedSigner> {
    let mut seen = HashSet::new();
    signers
        .into_iter()
        .filter(|signer| seen.insert(signer.pubkey()))
        .collect()
}

pub(crate) fn validate_request(
    instructions: &[Instruction],
    signers: &[SharedSigner],
    fee_payer: &Pubkey,
) -> Result<()> {
    if instructions.is_empty() {
        return Err(Error::InvalidRequest("指令序列为空".to_string()));
    }
    if !signers.iter().any(|signer| signer.pubkey() == *fee_payer) {
        return Err(Error::InvalidRequest(format!(
            "fee payer {fee_payer} 不在签名者集合中"
        )));
    }
    Ok(())
}

/// 编译 v0 消息并签名，指令顺序与调用方提供的完全一致。
pub(crate) fn compile_and_sign(
    instructions: &[Instruction],
    signers: &[SharedSigner],
    fee_payer: &Pubkey,
    block_reference: &BlockReference,
) -> Result<VersionedTransaction> {
    let message = V0Message::try_compile(fee_payer, instructions, &[], block_reference.blockhash)
        .map_err(|err| Error::InvalidRequest(format!("编译交易消息失败: {err}")))?;

    let required = usize::from(message.header.num_required_signatures);
    let required_keys = &message.account_keys[..required.min(message.account_keys.len())];

    let mut signer_refs: Vec<&dyn Signer> = Vec::with_capacity(required_keys.len());
    for key in required_keys {
        let signer = signers
            .iter()
            .find(|signer| signer.pubkey() == *key)
            .ok_or_else(|| Error::InvalidRequest(format!("缺少账户 {key} 的签名者")))?;
        signer_refs.push(signer.as_ref() as &dyn Signer);
    }

    VersionedTransaction::try_new(VersionedMessage::V0(message), &signer_refs)
        .map_err(|err| Error::InvalidRequest(format!("签名交易失败: {err}")))
}

/// 指令集合需要的签名数：所有 signer 账户与 fee payer 的并集。
pub(crate) fn required_signature_count(instructions: &[Instruction], fee_payer: &Pubkey) -> u64 {
    let mut keys: HashSet<Pubkey> = instructions
        .iter()
        .flat_map(|ix| ix.accounts.iter())
        .filter(|meta| meta.is_signer)
        .map(|meta| meta.pubkey)
        .collect();
    keys.insert(*fee_payer);
    keys.len() as u64
}
