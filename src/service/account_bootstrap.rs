//! 派生账户开通
//!
//! 派生账户在首次使用前必须存在并有余额。由控制账户用本地密钥签发一笔交易：
//! CreateAccount → Transfer(初始存款) → AddKey(MPC 公钥, FullAccess)。
//! 检查与创建不是原子操作，并发创建由链上裁决，"账户已存在" 按无操作处理。

use serde_json::Value;

use crate::{
    domain::near_types::{Action, KeyPair, PublicKey, Transaction},
    error::{ChainError, Result},
    infrastructure::{
        hashing::{default_hasher, TxHasher},
        near_rpc::{resolve_block_hash, view_access_key, NearRpc, QueryRequest, RpcError},
    },
};

pub struct EnsureDerivedAccountParams<'a> {
    pub controller_account_id: &'a str,
    pub controller_key_pair: &'a KeyPair,
    pub derived_account_id: &'a str,
    /// 派生公钥（`ed25519:<base58>`），作为新账户的 FullAccess key
    pub mpc_public_key: &'a str,
    /// yoctoNEAR
    pub initial_deposit_yocto: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnsureDerivedAccountOutcome {
    pub created: bool,
}

pub async fn ensure_derived_account_exists(
    provider: &dyn NearRpc,
    params: EnsureDerivedAccountParams<'_>,
) -> Result<EnsureDerivedAccountOutcome> {
    ensure_derived_account_exists_with_hasher(provider, default_hasher().as_ref(), params).await
}

pub async fn ensure_derived_account_exists_with_hasher(
    provider: &dyn NearRpc,
    hasher: &dyn TxHasher,
    params: EnsureDerivedAccountParams<'_>,
) -> Result<EnsureDerivedAccountOutcome> {
    if account_exists(provider, params.derived_account_id).await? {
        tracing::debug!(
            account_id = %params.derived_account_id,
            "Derived account already exists"
        );
        return Ok(EnsureDerivedAccountOutcome { created: false });
    }

    let mpc_public_key: PublicKey = params.mpc_public_key.parse()?;
    let controller_public_key = params.controller_key_pair.public_key();

    let access_key = view_access_key(
        provider,
        params.controller_account_id,
        &controller_public_key.to_string(),
    )
    .await?;
    let block_hash = resolve_block_hash(provider, &access_key).await?;

    let transaction = Transaction {
        signer_id: params.controller_account_id.to_string(),
        public_key: controller_public_key,
        nonce: access_key.next_nonce()?,
        receiver_id: params.derived_account_id.to_string(),
        block_hash,
        actions: vec![
            Action::create_account(),
            Action::transfer(params.initial_deposit_yocto),
            Action::add_full_access_key(mpc_public_key),
        ],
    };
    let signed = params
        .controller_key_pair
        .sign_transaction(transaction, hasher)?;

    let outcome = match provider.send_transaction(&signed).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_account_already_exists() => {
            return Ok(lost_creation_race(params.derived_account_id, &e.message))
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(failure) = outcome.failure() {
        if is_already_exists_failure(failure) {
            return Ok(lost_creation_race(
                params.derived_account_id,
                &failure.to_string(),
            ));
        }
        return Err(ChainError::ContractResult(format!(
            "account creation {} failed: {}",
            outcome.transaction.hash, failure
        )));
    }

    tracing::info!(
        account_id = %params.derived_account_id,
        controller = %params.controller_account_id,
        deposit = %params.initial_deposit_yocto,
        hash = %outcome.transaction.hash,
        "Derived account created"
    );

    Ok(EnsureDerivedAccountOutcome { created: true })
}

/// 只有明确的 "账户不存在" 才进入创建流程，其他 RPC 错误原样返回
async fn account_exists(provider: &dyn NearRpc, account_id: &str) -> Result<bool> {
    let request = QueryRequest::ViewAccount {
        account_id: account_id.to_string(),
    };
    match provider.query(&request).await {
        Ok(result) => Ok(result.get("amount").and_then(Value::as_str).is_some()),
        Err(e) if e.is_account_missing() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn is_already_exists_failure(failure: &Value) -> bool {
    RpcError::new(failure.to_string()).is_account_already_exists()
}

fn lost_creation_race(account_id: &str, detail: &str) -> EnsureDerivedAccountOutcome {
    tracing::warn!(
        account_id = %account_id,
        detail = %detail,
        "Derived account was created concurrently, skipping"
    );
    EnsureDerivedAccountOutcome { created: false }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_exists_failure_detection() {
        let failure = serde_json::json!({
            "ActionError": {
                "index": 0,
                "kind": { "AccountAlreadyExists": { "account_id": "near-1.alice.testnet" } }
            }
        });
        assert!(is_already_exists_failure(&failure));

        let other = serde_json::json!({ "ActionError": { "kind": { "LackBalanceForState": {} } } });
        assert!(!is_already_exists_failure(&other));
    }
}
