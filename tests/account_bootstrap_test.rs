//! 派生账户开通集成测试

mod common;

use chainsig::{
    domain::near_types::{
        AccessKey, AccessKeyPermission, Action, AddKeyAction, KeyPair, PublicKey,
    },
    infrastructure::near_rpc::{FinalExecutionStatus, RpcError},
    service::{ensure_derived_account_exists, EnsureDerivedAccountParams},
};
use common::*;
use serde_json::json;

const CONTROLLER: &str = "controller.testnet";
const DERIVED: &str = "near-1.controller.testnet";
const DEPOSIT: u128 = 100_000_000_000_000_000_000_000;

fn params(key_pair: &KeyPair) -> EnsureDerivedAccountParams<'_> {
    EnsureDerivedAccountParams {
        controller_account_id: CONTROLLER,
        controller_key_pair: key_pair,
        derived_account_id: DERIVED,
        mpc_public_key: PUBLIC_KEY,
        initial_deposit_yocto: DEPOSIT,
    }
}

fn controller_ready(rpc: &FakeRpc, key_pair: &KeyPair, nonce: u64) {
    rpc.on_query(
        &format!("access_key/{}/{}", CONTROLLER, key_pair.public_key()),
        Ok(access_key_view(Some(nonce))),
    );
}

#[tokio::test]
async fn test_existing_account_is_left_alone() {
    let rpc = FakeRpc::new();
    let key_pair = KeyPair::from_random();
    rpc.on_query(&format!("account/{}", DERIVED), Ok(account_view("5")));

    let outcome = ensure_derived_account_exists(&rpc, params(&key_pair))
        .await
        .unwrap();

    assert!(!outcome.created);
    assert!(rpc.sent().is_empty());
    assert_eq!(rpc.queries().len(), 1);
}

#[tokio::test]
async fn test_missing_account_is_created_in_one_transaction() {
    let rpc = FakeRpc::new();
    let key_pair = KeyPair::from_random();
    rpc.on_query(
        &format!("account/{}", DERIVED),
        Err(RpcError::typed("AccountDoesNotExist", "Account doesn't exist")),
    );
    controller_ready(&rpc, &key_pair, 7);

    let outcome = ensure_derived_account_exists(&rpc, params(&key_pair))
        .await
        .unwrap();

    assert!(outcome.created);

    let sent = rpc.sent();
    assert_eq!(sent.len(), 1);
    let tx = &sent[0].transaction;
    assert_eq!(tx.signer_id, CONTROLLER);
    assert_eq!(tx.receiver_id, DERIVED);
    assert_eq!(tx.public_key, key_pair.public_key());
    assert_eq!(tx.nonce, 8);
    assert_eq!(
        tx.actions,
        vec![
            Action::create_account(),
            Action::transfer(DEPOSIT),
            Action::AddKey(AddKeyAction {
                public_key: PUBLIC_KEY.parse::<PublicKey>().unwrap(),
                access_key: AccessKey {
                    nonce: 0,
                    permission: AccessKeyPermission::FullAccess,
                },
            }),
        ]
    );
}

#[tokio::test]
async fn test_response_without_balance_proceeds_to_creation() {
    let rpc = FakeRpc::new();
    let key_pair = KeyPair::from_random();
    rpc.on_query(&format!("account/{}", DERIVED), Ok(json!({})));
    controller_ready(&rpc, &key_pair, 0);

    let outcome = ensure_derived_account_exists(&rpc, params(&key_pair))
        .await
        .unwrap();

    assert!(outcome.created);
    assert_eq!(rpc.sent()[0].transaction.nonce, 1);
}

#[tokio::test]
async fn test_unclassified_error_is_propagated() {
    let rpc = FakeRpc::new();
    let key_pair = KeyPair::from_random();
    rpc.on_query(
        &format!("account/{}", DERIVED),
        Err(RpcError::new("Network error")),
    );

    let err = ensure_derived_account_exists(&rpc, params(&key_pair))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Network error");
    assert!(rpc.sent().is_empty());
}

#[tokio::test]
async fn test_concurrent_creation_rejected_at_submission_is_noop() {
    let rpc = FakeRpc::new();
    let key_pair = KeyPair::from_random();
    rpc.on_query(
        &format!("account/{}", DERIVED),
        Err(RpcError::new("Account doesn't exist")),
    );
    controller_ready(&rpc, &key_pair, 1);
    rpc.queue_send(Err(RpcError::new(format!(
        "Can't create a new account {}, because it already exists",
        DERIVED
    ))));

    let outcome = ensure_derived_account_exists(&rpc, params(&key_pair))
        .await
        .unwrap();

    assert!(!outcome.created);
    assert_eq!(rpc.sent().len(), 1);
}

#[tokio::test]
async fn test_concurrent_creation_failed_on_chain_is_noop() {
    let rpc = FakeRpc::new();
    let key_pair = KeyPair::from_random();
    rpc.on_query(
        &format!("account/{}", DERIVED),
        Err(RpcError::typed("AccountDoesNotExist", "")),
    );
    controller_ready(&rpc, &key_pair, 1);
    rpc.queue_send(Ok(outcome_with(
        "RaceHash",
        FinalExecutionStatus::Failure(json!({
            "ActionError": {
                "index": 0,
                "kind": { "AccountAlreadyExists": { "account_id": DERIVED } }
            }
        })),
    )));

    let outcome = ensure_derived_account_exists(&rpc, params(&key_pair))
        .await
        .unwrap();

    assert!(!outcome.created);
}

#[tokio::test]
async fn test_other_execution_failure_is_error() {
    let rpc = FakeRpc::new();
    let key_pair = KeyPair::from_random();
    rpc.on_query(
        &format!("account/{}", DERIVED),
        Err(RpcError::typed("AccountDoesNotExist", "")),
    );
    controller_ready(&rpc, &key_pair, 1);
    rpc.queue_send(Ok(outcome_with(
        "FailHash",
        FinalExecutionStatus::Failure(json!({
            "ActionError": { "index": 1, "kind": { "LackBalanceForState": {} } }
        })),
    )));

    tokio_test::assert_err!(ensure_derived_account_exists(&rpc, params(&key_pair)).await);
}

#[tokio::test]
async fn test_invalid_mpc_public_key_is_rejected_before_submission() {
    let rpc = FakeRpc::new();
    let key_pair = KeyPair::from_random();
    rpc.on_query(
        &format!("account/{}", DERIVED),
        Err(RpcError::typed("AccountDoesNotExist", "")),
    );
    controller_ready(&rpc, &key_pair, 1);

    let mut bad = params(&key_pair);
    bad.mpc_public_key = "ed25519:not-a-key";

    tokio_test::assert_err!(ensure_derived_account_exists(&rpc, bad).await);
    assert!(rpc.sent().is_empty());
}
