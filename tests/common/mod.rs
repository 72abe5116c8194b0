//! 测试辅助模块
//! 提供假的 RPC 客户端和签名账户

#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use base64::Engine;
use chainsig::{
    domain::near_types::SignedTransaction,
    error::Result,
    infrastructure::hashing::default_hasher,
    infrastructure::near_rpc::{
        BlockHeaderView, BlockView, FinalExecutionOutcome, FinalExecutionStatus, NearRpc,
        QueryRequest, RpcError, TransactionSummary,
    },
    service::{SignerAccount, TransactionIntent},
};
use serde_json::{json, Value};

pub const CONTRACT_ID: &str = "v1.signer-prod.testnet";
pub const ACCOUNT_ID: &str = "test.testnet";
pub const PUBLIC_KEY: &str = "ed25519:6E8sCci9badyRkXb3JoRpBj5p8C6Tw41ELDZoiihKEtp";
pub const BLOCK_HASH: &str = "EHuGQACu4zDquke3NZFAhEakR2KxjnqaUbdVKxEdkCjT";

/// 按查询路径返回预设结果，并记录所有调用
#[derive(Default)]
pub struct FakeRpc {
    query_responses: Mutex<HashMap<String, Result<Value, RpcError>>>,
    final_block_hash: Mutex<Option<String>>,
    send_responses: Mutex<VecDeque<Result<FinalExecutionOutcome, RpcError>>>,
    queries: Mutex<Vec<QueryRequest>>,
    sent: Mutex<Vec<SignedTransaction>>,
    block_calls: AtomicUsize,
}

impl FakeRpc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_query(&self, path: &str, response: Result<Value, RpcError>) {
        self.query_responses
            .lock()
            .unwrap()
            .insert(path.to_string(), response);
    }

    /// 合约 view 调用的返回值
    pub fn on_view(&self, contract_id: &str, method: &str, value: Value) {
        self.on_query(&format!("call/{}/{}", contract_id, method), Ok(view_result(&value)));
    }

    pub fn set_final_block(&self, hash: &str) {
        *self.final_block_hash.lock().unwrap() = Some(hash.to_string());
    }

    pub fn queue_send(&self, response: Result<FinalExecutionOutcome, RpcError>) {
        self.send_responses.lock().unwrap().push_back(response);
    }

    pub fn queries(&self) -> Vec<QueryRequest> {
        self.queries.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<SignedTransaction> {
        self.sent.lock().unwrap().clone()
    }

    pub fn block_calls(&self) -> usize {
        self.block_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NearRpc for FakeRpc {
    async fn query(&self, request: &QueryRequest) -> Result<Value, RpcError> {
        self.queries.lock().unwrap().push(request.clone());
        self.query_responses
            .lock()
            .unwrap()
            .get(&request.path())
            .cloned()
            .unwrap_or_else(|| Err(RpcError::new(format!("unexpected query {}", request.path()))))
    }

    async fn final_block(&self) -> Result<BlockView, RpcError> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        let hash = self.final_block_hash.lock().unwrap().clone();
        hash.map(|hash| BlockView {
            header: BlockHeaderView { hash, height: 1 },
        })
        .ok_or_else(|| RpcError::new("no final block configured"))
    }

    async fn send_transaction(
        &self,
        signed: &SignedTransaction,
    ) -> Result<FinalExecutionOutcome, RpcError> {
        self.sent.lock().unwrap().push(signed.clone());
        match self.send_responses.lock().unwrap().pop_front() {
            Some(response) => response,
            None => Ok(outcome_with(
                &signed.hash(default_hasher().as_ref()).unwrap(),
                FinalExecutionStatus::SuccessValue(String::new()),
            )),
        }
    }
}

/// 签名账户：返回预设的执行结果，记录提交的交易
pub struct FakeSignerAccount {
    account_id: String,
    outcomes: Mutex<Option<Vec<FinalExecutionOutcome>>>,
    submitted: Mutex<Vec<TransactionIntent>>,
}

impl FakeSignerAccount {
    pub fn new(account_id: &str, outcomes: Vec<FinalExecutionOutcome>) -> Self {
        Self {
            account_id: account_id.to_string(),
            outcomes: Mutex::new(Some(outcomes)),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn submitted(&self) -> Vec<TransactionIntent> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl SignerAccount for FakeSignerAccount {
    fn account_id(&self) -> &str {
        &self.account_id
    }

    async fn sign_and_send_transactions(
        &self,
        transactions: Vec<TransactionIntent>,
    ) -> Result<Vec<FinalExecutionOutcome>> {
        self.submitted.lock().unwrap().extend(transactions);
        Ok(self.outcomes.lock().unwrap().take().unwrap_or_default())
    }
}

/// call_function 的 result 字段为 JSON 文本的字节数组
pub fn view_result(value: &Value) -> Value {
    json!({
        "result": serde_json::to_vec(value).unwrap(),
        "logs": [],
        "block_height": 1,
        "block_hash": BLOCK_HASH,
    })
}

pub fn outcome_with(hash: &str, status: FinalExecutionStatus) -> FinalExecutionOutcome {
    FinalExecutionOutcome {
        status,
        transaction: TransactionSummary {
            hash: hash.to_string(),
            signer_id: None,
            receiver_id: None,
        },
    }
}

/// MPC 合约的成功返回
pub fn success_outcome(hash: &str, value: &Value) -> FinalExecutionOutcome {
    outcome_with(
        hash,
        FinalExecutionStatus::SuccessValue(
            base64::engine::general_purpose::STANDARD.encode(serde_json::to_vec(value).unwrap()),
        ),
    )
}

pub fn ecdsa_response(r: &str, s: &str, recovery_id: u8) -> Value {
    json!({
        "big_r": { "affine_point": format!("02{}", r) },
        "s": { "scalar": s },
        "recovery_id": recovery_id,
    })
}

pub fn ed25519_response(byte: u8) -> Value {
    json!({ "scheme": "Ed25519", "signature": vec![byte; 64] })
}

/// 合法 secp256k1 点（未压缩 SEC1 十六进制）
pub fn secp256k1_point_hex() -> String {
    let signing_key = k256::ecdsa::SigningKey::from_slice(&[1u8; 32]).unwrap();
    hex::encode(signing_key.verifying_key().to_encoded_point(false).as_bytes())
}

pub fn account_view(amount: &str) -> Value {
    json!({
        "amount": amount,
        "locked": "0",
        "code_hash": "11111111111111111111111111111111",
        "storage_usage": 182,
        "block_height": 1,
        "block_hash": BLOCK_HASH,
    })
}

pub fn access_key_view(nonce: Option<u64>) -> Value {
    let mut view = json!({
        "block_hash": BLOCK_HASH,
        "public_key": PUBLIC_KEY,
        "permission": "FullAccess",
    });
    if let Some(nonce) = nonce {
        view["nonce"] = json!(nonce);
    }
    view
}
