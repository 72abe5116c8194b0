//! NEAR JSON-RPC 客户端
//!
//! 适配器和签名编排器只依赖 `NearRpc` trait；`JsonRpcProvider` 是基于 reqwest 的实现，
//! 支持多个 RPC 端点按顺序故障转移（仅在传输层失败时切换）。

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::near_types::{decode_block_hash, SignedTransaction},
    error::{ChainError, Result},
};

static ACCOUNT_MISSING: Lazy<Regex> = Lazy::new(|| {
    // 兼容 "doesn't" / "doesn’t" / "doesnt" 以及大小写差异
    Regex::new(r"(?i)accountdoesnotexist|doesn\W?t\s+exist|does\s+not\s+exist")
        .expect("static regex")
});

static ACCOUNT_EXISTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)accountalreadyexists|already\s+exists").expect("static regex"));

/// RPC 层原始错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RpcError {
    /// 错误类型标签，例如 "AccountDoesNotExist"
    pub error_type: Option<String>,
    pub message: String,
}

impl RpcError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error_type: None,
            message: message.into(),
        }
    }

    pub fn typed(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: Some(error_type.into()),
            message: message.into(),
        }
    }

    /// 账户不存在（需要先创建并充值）
    pub fn is_account_missing(&self) -> bool {
        self.error_type.as_deref() == Some("AccountDoesNotExist")
            || ACCOUNT_MISSING.is_match(&self.message)
    }

    /// 并发创建时链上返回的 "账户已存在"
    pub fn is_account_already_exists(&self) -> bool {
        self.error_type.as_deref() == Some("AccountAlreadyExists")
            || ACCOUNT_EXISTS.is_match(&self.message)
    }

    /// 解析 JSON-RPC error 对象
    ///
    /// 结构化错误形如 `{ name, cause: { name, info }, code, message, data }`
    pub fn from_json_rpc(error: &Value) -> Self {
        let cause_name = error
            .pointer("/cause/name")
            .and_then(|v| v.as_str())
            .or_else(|| error.get("name").and_then(|v| v.as_str()));

        let error_type = cause_name.map(|name| match name {
            "UNKNOWN_ACCOUNT" => "AccountDoesNotExist".to_string(),
            "UNKNOWN_ACCESS_KEY" => "AccessKeyDoesNotExist".to_string(),
            other => other.to_string(),
        });

        let message = match error.get("data") {
            Some(Value::String(s)) => s.clone(),
            Some(data) if !data.is_null() => data.to_string(),
            _ => error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown RPC error")
                .to_string(),
        };

        Self {
            error_type,
            message,
        }
    }
}

/// 状态查询请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryRequest {
    ViewAccount {
        account_id: String,
    },
    ViewAccessKey {
        account_id: String,
        public_key: String,
    },
    CallFunction {
        account_id: String,
        method_name: String,
        args: Vec<u8>,
    },
}

impl QueryRequest {
    /// 路径形式，例如 `account/alice.near`
    pub fn path(&self) -> String {
        match self {
            Self::ViewAccount { account_id } => format!("account/{}", account_id),
            Self::ViewAccessKey {
                account_id,
                public_key,
            } => format!("access_key/{}/{}", account_id, public_key),
            Self::CallFunction {
                account_id,
                method_name,
                ..
            } => format!("call/{}/{}", account_id, method_name),
        }
    }

    fn to_params(&self) -> Value {
        match self {
            Self::ViewAccount { account_id } => serde_json::json!({
                "request_type": "view_account",
                "finality": "final",
                "account_id": account_id,
            }),
            Self::ViewAccessKey {
                account_id,
                public_key,
            } => serde_json::json!({
                "request_type": "view_access_key",
                "finality": "final",
                "account_id": account_id,
                "public_key": public_key,
            }),
            Self::CallFunction {
                account_id,
                method_name,
                args,
            } => serde_json::json!({
                "request_type": "call_function",
                "finality": "final",
                "account_id": account_id,
                "method_name": method_name,
                "args_base64": base64::engine::general_purpose::STANDARD.encode(args),
            }),
        }
    }
}

/// view_account 结果（只取余额）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountView {
    pub amount: String,
}

/// view_access_key 结果，字段均可能缺失
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessKeyView {
    #[serde(default)]
    pub nonce: Option<u64>,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub public_key: Option<String>,
}

impl AccessKeyView {
    /// 下一个可用 nonce：(nonce ?? 0) + 1
    pub fn next_nonce(&self) -> Result<u64> {
        self.nonce
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(|| ChainError::Encoding("access key nonce overflow".to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockHeaderView {
    pub hash: String,
    #[serde(default)]
    pub height: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockView {
    pub header: BlockHeaderView,
}

/// 交易最终执行状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FinalExecutionStatus {
    NotStarted,
    Started,
    Failure(Value),
    SuccessValue(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub hash: String,
    #[serde(default)]
    pub signer_id: Option<String>,
    #[serde(default)]
    pub receiver_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalExecutionOutcome {
    pub status: FinalExecutionStatus,
    pub transaction: TransactionSummary,
}

impl FinalExecutionOutcome {
    pub fn failure(&self) -> Option<&Value> {
        match &self.status {
            FinalExecutionStatus::Failure(v) => Some(v),
            _ => None,
        }
    }

    /// 合约调用声明的最后结果（SuccessValue 的 JSON 解码）
    pub fn last_result(&self) -> Result<Value> {
        match &self.status {
            FinalExecutionStatus::SuccessValue(encoded) => {
                let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;
                if bytes.is_empty() {
                    return Ok(Value::Null);
                }
                Ok(serde_json::from_slice(&bytes)?)
            }
            FinalExecutionStatus::Failure(failure) => {
                Err(ChainError::ContractResult(failure.to_string()))
            }
            other => Err(ChainError::ContractResult(format!(
                "transaction {} not finalized: {:?}",
                self.transaction.hash, other
            ))),
        }
    }
}

/// NEAR RPC 协作方接口
#[async_trait]
pub trait NearRpc: Send + Sync {
    /// 状态查询，返回 result 对象
    async fn query(&self, request: &QueryRequest) -> Result<Value, RpcError>;

    /// 最新的 final 区块
    async fn final_block(&self) -> Result<BlockView, RpcError>;

    /// 提交已签名交易并等待执行结果
    async fn send_transaction(
        &self,
        signed: &SignedTransaction,
    ) -> Result<FinalExecutionOutcome, RpcError>;
}

/// 只读合约方法调用，返回解码后的 JSON
pub async fn view_function(
    rpc: &dyn NearRpc,
    contract_id: &str,
    method_name: &str,
    args: &Value,
) -> Result<Value> {
    let request = QueryRequest::CallFunction {
        account_id: contract_id.to_string(),
        method_name: method_name.to_string(),
        args: serde_json::to_vec(args)?,
    };
    let result = rpc.query(&request).await?;

    let bytes: Vec<u8> = result
        .get("result")
        .cloned()
        .map(serde_json::from_value)
        .transpose()?
        .ok_or_else(|| {
            ChainError::Encoding(format!("missing result bytes in {}", request.path()))
        })?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// 查询 access key；每次调用都重新读取，不做缓存
pub async fn view_access_key(
    rpc: &dyn NearRpc,
    account_id: &str,
    public_key: &str,
) -> Result<AccessKeyView, RpcError> {
    let result = rpc
        .query(&QueryRequest::ViewAccessKey {
            account_id: account_id.to_string(),
            public_key: public_key.to_string(),
        })
        .await?;
    serde_json::from_value(result)
        .map_err(|e| RpcError::new(format!("Invalid access key response: {}", e)))
}

/// 交易引用的区块哈希：优先使用 access key 返回的，缺失时取最新 final 区块
pub async fn resolve_block_hash(rpc: &dyn NearRpc, access_key: &AccessKeyView) -> Result<[u8; 32]> {
    match &access_key.block_hash {
        Some(hash) => decode_block_hash(hash),
        None => {
            let block = rpc.final_block().await?;
            decode_block_hash(&block.header.hash)
        }
    }
}

enum Attempt {
    Done(Value),
    Rejected(RpcError),
    Unreachable(RpcError),
}

/// 基于 reqwest 的 JSON-RPC 实现
#[derive(Clone)]
pub struct JsonRpcProvider {
    http_client: reqwest::Client,
    endpoints: Vec<String>,
}

impl JsonRpcProvider {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_endpoints(vec![url.into()], Duration::from_secs(30))
    }

    /// 多端点：第一个为主端点，其余按顺序作为故障转移
    pub fn with_endpoints(endpoints: Vec<String>, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http_client,
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let mut last_error = RpcError::new("No RPC endpoint configured");

        for (index, url) in self.endpoints.iter().enumerate() {
            tracing::debug!(method = %method, endpoint = %url, "Sending NEAR RPC request");

            match self.call_endpoint(url, method, &params).await {
                Attempt::Done(result) => return Ok(result),
                Attempt::Rejected(err) => return Err(err),
                Attempt::Unreachable(err) => {
                    if index + 1 < self.endpoints.len() {
                        tracing::warn!(
                            error = %err,
                            endpoint = %url,
                            method = %method,
                            "NEAR RPC endpoint unreachable, failing over"
                        );
                    }
                    last_error = err;
                }
            }
        }

        Err(last_error)
    }

    async fn call_endpoint(&self, url: &str, method: &str, params: &Value) -> Attempt {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": "chainsig",
            "method": method,
            "params": params,
        });

        let response = match self.http_client.post(url).json(&payload).send().await {
            Ok(resp) => resp,
            Err(e) => {
                return Attempt::Unreachable(RpcError::new(format!(
                    "Failed to send RPC request to {}: {}",
                    url, e
                )))
            }
        };

        let status = response.status();
        if status.is_server_error() {
            return Attempt::Unreachable(RpcError::new(format!(
                "RPC request failed with status {}",
                status
            )));
        }

        let json: Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                return Attempt::Unreachable(RpcError::new(format!(
                    "Failed to parse RPC response: {}",
                    e
                )))
            }
        };

        if let Some(error) = json.get("error") {
            return Attempt::Rejected(RpcError::from_json_rpc(error));
        }

        match json.get("result") {
            // 旧版 query 接口把错误放在 result.error 中
            Some(result) => match result.get("error").and_then(|e| e.as_str()) {
                Some(message) => Attempt::Rejected(RpcError::new(message)),
                None => Attempt::Done(result.clone()),
            },
            None => Attempt::Rejected(RpcError::new("Missing result in RPC response")),
        }
    }
}

#[async_trait]
impl NearRpc for JsonRpcProvider {
    async fn query(&self, request: &QueryRequest) -> Result<Value, RpcError> {
        self.call("query", request.to_params()).await
    }

    async fn final_block(&self) -> Result<BlockView, RpcError> {
        let result = self
            .call("block", serde_json::json!({ "finality": "final" }))
            .await?;
        serde_json::from_value(result)
            .map_err(|e| RpcError::new(format!("Invalid block response: {}", e)))
    }

    async fn send_transaction(
        &self,
        signed: &SignedTransaction,
    ) -> Result<FinalExecutionOutcome, RpcError> {
        let encoded = signed
            .to_base64()
            .map_err(|e| RpcError::new(e.to_string()))?;
        let result = self
            .call("broadcast_tx_commit", serde_json::json!([encoded]))
            .await?;
        serde_json::from_value(result)
            .map_err(|e| RpcError::new(format!("Invalid execution outcome: {}", e)))
    }
}
