//! 统一错误类型
//!
//! 调用方按错误种类分支：账户未开通（可通过 bootstrap 自愈）与其他致命错误

use thiserror::Error;

use crate::infrastructure::near_rpc::RpcError;

/// NEAR 要求 Ed25519 签名时收到 RSV 签名的固定诊断信息
pub const NEAR_EXPECTS_ED25519: &str = "NEAR expects an Ed25519 signature object, not RSV array";

#[derive(Error, Debug)]
pub enum ChainError {
    /// 派生账户尚未创建/充值
    #[error("{message}")]
    AccountNotProvisioned { account_id: String, message: String },

    /// RPC 层的其他失败，原样透传
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("{0}")]
    InvalidSignatureShape(String),

    #[error("No signatures returned from MPC contract")]
    EmptySignatureSet,

    #[error("Expected {expected} execution outcomes, got {actual}")]
    OutcomeCountMismatch { expected: usize, actual: usize },

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid secret key: {0}")]
    InvalidSecretKey(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Contract call failed: {0}")]
    ContractResult(String),
}

impl ChainError {
    /// getBalance 路径：账户不存在
    pub fn account_not_found(account_id: &str) -> Self {
        Self::AccountNotProvisioned {
            account_id: account_id.to_string(),
            message: format!(
                "NEAR derived account not found: {}. Create & fund it or call \
                 chainsig::service::account_bootstrap::ensure_derived_account_exists(...) before sending.",
                account_id
            ),
        }
    }

    /// prepare 路径：附带自愈所需参数
    pub fn sender_not_found(account_id: &str, mpc_public_key: &str) -> Self {
        Self::AccountNotProvisioned {
            account_id: account_id.to_string(),
            message: format!(
                "NEAR derived account not found: {}. Create & fund it or call \
                 chainsig::service::account_bootstrap::ensure_derived_account_exists({{ \
                 derived_account_id: \"{}\", mpc_public_key: \"{}\" }}).",
                account_id, account_id, mpc_public_key
            ),
        }
    }

    pub fn is_account_not_provisioned(&self) -> bool {
        matches!(self, Self::AccountNotProvisioned { .. })
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

impl From<base64::DecodeError> for ChainError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Encoding(format!("invalid base64: {}", err))
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encoding(format!("JSON serialization error: {}", err))
    }
}

pub type Result<T, E = ChainError> = std::result::Result<T, E>;
