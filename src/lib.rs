//! chainsig - 基于 NEAR MPC 签名合约的跨链签名适配层
//!
//! 派生地址 → 查询余额 → 准备交易 → MPC 签名 → 拼接签名 → 广播

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod service;

pub use error::{ChainError, Result};

pub mod prelude {
    pub use crate::{
        config::Config,
        domain::{ChainAdapter, DerivedKey, PreparedTransaction, Signature, SignatureKeyType},
        error::{ChainError, Result},
        infrastructure::near_rpc::{JsonRpcProvider, NearRpc},
        service::{
            ensure_derived_account_exists, ChainSignatureContract, LocalSignerAccount,
            NearAdapter, NearTransactionRequest, SignArgs,
        },
    };
}
