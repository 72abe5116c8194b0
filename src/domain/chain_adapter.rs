//! 链适配器统一接口
//!
//! 每条链实现同一组操作：派生 → 余额 → 准备 → 完成签名 → 广播。
//! 交易生命周期由类型表达：`prepare` 产出未签名交易与待签哈希，
//! `finalize` 消费未签名交易并产出可广播的传输编码字符串。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{domain::signature::Signature, error::Result};

/// 待签名哈希（哈希型链固定 32 字节）
pub type HashToSign = Vec<u8>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationRequest {
    pub predecessor: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedKey {
    pub address: String,
    pub public_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub balance: u128,
    pub decimals: u32,
}

/// prepare 的结果：签名结果必须与 `hashes_to_sign` 按位置一一对应
#[derive(Debug, Clone)]
pub struct PreparedTransaction<T> {
    pub transaction: T,
    pub hashes_to_sign: Vec<HashToSign>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastResult {
    pub hash: String,
}

#[async_trait]
pub trait ChainAdapter: Send + Sync {
    type TransactionRequest: Send + Sync;
    type UnsignedTransaction: Send + Sync;

    /// 通过签名合约派生地址和公钥；相同 (predecessor, path, contract) 结果确定
    async fn derive_address_and_public_key(
        &self,
        predecessor: &str,
        path: &str,
    ) -> Result<DerivedKey>;

    /// 只读；账户不存在时返回 `AccountNotProvisioned`
    async fn get_balance(&self, address: &str) -> Result<Balance>;

    fn serialize_transaction(&self, transaction: &Self::UnsignedTransaction) -> Result<String>;

    fn deserialize_transaction(&self, serialized: &str) -> Result<Self::UnsignedTransaction>;

    /// 读取当前链状态构建未签名交易，不修改任何共享状态
    async fn prepare_transaction_for_signing(
        &self,
        request: Self::TransactionRequest,
    ) -> Result<PreparedTransaction<Self::UnsignedTransaction>>;

    /// 拼接签名，不访问网络；签名形态不符时返回 `InvalidSignatureShape`
    fn finalize_transaction_signing(
        &self,
        transaction: Self::UnsignedTransaction,
        signatures: &[Signature],
    ) -> Result<String>;

    async fn broadcast_tx(&self, signed: &str) -> Result<BroadcastResult>;

    async fn derive(&self, request: &DerivationRequest) -> Result<DerivedKey> {
        self.derive_address_and_public_key(&request.predecessor, &request.path)
            .await
    }
}
