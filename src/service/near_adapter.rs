//! NEAR 链适配器
//!
//! 目标链与签名合约所在链相同：派生账户为 `{path}.{predecessor}`，
//! 交易为单个 Transfer action，待签哈希为 borsh 编码的 SHA-256。

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use base64::Engine;

use crate::{
    config::NearConfig,
    domain::{
        chain_adapter::{
            Balance, BroadcastResult, ChainAdapter, DerivedKey, PreparedTransaction,
        },
        near_types::{
            Action, KeyType, NearSignature, PublicKey, SignedTransaction, Transaction,
        },
        signature::{Signature, SignatureKeyType},
    },
    error::{ChainError, Result, NEAR_EXPECTS_ED25519},
    infrastructure::{
        hashing::{default_hasher, TxHasher},
        near_rpc::{
            resolve_block_hash, view_access_key, AccountView, FinalExecutionStatus,
            JsonRpcProvider, NearRpc, QueryRequest,
        },
    },
    service::chain_signature_contract::ChainSignatureContract,
};

/// 1 NEAR = 10^24 yoctoNEAR
pub const NEAR_DECIMALS: u32 = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NearTransactionRequest {
    pub from: String,
    pub to: String,
    /// yoctoNEAR
    pub amount: u128,
    /// 发送方 access key（派生公钥）
    pub public_key: String,
    /// NEAR 转账不携带 memo，仅为接口兼容保留
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NearUnsignedTransaction {
    pub transaction: Transaction,
}

pub struct NearAdapter {
    provider: Arc<dyn NearRpc>,
    contract: Arc<ChainSignatureContract>,
    hasher: Arc<dyn TxHasher>,
    key_type: SignatureKeyType,
}

impl NearAdapter {
    pub fn new(provider: Arc<dyn NearRpc>, contract: Arc<ChainSignatureContract>) -> Self {
        Self {
            provider,
            contract,
            hasher: default_hasher(),
            key_type: SignatureKeyType::Eddsa,
        }
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn TxHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// 派生使用的签名域，默认 Ed25519
    pub fn with_key_type(mut self, key_type: SignatureKeyType) -> Self {
        self.key_type = key_type;
        self
    }

    /// 适配器与签名合约共用同一个 RPC 客户端
    pub fn from_config(config: &NearConfig) -> Self {
        let provider: Arc<dyn NearRpc> = Arc::new(JsonRpcProvider::with_endpoints(
            config.rpc_endpoints(),
            Duration::from_secs(config.rpc_timeout_secs),
        ));
        let contract = Arc::new(ChainSignatureContract::with_provider(
            &config.contract_id,
            &config.network_id,
            provider.clone(),
        ));
        Self::new(provider, contract)
    }

    pub fn contract(&self) -> &ChainSignatureContract {
        &self.contract
    }
}

#[async_trait]
impl ChainAdapter for NearAdapter {
    type TransactionRequest = NearTransactionRequest;
    type UnsignedTransaction = NearUnsignedTransaction;

    async fn derive_address_and_public_key(
        &self,
        predecessor: &str,
        path: &str,
    ) -> Result<DerivedKey> {
        let is_ed25519 = self.key_type == SignatureKeyType::Eddsa;
        let derived = self
            .contract
            .get_derived_public_key(path, predecessor, is_ed25519)
            .await?;

        let public_key = if is_ed25519 {
            derived.parse::<PublicKey>()?
        } else {
            PublicKey::from_uncompressed_sec1(&derived)?
        };

        Ok(DerivedKey {
            address: format!("{}.{}", path, predecessor),
            public_key: public_key.to_string(),
        })
    }

    async fn get_balance(&self, address: &str) -> Result<Balance> {
        let result = self
            .provider
            .query(&QueryRequest::ViewAccount {
                account_id: address.to_string(),
            })
            .await
            .map_err(|e| {
                if e.is_account_missing() {
                    ChainError::account_not_found(address)
                } else {
                    ChainError::Rpc(e)
                }
            })?;

        let view: AccountView = serde_json::from_value(result)?;
        let balance = view
            .amount
            .parse::<u128>()
            .map_err(|e| ChainError::InvalidAmount(format!("{}: {}", view.amount, e)))?;

        Ok(Balance {
            balance,
            decimals: NEAR_DECIMALS,
        })
    }

    fn serialize_transaction(&self, transaction: &NearUnsignedTransaction) -> Result<String> {
        Ok(base64::engine::general_purpose::STANDARD.encode(transaction.transaction.encode()?))
    }

    fn deserialize_transaction(&self, serialized: &str) -> Result<NearUnsignedTransaction> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(serialized)?;
        Ok(NearUnsignedTransaction {
            transaction: Transaction::decode(&bytes)?,
        })
    }

    async fn prepare_transaction_for_signing(
        &self,
        request: NearTransactionRequest,
    ) -> Result<PreparedTransaction<NearUnsignedTransaction>> {
        let NearTransactionRequest {
            from,
            to,
            amount,
            public_key,
            memo: _,
        } = request;

        let access_key = view_access_key(self.provider.as_ref(), &from, &public_key)
            .await
            .map_err(|e| {
                if e.is_account_missing() {
                    ChainError::sender_not_found(&from, &public_key)
                } else {
                    ChainError::Rpc(e)
                }
            })?;

        let block_hash = resolve_block_hash(self.provider.as_ref(), &access_key).await?;
        let tx_public_key: PublicKey = access_key
            .public_key
            .as_deref()
            .unwrap_or(&public_key)
            .parse()?;

        let transaction = Transaction {
            signer_id: from,
            public_key: tx_public_key,
            nonce: access_key.next_nonce()?,
            receiver_id: to,
            block_hash,
            actions: vec![Action::transfer(amount)],
        };
        let hash = transaction.signing_hash(self.hasher.as_ref())?;

        tracing::debug!(
            signer_id = %transaction.signer_id,
            receiver_id = %transaction.receiver_id,
            nonce = transaction.nonce,
            "Prepared NEAR transfer for signing"
        );

        Ok(PreparedTransaction {
            transaction: NearUnsignedTransaction { transaction },
            hashes_to_sign: vec![hash.to_vec()],
        })
    }

    fn finalize_transaction_signing(
        &self,
        transaction: NearUnsignedTransaction,
        signatures: &[Signature],
    ) -> Result<String> {
        if signatures.iter().any(Signature::is_rsv) {
            return Err(ChainError::InvalidSignatureShape(
                NEAR_EXPECTS_ED25519.to_string(),
            ));
        }

        let signature = match signatures {
            [] => return Err(ChainError::EmptySignatureSet),
            [Signature::Ed25519(sig)] => sig,
            _ => {
                return Err(ChainError::InvalidSignatureShape(format!(
                    "NEAR expects exactly one signature, got {}",
                    signatures.len()
                )))
            }
        };

        let transaction = transaction.transaction;
        // Ed25519 签名只能挂在 ed25519 access key 的交易上
        if transaction.public_key.key_type() != KeyType::Ed25519 {
            return Err(ChainError::InvalidSignatureShape(format!(
                "Ed25519 signature does not match {} transaction key",
                transaction.public_key.key_type().prefix()
            )));
        }
        let signature = NearSignature::for_key(&transaction.public_key, &signature.signature)?;
        SignedTransaction {
            transaction,
            signature,
        }
        .to_base64()
    }

    async fn broadcast_tx(&self, signed: &str) -> Result<BroadcastResult> {
        let signed = SignedTransaction::from_base64(signed)?;
        let outcome = self.provider.send_transaction(&signed).await?;
        let hash = outcome.transaction.hash;

        match &outcome.status {
            FinalExecutionStatus::Failure(failure) => {
                tracing::warn!(hash = %hash, failure = %failure, "NEAR transaction executed with failure");
            }
            _ => {
                tracing::info!(
                    hash = %hash,
                    signer_id = %signed.transaction.signer_id,
                    "NEAR transaction broadcast"
                );
            }
        }

        Ok(BroadcastResult { hash })
    }
}
