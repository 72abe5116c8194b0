//! MPC 签名合约封装（签名编排器）
//!
//! 每个待签哈希构建一笔 `sign` 合约调用，整批交给调用方提供的签名账户提交，
//! 再按输入顺序从执行结果中提取签名并归一化。

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    config::{default_rpc_url, NearConfig},
    domain::{
        near_types::{Action, PublicKey},
        signature::{response_to_mpc_signature, Signature, SignatureKeyType},
        HashToSign,
    },
    error::{ChainError, Result},
    infrastructure::near_rpc::{view_function, FinalExecutionOutcome, JsonRpcProvider, NearRpc},
};

/// sign 调用的 gas 上限（300 Tgas）
pub const NEAR_MAX_GAS: u64 = 300_000_000_000_000;

/// sign 调用附带的押金（1 yoctoNEAR）
pub const SIGN_DEPOSIT_YOCTO: u128 = 1;

/// 交给签名账户提交的一笔交易
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionIntent {
    pub signer_id: String,
    pub receiver_id: String,
    pub actions: Vec<Action>,
}

/// 调用方提供的批量提交能力
///
/// 返回的执行结果必须与提交的交易按位置一一对应
#[async_trait]
pub trait SignerAccount: Send + Sync {
    fn account_id(&self) -> &str;

    async fn sign_and_send_transactions(
        &self,
        transactions: Vec<TransactionIntent>,
    ) -> Result<Vec<FinalExecutionOutcome>>;
}

pub struct SignArgs<'a> {
    pub payloads: Vec<HashToSign>,
    pub path: String,
    pub key_type: SignatureKeyType,
    pub signer_account: &'a dyn SignerAccount,
}

pub struct ChainSignatureContract {
    contract_id: String,
    network_id: String,
    provider: Arc<dyn NearRpc>,
}

impl ChainSignatureContract {
    /// 未提供备用 RPC 时使用 `https://rpc.{network}.near.org`
    pub fn new(contract_id: &str, network_id: &str, fallback_rpc_urls: Vec<String>) -> Self {
        let endpoints = if fallback_rpc_urls.is_empty() {
            vec![default_rpc_url(network_id)]
        } else {
            fallback_rpc_urls
        };
        let provider = JsonRpcProvider::with_endpoints(endpoints, Duration::from_secs(30));
        Self::with_provider(contract_id, network_id, Arc::new(provider))
    }

    pub fn with_provider(contract_id: &str, network_id: &str, provider: Arc<dyn NearRpc>) -> Self {
        Self {
            contract_id: contract_id.to_string(),
            network_id: network_id.to_string(),
            provider,
        }
    }

    pub fn from_config(config: &NearConfig) -> Self {
        let provider = JsonRpcProvider::with_endpoints(
            config.rpc_endpoints(),
            Duration::from_secs(config.rpc_timeout_secs),
        );
        Self::with_provider(&config.contract_id, &config.network_id, Arc::new(provider))
    }

    pub fn contract_id(&self) -> &str {
        &self.contract_id
    }

    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    pub fn get_current_signature_deposit(&self) -> u128 {
        SIGN_DEPOSIT_YOCTO
    }

    /// 每个 payload 一笔 sign 调用，顺序与输入一致
    pub fn build_sign_transactions(
        &self,
        signer_id: &str,
        payloads: &[HashToSign],
        path: &str,
        key_type: SignatureKeyType,
    ) -> Result<Vec<TransactionIntent>> {
        payloads
            .iter()
            .map(|payload| {
                let mut payload_v2 = serde_json::Map::new();
                payload_v2.insert(
                    key_type.payload_tag().to_string(),
                    Value::String(hex::encode(payload)),
                );
                let args = serde_json::json!({
                    "request": {
                        "payload_v2": payload_v2,
                        "path": path,
                        "domain_id": key_type.domain_id(),
                    }
                });

                Ok(TransactionIntent {
                    signer_id: signer_id.to_string(),
                    receiver_id: self.contract_id.clone(),
                    actions: vec![Action::function_call(
                        "sign",
                        serde_json::to_vec(&args)?,
                        NEAR_MAX_GAS,
                        self.get_current_signature_deposit(),
                    )],
                })
            })
            .collect()
    }

    /// 请求 MPC 签名；第 i 个签名对应第 i 个 payload
    pub async fn sign(&self, args: SignArgs<'_>) -> Result<Vec<Signature>> {
        if args.payloads.is_empty() {
            return Err(ChainError::EmptySignatureSet);
        }

        let transactions = self.build_sign_transactions(
            args.signer_account.account_id(),
            &args.payloads,
            &args.path,
            args.key_type,
        )?;

        tracing::debug!(
            contract_id = %self.contract_id,
            path = %args.path,
            key_type = ?args.key_type,
            payloads = transactions.len(),
            "Submitting MPC sign requests"
        );

        let outcomes = args
            .signer_account
            .sign_and_send_transactions(transactions)
            .await?;

        if outcomes.len() != args.payloads.len() {
            return Err(ChainError::OutcomeCountMismatch {
                expected: args.payloads.len(),
                actual: outcomes.len(),
            });
        }

        let mut signatures = Vec::with_capacity(outcomes.len());
        for outcome in &outcomes {
            let result = outcome.last_result()?;
            match response_to_mpc_signature(&result)? {
                Some(signature) => signatures.push(signature),
                None => return Err(ChainError::EmptySignatureSet),
            }
        }

        tracing::info!(
            contract_id = %self.contract_id,
            signatures = signatures.len(),
            "MPC signatures received"
        );

        Ok(signatures)
    }

    /// 根公钥（未压缩 SEC1 十六进制）
    pub async fn get_public_key(&self) -> Result<String> {
        let value = view_function(
            self.provider.as_ref(),
            &self.contract_id,
            "public_key",
            &serde_json::json!({}),
        )
        .await?;
        let naj = value_as_key(&value)?;
        naj.parse::<PublicKey>()?.to_uncompressed_sec1()
    }

    /// 派生公钥：Ed25519 返回 `ed25519:<base58>` 原文，ECDSA 返回未压缩 SEC1 十六进制
    pub async fn get_derived_public_key(
        &self,
        path: &str,
        predecessor: &str,
        is_ed25519: bool,
    ) -> Result<String> {
        let key_type = if is_ed25519 {
            SignatureKeyType::Eddsa
        } else {
            SignatureKeyType::Ecdsa
        };

        let value = view_function(
            self.provider.as_ref(),
            &self.contract_id,
            "derived_public_key",
            &serde_json::json!({
                "path": path,
                "predecessor": predecessor,
                "domain_id": key_type.domain_id(),
            }),
        )
        .await?;
        let naj = value_as_key(&value)?;

        if is_ed25519 {
            return Ok(naj.to_string());
        }
        naj.parse::<PublicKey>()?.to_uncompressed_sec1()
    }
}

fn value_as_key(value: &Value) -> Result<&str> {
    value
        .as_str()
        .ok_or_else(|| ChainError::InvalidPublicKey(format!("expected key string, got {}", value)))
}
