//! 本地密钥签名账户
//!
//! 用于向签名合约提交 sign 调用的普通 NEAR 账户，按提交顺序逐笔签名并广播。

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    domain::near_types::{KeyPair, Transaction},
    error::Result,
    infrastructure::{
        hashing::{default_hasher, TxHasher},
        near_rpc::{resolve_block_hash, view_access_key, FinalExecutionOutcome, NearRpc},
    },
    service::chain_signature_contract::{SignerAccount, TransactionIntent},
};

pub struct LocalSignerAccount {
    account_id: String,
    key_pair: KeyPair,
    provider: Arc<dyn NearRpc>,
    hasher: Arc<dyn TxHasher>,
}

impl LocalSignerAccount {
    pub fn new(account_id: &str, key_pair: KeyPair, provider: Arc<dyn NearRpc>) -> Self {
        Self {
            account_id: account_id.to_string(),
            key_pair,
            provider,
            hasher: default_hasher(),
        }
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn TxHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    async fn build_transaction(&self, intent: TransactionIntent) -> Result<Transaction> {
        let public_key = self.key_pair.public_key();
        let access_key =
            view_access_key(self.provider.as_ref(), &intent.signer_id, &public_key.to_string())
                .await?;
        let block_hash = resolve_block_hash(self.provider.as_ref(), &access_key).await?;

        Ok(Transaction {
            signer_id: intent.signer_id,
            public_key,
            nonce: access_key.next_nonce()?,
            receiver_id: intent.receiver_id,
            block_hash,
            actions: intent.actions,
        })
    }
}

#[async_trait]
impl SignerAccount for LocalSignerAccount {
    fn account_id(&self) -> &str {
        &self.account_id
    }

    /// 逐笔提交：每笔都重新读取 nonce，前一笔上链后再发下一笔
    async fn sign_and_send_transactions(
        &self,
        transactions: Vec<TransactionIntent>,
    ) -> Result<Vec<FinalExecutionOutcome>> {
        let mut outcomes = Vec::with_capacity(transactions.len());

        for intent in transactions {
            let transaction = self.build_transaction(intent).await?;
            let signed = self
                .key_pair
                .sign_transaction(transaction, self.hasher.as_ref())?;

            tracing::debug!(
                signer_id = %self.account_id,
                receiver_id = %signed.transaction.receiver_id,
                nonce = signed.transaction.nonce,
                "Sending signed transaction"
            );

            outcomes.push(self.provider.send_transaction(&signed).await?);
        }

        Ok(outcomes)
    }
}
