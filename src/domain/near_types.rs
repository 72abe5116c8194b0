//! NEAR 链上原语
//!
//! 字段顺序与枚举判别值必须和链上 borsh 编码一致，不能随意调整

use std::{fmt, str::FromStr};

use base64::Engine;
use borsh::{BorshDeserialize, BorshSerialize};
use ed25519_dalek::{Signer as _, SigningKey};
use zeroize::Zeroizing;

use crate::{
    error::{ChainError, Result},
    infrastructure::hashing::TxHasher,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Ed25519,
    Secp256k1,
}

impl KeyType {
    pub fn prefix(&self) -> &'static str {
        match self {
            KeyType::Ed25519 => "ed25519",
            KeyType::Secp256k1 => "secp256k1",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub enum PublicKey {
    Ed25519([u8; 32]),
    Secp256k1([u8; 64]),
}

impl PublicKey {
    pub fn key_type(&self) -> KeyType {
        match self {
            PublicKey::Ed25519(_) => KeyType::Ed25519,
            PublicKey::Secp256k1(_) => KeyType::Secp256k1,
        }
    }

    pub fn key_data(&self) -> &[u8] {
        match self {
            PublicKey::Ed25519(data) => data,
            PublicKey::Secp256k1(data) => data,
        }
    }

    /// 未压缩 SEC1 十六进制（`04 || x || y`）转换为 NEAR secp256k1 公钥
    pub fn from_uncompressed_sec1(hex_key: &str) -> Result<Self> {
        let bytes = hex::decode(hex_key.trim_start_matches("0x"))
            .map_err(|e| ChainError::InvalidPublicKey(format!("invalid hex: {}", e)))?;
        k256::PublicKey::from_sec1_bytes(&bytes)
            .map_err(|e| ChainError::InvalidPublicKey(format!("invalid secp256k1 point: {}", e)))?;

        match bytes.split_first() {
            Some((0x04, rest)) if rest.len() == 64 => {
                let mut data = [0u8; 64];
                data.copy_from_slice(rest);
                Ok(PublicKey::Secp256k1(data))
            }
            _ => Err(ChainError::InvalidPublicKey(
                "expected uncompressed SEC1 point".to_string(),
            )),
        }
    }

    /// secp256k1 公钥转换为未压缩 SEC1 十六进制
    pub fn to_uncompressed_sec1(&self) -> Result<String> {
        match self {
            PublicKey::Secp256k1(data) => {
                let mut bytes = Vec::with_capacity(65);
                bytes.push(0x04);
                bytes.extend_from_slice(data);
                k256::PublicKey::from_sec1_bytes(&bytes).map_err(|e| {
                    ChainError::InvalidPublicKey(format!("invalid secp256k1 point: {}", e))
                })?;
                Ok(hex::encode(bytes))
            }
            PublicKey::Ed25519(_) => Err(ChainError::InvalidPublicKey(
                "ed25519 key has no SEC1 encoding".to_string(),
            )),
        }
    }
}

impl FromStr for PublicKey {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self> {
        // 无前缀时按 ed25519 处理
        let (curve, data) = s.split_once(':').unwrap_or(("ed25519", s));
        let bytes = bs58::decode(data)
            .into_vec()
            .map_err(|e| ChainError::InvalidPublicKey(format!("{}: {}", s, e)))?;

        match curve.to_lowercase().as_str() {
            "ed25519" => {
                let data: [u8; 32] = bytes.try_into().map_err(|_| {
                    ChainError::InvalidPublicKey(format!("{}: expected 32 bytes", s))
                })?;
                Ok(PublicKey::Ed25519(data))
            }
            "secp256k1" => {
                let data: [u8; 64] = bytes.try_into().map_err(|_| {
                    ChainError::InvalidPublicKey(format!("{}: expected 64 bytes", s))
                })?;
                Ok(PublicKey::Secp256k1(data))
            }
            other => Err(ChainError::InvalidPublicKey(format!(
                "unknown key type: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            self.key_type().prefix(),
            bs58::encode(self.key_data()).into_string()
        )
    }
}

/// 链上签名（与公钥使用相同的类型标签）
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum NearSignature {
    Ed25519([u8; 64]),
    Secp256k1([u8; 65]),
}

impl NearSignature {
    pub fn for_key(public_key: &PublicKey, bytes: &[u8]) -> Result<Self> {
        match public_key.key_type() {
            KeyType::Ed25519 => bytes
                .try_into()
                .map(NearSignature::Ed25519)
                .map_err(|_| ChainError::Encoding("ed25519 signature must be 64 bytes".into())),
            KeyType::Secp256k1 => bytes
                .try_into()
                .map(NearSignature::Secp256k1)
                .map_err(|_| {
                    ChainError::Encoding("secp256k1 signature must be 65 bytes".into())
                }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct CreateAccountAction {}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct DeployContractAction {
    pub code: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct FunctionCallAction {
    pub method_name: String,
    pub args: Vec<u8>,
    pub gas: u64,
    pub deposit: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TransferAction {
    pub deposit: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct StakeAction {
    pub stake: u128,
    pub public_key: PublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct FunctionCallPermission {
    pub allowance: Option<u128>,
    pub receiver_id: String,
    pub method_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum AccessKeyPermission {
    FunctionCall(FunctionCallPermission),
    FullAccess,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AccessKey {
    pub nonce: u64,
    pub permission: AccessKeyPermission,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AddKeyAction {
    pub public_key: PublicKey,
    pub access_key: AccessKey,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct DeleteKeyAction {
    pub public_key: PublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct DeleteAccountAction {
    pub beneficiary_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Action {
    CreateAccount(CreateAccountAction),
    DeployContract(DeployContractAction),
    FunctionCall(FunctionCallAction),
    Transfer(TransferAction),
    Stake(StakeAction),
    AddKey(AddKeyAction),
    DeleteKey(DeleteKeyAction),
    DeleteAccount(DeleteAccountAction),
}

impl Action {
    pub fn create_account() -> Self {
        Action::CreateAccount(CreateAccountAction {})
    }

    pub fn transfer(deposit: u128) -> Self {
        Action::Transfer(TransferAction { deposit })
    }

    pub fn function_call(method_name: &str, args: Vec<u8>, gas: u64, deposit: u128) -> Self {
        Action::FunctionCall(FunctionCallAction {
            method_name: method_name.to_string(),
            args,
            gas,
            deposit,
        })
    }

    pub fn add_full_access_key(public_key: PublicKey) -> Self {
        Action::AddKey(AddKeyAction {
            public_key,
            access_key: AccessKey {
                nonce: 0,
                permission: AccessKeyPermission::FullAccess,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Transaction {
    pub signer_id: String,
    pub public_key: PublicKey,
    pub nonce: u64,
    pub receiver_id: String,
    pub block_hash: [u8; 32],
    pub actions: Vec<Action>,
}

impl Transaction {
    /// 规范 borsh 编码
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(borsh::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(borsh::from_slice(bytes)?)
    }

    /// 需要签名的 32 字节摘要
    pub fn signing_hash(&self, hasher: &dyn TxHasher) -> Result<[u8; 32]> {
        Ok(hasher.sha256(&self.encode()?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub signature: NearSignature,
}

impl SignedTransaction {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(borsh::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(borsh::from_slice(bytes)?)
    }

    pub fn to_base64(&self) -> Result<String> {
        Ok(base64::engine::general_purpose::STANDARD.encode(self.encode()?))
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        Self::decode(&bytes)
    }

    /// 链上交易标识（base58）
    pub fn hash(&self, hasher: &dyn TxHasher) -> Result<String> {
        let digest = self.transaction.signing_hash(hasher)?;
        Ok(bs58::encode(digest).into_string())
    }
}

/// base58 区块哈希解码为 32 字节
pub fn decode_block_hash(encoded: &str) -> Result<[u8; 32]> {
    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| ChainError::Encoding(format!("invalid block hash {}: {}", encoded, e)))?;
    bytes
        .try_into()
        .map_err(|_| ChainError::Encoding(format!("block hash {} is not 32 bytes", encoded)))
}

/// 本地 ed25519 密钥对（仅用于控制账户，不用于派生账户）
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    pub fn from_random() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    /// 解析 `ed25519:<base58>`，支持 64 字节（seed || public）或 32 字节 seed
    pub fn from_secret_key_str(secret: &str) -> Result<Self> {
        let data = match secret.split_once(':') {
            Some(("ed25519", data)) => data,
            Some((other, _)) => {
                return Err(ChainError::InvalidSecretKey(format!(
                    "unsupported key type: {}",
                    other
                )))
            }
            None => secret,
        };

        let bytes = Zeroizing::new(
            bs58::decode(data)
                .into_vec()
                .map_err(|e| ChainError::InvalidSecretKey(e.to_string()))?,
        );

        let signing_key = match bytes.len() {
            64 => {
                let mut keypair = Zeroizing::new([0u8; 64]);
                keypair.copy_from_slice(&bytes);
                SigningKey::from_keypair_bytes(&keypair)
                    .map_err(|e| ChainError::InvalidSecretKey(e.to_string()))?
            }
            32 => {
                let mut seed = Zeroizing::new([0u8; 32]);
                seed.copy_from_slice(&bytes);
                SigningKey::from_bytes(&seed)
            }
            n => {
                return Err(ChainError::InvalidSecretKey(format!(
                    "expected 32 or 64 bytes, got {}",
                    n
                )))
            }
        };

        Ok(Self { signing_key })
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::Ed25519(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// 对交易签名：对 borsh 编码的摘要签名
    pub fn sign_transaction(
        &self,
        transaction: Transaction,
        hasher: &dyn TxHasher,
    ) -> Result<SignedTransaction> {
        let digest = transaction.signing_hash(hasher)?;
        let signature = NearSignature::Ed25519(self.sign(&digest));
        Ok(SignedTransaction {
            transaction,
            signature,
        })
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key().to_string())
            .finish()
    }
}
