//! 签名类型与 MPC 响应归一化
//!
//! MPC 合约对 ECDSA 返回 `{ big_r, s, recovery_id }`，对 EdDSA 返回
//! `{ scheme: "Ed25519", signature: [u8; 64] }`。在编排层一次性归一化为 `Signature`，
//! 下游只按枚举分支，不再探测字段。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ChainError, Result};

/// 可恢复 ECDSA 签名，r/s 为 32 字节十六进制，v = recovery_id + 27
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsvSignature {
    pub r: String,
    pub s: String,
    pub v: u8,
}

impl RsvSignature {
    /// r || s || v，共 65 字节
    pub fn to_bytes(&self) -> Result<[u8; 65]> {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&decode_scalar(&self.r, "r")?);
        out[32..64].copy_from_slice(&decode_scalar(&self.s, "s")?);
        out[64] = self.v;
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ed25519Signature {
    pub signature: [u8; 64],
}

impl Ed25519Signature {
    pub const SCHEME: &'static str = "Ed25519";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signature {
    Rsv(RsvSignature),
    Ed25519(Ed25519Signature),
}

impl Signature {
    pub fn is_rsv(&self) -> bool {
        matches!(self, Signature::Rsv(_))
    }
}

/// 签名域：0 = ECDSA(secp256k1)，1 = EdDSA(ed25519)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureKeyType {
    Ecdsa,
    Eddsa,
}

impl SignatureKeyType {
    pub fn domain_id(&self) -> u64 {
        match self {
            SignatureKeyType::Ecdsa => 0,
            SignatureKeyType::Eddsa => 1,
        }
    }

    /// `payload_v2` 的变体名
    pub fn payload_tag(&self) -> &'static str {
        match self {
            SignatureKeyType::Ecdsa => "Ecdsa",
            SignatureKeyType::Eddsa => "Eddsa",
        }
    }
}

#[derive(Deserialize)]
struct AffinePoint {
    affine_point: String,
}

#[derive(Deserialize)]
struct Scalar {
    scalar: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BigR {
    Point(AffinePoint),
    Legacy(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SValue {
    Scalar(Scalar),
    Legacy(String),
}

#[derive(Deserialize)]
struct EcdsaResponse {
    big_r: BigR,
    s: SValue,
    recovery_id: u8,
}

fn decode_scalar(hex_str: &str, field: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(hex_str.trim_start_matches("0x"))
        .map_err(|e| ChainError::Encoding(format!("invalid {} hex: {}", field, e)))?;
    bytes
        .try_into()
        .map_err(|_| ChainError::Encoding(format!("{} must be 32 bytes", field)))
}

fn is_empty_response(response: &Value) -> bool {
    match response {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// 压缩 ECDSA 响应转换为 RSV
pub fn to_rsv(response: &Value) -> Result<RsvSignature> {
    let parsed: EcdsaResponse = serde_json::from_value(response.clone())
        .map_err(|e| ChainError::Encoding(format!("unrecognized MPC signature response: {}", e)))?;

    let big_r = match parsed.big_r {
        BigR::Point(p) => p.affine_point,
        BigR::Legacy(s) => s,
    };
    let s = match parsed.s {
        SValue::Scalar(s) => s.scalar,
        SValue::Legacy(s) => s,
    };

    // big_r 为 33 字节压缩点，去掉 1 字节前缀即为 r
    let r = big_r
        .get(2..)
        .filter(|r| r.len() == 64)
        .ok_or_else(|| ChainError::Encoding(format!("invalid big_r: {}", big_r)))?
        .to_string();
    decode_scalar(&r, "r")?;
    decode_scalar(&s, "s")?;

    // secp256k1 恢复 id 只有 0..=3
    if parsed.recovery_id > 3 {
        return Err(ChainError::Encoding(format!(
            "invalid recovery_id: {}",
            parsed.recovery_id
        )));
    }

    Ok(RsvSignature {
        r,
        s,
        v: parsed.recovery_id + 27,
    })
}

/// MPC 响应归一化：显式 Ed25519 标签原样透传，否则按 ECDSA 处理。
/// 仅当响应为空时返回 `None`。
pub fn response_to_mpc_signature(response: &Value) -> Result<Option<Signature>> {
    if is_empty_response(response) {
        return Ok(None);
    }

    if response.get("scheme").and_then(|s| s.as_str()) == Some(Ed25519Signature::SCHEME) {
        if let Some(raw) = response.get("signature") {
            let bytes: Vec<u8> = serde_json::from_value(raw.clone())?;
            let signature: [u8; 64] = bytes.try_into().map_err(|b: Vec<u8>| {
                ChainError::Encoding(format!(
                    "Ed25519 signature must be 64 bytes, got {}",
                    b.len()
                ))
            })?;
            return Ok(Some(Signature::Ed25519(Ed25519Signature { signature })));
        }
    }

    to_rsv(response).map(|rsv| Some(Signature::Rsv(rsv)))
}
