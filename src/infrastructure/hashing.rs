//! 交易摘要计算
//!
//! 进程启动时确定一次哈希实现，之后通过 `Arc<dyn TxHasher>` 注入到适配器中

use std::sync::Arc;

use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};

pub trait TxHasher: Send + Sync {
    /// 32 字节 SHA-256 摘要
    fn sha256(&self, data: &[u8]) -> [u8; 32];
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

impl TxHasher for Sha256Hasher {
    fn sha256(&self, data: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hasher.finalize().into()
    }
}

static DEFAULT_HASHER: Lazy<Arc<dyn TxHasher>> = Lazy::new(|| Arc::new(Sha256Hasher));

/// 全局默认哈希实现
pub fn default_hasher() -> Arc<dyn TxHasher> {
    DEFAULT_HASHER.clone()
}
