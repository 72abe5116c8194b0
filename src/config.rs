//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// 应用配置结构体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub near: NearConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// NEAR 网络与 MPC 签名合约配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearConfig {
    pub network_id: String, // "mainnet" or "testnet"
    pub rpc_url: String,
    #[serde(default)]
    pub fallback_rpc_urls: Vec<String>,
    pub contract_id: String,
    #[serde(default = "default_timeout_secs")]
    pub rpc_timeout_secs: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
}

fn default_timeout_secs() -> u64 {
    30
}

/// 各网络默认的 MPC 签名合约
pub fn default_contract_id(network_id: &str) -> &'static str {
    match network_id {
        "mainnet" => "v1.signer",
        _ => "v1.signer-prod.testnet",
    }
}

/// 各网络默认的公共 RPC
pub fn default_rpc_url(network_id: &str) -> String {
    format!("https://rpc.{}.near.org", network_id)
}

impl NearConfig {
    /// 主端点在前，其余为故障转移端点（去重）
    pub fn rpc_endpoints(&self) -> Vec<String> {
        let mut endpoints = vec![self.rpc_url.clone()];
        for url in &self.fallback_rpc_urls {
            if !endpoints.contains(url) {
                endpoints.push(url.clone());
            }
        }
        endpoints
    }
}

impl Default for NearConfig {
    fn default() -> Self {
        let network_id = std::env::var("NEAR_NETWORK_ID").unwrap_or_else(|_| "testnet".into());
        Self {
            rpc_url: std::env::var("NEAR_RPC_URL").unwrap_or_else(|_| default_rpc_url(&network_id)),
            fallback_rpc_urls: std::env::var("NEAR_FALLBACK_RPC_URLS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            contract_id: std::env::var("MPC_CONTRACT_ID")
                .unwrap_or_else(|_| default_contract_id(&network_id).into()),
            rpc_timeout_secs: std::env::var("RPC_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_timeout_secs),
            network_id,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
        }
    }
}

impl Config {
    /// 加载当前目录下的 .env（不存在时忽略）
    pub fn load_dotenv() {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!(error = %e, "No .env file loaded");
        }
    }

    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            near: NearConfig::default(),
            logging: LoggingConfig::default(),
        })
    }

    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                config = Self::from_file(path)?;
            }
        }

        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if self.near.network_id != "mainnet" && self.near.network_id != "testnet" {
            anyhow::bail!("NEAR_NETWORK_ID must be 'mainnet' or 'testnet'");
        }

        for url in self.near.rpc_endpoints() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("RPC URL must start with http:// or https://: {}", url);
            }
        }

        if self.near.contract_id.is_empty() {
            anyhow::bail!("MPC_CONTRACT_ID must not be empty");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        Ok(())
    }
}
