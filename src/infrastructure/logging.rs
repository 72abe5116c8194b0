//! 日志系统配置模块
//! 库代码只调用 tracing 宏；由宿主程序调用 `init_logging` 安装订阅者

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::LoggingConfig;

/// 初始化日志系统（RUST_LOG 优先于配置中的级别）
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = build_filter(config);

    if config.format == "json" {
        Registry::default()
            .with(filter)
            .with(fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        Registry::default()
            .with(filter)
            .with(fmt::layer().with_ansi(true))
            .try_init()?;
    }

    Ok(())
}

fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// 简化初始化（使用默认配置）
pub fn init_default_logging() {
    let config = LoggingConfig::default();
    if let Err(e) = init_logging(&config) {
        eprintln!("Failed to initialize logging: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice_reports_error() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            format: "json".to_string(),
        };
        // 第一次可能因其他测试已安装订阅者而失败，第二次一定失败
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
