//! 可观测性模块
//!
//! 初始化 tracing 日志订阅器，支持 pretty 与 json 两种输出格式。
//! RUST_LOG 环境变量优先于配置中的日志级别。

use anyhow::Result;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::AppConfig;

/// 初始化日志订阅器
pub fn init(config: &AppConfig) -> Result<()> {
    // 构建环境过滤器
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.observability.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // 构建日志层
    let fmt_layer = if json_output(config) {
        fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// 生产环境强制结构化输出，其余环境按配置选择
fn json_output(config: &AppConfig) -> bool {
    config.is_production() || config.observability.log_format == "json"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ObservabilityConfig;

    #[test]
    fn test_json_output_selection() {
        // 默认开发环境输出 pretty
        assert!(!json_output(&AppConfig::default()));

        // 显式配置 json
        let config = AppConfig {
            observability: ObservabilityConfig {
                log_format: "json".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(json_output(&config));

        // 生产环境无论格式配置如何都输出 json
        let config = AppConfig {
            environment: "production".to_string(),
            ..Default::default()
        };
        assert!(json_output(&config));
    }

    #[test]
    fn test_init_with_defaults() {
        // 全局订阅器只能设置一次，该测试独占初始化
        let config = AppConfig::default();
        assert!(init(&config).is_ok());
    }
}
