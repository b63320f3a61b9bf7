//! 统一错误处理模块
//!
//! 定义系统中所有共享的错误类型，使用 thiserror 提供良好的错误信息。
//! 消费侧通过 `is_retryable` 区分瞬态失败（重投）与永久失败（死信）。

use thiserror::Error;

/// 系统错误类型
#[derive(Debug, Error)]
pub enum OrderFlowError {
    // ==================== 消息解码错误 ====================
    #[error("消息格式错误: {0}")]
    MalformedMessage(String),

    // ==================== 消息代理错误 ====================
    #[error("消息代理错误: {0}")]
    Broker(#[from] lapin::Error),

    #[error("连接池错误: {0}")]
    Pool(String),

    #[error("事件发布失败: {routing_key} - {message}")]
    Publish { routing_key: String, message: String },

    // ==================== 上游定价服务错误 ====================
    #[error("上游服务不可用: {service} - {message}")]
    UpstreamUnavailable { service: String, message: String },

    #[error("上游响应数据错误: {service} - {message}")]
    UpstreamData { service: String, message: String },

    // ==================== 数据库错误 ====================
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库迁移失败: {0}")]
    Migration(String),

    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    // ==================== 缓存错误 ====================
    #[error("Redis 错误: {0}")]
    Redis(#[from] redis::RedisError),

    // ==================== 验证错误 ====================
    #[error("参数验证失败: {0}")]
    Validation(String),

    // ==================== 通用错误 ====================
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, OrderFlowError>;

impl OrderFlowError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedMessage(_) => "MALFORMED_MESSAGE",
            Self::Broker(_) => "BROKER_ERROR",
            Self::Pool(_) => "BROKER_POOL_ERROR",
            Self::Publish { .. } => "PUBLISH_FAILED",
            Self::UpstreamUnavailable { .. } => "UPSTREAM_UNAVAILABLE",
            Self::UpstreamData { .. } => "UPSTREAM_DATA_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Migration(_) => "MIGRATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Redis(_) => "REDIS_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试（瞬态）错误
    ///
    /// 注意 `UpstreamData` 被归为不可重试：上游返回了成功响应但缺少
    /// 价格字段时按永久失败处理，与网络不可达的瞬态分类不对称。
    /// 该分类保留为独立变体，便于后续单独调整。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Broker(_)
                | Self::Pool(_)
                | Self::Publish { .. }
                | Self::UpstreamUnavailable { .. }
                | Self::Database(_)
                | Self::Redis(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = OrderFlowError::NotFound {
            entity: "Order".to_string(),
            id: "123".to_string(),
        };
        assert_eq!(err.code(), "NOT_FOUND");

        let err = OrderFlowError::MalformedMessage("bad json".to_string());
        assert_eq!(err.code(), "MALFORMED_MESSAGE");
    }

    #[test]
    fn test_is_retryable() {
        let db_err = OrderFlowError::Database(sqlx::Error::PoolTimedOut);
        assert!(db_err.is_retryable());

        let unavailable = OrderFlowError::UpstreamUnavailable {
            service: "product-service".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(unavailable.is_retryable());

        let malformed = OrderFlowError::MalformedMessage("missing field".to_string());
        assert!(!malformed.is_retryable());
    }

    /// 上游数据错误与上游不可用的分类不对称：前者永久、后者瞬态
    #[test]
    fn test_upstream_data_error_is_permanent() {
        let data_err = OrderFlowError::UpstreamData {
            service: "product-service".to_string(),
            message: "price field missing".to_string(),
        };
        assert!(!data_err.is_retryable());
        assert_eq!(data_err.code(), "UPSTREAM_DATA_ERROR");
    }
}
