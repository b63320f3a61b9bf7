//! 订单服务错误类型定义
//!
//! HTTP 层的错误出口：共享库错误在此映射为状态码与统一响应体。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use orderflow_shared::error::OrderFlowError;
use serde_json::json;

/// 订单服务错误类型
#[derive(Debug, thiserror::Error)]
pub enum OrderServiceError {
    // 验证错误
    #[error("参数验证失败: {0}")]
    Validation(String),

    // 基础设施与业务错误统一走共享错误
    #[error(transparent)]
    Shared(#[from] OrderFlowError),
}

impl OrderServiceError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Shared(e) => match e {
                OrderFlowError::Validation(_) | OrderFlowError::MalformedMessage(_) => {
                    StatusCode::BAD_REQUEST
                }
                OrderFlowError::NotFound { .. } => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Shared(e) => e.code(),
        }
    }
}

impl IntoResponse for OrderServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志，防止信息泄露
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, code = self.error_code(), "请求处理失败");
            "服务内部错误，请稍后重试".to_string()
        } else {
            self.to_string()
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for OrderServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, OrderServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    /// 构造代表性错误变体及其期望的 (StatusCode, error_code) 映射
    fn representative_variants() -> Vec<(OrderServiceError, StatusCode, &'static str)> {
        vec![
            (
                OrderServiceError::Validation("quantity 必须大于 0".into()),
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (
                OrderFlowError::NotFound {
                    entity: "Order".into(),
                    id: "42".into(),
                }
                .into(),
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
            ),
            (
                OrderFlowError::MalformedMessage("bad json".into()).into(),
                StatusCode::BAD_REQUEST,
                "MALFORMED_MESSAGE",
            ),
            (
                OrderFlowError::Publish {
                    routing_key: "order.created".into(),
                    message: "channel closed".into(),
                }
                .into(),
                StatusCode::INTERNAL_SERVER_ERROR,
                "PUBLISH_FAILED",
            ),
            (
                OrderFlowError::Database(sqlx::Error::PoolTimedOut).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
            ),
            (
                OrderFlowError::Internal("unexpected state".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ]
    }

    #[test]
    fn test_status_codes_and_error_codes() {
        for (error, expected_status, expected_code) in representative_variants() {
            assert_eq!(
                error.status_code(),
                expected_status,
                "状态码不匹配: {expected_code}"
            );
            assert_eq!(error.error_code(), expected_code);
        }
    }

    /// 响应体必须包含 success/code/message/data 四个字段
    #[tokio::test]
    async fn test_into_response_body_structure() {
        for (error, expected_status, expected_code) in representative_variants() {
            let response = error.into_response();
            assert_eq!(response.status(), expected_status);

            let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .expect("读取响应体失败");
            let body: serde_json::Value =
                serde_json::from_slice(&body_bytes).expect("响应体不是合法 JSON");

            assert_eq!(body["success"], json!(false));
            assert_eq!(body["code"], json!(expected_code));
            assert!(!body["message"].as_str().unwrap_or("").is_empty());
            assert!(body["data"].is_null());
        }
    }

    /// 系统级错误的响应消息不应泄露内部细节
    #[tokio::test]
    async fn test_system_errors_hide_internal_details() {
        let error: OrderServiceError = OrderFlowError::Publish {
            routing_key: "order.created".into(),
            message: "amqp://10.0.0.1:5672 connection refused".into(),
        }
        .into();

        let response = error.into_response();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("读取响应体失败");
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        let message = body["message"].as_str().unwrap();

        assert!(!message.contains("10.0.0.1"));
        assert!(message.contains("服务内部错误"));
    }

    /// 业务错误的响应消息应保留原始上下文
    #[tokio::test]
    async fn test_business_errors_preserve_message() {
        let error = OrderServiceError::Validation("quantity 必须大于 0".into());
        let response = error.into_response();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("读取响应体失败");
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

        assert!(body["message"].as_str().unwrap().contains("quantity"));
    }

    #[test]
    fn test_from_validation_errors() {
        use validator::{ValidationError, ValidationErrors};

        let mut errors = ValidationErrors::new();
        let mut field_error = ValidationError::new("range");
        field_error.message = Some("数量必须大于 0".into());
        errors.add("quantity", field_error);

        let error: OrderServiceError = errors.into();
        match &error {
            OrderServiceError::Validation(msg) => {
                assert!(msg.contains("quantity"), "转换后应保留字段名: {msg}");
            }
            other => panic!("期望 Validation 变体，实际: {:?}", other),
        }
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }
}
