//! 订单数据模型与 API DTO 定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 新建订单的初始状态
pub const ORDER_STATUS_DRAFT: &str = "draft";

/// 订单
///
/// 对外序列化采用 camelCase，`total` 字段对外名为 `totalPrice`，
/// 与既有客户端约定保持一致。
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub product_id: i64,
    pub quantity: i32,
    #[serde(rename = "totalPrice")]
    pub total: f64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// 待落库的订单
///
/// 总价 = 数量 × 创建时刻的商品单价，之后不随价格变动。
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub product_id: i64,
    pub quantity: i32,
    pub total: f64,
    pub status: String,
}

/// 创建订单请求
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(range(min = 1, message = "商品 ID 必须大于 0"))]
    pub product_id: i64,
    #[validate(range(min = 1, message = "数量必须大于 0"))]
    pub quantity: i32,
}

/// API 统一响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// 创建成功响应
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: "操作成功".to_string(),
            data: Some(data),
        }
    }

    /// 创建成功响应（自定义消息）
    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: message.into(),
            data: Some(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_wire_format() {
        let order = Order {
            id: 1,
            product_id: 7,
            quantity: 3,
            total: 28.5,
            status: "draft".to_string(),
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&order).unwrap();

        assert_eq!(value["id"], 1);
        assert_eq!(value["productId"], 7);
        assert_eq!(value["totalPrice"], 28.5);
        assert_eq!(value["status"], "draft");
        assert!(value.get("createdAt").is_some());
        // 内部字段名不外泄
        assert!(value.get("total").is_none());
        assert!(value.get("product_id").is_none());
    }

    #[test]
    fn test_create_order_request_validation() {
        let valid = CreateOrderRequest {
            product_id: 7,
            quantity: 3,
        };
        assert!(valid.validate().is_ok());

        let zero_quantity = CreateOrderRequest {
            product_id: 7,
            quantity: 0,
        };
        assert!(zero_quantity.validate().is_err());

        let bad_product = CreateOrderRequest {
            product_id: 0,
            quantity: 1,
        };
        assert!(bad_product.validate().is_err());
    }

    #[test]
    fn test_api_response_success() {
        let response = ApiResponse::success(vec![1, 2, 3]);
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["success"], true);
        assert_eq!(value["code"], "SUCCESS");
        assert_eq!(value["data"], serde_json::json!([1, 2, 3]));
    }
}
