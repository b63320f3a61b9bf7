//! Mock 商品数据模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 商品
///
/// 订单服务计价时通过 `GET /products/{id}` 读取 `price` 字段。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: f64,
    /// 剩余库存
    pub qty: i32,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_serializes_camel_case() {
        let product = Product {
            id: 7,
            name: "机械键盘".to_string(),
            price: 399.0,
            qty: 50,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["price"], 399.0);
        assert_eq!(json["qty"], 50);
        assert!(json.get("createdAt").is_some());
        assert!(json.get("created_at").is_none());
    }
}
