//! 事件信封与载荷定义模块
//!
//! 所有经由消息代理传递的事件共用同一个信封结构：
//! `{ "event": <路由键>, "timestamp": <RFC3339 UTC>, "data": <载荷> }`。
//! 消费侧按绑定的路由键选择载荷类型，信封中的 event 字段仅作参考，
//! 不做交叉校验。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::{OrderFlowError, Result};

// ---------------------------------------------------------------------------
// 事件信封
// ---------------------------------------------------------------------------

/// 事件信封
///
/// 发布时 `event` 填入路由键，`timestamp` 为发布时刻（UTC）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T = serde_json::Value> {
    /// 事件名（与路由键一致）
    pub event: String,
    /// 事件产生时间
    pub timestamp: DateTime<Utc>,
    /// 事件载荷
    pub data: T,
}

impl<T> EventEnvelope<T> {
    /// 创建一个以当前时间为时间戳的信封
    pub fn new(event: impl Into<String>, data: T) -> Self {
        Self {
            event: event.into(),
            timestamp: Utc::now(),
            data,
        }
    }
}

/// 解码事件信封，载荷一并反序列化为目标类型
///
/// 信封本身或 data 字段不符合预期形状都视为格式错误，
/// 由调用方按永久失败处理。
pub fn decode_event<T: DeserializeOwned>(body: &[u8]) -> Result<EventEnvelope<T>> {
    serde_json::from_slice(body).map_err(|e| OrderFlowError::MalformedMessage(e.to_string()))
}

// ---------------------------------------------------------------------------
// 事件载荷
// ---------------------------------------------------------------------------

/// 订单创建事件载荷（路由键 `order.created`）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderCreatedPayload {
    pub product_id: i64,
    pub quantity: i32,
}

/// 库存更新事件载荷（路由键 `update.product.stock`）
///
/// 订单服务在订单落库后发布，通知商品侧扣减库存。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StockUpdatePayload {
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub total: f64,
    pub status: String,
}

/// 订单状态更新事件载荷（路由键 `update.order.status`）
///
/// 商品侧处理完库存后回发，字段采用 camelCase 命名。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OrderStatusPayload {
    pub order_id: i64,
    pub status: String,
}
