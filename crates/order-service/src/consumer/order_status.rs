//! update.order.status 事件处理
//!
//! 商品服务完成库存裁决后回发状态事件（`Sale` 或 `Out of Stock`），
//! 此处将裁决结果写回订单。

use std::sync::Arc;

use async_trait::async_trait;
use orderflow_shared::amqp::{BrokerMessage, Disposition, MessageHandler};
use orderflow_shared::events::OrderStatusPayload;
use tracing::info;

use crate::repository::OrderRepository;

/// 处理一条 update.order.status 事件
///
/// 状态事件可能先于订单落库到达（极端时序下的重投场景），因此
/// 未知订单也按瞬态失败重投，而不是当作永久失败丢弃。
pub async fn handle_order_status(
    repository: &dyn OrderRepository,
    message: &BrokerMessage,
) -> Disposition {
    let envelope = match message.decode::<OrderStatusPayload>() {
        Ok(envelope) => envelope,
        Err(e) => return Disposition::from_error(&e),
    };
    let payload = envelope.data;

    if let Err(e) = repository
        .update_order_status(payload.order_id, &payload.status)
        .await
    {
        return Disposition::Transient {
            reason: e.to_string(),
        };
    }

    info!(
        order_id = payload.order_id,
        status = %payload.status,
        "订单状态已更新"
    );
    Disposition::Ack
}

/// update-order-status-queue 的消息处理器
pub struct OrderStatusHandler {
    repository: Arc<dyn OrderRepository>,
}

impl OrderStatusHandler {
    pub fn new(repository: Arc<dyn OrderRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl MessageHandler for OrderStatusHandler {
    async fn handle(&self, message: &BrokerMessage) -> Disposition {
        handle_order_status(self.repository.as_ref(), message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockOrderRepository;
    use mockall::predicate::eq;
    use orderflow_shared::amqp::routing;
    use orderflow_shared::error::OrderFlowError;

    /// 构造 update.order.status 事件消息，载荷为 camelCase
    fn order_status_message(data: serde_json::Value) -> BrokerMessage {
        let envelope = serde_json::json!({
            "event": routing::UPDATE_ORDER_STATUS,
            "timestamp": "2024-01-15T10:30:00Z",
            "data": data
        });
        BrokerMessage {
            routing_key: routing::UPDATE_ORDER_STATUS.to_string(),
            payload: serde_json::to_vec(&envelope).unwrap(),
            retry_count: 0,
        }
    }

    /// 正常路径：按事件内容更新订单状态
    #[tokio::test]
    async fn test_order_status_updates_order() {
        let mut repository = MockOrderRepository::new();
        repository
            .expect_update_order_status()
            .with(eq(42), eq("Sale"))
            .times(1)
            .returning(|_, _| Ok(()));

        let message = order_status_message(serde_json::json!({
            "orderId": 42,
            "status": "Sale"
        }));
        let disposition = handle_order_status(&repository, &message).await;

        assert_eq!(disposition, Disposition::Ack);
    }

    /// 未知订单按瞬态失败重投，等待订单落库
    #[tokio::test]
    async fn test_order_status_unknown_order_is_transient() {
        let mut repository = MockOrderRepository::new();
        repository.expect_update_order_status().returning(|_, _| {
            Err(OrderFlowError::NotFound {
                entity: "Order".to_string(),
                id: "99".to_string(),
            })
        });

        let message = order_status_message(serde_json::json!({
            "orderId": 99,
            "status": "Out of Stock"
        }));
        let disposition = handle_order_status(&repository, &message).await;

        assert!(matches!(disposition, Disposition::Transient { .. }));
    }

    /// 信封解码失败按永久失败处置
    #[tokio::test]
    async fn test_order_status_malformed_payload_is_permanent() {
        let repository = MockOrderRepository::new();

        let message = BrokerMessage {
            routing_key: routing::UPDATE_ORDER_STATUS.to_string(),
            payload: b"not-json".to_vec(),
            retry_count: 0,
        };
        let disposition = handle_order_status(&repository, &message).await;

        assert!(matches!(disposition, Disposition::Permanent { .. }));
    }

    /// 状态载荷使用 camelCase 字段，snake_case 视为格式错误
    #[tokio::test]
    async fn test_order_status_requires_camel_case_fields() {
        let repository = MockOrderRepository::new();

        let message = order_status_message(serde_json::json!({
            "order_id": 42,
            "status": "Sale"
        }));
        let disposition = handle_order_status(&repository, &message).await;

        assert!(matches!(disposition, Disposition::Permanent { .. }));
    }
}
