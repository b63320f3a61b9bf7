//! update.product.stock 事件处理
//!
//! 对订单服务发来的扣减请求做出库存裁决：库存足够则扣减并回发
//! `Sale`，不足则回发 `Out of Stock`。裁决本身是成功的业务结果，
//! 两种情况都确认消息，不会因库存不足而重投。

use std::sync::Arc;

use async_trait::async_trait;
use orderflow_shared::amqp::{BrokerMessage, Disposition, EventPublisher, MessageHandler, routing};
use orderflow_shared::error::OrderFlowError;
use orderflow_shared::events::{OrderStatusPayload, StockUpdatePayload};
use tracing::{error, info, warn};

use crate::store::{ProductStore, StockDeduction};

/// 库存足够时回发的订单状态
pub const STATUS_SALE: &str = "Sale";
/// 库存不足时回发的订单状态
pub const STATUS_OUT_OF_STOCK: &str = "Out of Stock";

/// 处理一条 update.product.stock 事件
///
/// 商品不存在属于数据缺陷，按永久失败进入死信队列。裁决事件发布
/// 失败时只记日志并确认：库存已经扣减，重投会造成重复扣减。
pub async fn handle_stock_update(
    store: &ProductStore,
    publisher: &dyn EventPublisher,
    message: &BrokerMessage,
) -> Disposition {
    let envelope = match message.decode::<StockUpdatePayload>() {
        Ok(envelope) => envelope,
        Err(e) => return Disposition::from_error(&e),
    };
    let payload = envelope.data;

    let status = match store.try_deduct(payload.product_id, payload.quantity) {
        StockDeduction::Deducted { remaining } => {
            info!(
                order_id = payload.order_id,
                product_id = payload.product_id,
                quantity = payload.quantity,
                remaining,
                "库存已扣减"
            );
            STATUS_SALE
        }
        StockDeduction::Insufficient { available } => {
            warn!(
                order_id = payload.order_id,
                product_id = payload.product_id,
                requested = payload.quantity,
                available,
                "库存不足"
            );
            STATUS_OUT_OF_STOCK
        }
        StockDeduction::UnknownProduct => {
            return Disposition::from_error(&OrderFlowError::NotFound {
                entity: "Product".to_string(),
                id: payload.product_id.to_string(),
            });
        }
    };

    let verdict = OrderStatusPayload {
        order_id: payload.order_id,
        status: status.to_string(),
    };
    match serde_json::to_value(&verdict) {
        Ok(data) => {
            if let Err(e) = publisher.publish(routing::UPDATE_ORDER_STATUS, data).await {
                error!(
                    order_id = payload.order_id,
                    status, error = %e,
                    "订单状态事件发布失败"
                );
            }
        }
        Err(e) => {
            error!(order_id = payload.order_id, error = %e, "订单状态事件序列化失败");
        }
    }

    Disposition::Ack
}

/// product-stock-queue 的消息处理器
pub struct StockUpdateHandler {
    store: Arc<ProductStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl StockUpdateHandler {
    pub fn new(store: Arc<ProductStore>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { store, publisher }
    }
}

#[async_trait]
impl MessageHandler for StockUpdateHandler {
    async fn handle(&self, message: &BrokerMessage) -> Disposition {
        handle_stock_update(self.store.as_ref(), self.publisher.as_ref(), message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use orderflow_shared::error::Result;

    mock! {
        pub Publisher {}

        #[async_trait]
        impl EventPublisher for Publisher {
            async fn publish(&self, routing_key: &str, data: serde_json::Value) -> Result<()>;
        }
    }

    /// 构造 update.product.stock 事件消息
    fn stock_update_message(order_id: i64, product_id: i64, quantity: i32) -> BrokerMessage {
        let envelope = serde_json::json!({
            "event": routing::UPDATE_PRODUCT_STOCK,
            "timestamp": "2024-01-15T10:30:00Z",
            "data": {
                "order_id": order_id,
                "product_id": product_id,
                "quantity": quantity,
                "total": 28.5,
                "status": "draft"
            }
        });
        BrokerMessage {
            routing_key: routing::UPDATE_PRODUCT_STOCK.to_string(),
            payload: serde_json::to_vec(&envelope).unwrap(),
            retry_count: 0,
        }
    }

    /// 库存足够：扣减并回发 Sale
    #[tokio::test]
    async fn test_stock_update_deducts_and_publishes_sale() {
        let store = ProductStore::new();
        let product = store.add("键帽", 99.0, 10);

        let mut publisher = MockPublisher::new();
        publisher
            .expect_publish()
            .withf(|routing_key, data| {
                routing_key == routing::UPDATE_ORDER_STATUS
                    && data["orderId"] == 42
                    && data["status"] == STATUS_SALE
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let message = stock_update_message(42, product.id, 3);
        let disposition = handle_stock_update(&store, &publisher, &message).await;

        assert_eq!(disposition, Disposition::Ack);
        assert_eq!(store.get(product.id).unwrap().qty, 7);
    }

    /// 库存不足：不扣减，回发 Out of Stock，消息仍然确认
    #[tokio::test]
    async fn test_stock_update_insufficient_publishes_out_of_stock() {
        let store = ProductStore::new();
        let product = store.add("键帽", 99.0, 1);

        let mut publisher = MockPublisher::new();
        publisher
            .expect_publish()
            .withf(|routing_key, data| {
                routing_key == routing::UPDATE_ORDER_STATUS
                    && data["orderId"] == 42
                    && data["status"] == STATUS_OUT_OF_STOCK
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let message = stock_update_message(42, product.id, 5);
        let disposition = handle_stock_update(&store, &publisher, &message).await;

        assert_eq!(disposition, Disposition::Ack);
        assert_eq!(store.get(product.id).unwrap().qty, 1);
    }

    /// 商品不存在：永久失败，不回发任何事件
    #[tokio::test]
    async fn test_stock_update_unknown_product_is_permanent() {
        let store = ProductStore::new();
        let publisher = MockPublisher::new();

        let message = stock_update_message(42, 404, 1);
        let disposition = handle_stock_update(&store, &publisher, &message).await;

        assert!(matches!(disposition, Disposition::Permanent { .. }));
    }

    /// 信封解码失败按永久失败处置
    #[tokio::test]
    async fn test_stock_update_malformed_payload_is_permanent() {
        let store = ProductStore::new();
        let publisher = MockPublisher::new();

        let message = BrokerMessage {
            routing_key: routing::UPDATE_PRODUCT_STOCK.to_string(),
            payload: b"not-json".to_vec(),
            retry_count: 0,
        };
        let disposition = handle_stock_update(&store, &publisher, &message).await;

        assert!(matches!(disposition, Disposition::Permanent { .. }));
    }

    /// 裁决事件发布失败：库存已扣减，消息仍然确认以避免重复扣减
    #[tokio::test]
    async fn test_stock_update_publish_failure_still_acks() {
        let store = ProductStore::new();
        let product = store.add("键帽", 99.0, 10);

        let mut publisher = MockPublisher::new();
        publisher.expect_publish().times(1).returning(|_, _| {
            Err(OrderFlowError::Publish {
                routing_key: routing::UPDATE_ORDER_STATUS.to_string(),
                message: "连接中断".to_string(),
            })
        });

        let message = stock_update_message(42, product.id, 4);
        let disposition = handle_stock_update(&store, &publisher, &message).await;

        assert_eq!(disposition, Disposition::Ack);
        // 扣减只发生一次
        assert_eq!(store.get(product.id).unwrap().qty, 6);
    }
}
