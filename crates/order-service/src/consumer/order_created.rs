//! order.created 事件处理
//!
//! 订单创建的核心编排：解码事件信封 -> 向商品服务查询单价 ->
//! 以创建时价格计算总价 -> 落库草稿订单 -> 发布库存更新事件，
//! 交由商品服务裁决扣减。
//!
//! 总价在此处一次性定价，后续商品价格变动不影响已创建的订单。

use std::sync::Arc;

use async_trait::async_trait;
use orderflow_shared::amqp::{BrokerMessage, Disposition, EventPublisher, MessageHandler, routing};
use orderflow_shared::events::{OrderCreatedPayload, StockUpdatePayload};
use tracing::{error, info};

use crate::models::{NewOrder, ORDER_STATUS_DRAFT};
use crate::pricing::PricingClient;
use crate::repository::OrderRepository;

/// 处理一条 order.created 事件
///
/// 失败分类：
/// - 信封解码失败 -> 永久失败，重投不可能修复
/// - 计价、落库失败 -> 按错误的可重试性分类
/// - 库存事件发布失败 -> 订单已落库，只记日志，消息仍然确认，
///   避免重投造成重复下单
pub async fn handle_order_created(
    repository: &dyn OrderRepository,
    pricing: &dyn PricingClient,
    publisher: &dyn EventPublisher,
    message: &BrokerMessage,
) -> Disposition {
    let envelope = match message.decode::<OrderCreatedPayload>() {
        Ok(envelope) => envelope,
        Err(e) => return Disposition::from_error(&e),
    };
    let payload = envelope.data;

    let price = match pricing.fetch_price(payload.product_id).await {
        Ok(price) => price,
        Err(e) => return Disposition::from_error(&e),
    };

    let order = NewOrder {
        product_id: payload.product_id,
        quantity: payload.quantity,
        total: f64::from(payload.quantity) * price,
        status: ORDER_STATUS_DRAFT.to_string(),
    };
    let order_id = match repository.create_order(&order).await {
        Ok(order_id) => order_id,
        Err(e) => return Disposition::from_error(&e),
    };

    info!(
        order_id,
        product_id = payload.product_id,
        quantity = payload.quantity,
        total = order.total,
        "草稿订单已创建"
    );

    let stock_update = StockUpdatePayload {
        order_id,
        product_id: payload.product_id,
        quantity: payload.quantity,
        total: order.total,
        status: order.status.clone(),
    };
    match serde_json::to_value(&stock_update) {
        Ok(data) => {
            // 订单已落库，发布失败不回滚也不重投，留待人工补偿
            if let Err(e) = publisher.publish(routing::UPDATE_PRODUCT_STOCK, data).await {
                error!(order_id, error = %e, "库存更新事件发布失败");
            }
        }
        Err(e) => {
            error!(order_id, error = %e, "库存更新事件序列化失败");
        }
    }

    Disposition::Ack
}

/// order-created-queue 的消息处理器
pub struct OrderCreatedHandler {
    repository: Arc<dyn OrderRepository>,
    pricing: Arc<dyn PricingClient>,
    publisher: Arc<dyn EventPublisher>,
}

impl OrderCreatedHandler {
    pub fn new(
        repository: Arc<dyn OrderRepository>,
        pricing: Arc<dyn PricingClient>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            repository,
            pricing,
            publisher,
        }
    }
}

#[async_trait]
impl MessageHandler for OrderCreatedHandler {
    async fn handle(&self, message: &BrokerMessage) -> Disposition {
        handle_order_created(
            self.repository.as_ref(),
            self.pricing.as_ref(),
            self.publisher.as_ref(),
            message,
        )
        .await
    }
}
