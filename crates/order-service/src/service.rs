//! 订单业务服务层
//!
//! HTTP 入口背后的编排：下单请求只发布事件即返回，订单本身由
//! 消费者异步创建；订单查询走旁路缓存。

use std::sync::Arc;

use orderflow_shared::amqp::{EventPublisher, routing};
use orderflow_shared::cache::{Cache, CacheKey, ORDER_CACHE_TTL};
use orderflow_shared::error::Result;
use tracing::{debug, info, warn};

use crate::models::{CreateOrderRequest, Order};
use crate::repository::OrderRepository;

/// 订单服务
///
/// 依赖全部通过 trait object 注入，便于在测试中替换为 mock。
pub struct OrderService {
    repository: Arc<dyn OrderRepository>,
    publisher: Arc<dyn EventPublisher>,
    cache: Arc<Cache>,
}

impl OrderService {
    pub fn new(
        repository: Arc<dyn OrderRepository>,
        publisher: Arc<dyn EventPublisher>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            repository,
            publisher,
            cache,
        }
    }

    /// 受理下单请求
    ///
    /// 只发布 order.created 事件即视为受理成功，计价与落库由消费者
    /// 异步完成。返回发布的事件载荷，供 HTTP 层回显给调用方。
    pub async fn submit_order(&self, request: &CreateOrderRequest) -> Result<serde_json::Value> {
        let data = serde_json::json!({
            "product_id": request.product_id,
            "quantity": request.quantity,
        });
        self.publisher
            .publish(routing::ORDER_CREATED, data.clone())
            .await?;

        info!(
            product_id = request.product_id,
            quantity = request.quantity,
            "下单事件已受理"
        );
        Ok(data)
    }

    /// 按商品查询订单，带旁路缓存
    ///
    /// 缓存读取失败视为基础设施故障直接向上传播；命中空列表按
    /// 未命中处理，回源数据库；只缓存非空结果，写入失败仅记日志。
    pub async fn get_orders_by_product(&self, product_id: i64) -> Result<Vec<Order>> {
        let key = CacheKey::orders_by_product(product_id);

        if let Some(orders) = self.cache.get::<Vec<Order>>(&key).await?
            && !orders.is_empty()
        {
            debug!(product_id, count = orders.len(), "订单查询命中缓存");
            return Ok(orders);
        }

        let orders = self.repository.get_orders_by_product(product_id).await?;

        if !orders.is_empty()
            && let Err(e) = self.cache.set(&key, &orders, ORDER_CACHE_TTL).await
        {
            warn!(product_id, error = %e, "订单缓存写入失败");
        }

        Ok(orders)
    }
}
