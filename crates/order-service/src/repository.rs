//! 订单仓储
//!
//! 定义仓储接口，便于消费者与服务层依赖抽象而非具体实现，支持 mock 测试。

use async_trait::async_trait;
use orderflow_shared::error::{OrderFlowError, Result};
use sqlx::PgPool;

use crate::models::{NewOrder, Order};

/// 订单仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// 落库新订单，返回订单 ID
    async fn create_order(&self, order: &NewOrder) -> Result<i64>;
    /// 更新订单状态，订单不存在时返回 NotFound
    async fn update_order_status(&self, order_id: i64, status: &str) -> Result<()>;
    /// 按商品查询订单
    async fn get_orders_by_product(&self, product_id: i64) -> Result<Vec<Order>>;
}

/// PostgreSQL 订单仓储实现
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create_order(&self, order: &NewOrder) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO orders (product_id, quantity, total, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(order.product_id)
        .bind(order.quantity)
        .bind(order.total)
        .bind(&order.status)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    async fn update_order_status(&self, order_id: i64, status: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(status)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OrderFlowError::NotFound {
                entity: "Order".to_string(),
                id: order_id.to_string(),
            });
        }

        Ok(())
    }

    async fn get_orders_by_product(&self, product_id: i64) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, product_id, quantity, total, status, created_at
            FROM orders
            WHERE product_id = $1
            ORDER BY id
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }
}
