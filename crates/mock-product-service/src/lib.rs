//! Mock 商品服务
//!
//! 订单服务的可独立运行协作方，无需数据库：
//!
//! - `GET /products/{id}` 提供计价查询，商品目录保存在内存中
//! - 消费 `update.product.stock`，裁决库存并回发 `update.order.status`
//!
//! 用于本地开发和联调，演示完整的下单 -> 计价 -> 扣减 -> 状态回写链路。

pub mod api;
pub mod consumer;
pub mod models;
pub mod store;
