//! 队列消费处理器
//!
//! 订单服务消费两个队列：
//!
//! - `order-created-queue`（绑定 `order.created`）：查询商品单价、落库草稿
//!   订单，再发布库存更新事件
//! - `update-order-status-queue`（绑定 `update.order.status`）：按商品服务的
//!   裁决更新订单状态
//!
//! 处理函数只做业务分类并返回处置结果，消息的确认、重投与死信
//! 由共享消费者统一落实。

mod order_created;
mod order_status;

pub use order_created::{OrderCreatedHandler, handle_order_created};
pub use order_status::{OrderStatusHandler, handle_order_status};
