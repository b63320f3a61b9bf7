//! 订单服务
//!
//! 事件驱动的订单协调服务，对外提供下单与订单查询的 HTTP API，
//! 对内通过 AMQP topic 交换机与商品服务协作：
//!
//! - 下单请求只发布 `order.created` 事件即返回 202
//! - 消费 `order.created`：查询商品单价、落库草稿订单、发布库存更新事件
//! - 消费 `update.order.status`：按商品服务的库存裁决更新订单状态
//!
//! ## 模块组织
//!
//! - `handlers` / `routes` / `state`: HTTP 层
//! - `service`: 业务编排（发布事件、旁路缓存查询）
//! - `consumer`: 队列消费处理器
//! - `repository`: 订单持久化
//! - `pricing`: 商品服务 HTTP 客户端
//! - `models` / `error`: 数据结构与错误映射

pub mod consumer;
pub mod error;
pub mod handlers;
pub mod models;
pub mod pricing;
pub mod repository;
pub mod routes;
pub mod service;
pub mod state;
