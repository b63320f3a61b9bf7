//! 共享库
//!
//! 包含各服务共用的配置、错误处理、事件定义、AMQP 客户端、
//! 数据库连接、缓存、重试与死信等基础设施代码。

pub mod amqp;
pub mod cache;
pub mod config;
pub mod database;
pub mod dlq;
pub mod error;
pub mod events;
pub mod observability;
pub mod retry;
