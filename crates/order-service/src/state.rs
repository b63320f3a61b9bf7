//! 应用状态定义

use std::sync::Arc;

use crate::service::OrderService;

/// 应用共享状态
///
/// 通过 axum 的 State 机制注入到各处理器。
#[derive(Clone)]
pub struct AppState {
    /// 订单服务
    pub service: Arc<OrderService>,
}

impl AppState {
    pub fn new(service: Arc<OrderService>) -> Self {
        Self { service }
    }
}
