//! 路由定义

use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers;
use crate::state::AppState;

/// 订单 API 路由
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(handlers::create_order))
        .route(
            "/orders/product/{product_id}",
            get(handlers::list_orders_by_product),
        )
}
