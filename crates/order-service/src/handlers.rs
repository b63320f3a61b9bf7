//! 订单 HTTP API 处理器

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;
use validator::Validate;

use crate::{
    error::OrderServiceError,
    models::{ApiResponse, CreateOrderRequest, Order},
    state::AppState,
};

/// 受理下单请求
///
/// POST /orders
///
/// 校验通过后只发布 order.created 事件即返回 202，计价与落库由
/// 消费者异步完成，响应中回显已发布的事件载荷。
pub async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<serde_json::Value>>), OrderServiceError> {
    req.validate()?;

    let event = state.service.submit_order(&req).await?;

    info!(product_id = req.product_id, quantity = req.quantity, "下单请求已受理");

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success_with_message(event, "订单已受理，正在异步处理")),
    ))
}

/// 按商品查询订单
///
/// GET /orders/product/{product_id}
pub async fn list_orders_by_product(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<Order>>>, OrderServiceError> {
    let orders = state.service.get_orders_by_product(product_id).await?;

    Ok(Json(ApiResponse::success(orders)))
}
