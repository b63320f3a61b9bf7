//! Mock 商品 REST API
//!
//! 订单服务计价时调用 `GET /products/{id}` 读取单价，其余端点
//! 用于演示时查看和调整商品目录。

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::models::Product;
use crate::store::ProductStore;

/// 商品服务状态
#[derive(Clone)]
pub struct ProductApiState {
    pub store: Arc<ProductStore>,
}

/// 录入商品请求
#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub price: f64,
    pub qty: i32,
}

/// 构建商品路由
pub fn product_routes() -> Router<ProductApiState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/{id}", get(get_product))
}

/// 商品详情
///
/// GET /products/{id}
async fn get_product(
    State(state): State<ProductApiState>,
    Path(id): Path<i64>,
) -> Result<Json<Product>, StatusCode> {
    state.store.get(id).map(Json).ok_or_else(|| {
        warn!(product_id = id, "商品不存在");
        StatusCode::NOT_FOUND
    })
}

/// 商品列表
///
/// GET /products
async fn list_products(State(state): State<ProductApiState>) -> Json<Vec<Product>> {
    Json(state.store.list())
}

/// 录入商品
///
/// POST /products
async fn create_product(
    State(state): State<ProductApiState>,
    Json(req): Json<CreateProductRequest>,
) -> (StatusCode, Json<Product>) {
    let product = state.store.add(&req.name, req.price, req.qty);
    info!(product_id = product.id, name = %product.name, "商品已录入");
    (StatusCode::CREATED, Json(product))
}
