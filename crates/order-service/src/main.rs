//! 订单服务入口
//!
//! 组装 HTTP API 与两个队列消费者，共享同一套仓储与发布器。

use std::sync::Arc;

use axum::{Json, Router, routing::get};
use chrono::Utc;
use order_service::{
    consumer::{OrderCreatedHandler, OrderStatusHandler},
    pricing::HttpPricingClient,
    repository::PgOrderRepository,
    routes,
    service::OrderService,
    state::AppState,
};
use orderflow_shared::{
    amqp::{
        AmqpClient, AmqpConsumer, AmqpPublisher, EventPublisher, MessageHandler, queues, routing,
    },
    cache::Cache,
    config::AppConfig,
    database::Database,
    observability,
    retry::RetryPolicy,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 统一加载配置：config/order-service.toml + ORDERFLOW_ 环境变量
    let config = AppConfig::load("order-service").unwrap_or_else(|e| {
        tracing::warn!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    // 2. 初始化日志
    observability::init(&config)?;

    info!("Starting order-service on {}", config.server_addr());
    info!(environment = %config.environment, "Configuration loaded");

    // 3. 初始化数据库连接并执行迁移
    let db = Database::connect(&config.database).await?;
    db.run_migrations().await?;
    info!("Database connection established");

    // 4. 初始化 Redis 缓存
    let cache = Arc::new(Cache::new(&config.redis)?);
    cache.health_check().await?;
    info!("Redis connection established");

    // 5. 建立 AMQP 连接池并声明交换机与死信拓扑
    let amqp = Arc::new(AmqpClient::connect(&config.amqp).await?);
    let publisher: Arc<dyn EventPublisher> = Arc::new(AmqpPublisher::new(amqp.clone()));
    info!("AMQP connection established");

    // 6. 组装仓储与业务服务
    let repository = Arc::new(PgOrderRepository::new(db.pool().clone()));
    let pricing = Arc::new(HttpPricingClient::new(&config.pricing)?);
    let service = Arc::new(OrderService::new(
        repository.clone(),
        publisher.clone(),
        cache.clone(),
    ));
    let state = AppState::new(service);

    // 7. 启动队列消费者，watch 通道用于广播关闭信号
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let policy = RetryPolicy {
        max_retries: config.amqp.max_retries,
        ..RetryPolicy::default()
    };

    let created_handler: Arc<dyn MessageHandler> = Arc::new(OrderCreatedHandler::new(
        repository.clone(),
        pricing,
        publisher.clone(),
    ));
    let created_consumer = AmqpConsumer::new(
        amqp.clone(),
        queues::ORDER_CREATED,
        routing::ORDER_CREATED,
        "order-service-order-created",
        config.amqp.prefetch,
        policy.clone(),
    );
    let created_shutdown = shutdown_rx.clone();
    let created_task = tokio::spawn(async move {
        created_consumer.run(created_handler, created_shutdown).await;
    });

    let status_handler: Arc<dyn MessageHandler> = Arc::new(OrderStatusHandler::new(repository));
    let status_consumer = AmqpConsumer::new(
        amqp.clone(),
        queues::UPDATE_ORDER_STATUS,
        routing::UPDATE_ORDER_STATUS,
        "order-service-order-status",
        config.amqp.prefetch,
        policy,
    );
    let status_task = tokio::spawn(async move {
        status_consumer.run(status_handler, shutdown_rx).await;
    });
    info!("Queue consumers started");

    // 8. 组装 HTTP 路由
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(routes::api_routes())
        .route("/health", get(health_check))
        .route(
            "/ready",
            get({
                let db_for_ready = db.clone();
                let cache_for_ready = cache.clone();
                let amqp_for_ready = amqp.clone();
                move || {
                    readiness_check(
                        db_for_ready.clone(),
                        cache_for_ready.clone(),
                        amqp_for_ready.clone(),
                    )
                }
            }),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    // 9. 启动 HTTP 服务
    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 10. HTTP 已停止，通知消费者退出并等待在途消息处理完毕
    let _ = shutdown_tx.send(true);
    if let Err(e) = created_task.await {
        error!(error = %e, "order.created 消费者任务异常结束");
    }
    if let Err(e) = status_task.await {
        error!(error = %e, "update.order.status 消费者任务异常结束");
    }

    db.close().await;
    info!("Server shutdown complete");

    Ok(())
}

/// 监听关闭信号
///
/// K8s 通过 SIGTERM 通知 Pod 停止；本地开发通过 Ctrl+C。
/// 收到任一信号后返回，触发 axum 的优雅关闭流程。
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("注册 Ctrl+C 处理器失败");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("注册 SIGTERM 处理器失败")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}

/// 存活探针：服务进程正常即返回 ok
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "order-service",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

/// 就绪探针：检查数据库、Redis 与 AMQP 连接是否可用
///
/// K8s 就绪探针失败时会将 Pod 从 Service 端点移除，
/// 避免将流量路由到无法正常处理请求的实例。
async fn readiness_check(
    db: Database,
    cache: Arc<Cache>,
    amqp: Arc<AmqpClient>,
) -> Json<serde_json::Value> {
    let db_ok = db.health_check().await.is_ok();
    let cache_ok = cache.health_check().await.is_ok();
    let amqp_ok = amqp.health_check().await.is_ok();
    let all_ok = db_ok && cache_ok && amqp_ok;

    Json(serde_json::json!({
        "status": if all_ok { "ok" } else { "degraded" },
        "service": "order-service",
        "checks": {
            "database": if db_ok { "ok" } else { "fail" },
            "redis": if cache_ok { "ok" } else { "fail" },
            "amqp": if amqp_ok { "ok" } else { "fail" }
        }
    }))
}
