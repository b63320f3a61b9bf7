//! AMQP 消息代理模块
//!
//! 基于 lapin + deadpool-lapin 封装连接池、事件发布与队列消费。
//! 所有事件经由单一的持久化 topic 交换机路由，每个消费者声明
//! 自己的持久化队列并绑定一个路由键，prefetch=1 逐条消费。
//!
//! 消息处置遵循三态模型：成功确认、瞬态失败带计数重投、永久失败
//! 进入死信队列。消费循环由监督循环托管，崩溃后指数退避重启。

use std::sync::Arc;

use async_trait::async_trait;
use deadpool_lapin::{Manager, Pool};
use futures::StreamExt;
use lapin::{
    BasicProperties, Channel, ConnectionProperties, ExchangeKind,
    message::Delivery,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
        BasicQosOptions, BasicRejectOptions, ConfirmSelectOptions, ExchangeDeclareOptions,
        QueueBindOptions, QueueDeclareOptions,
    },
    types::{AMQPValue, FieldTable},
};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::AmqpConfig;
use crate::dlq::DeadLetterMessage;
use crate::error::{OrderFlowError, Result};
use crate::events::{EventEnvelope, decode_event};
use crate::retry::RetryPolicy;

// ---------------------------------------------------------------------------
// 路由键与队列常量
// ---------------------------------------------------------------------------

/// 路由键定义
pub mod routing {
    /// 订单创建事件
    pub const ORDER_CREATED: &str = "order.created";
    /// 库存更新事件
    pub const UPDATE_PRODUCT_STOCK: &str = "update.product.stock";
    /// 订单状态更新事件
    pub const UPDATE_ORDER_STATUS: &str = "update.order.status";
    /// 死信事件
    pub const ORDER_DLQ: &str = "order.dlq";
}

/// 队列定义
pub mod queues {
    /// 订单服务消费 order.created 的队列
    pub const ORDER_CREATED: &str = "order-created-queue";
    /// 订单服务消费 update.order.status 的队列
    pub const UPDATE_ORDER_STATUS: &str = "update-order-status-queue";
    /// 商品服务消费 update.product.stock 的队列
    pub const PRODUCT_STOCK: &str = "product-stock-queue";
    /// 死信停靠队列
    pub const ORDER_DLQ: &str = "order-dlq-queue";
}

/// 重投计数头，随消息重投递增
pub const RETRY_COUNT_HEADER: &str = "x-retry-count";

// ---------------------------------------------------------------------------
// 消费消息
// ---------------------------------------------------------------------------

/// 从队列取出的消息快照
///
/// 与底层投递解耦，处理函数只依赖该结构，便于单元测试。
#[derive(Debug, Clone)]
pub struct BrokerMessage {
    /// 消息的路由键
    pub routing_key: String,
    /// 原始消息体
    pub payload: Vec<u8>,
    /// 该消息已被重投的次数（首次投递为 0）
    pub retry_count: u32,
}

impl BrokerMessage {
    fn from_delivery(delivery: &Delivery) -> Self {
        Self {
            routing_key: delivery.routing_key.as_str().to_string(),
            payload: delivery.data.clone(),
            retry_count: retry_count_from_properties(&delivery.properties),
        }
    }

    /// 消息体按 UTF-8 解释
    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// 解码为事件信封，载荷反序列化为目标类型
    pub fn decode<T: DeserializeOwned>(&self) -> Result<EventEnvelope<T>> {
        decode_event(&self.payload)
    }
}

/// 从消息属性中读取重投计数头，缺失或类型不符按 0 处理
fn retry_count_from_properties(properties: &BasicProperties) -> u32 {
    let Some(headers) = properties.headers().as_ref() else {
        return 0;
    };
    headers
        .inner()
        .iter()
        .find(|(key, _)| key.as_str() == RETRY_COUNT_HEADER)
        .map(|(_, value)| match value {
            AMQPValue::LongInt(v) => u32::try_from(*v).unwrap_or(0),
            AMQPValue::LongLongInt(v) => u32::try_from(*v).unwrap_or(0),
            AMQPValue::ShortInt(v) => u32::try_from(*v).unwrap_or(0),
            AMQPValue::LongUInt(v) => *v,
            _ => 0,
        })
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// 消息处置
// ---------------------------------------------------------------------------

/// 消息处理结果
///
/// 处理函数只负责分类，确认、重投、死信由消费者统一执行。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// 处理成功，确认消息
    Ack,
    /// 瞬态失败，按计数重投，耗尽后转入死信队列
    Transient { reason: String },
    /// 永久失败，转入死信队列并拒绝，不回队
    Permanent { reason: String },
}

impl Disposition {
    /// 按错误的可重试性分类
    pub fn from_error(err: &OrderFlowError) -> Self {
        if err.is_retryable() {
            Self::Transient {
                reason: err.to_string(),
            }
        } else {
            Self::Permanent {
                reason: err.to_string(),
            }
        }
    }
}

/// 消息处理器
///
/// 实现方持有自己的依赖（仓储、发布器等），返回处置结果而非直接
/// 操作通道。
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &BrokerMessage) -> Disposition;
}

// ---------------------------------------------------------------------------
// AMQP 客户端
// ---------------------------------------------------------------------------

/// AMQP 连接池客户端
///
/// 持有 deadpool 连接池，负责启动期拓扑声明（交换机与死信队列）。
#[derive(Clone)]
pub struct AmqpClient {
    pool: Pool,
    exchange: String,
}

impl AmqpClient {
    /// 建立连接池并声明基础拓扑
    pub async fn connect(config: &AmqpConfig) -> Result<Self> {
        let manager = Manager::new(config.url.clone(), ConnectionProperties::default());
        let pool = Pool::builder(manager)
            .max_size(config.pool_size)
            .build()
            .map_err(|e| OrderFlowError::Pool(e.to_string()))?;

        let client = Self {
            pool,
            exchange: config.exchange.clone(),
        };
        client.declare_topology().await?;

        info!(exchange = %client.exchange, "AMQP 连接池就绪");
        Ok(client)
    }

    /// 交换机名称
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// 从连接池取连接并开启新通道
    pub async fn channel(&self) -> Result<Channel> {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| OrderFlowError::Pool(e.to_string()))?;
        let channel = conn.create_channel().await?;
        Ok(channel)
    }

    /// 健康检查：能开出通道即视为可用
    pub async fn health_check(&self) -> Result<()> {
        let _channel = self.channel().await?;
        Ok(())
    }

    /// 声明持久化 topic 交换机与死信队列
    async fn declare_topology(&self) -> Result<()> {
        let channel = self.channel().await?;

        channel
            .exchange_declare(
                &self.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        channel
            .queue_declare(
                queues::ORDER_DLQ,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_bind(
                queues::ORDER_DLQ,
                &self.exchange,
                routing::ORDER_DLQ,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 事件发布
// ---------------------------------------------------------------------------

/// 事件发布能力
///
/// 业务层只依赖该 trait，不接触通道句柄。
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// 将载荷包入信封后按路由键发布，同步错误直接返回
    async fn publish(&self, routing_key: &str, data: serde_json::Value) -> Result<()>;
}

/// 基于 AMQP 交换机的事件发布器
pub struct AmqpPublisher {
    client: Arc<AmqpClient>,
}

impl AmqpPublisher {
    pub fn new(client: Arc<AmqpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventPublisher for AmqpPublisher {
    async fn publish(&self, routing_key: &str, data: serde_json::Value) -> Result<()> {
        let envelope = EventEnvelope::new(routing_key, data);
        let payload = serde_json::to_vec(&envelope)
            .map_err(|e| OrderFlowError::Internal(e.to_string()))?;

        let channel = self.client.channel().await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;
        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2);

        // 非 mandatory 发布，无绑定队列时消息按路由语义丢弃
        let confirm = channel
            .basic_publish(
                self.client.exchange(),
                routing_key,
                BasicPublishOptions::default(),
                &payload,
                properties,
            )
            .await
            .map_err(|e| OrderFlowError::Publish {
                routing_key: routing_key.to_string(),
                message: e.to_string(),
            })?;
        confirm.await.map_err(|e| OrderFlowError::Publish {
            routing_key: routing_key.to_string(),
            message: e.to_string(),
        })?;

        debug!(routing_key, "事件已发布");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 队列消费
// ---------------------------------------------------------------------------

/// 结算动作，由处置结果与消息的已重投次数推导
///
/// 推导与通道操作解耦，计数边界可独立验证。
#[derive(Debug, Clone, PartialEq, Eq)]
enum SettlePlan {
    /// 确认消息
    Ack,
    /// 带递增计数重投，成功后确认原消息，重投失败则退回队列
    Republish { next_retry: u32, reason: String },
    /// 重投额度耗尽：死信落盘后拒绝，死信失败则退回队列
    Park { reason: String },
    /// 永久失败：尽力死信，无论成败都拒绝且不回队
    Reject { reason: String },
}

fn settle_plan(disposition: Disposition, retry_count: u32, policy: &RetryPolicy) -> SettlePlan {
    match disposition {
        Disposition::Ack => SettlePlan::Ack,
        Disposition::Transient { reason } => {
            if policy.should_retry(retry_count) {
                SettlePlan::Republish {
                    next_retry: retry_count + 1,
                    reason,
                }
            } else {
                SettlePlan::Park { reason }
            }
        }
        Disposition::Permanent { reason } => SettlePlan::Reject { reason },
    }
}

/// 单队列消费者
///
/// `run` 是监督循环：消费循环因通道或连接故障退出后，按指数退避
/// 重启，处理成功会重置退避计数；收到关闭信号则干净退出。
pub struct AmqpConsumer {
    client: Arc<AmqpClient>,
    queue: String,
    routing_key: String,
    consumer_tag: String,
    prefetch: u16,
    policy: RetryPolicy,
}

impl AmqpConsumer {
    pub fn new(
        client: Arc<AmqpClient>,
        queue: impl Into<String>,
        routing_key: impl Into<String>,
        consumer_tag: impl Into<String>,
        prefetch: u16,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            queue: queue.into(),
            routing_key: routing_key.into(),
            consumer_tag: consumer_tag.into(),
            prefetch,
            policy,
        }
    }

    /// 运行消费者直到收到关闭信号
    pub async fn run(&self, handler: Arc<dyn MessageHandler>, mut shutdown: watch::Receiver<bool>) {
        let mut failures: u32 = 0;
        loop {
            if *shutdown.borrow() {
                return;
            }

            match self
                .consume_loop(handler.as_ref(), &mut shutdown, &mut failures)
                .await
            {
                Ok(()) => {
                    info!(queue = %self.queue, "消费者已停止");
                    return;
                }
                Err(e) => {
                    failures += 1;
                    let delay = self.policy.delay_for_attempt(failures);
                    error!(
                        queue = %self.queue,
                        error = %e,
                        failures,
                        delay_ms = delay.as_millis() as u64,
                        "消费循环异常退出，退避后重启"
                    );
                    tokio::select! {
                        biased;
                        _ = shutdown.changed() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// 单轮消费循环，返回 Ok 表示收到关闭信号
    async fn consume_loop(
        &self,
        handler: &dyn MessageHandler,
        shutdown: &mut watch::Receiver<bool>,
        failures: &mut u32,
    ) -> Result<()> {
        let channel = self.client.channel().await?;
        channel
            .basic_qos(self.prefetch, BasicQosOptions::default())
            .await?;
        // 重投与死信发布走同一通道，开启确认模式保证落盘后再 ack 原消息
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;

        channel
            .queue_declare(
                &self.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_bind(
                &self.queue,
                self.client.exchange(),
                &self.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let mut consumer = channel
            .basic_consume(
                &self.queue,
                &self.consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!(
            queue = %self.queue,
            routing_key = %self.routing_key,
            prefetch = self.prefetch,
            "消费者已启动"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    info!(queue = %self.queue, "收到关闭信号，停止消费");
                    return Ok(());
                }
                delivery = consumer.next() => {
                    match delivery {
                        Some(Ok(delivery)) => {
                            let message = BrokerMessage::from_delivery(&delivery);
                            let disposition = handler.handle(&message).await;
                            self.settle(&channel, delivery, &message, disposition).await?;
                            *failures = 0;
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            return Err(OrderFlowError::Internal(format!(
                                "队列 {} 的消费流已断开",
                                self.queue
                            )));
                        }
                    }
                }
            }
        }
    }

    /// 按处置结果落实消息确认
    async fn settle(
        &self,
        channel: &Channel,
        delivery: Delivery,
        message: &BrokerMessage,
        disposition: Disposition,
    ) -> Result<()> {
        match settle_plan(disposition, message.retry_count, &self.policy) {
            SettlePlan::Ack => {
                delivery.ack(BasicAckOptions::default()).await?;
            }
            SettlePlan::Republish { next_retry, reason } => {
                warn!(
                    queue = %self.queue,
                    routing_key = %message.routing_key,
                    retry_count = next_retry,
                    max_retries = self.policy.max_retries,
                    reason = %reason,
                    "瞬态失败，重投消息"
                );
                // 先重投后确认，通道中断时宁可重复不可丢失
                match self.republish(channel, message, next_retry).await {
                    Ok(()) => delivery.ack(BasicAckOptions::default()).await?,
                    Err(e) => {
                        error!(error = %e, "重投失败，消息退回队列");
                        delivery
                            .nack(BasicNackOptions {
                                requeue: true,
                                ..Default::default()
                            })
                            .await?;
                    }
                }
            }
            SettlePlan::Park { reason } => {
                error!(
                    queue = %self.queue,
                    routing_key = %message.routing_key,
                    retry_count = message.retry_count,
                    reason = %reason,
                    "重投次数耗尽，转入死信队列"
                );
                match self.park(channel, message, &reason).await {
                    Ok(()) => {
                        delivery
                            .reject(BasicRejectOptions { requeue: false })
                            .await?
                    }
                    Err(e) => {
                        error!(error = %e, "死信投递失败，消息退回队列");
                        delivery
                            .nack(BasicNackOptions {
                                requeue: true,
                                ..Default::default()
                            })
                            .await?;
                    }
                }
            }
            SettlePlan::Reject { reason } => {
                error!(
                    queue = %self.queue,
                    routing_key = %message.routing_key,
                    reason = %reason,
                    "永久失败，拒绝消息"
                );
                // 永久失败不回队，避免 prefetch=1 下阻塞队列；死信投递尽力而为
                if let Err(e) = self.park(channel, message, &reason).await {
                    error!(
                        error = %e,
                        payload = %message.payload_str(),
                        "死信投递失败，原始消息仅保留在日志中"
                    );
                }
                delivery
                    .reject(BasicRejectOptions { requeue: false })
                    .await?;
            }
        }
        Ok(())
    }

    /// 以递增的重投计数原样重投消息
    async fn republish(
        &self,
        channel: &Channel,
        message: &BrokerMessage,
        next_retry: u32,
    ) -> Result<()> {
        let mut headers = FieldTable::default();
        headers.insert(
            RETRY_COUNT_HEADER.into(),
            AMQPValue::LongInt(next_retry as i32),
        );
        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2)
            .with_headers(headers);

        let confirm = channel
            .basic_publish(
                self.client.exchange(),
                &message.routing_key,
                BasicPublishOptions::default(),
                &message.payload,
                properties,
            )
            .await?;
        confirm.await?;
        Ok(())
    }

    /// 包装为死信消息并发往死信队列
    async fn park(&self, channel: &Channel, message: &BrokerMessage, reason: &str) -> Result<()> {
        let dead_letter = DeadLetterMessage::new(
            message.routing_key.as_str(),
            &message.payload,
            reason,
            message.retry_count,
            self.policy.max_retries,
        );
        let payload = serde_json::to_vec(&dead_letter)
            .map_err(|e| OrderFlowError::Internal(e.to_string()))?;

        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2);
        let confirm = channel
            .basic_publish(
                self.client.exchange(),
                routing::ORDER_DLQ,
                BasicPublishOptions::default(),
                &payload,
                properties,
            )
            .await?;
        confirm.await?;
        Ok(())
    }
}
