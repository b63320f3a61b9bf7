//! 死信消息模块
//!
//! 重投耗尽或永久失败的消息不直接丢弃，而是包装成死信消息发往
//! 死信队列，保留原始载荷与失败原因供人工排查。死信队列只停靠
//! 不消费，处置由运维侧决定。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 死信消息
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterMessage {
    /// 死信唯一标识
    pub message_id: Uuid,
    /// 原始消息的路由键
    pub source_routing_key: String,
    /// 原始消息体（非 UTF-8 字节按替换字符保留）
    pub payload: String,
    /// 失败原因
    pub error: String,
    /// 已重投次数
    pub retry_count: u32,
    /// 重投上限
    pub max_retries: u32,
    /// 进入死信的时间
    pub failed_at: DateTime<Utc>,
}

impl DeadLetterMessage {
    /// 由失败消息构建死信
    pub fn new(
        source_routing_key: impl Into<String>,
        payload: &[u8],
        error: impl Into<String>,
        retry_count: u32,
        max_retries: u32,
    ) -> Self {
        Self {
            message_id: Uuid::now_v7(),
            source_routing_key: source_routing_key.into(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            error: error.into(),
            retry_count,
            max_retries,
            failed_at: Utc::now(),
        }
    }
}
