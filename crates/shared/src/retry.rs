//! 重试策略模块
//!
//! 提供指数退避的重试策略。消费者崩溃后的重启退避与单条消息的
//! 重投上限都由同一个策略描述：`max_retries` 约束消息重投次数，
//! 退避参数约束重启间隔（重启本身不设上限）。

use std::time::Duration;

/// 重试策略配置
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 单条消息的最大重投次数
    pub max_retries: u32,
    /// 初始退避时间
    pub initial_backoff: Duration,
    /// 最大退避时间
    pub max_backoff: Duration,
    /// 退避倍数
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// 已重投 `retry_count` 次的消息是否还允许再投一次
    pub fn should_retry(&self, retry_count: u32) -> bool {
        retry_count < self.max_retries
    }

    /// 计算第 `attempt` 次连续失败后的退避时间（attempt 从 1 开始）
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let delay_ms =
            self.initial_backoff.as_millis() as f64 * self.multiplier.powi(exp as i32);
        let capped_ms = delay_ms.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }
}
