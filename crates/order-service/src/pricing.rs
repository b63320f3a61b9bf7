//! 商品定价客户端
//!
//! 订单创建时向商品服务查询当前单价。网络不可达、超时与非成功
//! 状态码按上游不可用（瞬态）处理；响应成功但缺少数值 price 字段
//! 按上游数据错误（永久）处理，两者的重试语义不同。

use std::time::Duration;

use async_trait::async_trait;
use orderflow_shared::config::PricingConfig;
use orderflow_shared::error::{OrderFlowError, Result};

const PRICING_SERVICE: &str = "product-service";

/// 商品定价查询接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PricingClient: Send + Sync {
    /// 查询商品当前单价
    async fn fetch_price(&self, product_id: i64) -> Result<f64>;
}

/// 基于 HTTP 的定价客户端
pub struct HttpPricingClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPricingClient {
    pub fn new(config: &PricingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| OrderFlowError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PricingClient for HttpPricingClient {
    async fn fetch_price(&self, product_id: i64) -> Result<f64> {
        let url = format!("{}/products/{}", self.base_url, product_id);

        let response =
            self.client
                .get(&url)
                .send()
                .await
                .map_err(|e| OrderFlowError::UpstreamUnavailable {
                    service: PRICING_SERVICE.to_string(),
                    message: e.to_string(),
                })?;

        if !response.status().is_success() {
            return Err(OrderFlowError::UpstreamUnavailable {
                service: PRICING_SERVICE.to_string(),
                message: format!("GET {} 返回 {}", url, response.status()),
            });
        }

        let body: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| OrderFlowError::UpstreamUnavailable {
                    service: PRICING_SERVICE.to_string(),
                    message: e.to_string(),
                })?;

        body.get("price")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| OrderFlowError::UpstreamData {
                service: PRICING_SERVICE.to_string(),
                message: format!("商品 {} 的响应缺少数值 price 字段", product_id),
            })
    }
}
