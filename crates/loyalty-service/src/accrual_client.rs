//! 积分计算服务客户端
//!
//! 每次调用都经过熔断器：熔断器拒绝时返回 `Unavailable`，与"订单尚无结果"严格区分。
//! 上游 204 表示订单已存在但尚无最终结果，在熔断器内按成功计数。

use async_trait::async_trait;
use loyalty_shared::Amount;
use loyalty_shared::circuit_breaker::{CircuitBreaker, CircuitBreakerError};
use loyalty_shared::config::AccrualClientConfig;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::models::LocalOrderStatus;

/// 积分计算服务中的订单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpstreamStatus {
    Registered,
    Processing,
    Processed,
    Invalid,
}

impl From<UpstreamStatus> for LocalOrderStatus {
    fn from(status: UpstreamStatus) -> Self {
        match status {
            UpstreamStatus::Registered => LocalOrderStatus::New,
            UpstreamStatus::Processing => LocalOrderStatus::Processing,
            UpstreamStatus::Processed => LocalOrderStatus::Processed,
            UpstreamStatus::Invalid => LocalOrderStatus::Invalid,
        }
    }
}

/// 积分计算结果
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccrualInfo {
    pub order: String,
    pub status: UpstreamStatus,
    #[serde(default)]
    pub accrual: Option<Amount>,
}

/// 查询结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccrualLookup {
    Known(AccrualInfo),
    /// 上游返回 204，稍后重试
    NotYetKnown,
}

/// 客户端错误，全部可在下一轮重试
#[derive(Debug, thiserror::Error)]
pub enum AccrualClientError {
    #[error("积分计算服务不可用: 熔断器 {name} 拒绝请求")]
    Unavailable { name: String },
    #[error("请求积分计算服务失败: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("积分计算服务返回非预期状态码: {0}")]
    UnexpectedStatus(u16),
    #[error("解析积分计算服务响应失败: {0}")]
    Decode(String),
}

impl AccrualClientError {
    /// 熔断器直接拒绝，未发出请求
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// 积分查询接口，对账 Worker 依赖该抽象
#[async_trait]
pub trait AccrualLookupService: Send + Sync {
    async fn get_accrual_info(&self, number: &str) -> Result<AccrualLookup, AccrualClientError>;
}

/// 基于 reqwest 的积分计算服务客户端
pub struct AccrualClient {
    http: reqwest::Client,
    base_url: String,
    breaker: CircuitBreaker,
}

impl AccrualClient {
    /// 熔断器名称，用于日志和指标标签
    pub const BREAKER_NAME: &'static str = "accrual-service";

    pub fn new(config: &AccrualClientConfig) -> Result<Self, AccrualClientError> {
        // 单次请求超时独立于熔断器冷却；超时计为一次失败
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            breaker: CircuitBreaker::new(config.breaker_config(Self::BREAKER_NAME)),
        })
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    async fn fetch(&self, number: &str) -> Result<AccrualLookup, AccrualClientError> {
        let url = format!("{}/api/orders/{}", self.base_url, number);
        let response = self.http.get(&url).send().await?;

        match response.status() {
            StatusCode::OK => {
                let info = response
                    .json::<AccrualInfo>()
                    .await
                    .map_err(|e| AccrualClientError::Decode(e.to_string()))?;
                Ok(AccrualLookup::Known(info))
            }
            StatusCode::NO_CONTENT => Ok(AccrualLookup::NotYetKnown),
            other => Err(AccrualClientError::UnexpectedStatus(other.as_u16())),
        }
    }
}

#[async_trait]
impl AccrualLookupService for AccrualClient {
    #[instrument(skip(self), fields(breaker = %self.breaker.state()))]
    async fn get_accrual_info(&self, number: &str) -> Result<AccrualLookup, AccrualClientError> {
        let result = self
            .breaker
            .call(|| self.fetch(number))
            .await
            .map_err(|e| match e {
                CircuitBreakerError::Open { name }
                | CircuitBreakerError::TooManyTrialRequests { name } => {
                    AccrualClientError::Unavailable { name }
                }
                CircuitBreakerError::ServiceError(e) => e,
            });

        if let Ok(lookup) = &result {
            debug!(order_number = number, ?lookup, "积分计算服务响应");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            LocalOrderStatus::from(UpstreamStatus::Registered),
            LocalOrderStatus::New
        );
        assert_eq!(
            LocalOrderStatus::from(UpstreamStatus::Processing),
            LocalOrderStatus::Processing
        );
        assert_eq!(
            LocalOrderStatus::from(UpstreamStatus::Processed),
            LocalOrderStatus::Processed
        );
        assert_eq!(
            LocalOrderStatus::from(UpstreamStatus::Invalid),
            LocalOrderStatus::Invalid
        );
    }

    #[test]
    fn test_accrual_info_wire_format() {
        let info: AccrualInfo =
            serde_json::from_str(r#"{"order":"2377225624","status":"PROCESSED","accrual":729.98}"#)
                .unwrap();
        assert_eq!(info.status, UpstreamStatus::Processed);
        assert_eq!(info.accrual, Some(Amount::from_minor(72_998)));

        let pending: AccrualInfo =
            serde_json::from_str(r#"{"order":"2377225624","status":"REGISTERED"}"#).unwrap();
        assert_eq!(pending.accrual, None);
    }
}
