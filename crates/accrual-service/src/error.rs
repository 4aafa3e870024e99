//! 积分计算引擎错误类型定义

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// 积分计算引擎错误类型
#[derive(Debug, thiserror::Error)]
pub enum AccrualError {
    // 验证错误
    #[error("参数验证失败: {0}")]
    Validation(String),

    // 冲突
    #[error("订单已登记: {0}")]
    OrderConflict(String),
    #[error("奖励规则已存在: {0}")]
    RuleConflict(String),

    // 数据错误
    #[error("订单 {order_id} 的商品明细与计算结果不一致: 明细 {items} 条，结果 {computed} 条")]
    ItemCountMismatch {
        order_id: i64,
        items: usize,
        computed: usize,
    },

    // 系统错误
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("内部错误: {0}")]
    Internal(String),
}

impl AccrualError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::OrderConflict(_) | Self::RuleConflict(_) => StatusCode::CONFLICT,
            Self::ItemCountMismatch { .. } | Self::Database(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::OrderConflict(_) => "ORDER_ALREADY_REGISTERED",
            Self::RuleConflict(_) => "RULE_ALREADY_EXISTS",
            Self::ItemCountMismatch { .. } => "ITEM_COUNT_MISMATCH",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AccrualError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "数据库操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::ItemCountMismatch { .. } | Self::Internal(_) => {
                tracing::error!(error = %self, "内部错误");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for AccrualError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl From<loyalty_shared::error::LoyaltyError> for AccrualError {
    fn from(err: loyalty_shared::error::LoyaltyError) -> Self {
        match err {
            loyalty_shared::error::LoyaltyError::Database(e) => Self::Database(e),
            loyalty_shared::error::LoyaltyError::Validation(msg) => Self::Validation(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, AccrualError>;
