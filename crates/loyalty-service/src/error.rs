//! 会员积分服务错误类型定义

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// 会员积分服务错误类型
#[derive(Debug, thiserror::Error)]
pub enum LoyaltyServiceError {
    // 认证错误
    #[error("未授权: 缺少有效的用户身份")]
    Unauthorized,

    // 验证错误
    #[error("订单号格式错误: {0}")]
    InvalidOrderNumber(String),
    #[error("参数验证失败: {0}")]
    Validation(String),

    // 业务错误
    #[error("订单 {0} 已被其他用户提交")]
    OrderOwnedByAnotherUser(String),
    #[error("余额不足")]
    InsufficientFunds,

    // 系统错误
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("内部错误: {0}")]
    Internal(String),
}

impl LoyaltyServiceError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InvalidOrderNumber(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::OrderOwnedByAnotherUser(_) => StatusCode::CONFLICT,
            Self::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidOrderNumber(_) => "INVALID_ORDER_NUMBER",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::OrderOwnedByAnotherUser(_) => "ORDER_OWNED_BY_ANOTHER_USER",
            Self::InsufficientFunds => "INSUFFICIENT_FUNDS",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for LoyaltyServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "数据库操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "内部错误");
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

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, LoyaltyServiceError>;
