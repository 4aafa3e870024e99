//! HTTP 处理器
//!
//! 所有 `/api/user` 接口都通过 `AuthenticatedUser` 提取用户身份，缺失时返回 401。

pub mod balance;
pub mod health;
pub mod orders;

use axum::extract::rejection::JsonRejection;

use crate::error::LoyaltyServiceError;

/// 请求体解析失败统一按 400 处理
pub(crate) fn json_rejection(rejection: JsonRejection) -> LoyaltyServiceError {
    LoyaltyServiceError::Validation(rejection.body_text())
}
