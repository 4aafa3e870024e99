//! HTTP 处理器

pub mod goods;
pub mod health;
pub mod orders;

use axum::extract::rejection::JsonRejection;

use crate::error::AccrualError;

/// 请求体解析失败（非法 JSON、缺少字段、类型不符）统一按 400 处理
pub(crate) fn json_rejection(rejection: JsonRejection) -> AccrualError {
    AccrualError::Validation(rejection.body_text())
}
