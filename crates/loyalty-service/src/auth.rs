//! 用户身份提取
//!
//! 注册、登录与令牌签发由上游认证网关负责，网关验证令牌后
//! 通过 `X-User-Id` 请求头注入用户 ID。

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::LoyaltyServiceError;

/// 认证网关注入的用户 ID 请求头
pub const USER_ID_HEADER: &str = "x-user-id";

/// 已认证用户
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub i64);

impl AuthenticatedUser {
    pub fn id(self) -> i64 {
        self.0
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = LoyaltyServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(AuthenticatedUser)
            .ok_or(LoyaltyServiceError::Unauthorized)
    }
}
