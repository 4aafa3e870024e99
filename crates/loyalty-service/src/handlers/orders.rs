//! 订单提交与查询

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    auth::AuthenticatedUser,
    dto::OrderResponse,
    error::LoyaltyServiceError,
    service::SubmitOutcome,
    state::AppState,
};

/// 提交订单号（纯文本请求体）
///
/// POST /api/user/orders
///
/// 新订单返回 202，同一用户重复提交返回 200。
pub async fn submit_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    body: String,
) -> Result<StatusCode, LoyaltyServiceError> {
    match state.order_service.submit(user.id(), &body).await? {
        SubmitOutcome::Accepted => Ok(StatusCode::ACCEPTED),
        SubmitOutcome::AlreadySubmitted => Ok(StatusCode::OK),
    }
}

/// 当前用户的订单
///
/// GET /api/user/orders
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Response, LoyaltyServiceError> {
    let orders = state.order_service.list(user.id()).await?;
    if orders.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<OrderResponse> = orders.into_iter().map(OrderResponse::from).collect();
    Ok(Json(body).into_response())
}
