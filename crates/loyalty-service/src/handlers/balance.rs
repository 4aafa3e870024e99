//! 余额与提现

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::json_rejection;
use crate::{
    auth::AuthenticatedUser,
    dto::{BalanceResponse, WithdrawRequest, WithdrawalResponse},
    error::LoyaltyServiceError,
    state::AppState,
};

/// GET /api/user/balance
pub async fn get_balance(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<BalanceResponse>, LoyaltyServiceError> {
    let balance = state.balance_service.balance(user.id()).await?;
    Ok(Json(balance.into()))
}

/// 以积分抵扣订单
///
/// POST /api/user/balance/withdraw
pub async fn withdraw(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    payload: Result<Json<WithdrawRequest>, JsonRejection>,
) -> Result<StatusCode, LoyaltyServiceError> {
    let Json(req) = payload.map_err(json_rejection)?;
    state
        .balance_service
        .withdraw(user.id(), &req.order, req.sum)
        .await?;
    Ok(StatusCode::OK)
}

/// GET /api/user/withdrawals
pub async fn list_withdrawals(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Response, LoyaltyServiceError> {
    let withdrawals = state.balance_service.withdrawals(user.id()).await?;
    if withdrawals.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<WithdrawalResponse> = withdrawals
        .into_iter()
        .map(WithdrawalResponse::from)
        .collect();
    Ok(Json(body).into_response())
}
