//! 订单登记与查询

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::info;
use validator::Validate;

use super::json_rejection;
use crate::{
    dto::{OrderStatusResponse, RegisterOrderRequest},
    error::AccrualError,
    models::LineItem,
    state::AppState,
};

/// 查询订单计算结果
///
/// GET /api/orders/{number}
///
/// 订单未登记时返回 204。
pub async fn get_order(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<Response, AccrualError> {
    match state.repo.find_order(&number).await? {
        Some(order) => Ok(Json(OrderStatusResponse::from(order)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// 登记订单及商品明细
///
/// POST /api/orders
pub async fn register_order(
    State(state): State<AppState>,
    payload: Result<Json<RegisterOrderRequest>, JsonRejection>,
) -> Result<StatusCode, AccrualError> {
    let Json(req) = payload.map_err(json_rejection)?;
    req.validate()?;

    let number = req.order.trim().to_string();
    let goods: Vec<LineItem> = req.goods.into_iter().map(LineItem::from).collect();

    let order_id = state.repo.create_order(&number, &goods).await?;

    info!(order_id, order_number = %number, items = goods.len(), "订单已登记");

    Ok(StatusCode::ACCEPTED)
}
