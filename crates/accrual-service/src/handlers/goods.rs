//! 奖励规则登记

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use tracing::info;
use validator::Validate;

use super::json_rejection;
use crate::{dto::RegisterRuleRequest, error::AccrualError, models::RewardRule, state::AppState};

/// 登记奖励规则
///
/// POST /api/goods
pub async fn register_rule(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRuleRequest>, JsonRejection>,
) -> Result<StatusCode, AccrualError> {
    let Json(req) = payload.map_err(json_rejection)?;
    req.validate()?;

    let rule = RewardRule::from(req);
    let rule_id = state.repo.create_rule(&rule).await?;

    info!(
        rule_id,
        pattern = %rule.pattern,
        reward = %rule.reward,
        reward_type = rule.reward_type.tag(),
        "奖励规则已登记"
    );

    Ok(StatusCode::OK)
}
