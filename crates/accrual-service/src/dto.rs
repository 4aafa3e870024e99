//! 请求与响应 DTO 定义

use loyalty_shared::Amount;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::{AccrualOrder, AccrualStatus, LineItem, RewardKind, RewardRule};

/// 商品价格与规则奖励值的上限
pub const MAX_AMOUNT: Amount = Amount::from_units(1_000_000_000);

/// 登记订单请求
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterOrderRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub order: String,
    #[validate(custom(function = "validate_goods"))]
    pub goods: Vec<GoodsItemRequest>,
}

/// 订单中的一件商品
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct GoodsItemRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub description: String,
    #[validate(custom(function = "validate_amount"))]
    pub price: Amount,
}

impl From<GoodsItemRequest> for LineItem {
    fn from(req: GoodsItemRequest) -> Self {
        LineItem::new(req.description, req.price)
    }
}

/// 登记奖励规则请求
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRuleRequest {
    #[serde(rename = "match")]
    #[validate(custom(function = "validate_not_blank"))]
    pub pattern: String,
    #[validate(custom(function = "validate_amount"))]
    pub reward: Amount,
    #[validate(custom(function = "validate_reward_kind"))]
    pub reward_type: RewardKind,
}

impl From<RegisterRuleRequest> for RewardRule {
    fn from(req: RegisterRuleRequest) -> Self {
        RewardRule {
            pattern: req.pattern,
            reward: req.reward,
            reward_type: req.reward_type,
        }
    }
}

/// 订单计算结果
///
/// `accrual` 在订单 PROCESSED 之前不出现在响应中。
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderStatusResponse {
    pub order: String,
    pub status: AccrualStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Amount>,
}

impl From<AccrualOrder> for OrderStatusResponse {
    fn from(order: AccrualOrder) -> Self {
        let accrual = match order.status {
            AccrualStatus::Processed => order.accrual,
            _ => None,
        };
        Self {
            order: order.number,
            status: order.status,
            accrual,
        }
    }
}

fn validation_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(validation_error("blank", "不能为空"));
    }
    Ok(())
}

fn validate_amount(value: &Amount) -> Result<(), ValidationError> {
    if !value.is_positive() {
        return Err(validation_error("not_positive", "必须大于 0"));
    }
    if *value > MAX_AMOUNT {
        return Err(validation_error("too_large", "不能超过 1000000000"));
    }
    Ok(())
}

fn validate_reward_kind(value: &RewardKind) -> Result<(), ValidationError> {
    if !value.is_known() {
        return Err(validation_error("unknown_reward_type", "奖励类型只能是 % 或 pt"));
    }
    Ok(())
}

fn validate_goods(goods: &[GoodsItemRequest]) -> Result<(), ValidationError> {
    if goods.is_empty() {
        return Err(validation_error("no_goods", "订单至少包含一件商品"));
    }
    if goods.iter().any(|item| item.validate().is_err()) {
        return Err(validation_error("invalid_goods", "商品描述不能为空且价格必须在 (0, 1000000000] 之间"));
    }
    Ok(())
}
