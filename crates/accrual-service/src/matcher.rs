//! 奖励规则匹配
//!
//! 纯函数：给定商品明细与规则集，计算每个商品的积分和订单总积分。
//! 规则在商品描述中做子串匹配，一个商品可以命中多条规则，各规则贡献累加。

use loyalty_shared::Amount;

use crate::models::{LineItem, RewardKind, RewardRule};

/// 匹配结果
///
/// `per_item` 与输入商品一一对应，`total` 为其总和。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccrualBreakdown {
    pub per_item: Vec<Amount>,
    pub total: Amount,
}

/// 积分计算结果超出金额可表示范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("积分计算溢出")]
pub struct AccrualOverflow;

/// 计算单条规则对单个商品的贡献（未命中为零）
pub fn rule_contribution(
    item: &LineItem,
    rule: &RewardRule,
) -> Result<Amount, AccrualOverflow> {
    if !item.description.contains(rule.pattern.as_str()) {
        return Ok(Amount::ZERO);
    }

    match &rule.reward_type {
        RewardKind::Percentage => item.price.percent_of(rule.reward).ok_or(AccrualOverflow),
        RewardKind::FixedPoints => Ok(rule.reward),
        RewardKind::Unknown(_) => Ok(Amount::ZERO),
    }
}

/// 为所有商品匹配规则
///
/// 任一商品或总额溢出时整体失败，调用方应将订单判为无效。
pub fn match_rules(
    items: &[LineItem],
    rules: &[RewardRule],
) -> Result<AccrualBreakdown, AccrualOverflow> {
    let per_item = items
        .iter()
        .map(|item| {
            rules.iter().try_fold(Amount::ZERO, |acc, rule| {
                acc.checked_add(rule_contribution(item, rule)?)
                    .ok_or(AccrualOverflow)
            })
        })
        .collect::<Result<Vec<Amount>, _>>()?;
    let total = Amount::checked_sum(per_item.iter().copied()).ok_or(AccrualOverflow)?;

    Ok(AccrualBreakdown { per_item, total })
}
