//! 积分计算引擎领域模型
//!
//! 订单状态同时支持数据库（sqlx）和 JSON（serde）序列化；
//! 奖励类型在线上以 `"%"` / `"pt"` 表示。

use std::fmt;

use chrono::{DateTime, Utc};
use loyalty_shared::Amount;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 订单计算状态
///
/// 状态只会向前推进：REGISTERED → PROCESSING → {PROCESSED, INVALID}
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccrualStatus {
    /// 已登记，等待计算
    #[default]
    Registered,
    /// 计算中
    Processing,
    /// 计算完成，积分已确定
    Processed,
    /// 无法计算
    Invalid,
}

impl AccrualStatus {
    /// 终态不再发生任何转换
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Processed | Self::Invalid)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "REGISTERED",
            Self::Processing => "PROCESSING",
            Self::Processed => "PROCESSED",
            Self::Invalid => "INVALID",
        }
    }
}

impl fmt::Display for AccrualStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 奖励类型
///
/// 未识别的类型原样保留，匹配时贡献为零而不是报错。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RewardKind {
    /// 按商品价格的百分比计算
    Percentage,
    /// 固定积分，与价格无关
    FixedPoints,
    Unknown(String),
}

impl RewardKind {
    pub const PERCENTAGE_TAG: &'static str = "%";
    pub const FIXED_POINTS_TAG: &'static str = "pt";

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            Self::PERCENTAGE_TAG => Self::Percentage,
            Self::FIXED_POINTS_TAG => Self::FixedPoints,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            Self::Percentage => Self::PERCENTAGE_TAG,
            Self::FixedPoints => Self::FIXED_POINTS_TAG,
            Self::Unknown(tag) => tag,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl Serialize for RewardKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

impl<'de> Deserialize<'de> for RewardKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Self::from_tag(&tag))
    }
}

/// 订单商品明细，创建后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LineItem {
    pub description: String,
    pub price: Amount,
}

impl LineItem {
    pub fn new(description: impl Into<String>, price: Amount) -> Self {
        Self {
            description: description.into(),
            price,
        }
    }
}

/// 奖励规则
///
/// `pattern` 在商品描述中做区分大小写的子串匹配。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRule {
    #[serde(rename = "match")]
    pub pattern: String,
    pub reward: Amount,
    pub reward_type: RewardKind,
}

impl RewardRule {
    pub fn percentage(pattern: impl Into<String>, percent: Amount) -> Self {
        Self {
            pattern: pattern.into(),
            reward: percent,
            reward_type: RewardKind::Percentage,
        }
    }

    pub fn fixed_points(pattern: impl Into<String>, points: Amount) -> Self {
        Self {
            pattern: pattern.into(),
            reward: points,
            reward_type: RewardKind::FixedPoints,
        }
    }
}

/// 积分计算引擎中的订单
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AccrualOrder {
    pub id: i64,
    pub number: String,
    pub status: AccrualStatus,
    /// 仅在 PROCESSED 时存在
    pub accrual: Option<Amount>,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 待计算订单（处理循环只需要 id 和订单号）
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PendingOrder {
    pub id: i64,
    pub number: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reward_kind_tags() {
        assert_eq!(RewardKind::from_tag("%"), RewardKind::Percentage);
        assert_eq!(RewardKind::from_tag("pt"), RewardKind::FixedPoints);
        assert_eq!(
            RewardKind::from_tag("bonus"),
            RewardKind::Unknown("bonus".to_string())
        );
        assert!(!RewardKind::from_tag("PT").is_known());
    }

    #[test]
    fn test_reward_rule_wire_format() {
        let rule: RewardRule =
            serde_json::from_str(r#"{"match":"Bork","reward":10,"reward_type":"%"}"#).unwrap();
        assert_eq!(rule, RewardRule::percentage("Bork", Amount::from_units(10)));

        let json = serde_json::to_value(RewardRule::fixed_points("Acme", Amount::from_units(5)))
            .unwrap();
        assert_eq!(json["match"], "Acme");
        assert_eq!(json["reward_type"], "pt");
    }

    #[test]
    fn test_status_terminal() {
        assert!(!AccrualStatus::Registered.is_terminal());
        assert!(!AccrualStatus::Processing.is_terminal());
        assert!(AccrualStatus::Processed.is_terminal());
        assert!(AccrualStatus::Invalid.is_terminal());
        assert_eq!(
            serde_json::to_string(&AccrualStatus::Processed).unwrap(),
            "\"PROCESSED\""
        );
    }
}
