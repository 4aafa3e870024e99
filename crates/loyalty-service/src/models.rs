//! 会员积分服务领域模型
//!
//! 本地订单是积分计算服务中订单的影子记录，两者通过订单号异步对账，
//! 可能短暂不一致。

use std::fmt;

use chrono::{DateTime, Utc};
use loyalty_shared::Amount;
use serde::{Deserialize, Serialize};

/// 本地订单状态
///
/// PROCESSED 与 INVALID 为终态，进入后不再改变。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocalOrderStatus {
    /// 已提交，积分计算服务尚未受理
    #[default]
    New,
    Processing,
    Processed,
    Invalid,
}

impl LocalOrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Processed | Self::Invalid)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Processing => "PROCESSING",
            Self::Processed => "PROCESSED",
            Self::Invalid => "INVALID",
        }
    }
}

impl fmt::Display for LocalOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 用户提交的订单
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Order {
    pub id: i64,
    pub number: String,
    pub user_id: i64,
    pub status: LocalOrderStatus,
    /// 仅在 PROCESSED 时存在，写入后不再修改
    pub accrual: Option<Amount>,
    pub uploaded_at: DateTime<Utc>,
}

/// 待对账订单
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PendingOrder {
    pub number: String,
    pub user_id: i64,
    pub status: LocalOrderStatus,
}

/// 用户余额
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Balance {
    /// 可用余额，永不为负
    pub current: Amount,
    /// 累计提现
    pub withdrawn: Amount,
}

/// 提现记录
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Withdrawal {
    pub order_number: String,
    pub sum: Amount,
    pub processed_at: DateTime<Utc>,
}
