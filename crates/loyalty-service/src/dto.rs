//! 请求与响应 DTO 定义

use chrono::{DateTime, Utc};
use loyalty_shared::Amount;
use serde::{Deserialize, Serialize};

use crate::models::{Balance, LocalOrderStatus, Order, Withdrawal};

/// 提现请求
#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    /// 抵扣的订单号
    pub order: String,
    pub sum: Amount,
}

/// 订单列表项
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderResponse {
    pub number: String,
    pub status: LocalOrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Amount>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            number: order.number,
            status: order.status,
            accrual: order.accrual,
            uploaded_at: order.uploaded_at,
        }
    }
}

/// 余额
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceResponse {
    pub current: Amount,
    pub withdrawn: Amount,
}

impl From<Balance> for BalanceResponse {
    fn from(balance: Balance) -> Self {
        Self {
            current: balance.current,
            withdrawn: balance.withdrawn,
        }
    }
}

/// 提现记录
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WithdrawalResponse {
    pub order: String,
    pub sum: Amount,
    pub processed_at: DateTime<Utc>,
}

impl From<Withdrawal> for WithdrawalResponse {
    fn from(w: Withdrawal) -> Self {
        Self {
            order: w.order_number,
            sum: w.sum,
            processed_at: w.processed_at,
        }
    }
}
