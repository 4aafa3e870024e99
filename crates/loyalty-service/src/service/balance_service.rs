//! 余额与提现服务

use std::sync::Arc;

use loyalty_shared::{Amount, OrderNumberValidator};
use tracing::{info, warn};

use crate::error::{LoyaltyServiceError, Result};
use crate::models::{Balance, Withdrawal};
use crate::repository::BalanceRepository;

pub struct BalanceService {
    repo: Arc<dyn BalanceRepository>,
    validator: OrderNumberValidator,
}

impl BalanceService {
    pub fn new(repo: Arc<dyn BalanceRepository>, validator: OrderNumberValidator) -> Self {
        Self { repo, validator }
    }

    pub async fn balance(&self, user_id: i64) -> Result<Balance> {
        self.repo.balance(user_id).await
    }

    /// 以积分抵扣订单
    ///
    /// 订单号与提交订单使用同一校验策略；余额不足返回 `InsufficientFunds`。
    pub async fn withdraw(&self, user_id: i64, order_number: &str, sum: Amount) -> Result<()> {
        let order_number = order_number.trim();
        if !self.validator.is_valid(order_number) {
            return Err(LoyaltyServiceError::InvalidOrderNumber(
                order_number.to_string(),
            ));
        }
        if !sum.is_positive() {
            return Err(LoyaltyServiceError::Validation(
                "提现金额必须大于 0".to_string(),
            ));
        }

        if !self.repo.withdraw(user_id, order_number, sum).await? {
            warn!(user_id, order_number, sum = %sum, "余额不足，提现被拒绝");
            return Err(LoyaltyServiceError::InsufficientFunds);
        }

        info!(user_id, order_number, sum = %sum, "提现成功");
        Ok(())
    }

    pub async fn withdrawals(&self, user_id: i64) -> Result<Vec<Withdrawal>> {
        self.repo.withdrawals(user_id).await
    }
}
