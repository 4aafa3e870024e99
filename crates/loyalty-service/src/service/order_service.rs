//! 订单提交服务
//!
//! 提交只负责登记本地订单（NEW），积分结果由对账 Worker 异步同步。

use std::sync::Arc;

use loyalty_shared::OrderNumberValidator;
use tracing::info;

use crate::error::{LoyaltyServiceError, Result};
use crate::models::Order;
use crate::repository::{InsertOutcome, OrderRepository};

/// 提交结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// 新订单已受理
    Accepted,
    /// 同一用户重复提交
    AlreadySubmitted,
}

pub struct OrderService {
    repo: Arc<dyn OrderRepository>,
    validator: OrderNumberValidator,
}

impl OrderService {
    pub fn new(repo: Arc<dyn OrderRepository>, validator: OrderNumberValidator) -> Self {
        Self { repo, validator }
    }

    /// 提交订单号
    pub async fn submit(&self, user_id: i64, number: &str) -> Result<SubmitOutcome> {
        let number = number.trim();
        if !self.validator.is_valid(number) {
            return Err(LoyaltyServiceError::InvalidOrderNumber(number.to_string()));
        }

        match self.repo.insert_new(user_id, number).await? {
            InsertOutcome::Inserted => {
                info!(user_id, order_number = %number, "订单已提交");
                Ok(SubmitOutcome::Accepted)
            }
            InsertOutcome::Existing { owner_id } if owner_id == user_id => {
                Ok(SubmitOutcome::AlreadySubmitted)
            }
            InsertOutcome::Existing { .. } => Err(LoyaltyServiceError::OrderOwnedByAnotherUser(
                number.to_string(),
            )),
        }
    }

    pub async fn list(&self, user_id: i64) -> Result<Vec<Order>> {
        self.repo.list_by_user(user_id).await
    }

    pub async fn ping(&self) -> Result<()> {
        self.repo.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockOrderRepository;
    use loyalty_shared::OrderNumberPolicy;
    use mockall::predicate::eq;

    fn service(mock: MockOrderRepository) -> OrderService {
        OrderService::new(
            Arc::new(mock),
            OrderNumberValidator::new(OrderNumberPolicy::Luhn),
        )
    }

    #[tokio::test]
    async fn test_submit_new_order() {
        let mut mock = MockOrderRepository::new();
        mock.expect_insert_new()
            .with(eq(1), eq("2377225624"))
            .times(1)
            .returning(|_, _| Ok(InsertOutcome::Inserted));

        let outcome = service(mock).submit(1, " 2377225624\n").await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Accepted);
    }

    #[tokio::test]
    async fn test_resubmit_by_same_user() {
        let mut mock = MockOrderRepository::new();
        mock.expect_insert_new()
            .returning(|_, _| Ok(InsertOutcome::Existing { owner_id: 1 }));

        let outcome = service(mock).submit(1, "2377225624").await.unwrap();

        assert_eq!(outcome, SubmitOutcome::AlreadySubmitted);
    }

    #[tokio::test]
    async fn test_submit_by_another_user_conflicts() {
        let mut mock = MockOrderRepository::new();
        mock.expect_insert_new()
            .returning(|_, _| Ok(InsertOutcome::Existing { owner_id: 2 }));

        let err = service(mock).submit(1, "2377225624").await.unwrap_err();

        assert!(matches!(err, LoyaltyServiceError::OrderOwnedByAnotherUser(n) if n == "2377225624"));
    }

    #[tokio::test]
    async fn test_invalid_number_never_reaches_repository() {
        let mut mock = MockOrderRepository::new();
        mock.expect_insert_new().never();

        let err = service(mock).submit(1, "2377225625").await.unwrap_err();

        assert!(matches!(err, LoyaltyServiceError::InvalidOrderNumber(_)));
    }

    #[tokio::test]
    async fn test_digits_policy() {
        let mut mock = MockOrderRepository::new();
        mock.expect_insert_new()
            .returning(|_, _| Ok(InsertOutcome::Inserted));
        let service = OrderService::new(
            Arc::new(mock),
            OrderNumberValidator::new(OrderNumberPolicy::Digits { min: 5, max: 12 }),
        );

        // Luhn 校验失败，但满足纯数字长度策略
        assert_eq!(
            service.submit(1, "2377225625").await.unwrap(),
            SubmitOutcome::Accepted
        );
        assert!(service.submit(1, "1234").await.is_err());
    }
}
