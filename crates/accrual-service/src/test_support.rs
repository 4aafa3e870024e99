//! 测试用内存仓储

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::error::{AccrualError, Result};
use crate::matcher::AccrualBreakdown;
use crate::models::{AccrualOrder, AccrualStatus, LineItem, PendingOrder, RewardRule};
use crate::repository::AccrualRepository;

#[derive(Default)]
struct Tables {
    orders: Vec<(AccrualOrder, Vec<LineItem>)>,
    rules: Vec<RewardRule>,
}

/// 与 PostgreSQL 实现保持相同状态守卫的内存仓储
#[derive(Default)]
pub struct InMemoryAccrualRepository {
    tables: Mutex<Tables>,
}

impl InMemoryAccrualRepository {
    pub fn status_of(&self, number: &str) -> Option<AccrualStatus> {
        self.tables
            .lock()
            .orders
            .iter()
            .find(|(order, _)| order.number == number)
            .map(|(order, _)| order.status)
    }

    fn set_status(&self, order_id: i64, status: AccrualStatus, allowed: &[AccrualStatus]) -> bool {
        let mut tables = self.tables.lock();
        match tables.orders.iter_mut().find(|(o, _)| o.id == order_id) {
            Some((order, _)) if allowed.contains(&order.status) => {
                order.status = status;
                order.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl AccrualRepository for InMemoryAccrualRepository {
    async fn registered_orders(&self) -> Result<Vec<PendingOrder>> {
        Ok(self
            .tables
            .lock()
            .orders
            .iter()
            .filter(|(o, _)| o.status == AccrualStatus::Registered)
            .map(|(o, _)| PendingOrder {
                id: o.id,
                number: o.number.clone(),
            })
            .collect())
    }

    async fn reward_rules(&self) -> Result<Vec<RewardRule>> {
        Ok(self.tables.lock().rules.clone())
    }

    async fn mark_processing(&self, order_id: i64) -> Result<bool> {
        Ok(self.set_status(
            order_id,
            AccrualStatus::Processing,
            &[AccrualStatus::Registered, AccrualStatus::Processing],
        ))
    }

    async fn mark_invalid(&self, order_id: i64) -> Result<bool> {
        Ok(self.set_status(
            order_id,
            AccrualStatus::Invalid,
            &[AccrualStatus::Registered, AccrualStatus::Processing],
        ))
    }

    async fn order_items(&self, order_id: i64) -> Result<Vec<LineItem>> {
        Ok(self
            .tables
            .lock()
            .orders
            .iter()
            .find(|(o, _)| o.id == order_id)
            .map(|(_, items)| items.clone())
            .unwrap_or_default())
    }

    async fn save_order_points(
        &self,
        order_id: i64,
        breakdown: &AccrualBreakdown,
    ) -> Result<bool> {
        let mut tables = self.tables.lock();
        match tables.orders.iter_mut().find(|(o, _)| o.id == order_id) {
            Some((order, _)) if order.status == AccrualStatus::Processing => {
                order.status = AccrualStatus::Processed;
                order.accrual = Some(breakdown.total);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn requeue_stale(&self, _older_than: Duration) -> Result<u64> {
        Ok(0)
    }

    async fn find_order(&self, number: &str) -> Result<Option<AccrualOrder>> {
        Ok(self
            .tables
            .lock()
            .orders
            .iter()
            .find(|(o, _)| o.number == number)
            .map(|(o, _)| o.clone()))
    }

    async fn create_order(&self, number: &str, goods: &[LineItem]) -> Result<i64> {
        let mut tables = self.tables.lock();
        if tables.orders.iter().any(|(o, _)| o.number == number) {
            return Err(AccrualError::OrderConflict(number.to_string()));
        }
        let id = tables.orders.len() as i64 + 1;
        let now = Utc::now();
        tables.orders.push((
            AccrualOrder {
                id,
                number: number.to_string(),
                status: AccrualStatus::Registered,
                accrual: None,
                uploaded_at: now,
                updated_at: now,
            },
            goods.to_vec(),
        ));
        Ok(id)
    }

    async fn create_rule(&self, rule: &RewardRule) -> Result<i64> {
        let mut tables = self.tables.lock();
        if tables.rules.iter().any(|r| r.pattern == rule.pattern) {
            return Err(AccrualError::RuleConflict(rule.pattern.clone()));
        }
        tables.rules.push(rule.clone());
        Ok(tables.rules.len() as i64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
