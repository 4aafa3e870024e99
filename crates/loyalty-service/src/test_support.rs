//! 测试用内存存储与可编排的积分查询

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use loyalty_shared::Amount;
use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;

use crate::accrual_client::{
    AccrualClientError, AccrualInfo, AccrualLookup, AccrualLookupService, UpstreamStatus,
};
use crate::error::{LoyaltyServiceError, Result};
use crate::models::{Balance, LocalOrderStatus, Order, PendingOrder, Withdrawal};
use crate::repository::{
    BalanceRepository, InsertOutcome, OrderRepository, ReconcileStore, ReconcileTx,
};

#[derive(Default)]
struct Tables {
    orders: Vec<Order>,
    balances: HashMap<i64, Balance>,
    withdrawals: Vec<(i64, Withdrawal)>,
}

impl Tables {
    fn order_mut(&mut self, number: &str) -> Option<&mut Order> {
        self.orders.iter_mut().find(|o| o.number == number)
    }

    fn order(&self, number: &str) -> Option<&Order> {
        self.orders.iter().find(|o| o.number == number)
    }
}

/// 与 PostgreSQL 实现保持相同守卫的内存存储
///
/// 对账事务持有一把独占锁直到提交或 drop，对应数据库中的行锁；
/// 事务内的写入暂存，提交时才对其他读者可见。
#[derive(Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    tx_lock: Arc<tokio::sync::Mutex<()>>,
    fail_commit: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn seed_order(&self, user_id: i64, number: &str, status: LocalOrderStatus) {
        let mut tables = self.tables.lock();
        let id = tables.orders.len() as i64 + 1;
        tables.orders.push(Order {
            id,
            number: number.to_string(),
            user_id,
            status,
            accrual: None,
            uploaded_at: Utc::now(),
        });
    }

    pub fn seed_balance(&self, user_id: i64, current: Amount) {
        self.tables.lock().balances.insert(
            user_id,
            Balance {
                current,
                withdrawn: Amount::ZERO,
            },
        );
    }

    pub fn order_status(&self, number: &str) -> Option<LocalOrderStatus> {
        self.tables.lock().order(number).map(|o| o.status)
    }

    pub fn order_accrual(&self, number: &str) -> Option<Amount> {
        self.tables.lock().order(number).and_then(|o| o.accrual)
    }

    pub fn current_balance(&self, user_id: i64) -> Amount {
        self.tables
            .lock()
            .balances
            .get(&user_id)
            .map(|b| b.current)
            .unwrap_or_default()
    }

    pub fn pending_numbers(&self) -> Vec<String> {
        self.tables
            .lock()
            .orders
            .iter()
            .filter(|o| !o.status.is_terminal())
            .map(|o| o.number.clone())
            .collect()
    }

    /// 下一次提交失败（整轮回滚）
    pub fn fail_next_commit(&self) {
        self.fail_commit.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert_new(&self, user_id: i64, number: &str) -> Result<InsertOutcome> {
        if let Some(existing) = self.tables.lock().order(number) {
            return Ok(InsertOutcome::Existing {
                owner_id: existing.user_id,
            });
        }
        self.seed_order(user_id, number, LocalOrderStatus::New);
        Ok(InsertOutcome::Inserted)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Order>> {
        Ok(self
            .tables
            .lock()
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl BalanceRepository for InMemoryStore {
    async fn balance(&self, user_id: i64) -> Result<Balance> {
        Ok(self
            .tables
            .lock()
            .balances
            .get(&user_id)
            .copied()
            .unwrap_or_default())
    }

    async fn withdraw(&self, user_id: i64, order_number: &str, sum: Amount) -> Result<bool> {
        let mut tables = self.tables.lock();
        let balance = tables.balances.entry(user_id).or_default();
        if balance.current < sum {
            return Ok(false);
        }
        balance.current -= sum;
        balance.withdrawn += sum;
        tables.withdrawals.push((
            user_id,
            Withdrawal {
                order_number: order_number.to_string(),
                sum,
                processed_at: Utc::now(),
            },
        ));
        Ok(true)
    }

    async fn withdrawals(&self, user_id: i64) -> Result<Vec<Withdrawal>> {
        Ok(self
            .tables
            .lock()
            .withdrawals
            .iter()
            .filter(|(owner, _)| *owner == user_id)
            .map(|(_, w)| w.clone())
            .collect())
    }
}

#[async_trait]
impl ReconcileStore for InMemoryStore {
    async fn pending_orders(&self) -> Result<Vec<PendingOrder>> {
        Ok(self
            .tables
            .lock()
            .orders
            .iter()
            .filter(|o| !o.status.is_terminal())
            .map(|o| PendingOrder {
                number: o.number.clone(),
                user_id: o.user_id,
                status: o.status,
            })
            .collect())
    }

    async fn begin(&self) -> Result<Box<dyn ReconcileTx>> {
        let guard = self.tx_lock.clone().lock_owned().await;
        Ok(Box::new(InMemoryTx {
            _guard: guard,
            tables: self.tables.clone(),
            fail_commit: self.fail_commit.clone(),
            updates: HashMap::new(),
            credits: Vec::new(),
        }))
    }
}

struct InMemoryTx {
    _guard: OwnedMutexGuard<()>,
    tables: Arc<Mutex<Tables>>,
    fail_commit: Arc<AtomicBool>,
    updates: HashMap<String, (LocalOrderStatus, Option<Amount>)>,
    credits: Vec<(i64, Amount)>,
}

#[async_trait]
impl ReconcileTx for InMemoryTx {
    async fn apply_result(
        &mut self,
        number: &str,
        status: LocalOrderStatus,
        accrual: Option<Amount>,
    ) -> Result<bool> {
        let current = match self.updates.get(number) {
            Some((staged, _)) => Some(*staged),
            None => self.tables.lock().order(number).map(|o| o.status),
        };

        match current {
            Some(s) if !s.is_terminal() => {
                self.updates.insert(number.to_string(), (status, accrual));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn credit(&mut self, user_id: i64, amount: Amount) -> Result<()> {
        self.credits.push((user_id, amount));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        if self.fail_commit.swap(false, Ordering::SeqCst) {
            return Err(LoyaltyServiceError::Internal("模拟提交失败".to_string()));
        }

        let mut tables = self.tables.lock();
        for (number, (status, accrual)) in &self.updates {
            if let Some(order) = tables.order_mut(number) {
                order.status = *status;
                order.accrual = *accrual;
            }
        }
        for (user_id, amount) in &self.credits {
            tables.balances.entry(*user_id).or_default().current += *amount;
        }
        Ok(())
    }
}

/// 可编排的积分计算服务响应
#[derive(Debug, Clone)]
pub enum Scripted {
    Known {
        status: UpstreamStatus,
        accrual: Option<Amount>,
    },
    NotYetKnown,
    Error,
}

impl Scripted {
    pub fn processed(accrual: Amount) -> Self {
        Self::Known {
            status: UpstreamStatus::Processed,
            accrual: Some(accrual),
        }
    }
}

/// 按订单号返回预设结果；未设置的订单视为尚无结果
#[derive(Default)]
pub struct ScriptedLookup {
    responses: Mutex<HashMap<String, Scripted>>,
    calls: AtomicUsize,
}

impl ScriptedLookup {
    pub fn set(&self, number: &str, response: Scripted) {
        self.responses.lock().insert(number.to_string(), response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccrualLookupService for ScriptedLookup {
    async fn get_accrual_info(
        &self,
        number: &str,
    ) -> std::result::Result<AccrualLookup, AccrualClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self.responses.lock().get(number).cloned();
        match response {
            Some(Scripted::Known { status, accrual }) => Ok(AccrualLookup::Known(AccrualInfo {
                order: number.to_string(),
                status,
                accrual,
            })),
            Some(Scripted::NotYetKnown) | None => Ok(AccrualLookup::NotYetKnown),
            Some(Scripted::Error) => Err(AccrualClientError::UnexpectedStatus(500)),
        }
    }
}
