//! 仓储 Trait 定义

use async_trait::async_trait;
use loyalty_shared::Amount;

use crate::error::Result;
use crate::models::{Balance, LocalOrderStatus, Order, PendingOrder, Withdrawal};

/// 订单插入结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// 订单号已存在，附带其所属用户
    Existing { owner_id: i64 },
}

/// 订单仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// 以 NEW 状态插入订单；订单号已存在时不修改任何数据
    async fn insert_new(&self, user_id: i64, number: &str) -> Result<InsertOutcome>;
    /// 用户的订单，按提交时间升序
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Order>>;
    async fn ping(&self) -> Result<()>;
}

/// 余额仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceRepository: Send + Sync {
    /// 没有余额记录的用户返回零余额
    async fn balance(&self, user_id: i64) -> Result<Balance>;
    /// 在同一事务中扣减余额并写入提现记录；余额不足返回 false 且不做任何修改
    async fn withdraw(&self, user_id: i64, order_number: &str, sum: Amount) -> Result<bool>;
    /// 用户的提现记录，按处理时间升序
    async fn withdrawals(&self, user_id: i64) -> Result<Vec<Withdrawal>>;
}

/// 对账存储
#[async_trait]
pub trait ReconcileStore: Send + Sync {
    /// 状态为 NEW 或 PROCESSING 的订单
    async fn pending_orders(&self) -> Result<Vec<PendingOrder>>;
    /// 开启一轮对账事务
    async fn begin(&self) -> Result<Box<dyn ReconcileTx>>;
}

/// 一轮对账的事务
///
/// 未调用 `commit` 就被 drop 时，本轮所有写入回滚。
#[async_trait]
pub trait ReconcileTx: Send {
    /// 更新非终态订单的状态与积分，返回是否有订单发生转换
    async fn apply_result(
        &mut self,
        number: &str,
        status: LocalOrderStatus,
        accrual: Option<Amount>,
    ) -> Result<bool>;
    /// 增加用户可用余额
    async fn credit(&mut self, user_id: i64, amount: Amount) -> Result<()>;
    async fn commit(self: Box<Self>) -> Result<()>;
}
