//! 仓储 Trait 定义
//!
//! 处理循环与 HTTP 处理器都依赖该抽象，测试中以 mock 或内存实现替换。

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::matcher::AccrualBreakdown;
use crate::models::{AccrualOrder, LineItem, PendingOrder, RewardRule};

/// 积分计算仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccrualRepository: Send + Sync {
    // 处理循环
    /// 状态为 REGISTERED 的订单，按登记顺序
    async fn registered_orders(&self) -> Result<Vec<PendingOrder>>;
    async fn reward_rules(&self) -> Result<Vec<RewardRule>>;
    /// 返回 false 表示订单已处于终态，未做修改
    async fn mark_processing(&self, order_id: i64) -> Result<bool>;
    async fn mark_invalid(&self, order_id: i64) -> Result<bool>;
    async fn order_items(&self, order_id: i64) -> Result<Vec<LineItem>>;
    /// 在同一事务中写入商品积分、订单总积分并置为 PROCESSED；
    /// 仅当订单仍处于 PROCESSING 时生效
    async fn save_order_points(&self, order_id: i64, breakdown: &AccrualBreakdown)
    -> Result<bool>;
    /// 将 PROCESSING 超过 `older_than` 的订单退回 REGISTERED，返回数量
    async fn requeue_stale(&self, older_than: Duration) -> Result<u64>;

    // 查询与登记
    async fn find_order(&self, number: &str) -> Result<Option<AccrualOrder>>;
    /// 订单与商品明细在同一事务中写入，订单号重复返回 `OrderConflict`
    async fn create_order(&self, number: &str, goods: &[LineItem]) -> Result<i64>;
    /// 匹配串重复返回 `RuleConflict`
    async fn create_rule(&self, rule: &RewardRule) -> Result<i64>;

    async fn ping(&self) -> Result<()>;
}
