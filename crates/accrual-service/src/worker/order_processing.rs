//! 订单积分计算 Worker
//!
//! 单实例、顺序处理的轮询循环。每一轮：
//! 1. 回收 PROCESSING 状态滞留过久的订单（进程在轮次中途崩溃时遗留）
//! 2. 读取所有 REGISTERED 订单，并为本轮读取一次规则集
//! 3. 逐个订单：置为 PROCESSING，读取商品明细，匹配规则，写入积分并置为 PROCESSED
//!
//! 单个订单失败只会将该订单置为 INVALID，不会中断本轮。
//! 关闭信号只在两轮之间检查，进行中的一轮总能完整结束。

use std::sync::Arc;
use std::time::{Duration, Instant};

use loyalty_shared::config::AccrualWorkerConfig;
use loyalty_shared::observability::metrics;
use loyalty_shared::shutdown;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::matcher::match_rules;
use crate::models::{PendingOrder, RewardRule};
use crate::repository::AccrualRepository;

/// 单轮处理结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub processed: u32,
    pub invalid: u32,
    /// 状态已被其他流程改变、或状态写入失败而未处理的订单
    pub skipped: u32,
    /// 本轮开始时回收的滞留订单
    pub requeued: u64,
}

impl CycleReport {
    pub fn is_idle(&self) -> bool {
        self.processed == 0 && self.invalid == 0 && self.skipped == 0 && self.requeued == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrderOutcome {
    Processed,
    Invalid,
    Skipped,
}

/// 订单积分计算 Worker
pub struct OrderProcessingWorker {
    repo: Arc<dyn AccrualRepository>,
    /// 两轮之间的休眠间隔
    poll_interval: Duration,
    /// PROCESSING 滞留阈值，None 表示不回收
    stale_after: Option<Duration>,
}

impl OrderProcessingWorker {
    pub fn new(
        repo: Arc<dyn AccrualRepository>,
        poll_interval: Duration,
        stale_after: Option<Duration>,
    ) -> Self {
        Self {
            repo,
            poll_interval,
            stale_after,
        }
    }

    pub fn from_config(repo: Arc<dyn AccrualRepository>, config: &AccrualWorkerConfig) -> Self {
        Self::new(repo, config.poll_interval(), config.stale_after())
    }

    /// 主循环：持续处理订单直到收到关闭通知
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            poll_interval = ?self.poll_interval,
            stale_after = ?self.stale_after,
            "OrderProcessingWorker 已启动"
        );

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let report = self.run_cycle().await;
            if !report.is_idle() {
                info!(
                    processed = report.processed,
                    invalid = report.invalid,
                    skipped = report.skipped,
                    requeued = report.requeued,
                    "订单积分计算完成一轮"
                );
            }

            // 记录 Worker 健康状态
            metrics::set_worker_last_run("order_processing");

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = shutdown::wait_for(&mut shutdown_rx) => break,
            }
        }

        info!("OrderProcessingWorker 已停止");
    }

    /// 执行一轮处理
    pub async fn run_cycle(&self) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::default();

        if let Some(stale_after) = self.stale_after {
            match self.repo.requeue_stale(stale_after).await {
                Ok(0) => {}
                Ok(count) => {
                    warn!(count, ?stale_after, "滞留在 PROCESSING 的订单已重新入队");
                    metrics::record_accrual_requeued(count);
                    report.requeued = count;
                }
                Err(e) => error!(error = %e, "回收滞留订单失败"),
            }
        }

        let orders = match self.repo.registered_orders().await {
            Ok(orders) => orders,
            Err(e) => {
                error!(error = %e, "读取待计算订单失败，跳过本轮");
                return report;
            }
        };

        if orders.is_empty() {
            return report;
        }

        // 规则每轮只读取一次，本轮所有订单共享
        let rules = match self.repo.reward_rules().await {
            Ok(rules) => rules,
            Err(e) => {
                error!(error = %e, "读取奖励规则失败，跳过本轮");
                return report;
            }
        };

        debug!(orders = orders.len(), rules = rules.len(), "开始计算订单积分");

        for order in &orders {
            match self.process_order(order, &rules).await {
                OrderOutcome::Processed => report.processed += 1,
                OrderOutcome::Invalid => report.invalid += 1,
                OrderOutcome::Skipped => report.skipped += 1,
            }
        }

        metrics::record_accrual_cycle(started.elapsed().as_secs_f64());

        report
    }

    async fn process_order(&self, order: &PendingOrder, rules: &[RewardRule]) -> OrderOutcome {
        match self.repo.mark_processing(order.id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(order_number = %order.number, "订单已处于终态，跳过");
                return OrderOutcome::Skipped;
            }
            Err(e) => {
                error!(order_number = %order.number, error = %e, "订单置为 PROCESSING 失败");
                return OrderOutcome::Skipped;
            }
        }

        let items = match self.repo.order_items(order.id).await {
            Ok(items) => items,
            Err(e) => {
                warn!(order_number = %order.number, error = %e, "读取商品明细失败，订单置为 INVALID");
                return self.invalidate(order).await;
            }
        };

        let breakdown = match match_rules(&items, rules) {
            Ok(breakdown) => breakdown,
            Err(e) => {
                warn!(order_number = %order.number, error = %e, "订单积分超出可表示范围，订单置为 INVALID");
                return self.invalidate(order).await;
            }
        };

        match self.repo.save_order_points(order.id, &breakdown).await {
            Ok(true) => {
                info!(
                    order_number = %order.number,
                    accrual = %breakdown.total,
                    status = "PROCESSED",
                    "订单积分计算完成"
                );
                metrics::record_accrual_order("processed");
                OrderOutcome::Processed
            }
            Ok(false) => {
                debug!(order_number = %order.number, "订单状态已被改变，放弃写入积分");
                OrderOutcome::Skipped
            }
            Err(e) => {
                error!(order_number = %order.number, error = %e, "写入订单积分失败，订单置为 INVALID");
                self.invalidate(order).await
            }
        }
    }

    async fn invalidate(&self, order: &PendingOrder) -> OrderOutcome {
        match self.repo.mark_invalid(order.id).await {
            Ok(_) => {
                metrics::record_accrual_order("invalid");
                OrderOutcome::Invalid
            }
            Err(e) => {
                // 订单留在 PROCESSING，由滞留回收重新入队
                error!(order_number = %order.number, error = %e, "订单置为 INVALID 失败");
                OrderOutcome::Skipped
            }
        }
    }
}
