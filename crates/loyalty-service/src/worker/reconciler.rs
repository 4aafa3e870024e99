//! 订单状态/余额对账 Worker
//!
//! 单实例、按固定间隔轮询。每一轮：
//! 1. 读取所有 NEW / PROCESSING 订单
//! 2. 为整轮开启一个事务
//! 3. 逐个订单查询积分计算服务：出错或尚无结果则本轮跳过该订单；
//!    有确定结果则更新订单状态与积分，若为 PROCESSED 则在同一事务中为用户入账
//! 4. 全部处理完后提交；提交失败则整轮回滚，订单保持待对账状态，下一轮重试
//!
//! 入账只在订单确实发生转换时进行，终态订单不会再次被访问，因此重试不会重复入账。

use std::sync::Arc;
use std::time::Duration;

use loyalty_shared::Amount;
use loyalty_shared::config::ReconcilerConfig;
use loyalty_shared::observability::metrics;
use loyalty_shared::shutdown;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::accrual_client::{AccrualLookup, AccrualLookupService};
use crate::error::Result;
use crate::models::LocalOrderStatus;
use crate::repository::ReconcileStore;

/// 单轮对账结果（仅在提交成功后返回）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// 发生状态转换的订单
    pub updated: u32,
    /// 积分计算服务尚无结果
    pub not_ready: u32,
    /// 查询失败（含熔断器拒绝）
    pub failed: u32,
    /// 上游状态与本地一致，或订单已被其他对账者处理
    pub unchanged: u32,
    /// 本轮入账总额
    pub credited: Amount,
}

pub struct StatusReconciler {
    lookup: Arc<dyn AccrualLookupService>,
    store: Arc<dyn ReconcileStore>,
    tick_interval: Duration,
}

impl StatusReconciler {
    pub fn new(
        lookup: Arc<dyn AccrualLookupService>,
        store: Arc<dyn ReconcileStore>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            lookup,
            store,
            tick_interval,
        }
    }

    pub fn from_config(
        lookup: Arc<dyn AccrualLookupService>,
        store: Arc<dyn ReconcileStore>,
        config: &ReconcilerConfig,
    ) -> Self {
        Self::new(lookup, store, config.tick_interval())
    }

    /// 主循环：按间隔对账直到收到关闭通知
    ///
    /// 关闭通知只在两轮之间生效，进行中的事务总能提交或回滚。
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(tick_interval = ?self.tick_interval, "StatusReconciler 已启动");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            match self.run_tick().await {
                Ok(report) => {
                    metrics::record_reconciler_tick("committed");
                    if report.updated > 0 {
                        info!(
                            updated = report.updated,
                            not_ready = report.not_ready,
                            failed = report.failed,
                            credited = %report.credited,
                            "对账完成一轮"
                        );
                    }
                }
                Err(e) => {
                    metrics::record_reconciler_tick("rolled_back");
                    error!(error = %e, "对账失败，本轮写入已回滚，下一轮重试");
                }
            }

            metrics::set_worker_last_run("reconciler");

            tokio::select! {
                _ = tokio::time::sleep(self.tick_interval) => {}
                _ = shutdown::wait_for(&mut shutdown_rx) => break,
            }
        }

        info!("StatusReconciler 已停止");
    }

    /// 执行一轮对账
    pub async fn run_tick(&self) -> Result<TickReport> {
        let pending = self.store.pending_orders().await?;
        let mut report = TickReport::default();
        if pending.is_empty() {
            return Ok(report);
        }

        let mut tx = self.store.begin().await?;

        for order in &pending {
            let info = match self.lookup.get_accrual_info(&order.number).await {
                Ok(AccrualLookup::Known(info)) => info,
                Ok(AccrualLookup::NotYetKnown) => {
                    debug!(order_number = %order.number, "积分计算服务尚无结果");
                    metrics::record_reconciled_order("not_ready");
                    report.not_ready += 1;
                    continue;
                }
                Err(e) => {
                    warn!(order_number = %order.number, error = %e, "查询积分失败，本轮跳过");
                    metrics::record_reconciled_order("failed");
                    report.failed += 1;
                    continue;
                }
            };

            let status = LocalOrderStatus::from(info.status);
            if status == order.status {
                report.unchanged += 1;
                continue;
            }

            // 积分只在 PROCESSED 时写入；缺失视为 0
            let accrual = (status == LocalOrderStatus::Processed)
                .then(|| info.accrual.unwrap_or(Amount::ZERO));

            if !tx.apply_result(&order.number, status, accrual).await? {
                debug!(order_number = %order.number, "订单已被其他对账者处理");
                report.unchanged += 1;
                continue;
            }

            if let Some(amount) = accrual {
                tx.credit(order.user_id, amount).await?;
                report.credited += amount;
            }

            info!(
                order_number = %order.number,
                user_id = order.user_id,
                from = %order.status,
                status = %status,
                accrual = ?accrual.map(|a| a.to_string()),
                "订单状态已同步"
            );
            metrics::record_reconciled_order("updated");
            report.updated += 1;
        }

        tx.commit().await?;
        metrics::record_balance_credit(report.credited.minor());

        Ok(report)
    }
}
