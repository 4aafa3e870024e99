//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!(
        "circuit_breaker_transitions_total",
        "Circuit breaker state transitions"
    );
    metrics::describe_counter!(
        "circuit_breaker_rejections_total",
        "Calls rejected by an open circuit breaker"
    );
    metrics::describe_gauge!(
        "circuit_breaker_state",
        "Current breaker state (0 closed, 1 half-open, 2 open)"
    );

    metrics::describe_counter!(
        "accrual_orders_total",
        "Orders finished by the accrual processing loop, by outcome"
    );
    metrics::describe_histogram!(
        "accrual_cycle_duration_seconds",
        "Accrual processing cycle duration in seconds"
    );
    metrics::describe_counter!(
        "accrual_orders_requeued_total",
        "Stale PROCESSING orders returned to REGISTERED"
    );

    metrics::describe_counter!(
        "reconciler_orders_total",
        "Orders examined by the reconciler, by outcome"
    );
    metrics::describe_counter!(
        "reconciler_ticks_total",
        "Reconciler ticks, by commit outcome"
    );
    metrics::describe_counter!(
        "balance_credited_minor_total",
        "Accrual credited to balances, in minor units"
    );

    metrics::describe_gauge!(
        "worker_last_run_timestamp",
        "Unix timestamp of the worker's last completed run"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录积分计算结果（processed / invalid）
#[inline]
pub fn record_accrual_order(outcome: &str) {
    metrics::counter!("accrual_orders_total", "outcome" => outcome.to_string()).increment(1);
}

/// 记录一轮积分计算耗时
#[inline]
pub fn record_accrual_cycle(duration_secs: f64) {
    metrics::histogram!("accrual_cycle_duration_seconds").record(duration_secs);
}

/// 记录重新入队的卡滞订单
#[inline]
pub fn record_accrual_requeued(count: u64) {
    metrics::counter!("accrual_orders_requeued_total").increment(count);
}

/// 记录对账结果（updated / skipped / not_ready / failed）
#[inline]
pub fn record_reconciled_order(outcome: &str) {
    metrics::counter!("reconciler_orders_total", "outcome" => outcome.to_string()).increment(1);
}

/// 记录对账事务结果（committed / rolled_back）
#[inline]
pub fn record_reconciler_tick(outcome: &str) {
    metrics::counter!("reconciler_ticks_total", "outcome" => outcome.to_string()).increment(1);
}

/// 记录入账金额（最小单位）
#[inline]
pub fn record_balance_credit(minor: i64) {
    if minor > 0 {
        metrics::counter!("balance_credited_minor_total").increment(minor as u64);
    }
}

/// 记录 Worker 最近一次完成运行的时间
#[inline]
pub fn set_worker_last_run(worker: &str) {
    metrics::gauge!("worker_last_run_timestamp", "worker" => worker.to_string())
        .set(chrono::Utc::now().timestamp() as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_functions_do_not_panic() {
        // 即使没有初始化 recorder，这些函数也不应该 panic
        record_http_request("GET", "/api/orders/1", 200, 0.1);
        record_accrual_order("processed");
        record_accrual_cycle(0.05);
        record_accrual_requeued(2);
        record_reconciled_order("updated");
        record_reconciler_tick("committed");
        record_balance_credit(1000);
        record_balance_credit(0);
        set_worker_last_run("reconciler");
    }
}
