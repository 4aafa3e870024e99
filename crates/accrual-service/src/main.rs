//! 积分计算服务
//!
//! 提供订单登记、奖励规则登记与订单计算结果查询 REST API，
//! 并在后台循环中为已登记订单计算积分。

use std::sync::Arc;
use std::time::Duration;

use accrual::{
    MIGRATOR,
    repository::{AccrualRepository, PgAccrualRepository},
    routes,
    state::AppState,
    worker::OrderProcessingWorker,
};
use loyalty_shared::{
    config::AppConfig,
    database::Database,
    observability,
    shutdown::{Shutdown, shutdown_signal},
};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 统一加载配置：config/accrual-service.toml + LOYALTY_ 前缀环境变量
    let config = AppConfig::load("accrual-service").unwrap_or_else(|e| {
        warn!(error = %e, "加载配置失败，使用默认配置");
        AppConfig::default()
    });

    let obs_config = config
        .observability
        .clone()
        .with_service_name("accrual-service");
    let _guard = observability::init(&obs_config).await?;

    info!("Starting accrual-service on {}", config.server_addr());

    let db = Database::connect(&config.database).await?;
    if config.database.run_migrations {
        db.run_migrations(&MIGRATOR).await?;
    }

    let repo: Arc<dyn AccrualRepository> = Arc::new(PgAccrualRepository::new(db.pool().clone()));

    // 后台订单积分计算循环，关闭时等待当前一轮结束
    let shutdown = Shutdown::new();
    let worker = OrderProcessingWorker::from_config(repo.clone(), &config.accrual);
    let worker_shutdown = shutdown.subscribe();
    let worker_handle = tokio::spawn(async move {
        worker.run(worker_shutdown).await;
    });

    let app = routes::build_router(
        AppState::new(repo),
        Duration::from_secs(config.server.request_timeout_seconds),
    );

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.trigger();
    if let Err(e) = worker_handle.await {
        warn!(error = %e, "订单积分计算 Worker 异常退出");
    }

    db.close().await;
    info!("Server shutdown complete");

    Ok(())
}
