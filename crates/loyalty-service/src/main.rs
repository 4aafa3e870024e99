//! 会员积分服务
//!
//! 提供订单提交、余额与提现 REST API，并在后台把积分计算服务的结果
//! 对账到本地订单状态与用户余额。

use std::sync::Arc;
use std::time::Duration;

use loyalty::{
    AccrualClient, MIGRATOR,
    repository::{PgBalanceRepository, PgOrderRepository, PgReconcileStore},
    routes,
    service::{BalanceService, OrderService},
    state::AppState,
    worker::StatusReconciler,
};
use loyalty_shared::{
    OrderNumberValidator,
    config::AppConfig,
    database::Database,
    observability,
    shutdown::{Shutdown, shutdown_signal},
};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 统一加载配置：config/loyalty-service.toml + LOYALTY_ 前缀环境变量
    let config = AppConfig::load("loyalty-service").unwrap_or_else(|e| {
        warn!(error = %e, "加载配置失败，使用默认配置");
        AppConfig::default()
    });

    let obs_config = config
        .observability
        .clone()
        .with_service_name("loyalty-service");
    let _guard = observability::init(&obs_config).await?;

    info!("Starting loyalty-service on {}", config.server_addr());

    let db = Database::connect(&config.database).await?;
    if config.database.run_migrations {
        db.run_migrations(&MIGRATOR).await?;
    }

    // 提交与提现共用同一订单号校验策略
    let validator = OrderNumberValidator::new(config.order_number.policy);
    let order_service = Arc::new(OrderService::new(
        Arc::new(PgOrderRepository::new(db.pool().clone())),
        validator,
    ));
    let balance_service = Arc::new(BalanceService::new(
        Arc::new(PgBalanceRepository::new(db.pool().clone())),
        validator,
    ));

    let accrual_client = AccrualClient::new(&config.accrual_client)?;
    info!(
        base_url = %config.accrual_client.base_url,
        "积分计算服务客户端已创建"
    );

    let shutdown = Shutdown::new();
    let reconciler = StatusReconciler::from_config(
        Arc::new(accrual_client),
        Arc::new(PgReconcileStore::new(db.pool().clone())),
        &config.reconciler,
    );
    let reconciler_shutdown = shutdown.subscribe();
    let reconciler_handle = tokio::spawn(async move {
        reconciler.run(reconciler_shutdown).await;
    });

    let app = routes::build_router(
        AppState::new(order_service, balance_service),
        Duration::from_secs(config.server.request_timeout_seconds),
    );

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 等待进行中的一轮对账提交或回滚
    shutdown.trigger();
    if let Err(e) = reconciler_handle.await {
        warn!(error = %e, "对账 Worker 异常退出");
    }

    db.close().await;
    info!("Server shutdown complete");

    Ok(())
}
