//! 应用状态定义

use std::sync::Arc;

use crate::service::{BalanceService, OrderService};

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub order_service: Arc<OrderService>,
    pub balance_service: Arc<BalanceService>,
}

impl AppState {
    pub fn new(order_service: Arc<OrderService>, balance_service: Arc<BalanceService>) -> Self {
        Self {
            order_service,
            balance_service,
        }
    }
}
