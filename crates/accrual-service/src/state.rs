//! 应用状态定义

use std::sync::Arc;

use crate::repository::AccrualRepository;

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn AccrualRepository>,
}

impl AppState {
    pub fn new(repo: Arc<dyn AccrualRepository>) -> Self {
        Self { repo }
    }
}
