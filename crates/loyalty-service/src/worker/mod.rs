//! 后台任务 Worker 模块

pub mod reconciler;

pub use reconciler::{StatusReconciler, TickReport};
