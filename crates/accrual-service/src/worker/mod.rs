//! 后台任务 Worker 模块

pub mod order_processing;

pub use order_processing::{CycleReport, OrderProcessingWorker};
