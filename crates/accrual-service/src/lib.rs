//! 积分计算引擎
//!
//! 接收订单及其商品明细、维护奖励规则，并在后台循环中为订单计算积分。
//!
//! ## 模块结构
//!
//! - `models`: 订单、商品明细、奖励规则等领域模型
//! - `matcher`: 奖励规则匹配（纯函数）
//! - `repository`: 订单与规则的持久化
//! - `worker`: 订单积分计算循环
//! - `handlers` / `routes`: HTTP 接口
//! - `error`: 错误类型定义

pub mod dto;
pub mod error;
pub mod handlers;
pub mod matcher;
pub mod models;
pub mod repository;
pub mod routes;
pub mod state;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{AccrualError, Result};
pub use matcher::{AccrualBreakdown, AccrualOverflow, match_rules};
pub use models::{AccrualOrder, AccrualStatus, LineItem, RewardKind, RewardRule};

/// 服务内置的数据库迁移
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
