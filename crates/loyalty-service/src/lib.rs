//! 会员积分服务
//!
//! 面向用户的订单提交、余额与提现接口，以及把积分计算服务的结果
//! 同步到本地订单状态和用户余额的对账 Worker。
//!
//! ## 模块结构
//!
//! - `models`: 本地订单、余额、提现记录
//! - `accrual_client`: 经熔断器保护的积分计算服务客户端
//! - `repository`: 订单、余额与对账事务的持久化
//! - `service`: 订单提交与余额业务逻辑
//! - `worker`: 订单状态/余额对账 Worker
//! - `auth`: 上游网关注入的用户身份
//! - `handlers` / `routes`: HTTP 接口

pub mod accrual_client;
pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod routes;
pub mod service;
pub mod state;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use accrual_client::{
    AccrualClient, AccrualClientError, AccrualInfo, AccrualLookup, AccrualLookupService,
    UpstreamStatus,
};
pub use error::{LoyaltyServiceError, Result};
pub use models::{Balance, LocalOrderStatus, Order, Withdrawal};

/// 服务内置的数据库迁移
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
