//! 共享库
//!
//! 积分计算服务与会员积分服务共用的基础设施：配置、错误处理、数据库连接、
//! 金额类型、订单号校验、熔断器、可观测性以及优雅关闭。

pub mod amount;
pub mod circuit_breaker;
pub mod config;
pub mod database;
pub mod error;
pub mod observability;
pub mod order_number;
pub mod shutdown;

pub use amount::Amount;
pub use order_number::{OrderNumberPolicy, OrderNumberValidator};
