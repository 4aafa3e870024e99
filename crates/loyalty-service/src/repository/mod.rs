//! 数据库仓储层
//!
//! - 订单与余额的读写由服务层调用
//! - 对账写入通过 `ReconcileStore` 开启的事务完成，状态更新与余额入账同进同退

mod balance_repo;
mod order_repo;
mod reconcile_store;
mod traits;

pub use balance_repo::PgBalanceRepository;
pub use order_repo::PgOrderRepository;
pub use reconcile_store::{PgReconcileStore, PgReconcileTx};
pub use traits::*;
