//! 数据库仓储层
//!
//! 仓储只负责数据持久化，状态守卫写在 SQL 中：终态订单不会被任何更新覆盖。

mod accrual_repo;
mod traits;

pub use accrual_repo::PgAccrualRepository;
pub use traits::*;
