//! 对账存储的 PostgreSQL 实现
//!
//! 一轮对账共用一个事务。订单更新带 `status IN ('NEW','PROCESSING')` 守卫，
//! 并发的两个对账者中只有先拿到行锁的一方能完成转换并入账。

use async_trait::async_trait;
use loyalty_shared::Amount;
use sqlx::{PgPool, Postgres, Transaction};

use super::traits::{ReconcileStore, ReconcileTx};
use crate::error::Result;
use crate::models::{LocalOrderStatus, PendingOrder};

#[derive(Clone)]
pub struct PgReconcileStore {
    pool: PgPool,
}

impl PgReconcileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReconcileStore for PgReconcileStore {
    async fn pending_orders(&self) -> Result<Vec<PendingOrder>> {
        let orders = sqlx::query_as::<_, PendingOrder>(
            r#"
            SELECT number, user_id, status
            FROM orders
            WHERE status IN ('NEW', 'PROCESSING')
            ORDER BY uploaded_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    async fn begin(&self) -> Result<Box<dyn ReconcileTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgReconcileTx { tx }))
    }
}

/// 对账事务，drop 时未提交则由 sqlx 回滚
pub struct PgReconcileTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ReconcileTx for PgReconcileTx {
    async fn apply_result(
        &mut self,
        number: &str,
        status: LocalOrderStatus,
        accrual: Option<Amount>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, accrual = $3, updated_at = NOW()
            WHERE number = $1 AND status IN ('NEW', 'PROCESSING')
            "#,
        )
        .bind(number)
        .bind(status)
        .bind(accrual)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn credit(&mut self, user_id: i64, amount: Amount) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO balances (user_id, current, withdrawn)
            VALUES ($1, $2, 0)
            ON CONFLICT (user_id)
            DO UPDATE SET current = balances.current + EXCLUDED.current
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
