//! 余额仓储的 PostgreSQL 实现

use async_trait::async_trait;
use loyalty_shared::Amount;
use sqlx::PgPool;
use tracing::instrument;

use super::traits::BalanceRepository;
use crate::error::Result;
use crate::models::{Balance, Withdrawal};

#[derive(Clone)]
pub struct PgBalanceRepository {
    pool: PgPool,
}

impl PgBalanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BalanceRepository for PgBalanceRepository {
    async fn balance(&self, user_id: i64) -> Result<Balance> {
        let balance = sqlx::query_as::<_, Balance>(
            "SELECT current, withdrawn FROM balances WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(balance.unwrap_or_default())
    }

    #[instrument(skip(self), fields(sum = %sum))]
    async fn withdraw(&self, user_id: i64, order_number: &str, sum: Amount) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        // current >= sum 的守卫保证余额不会为负
        let debited = sqlx::query(
            r#"
            UPDATE balances
            SET current = current - $2, withdrawn = withdrawn + $2
            WHERE user_id = $1 AND current >= $2
            "#,
        )
        .bind(user_id)
        .bind(sum)
        .execute(&mut *tx)
        .await?;

        if debited.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO withdrawals (user_id, order_number, sum)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(order_number)
        .bind(sum)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(true)
    }

    async fn withdrawals(&self, user_id: i64) -> Result<Vec<Withdrawal>> {
        let withdrawals = sqlx::query_as::<_, Withdrawal>(
            r#"
            SELECT order_number, sum, processed_at
            FROM withdrawals
            WHERE user_id = $1
            ORDER BY processed_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(withdrawals)
    }
}
