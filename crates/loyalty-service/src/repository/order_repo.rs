//! 订单仓储的 PostgreSQL 实现

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::{InsertOutcome, OrderRepository};
use crate::error::Result;
use crate::models::Order;

#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn insert_new(&self, user_id: i64, number: &str) -> Result<InsertOutcome> {
        // ON CONFLICT DO NOTHING 避免并发提交同一订单号时出现唯一约束错误
        let inserted: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO orders (number, user_id, status)
            VALUES ($1, $2, 'NEW')
            ON CONFLICT (number) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(number)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        if inserted.is_some() {
            return Ok(InsertOutcome::Inserted);
        }

        let owner_id: i64 = sqlx::query_scalar("SELECT user_id FROM orders WHERE number = $1")
            .bind(number)
            .fetch_one(&self.pool)
            .await?;

        Ok(InsertOutcome::Existing { owner_id })
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, number, user_id, status, accrual, uploaded_at
            FROM orders
            WHERE user_id = $1
            ORDER BY uploaded_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
