//! 积分计算仓储的 PostgreSQL 实现

use std::time::Duration;

use async_trait::async_trait;
use loyalty_shared::Amount;
use loyalty_shared::error::is_unique_violation;
use sqlx::PgPool;
use tracing::{debug, instrument};

use super::traits::AccrualRepository;
use crate::error::{AccrualError, Result};
use crate::matcher::AccrualBreakdown;
use crate::models::{AccrualOrder, LineItem, PendingOrder, RewardKind, RewardRule};

/// 规则表查询结果行
#[derive(sqlx::FromRow)]
struct RewardRuleRow {
    pattern: String,
    reward: Amount,
    reward_type: String,
}

impl From<RewardRuleRow> for RewardRule {
    fn from(row: RewardRuleRow) -> Self {
        Self {
            pattern: row.pattern,
            reward: row.reward,
            reward_type: RewardKind::from_tag(&row.reward_type),
        }
    }
}

/// 积分计算仓储
#[derive(Clone)]
pub struct PgAccrualRepository {
    pool: PgPool,
}

impl PgAccrualRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccrualRepository for PgAccrualRepository {
    async fn registered_orders(&self) -> Result<Vec<PendingOrder>> {
        let orders = sqlx::query_as::<_, PendingOrder>(
            r#"
            SELECT id, number
            FROM orders
            WHERE status = 'REGISTERED'
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    async fn reward_rules(&self) -> Result<Vec<RewardRule>> {
        let rows = sqlx::query_as::<_, RewardRuleRow>(
            r#"
            SELECT "match" AS pattern, reward, reward_type
            FROM reward_rules
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RewardRule::from).collect())
    }

    async fn mark_processing(&self, order_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'PROCESSING', updated_at = NOW()
            WHERE id = $1 AND status NOT IN ('PROCESSED', 'INVALID')
            "#,
        )
        .bind(order_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_invalid(&self, order_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'INVALID', updated_at = NOW()
            WHERE id = $1 AND status NOT IN ('PROCESSED', 'INVALID')
            "#,
        )
        .bind(order_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn order_items(&self, order_id: i64) -> Result<Vec<LineItem>> {
        let items = sqlx::query_as::<_, LineItem>(
            r#"
            SELECT description, price
            FROM order_items
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    #[instrument(skip(self, breakdown), fields(total = %breakdown.total))]
    async fn save_order_points(
        &self,
        order_id: i64,
        breakdown: &AccrualBreakdown,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'PROCESSED', accrual = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'PROCESSING'
            "#,
        )
        .bind(order_id)
        .bind(breakdown.total)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            // 订单已被回收或已进入终态，事务随 drop 回滚
            debug!(order_id, "订单不再处于 PROCESSING，放弃写入");
            return Ok(false);
        }

        let item_ids: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM order_items WHERE order_id = $1 ORDER BY id ASC")
                .bind(order_id)
                .fetch_all(&mut *tx)
                .await?;

        if item_ids.len() != breakdown.per_item.len() {
            return Err(AccrualError::ItemCountMismatch {
                order_id,
                items: item_ids.len(),
                computed: breakdown.per_item.len(),
            });
        }

        for (item_id, accrual) in item_ids.iter().zip(&breakdown.per_item) {
            sqlx::query("UPDATE order_items SET accrual = $2 WHERE id = $1")
                .bind(item_id)
                .bind(*accrual)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(true)
    }

    async fn requeue_stale(&self, older_than: Duration) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'REGISTERED', updated_at = NOW()
            WHERE status = 'PROCESSING'
              AND updated_at < NOW() - make_interval(secs => $1)
            "#,
        )
        .bind(older_than.as_secs_f64())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn find_order(&self, number: &str) -> Result<Option<AccrualOrder>> {
        let order = sqlx::query_as::<_, AccrualOrder>(
            r#"
            SELECT id, number, status, accrual, uploaded_at, updated_at
            FROM orders
            WHERE number = $1
            "#,
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    async fn create_order(&self, number: &str, goods: &[LineItem]) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let order_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (number, status)
            VALUES ($1, 'REGISTERED')
            RETURNING id
            "#,
        )
        .bind(number)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AccrualError::OrderConflict(number.to_string())
            } else {
                AccrualError::Database(e)
            }
        })?;

        for item in goods {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, description, price)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(order_id)
            .bind(&item.description)
            .bind(item.price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(order_id)
    }

    async fn create_rule(&self, rule: &RewardRule) -> Result<i64> {
        let rule_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO reward_rules ("match", reward, reward_type)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&rule.pattern)
        .bind(rule.reward)
        .bind(rule.reward_type.tag())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AccrualError::RuleConflict(rule.pattern.clone())
            } else {
                AccrualError::Database(e)
            }
        })?;

        Ok(rule_id)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
