// Direct read path - a separately pooled, lean query path for the hottest reads

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::StoreError;
use crate::models::{CacheStats, Task, TaskStatus, User};
use crate::services::local_cache::{stats_query, TASK_COLUMNS, USER_COLUMNS};
use crate::services::pool::ConnectionPool;
use crate::services::store::DirectStore;

pub struct PgDirectStore {
    pool: Arc<ConnectionPool>,
}

impl PgDirectStore {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }
}

/// Log at the failure site; the coalescing layer decides on the fallback
fn logged<T>(operation: &'static str, result: Result<T, StoreError>) -> Result<T, StoreError> {
    if let Err(e) = &result {
        warn!(operation, error = %e, "Direct store query failed");
    }
    result
}

#[async_trait]
impl DirectStore for PgDirectStore {
    async fn get_user_by_telegram_id(&self, telegram_id: &str) -> Result<Option<User>, StoreError> {
        let result = async {
            let pool = self.pool.acquire().await?;
            let user = sqlx::query_as::<_, User>(&format!(
                "SELECT {} FROM users WHERE telegram_id = $1",
                USER_COLUMNS
            ))
            .bind(telegram_id)
            .fetch_optional(&pool)
            .await?;
            Ok::<_, StoreError>(user)
        }
        .await;
        logged("get_user_by_telegram_id", result)
    }

    async fn get_tasks_by_assignee(
        &self,
        assignee_id: &str,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, StoreError> {
        let result = async {
            let pool = self.pool.acquire().await?;
            let tasks = sqlx::query_as::<_, Task>(&format!(
                "SELECT {} FROM tasks WHERE assignee_id = $1 AND ($2::text IS NULL OR status = $2) \
                 ORDER BY created_date DESC",
                TASK_COLUMNS
            ))
            .bind(assignee_id)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&pool)
            .await?;
            Ok::<_, StoreError>(tasks)
        }
        .await;
        logged("get_tasks_by_assignee", result)
    }

    /// Insert-or-refresh, returning the stored row
    async fn create_user(&self, user: &User) -> Result<User, StoreError> {
        let result = async {
            let pool = self.pool.acquire().await?;
            let stored = sqlx::query_as::<_, User>(&format!(
                r#"
                INSERT INTO users (telegram_id, notion_id, name, username, position, is_active, registration_date)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (telegram_id) DO UPDATE SET
                    name = EXCLUDED.name,
                    username = EXCLUDED.username,
                    position = EXCLUDED.position,
                    is_active = EXCLUDED.is_active,
                    updated_at = NOW()
                RETURNING {}
                "#,
                USER_COLUMNS
            ))
            .bind(&user.telegram_id)
            .bind(&user.notion_id)
            .bind(&user.name)
            .bind(&user.username)
            .bind(&user.position)
            .bind(user.is_active)
            .bind(user.registration_date)
            .fetch_one(&pool)
            .await?;
            Ok::<_, StoreError>(stored)
        }
        .await;
        logged("create_user", result)
    }

    async fn get_all_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let result = async {
            let pool = self.pool.acquire().await?;
            let tasks = sqlx::query_as::<_, Task>(&format!(
                "SELECT {} FROM tasks ORDER BY created_date DESC",
                TASK_COLUMNS
            ))
            .fetch_all(&pool)
            .await?;
            Ok::<_, StoreError>(tasks)
        }
        .await;
        logged("get_all_tasks", result)
    }

    async fn get_stats(&self) -> Result<CacheStats, StoreError> {
        logged("get_stats", stats_query(&self.pool).await)
    }
}
