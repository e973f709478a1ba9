// Postgres cache - typed upserts and lookups for users, reports, tasks and attendance
//
// Rows use snake_case columns; the models carry the camelCase names on the
// serde side, so the same structs serve both boundaries.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgArguments, PgPool};
use sqlx::Row;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::{
    format_work_hours, Attendance, AttendanceStatus, CacheStats, Report, Task, TaskStatus, User,
    NO_WORK_HOURS,
};
use crate::services::pool::ConnectionPool;
use crate::services::store::CacheStore;

pub(crate) const USER_COLUMNS: &str =
    "telegram_id, notion_id, name, username, position, is_active, registration_date";

pub(crate) const REPORT_COLUMNS: &str = "id, notion_id, telegram_id, employee_name, date, \
     what_done, problems, goals, timestamp, status, synced";

pub(crate) const TASK_COLUMNS: &str = "id, notion_id, task_id, title, description, assignee_id, \
     assignee_name, creator_id, creator_name, status, priority, created_date, deadline, \
     completed_date, synced";

pub(crate) const ATTENDANCE_COLUMNS: &str = "id, notion_id, employee_id, employee_name, date, \
     check_in, check_out, work_hours, status, location_in, location_out, synced";

/// Create-if-not-exists statements, run once at service start
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        telegram_id TEXT PRIMARY KEY,
        notion_id TEXT,
        name TEXT NOT NULL,
        username TEXT,
        position TEXT,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        registration_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reports (
        id TEXT PRIMARY KEY,
        notion_id TEXT,
        telegram_id TEXT NOT NULL,
        employee_name TEXT NOT NULL DEFAULT '',
        date DATE NOT NULL,
        what_done TEXT NOT NULL DEFAULT '',
        problems TEXT NOT NULL DEFAULT '',
        goals TEXT NOT NULL DEFAULT '',
        timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        status TEXT NOT NULL,
        synced BOOLEAN NOT NULL DEFAULT FALSE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_reports_telegram_id ON reports (telegram_id)",
    "CREATE INDEX IF NOT EXISTS idx_reports_date ON reports (date)",
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id TEXT PRIMARY KEY,
        notion_id TEXT,
        task_id TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        assignee_id TEXT NOT NULL,
        assignee_name TEXT NOT NULL DEFAULT '',
        creator_id TEXT NOT NULL DEFAULT '',
        creator_name TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL,
        priority TEXT NOT NULL,
        created_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deadline DATE,
        completed_date TIMESTAMPTZ,
        synced BOOLEAN NOT NULL DEFAULT FALSE,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_tasks_assignee_id ON tasks (assignee_id)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks (status)",
    r#"
    CREATE TABLE IF NOT EXISTS attendance (
        id TEXT PRIMARY KEY,
        notion_id TEXT,
        employee_id TEXT NOT NULL,
        employee_name TEXT NOT NULL DEFAULT '',
        date DATE NOT NULL,
        check_in TIMESTAMPTZ NOT NULL,
        check_out TIMESTAMPTZ,
        work_hours DOUBLE PRECISION,
        status TEXT NOT NULL,
        location_in TEXT,
        location_out TEXT,
        synced BOOLEAN NOT NULL DEFAULT FALSE,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (employee_id, date)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance (date)",
];

/// LocalCache implementation over its own connection pool
#[derive(Clone)]
pub struct PgCache {
    pool: Arc<ConnectionPool>,
}

impl PgCache {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    async fn pool(&self) -> Result<PgPool, StoreError> {
        self.pool.acquire().await
    }
}

#[async_trait]
impl CacheStore for PgCache {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        info!("Cache schema ready");
        Ok(())
    }

    // =========================================================================
    // USERS
    // =========================================================================

    async fn cache_user(&self, user: &User) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        sqlx::query(
            r#"
            INSERT INTO users (telegram_id, notion_id, name, username, position, is_active, registration_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (telegram_id) DO UPDATE SET
                notion_id = COALESCE(EXCLUDED.notion_id, users.notion_id),
                name = EXCLUDED.name,
                username = EXCLUDED.username,
                position = EXCLUDED.position,
                is_active = EXCLUDED.is_active,
                updated_at = NOW()
            "#,
        )
        .bind(&user.telegram_id)
        .bind(&user.notion_id)
        .bind(&user.name)
        .bind(&user.username)
        .bind(&user.position)
        .bind(user.is_active)
        .bind(user.registration_date)
        .execute(&pool)
        .await?;

        debug!(telegram_id = %user.telegram_id, "Cached user");
        Ok(())
    }

    async fn get_cached_user(&self, telegram_id: &str) -> Result<Option<User>, StoreError> {
        let pool = self.pool().await?;
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE telegram_id = $1",
            USER_COLUMNS
        ))
        .bind(telegram_id)
        .fetch_optional(&pool)
        .await?;
        Ok(user)
    }

    // =========================================================================
    // REPORTS
    // =========================================================================

    /// Reports are immutable after creation; only sync bookkeeping changes
    async fn cache_report(&self, report: &Report) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        sqlx::query(
            r#"
            INSERT INTO reports (id, notion_id, telegram_id, employee_name, date, what_done,
                                 problems, goals, timestamp, status, synced)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                notion_id = COALESCE(EXCLUDED.notion_id, reports.notion_id),
                synced = EXCLUDED.synced
            "#,
        )
        .bind(&report.id)
        .bind(&report.notion_id)
        .bind(&report.telegram_id)
        .bind(&report.employee_name)
        .bind(report.date)
        .bind(&report.what_done)
        .bind(&report.problems)
        .bind(&report.goals)
        .bind(report.timestamp)
        .bind(&report.status)
        .bind(report.synced)
        .execute(&pool)
        .await?;

        debug!(report_id = %report.id, "Cached report");
        Ok(())
    }

    async fn get_cached_today_report(
        &self,
        telegram_id: &str,
        today: NaiveDate,
    ) -> Result<Option<Report>, StoreError> {
        let pool = self.pool().await?;
        let report = sqlx::query_as::<_, Report>(&format!(
            "SELECT {} FROM reports WHERE telegram_id = $1 AND date = $2 \
             ORDER BY timestamp DESC LIMIT 1",
            REPORT_COLUMNS
        ))
        .bind(telegram_id)
        .bind(today)
        .fetch_optional(&pool)
        .await?;
        Ok(report)
    }

    async fn get_cached_user_reports(
        &self,
        telegram_id: &str,
        limit: i64,
    ) -> Result<Vec<Report>, StoreError> {
        let pool = self.pool().await?;
        let reports = sqlx::query_as::<_, Report>(&format!(
            "SELECT {} FROM reports WHERE telegram_id = $1 \
             ORDER BY date DESC, timestamp DESC LIMIT $2",
            REPORT_COLUMNS
        ))
        .bind(telegram_id)
        .bind(limit)
        .fetch_all(&pool)
        .await?;
        Ok(reports)
    }

    async fn get_cached_reports_for_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        employee_id: Option<&str>,
    ) -> Result<Vec<Report>, StoreError> {
        let pool = self.pool().await?;
        let reports = sqlx::query_as::<_, Report>(&format!(
            "SELECT {} FROM reports \
             WHERE date BETWEEN $1 AND $2 AND ($3::text IS NULL OR telegram_id = $3) \
             ORDER BY date DESC, timestamp DESC",
            REPORT_COLUMNS
        ))
        .bind(start)
        .bind(end)
        .bind(employee_id)
        .fetch_all(&pool)
        .await?;
        Ok(reports)
    }

    async fn get_cached_report(&self, id: &str) -> Result<Option<Report>, StoreError> {
        let pool = self.pool().await?;
        let report = sqlx::query_as::<_, Report>(&format!(
            "SELECT {} FROM reports WHERE id = $1",
            REPORT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&pool)
        .await?;
        Ok(report)
    }

    async fn get_unsynced_reports(&self) -> Result<Vec<Report>, StoreError> {
        let pool = self.pool().await?;
        let reports = sqlx::query_as::<_, Report>(&format!(
            "SELECT {} FROM reports WHERE synced = FALSE ORDER BY timestamp",
            REPORT_COLUMNS
        ))
        .fetch_all(&pool)
        .await?;
        Ok(reports)
    }

    async fn mark_report_synced(&self, id: &str, notion_id: Option<&str>) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        sqlx::query(
            "UPDATE reports SET synced = TRUE, notion_id = COALESCE($2, notion_id) WHERE id = $1",
        )
        .bind(id)
        .bind(notion_id)
        .execute(&pool)
        .await?;
        Ok(())
    }

    // =========================================================================
    // TASKS
    // =========================================================================

    /// Title and assignee are set once; conflicts refresh only the mutable fields.
    /// A synced copy never overwrites a row with an unpushed local edit.
    async fn cache_task(&self, task: &Task) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        sqlx::query(
            r#"
            INSERT INTO tasks (id, notion_id, task_id, title, description, assignee_id, assignee_name,
                               creator_id, creator_name, status, priority, created_date, deadline,
                               completed_date, synced)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO UPDATE SET
                notion_id = COALESCE(EXCLUDED.notion_id, tasks.notion_id),
                status = EXCLUDED.status,
                completed_date = COALESCE(EXCLUDED.completed_date, tasks.completed_date),
                synced = EXCLUDED.synced,
                updated_at = NOW()
            WHERE tasks.synced OR NOT EXCLUDED.synced
            "#,
        )
        .bind(&task.id)
        .bind(&task.notion_id)
        .bind(&task.task_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.assignee_id)
        .bind(&task.assignee_name)
        .bind(&task.creator_id)
        .bind(&task.creator_name)
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(task.created_date)
        .bind(task.deadline)
        .bind(task.completed_date)
        .bind(task.synced)
        .execute(&pool)
        .await?;

        debug!(task_id = %task.id, "Cached task");
        Ok(())
    }

    async fn get_cached_task(&self, id: &str) -> Result<Option<Task>, StoreError> {
        let pool = self.pool().await?;
        let task = sqlx::query_as::<_, Task>(&format!(
            "SELECT {} FROM tasks WHERE id = $1 OR notion_id = $1 LIMIT 1",
            TASK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&pool)
        .await?;
        Ok(task)
    }

    async fn get_cached_tasks_by_assignee(
        &self,
        assignee_id: &str,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, StoreError> {
        let pool = self.pool().await?;
        let tasks = sqlx::query_as::<_, Task>(&format!(
            "SELECT {} FROM tasks WHERE assignee_id = $1 AND ($2::text IS NULL OR status = $2) \
             ORDER BY created_date DESC",
            TASK_COLUMNS
        ))
        .bind(assignee_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&pool)
        .await?;
        Ok(tasks)
    }

    async fn get_all_cached_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let pool = self.pool().await?;
        let tasks = sqlx::query_as::<_, Task>(&format!(
            "SELECT {} FROM tasks ORDER BY created_date DESC",
            TASK_COLUMNS
        ))
        .fetch_all(&pool)
        .await?;
        Ok(tasks)
    }

    /// `completed_date` is stamped only when the new status is Completed
    async fn update_cached_task_status(&self, id: &str, status: TaskStatus) -> Result<bool, StoreError> {
        let pool = self.pool().await?;
        let result = sqlx::query(
            r#"
            UPDATE tasks SET
                status = $2::text,
                completed_date = CASE WHEN $2::text = $3::text THEN NOW() ELSE completed_date END,
                synced = FALSE,
                updated_at = NOW()
            WHERE id = $1 OR notion_id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(TaskStatus::Completed.as_str())
        .execute(&pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_unsynced_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let pool = self.pool().await?;
        let tasks = sqlx::query_as::<_, Task>(&format!(
            "SELECT {} FROM tasks WHERE synced = FALSE ORDER BY created_date",
            TASK_COLUMNS
        ))
        .fetch_all(&pool)
        .await?;
        Ok(tasks)
    }

    async fn mark_task_synced(
        &self,
        id: &str,
        notion_id: Option<&str>,
        pushed: TaskStatus,
    ) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        sqlx::query(
            "UPDATE tasks SET synced = (synced OR status = $3), \
             notion_id = COALESCE($2, notion_id), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(notion_id)
        .bind(pushed.as_str())
        .execute(&pool)
        .await?;
        Ok(())
    }

    // =========================================================================
    // ATTENDANCE
    // =========================================================================

    /// Conflicts on (employee_id, date) only touch the check-out side of the row,
    /// and a synced copy never overwrites an unpushed check-out
    async fn cache_attendance(&self, attendance: &Attendance) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        sqlx::query(
            r#"
            INSERT INTO attendance (id, notion_id, employee_id, employee_name, date, check_in,
                                    check_out, work_hours, status, location_in, location_out, synced)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (employee_id, date) DO UPDATE SET
                notion_id = COALESCE(EXCLUDED.notion_id, attendance.notion_id),
                check_out = COALESCE(EXCLUDED.check_out, attendance.check_out),
                work_hours = COALESCE(EXCLUDED.work_hours, attendance.work_hours),
                status = CASE WHEN EXCLUDED.check_out IS NOT NULL THEN EXCLUDED.status
                              ELSE attendance.status END,
                location_out = COALESCE(EXCLUDED.location_out, attendance.location_out),
                synced = CASE WHEN EXCLUDED.check_out IS NOT NULL THEN EXCLUDED.synced
                              ELSE attendance.synced END,
                updated_at = NOW()
            WHERE attendance.synced OR NOT EXCLUDED.synced
            "#,
        )
        .bind(&attendance.id)
        .bind(&attendance.notion_id)
        .bind(&attendance.employee_id)
        .bind(&attendance.employee_name)
        .bind(attendance.date)
        .bind(attendance.check_in)
        .bind(attendance.check_out)
        .bind(attendance.work_hours)
        .bind(attendance.status.as_str())
        .bind(&attendance.location_in)
        .bind(&attendance.location_out)
        .bind(attendance.synced)
        .execute(&pool)
        .await?;

        debug!(employee_id = %attendance.employee_id, date = %attendance.date, "Cached attendance");
        Ok(())
    }

    async fn get_cached_today_attendance(
        &self,
        employee_id: &str,
        today: NaiveDate,
    ) -> Result<Option<Attendance>, StoreError> {
        let pool = self.pool().await?;
        let row = sqlx::query_as::<_, Attendance>(&format!(
            "SELECT {} FROM attendance WHERE employee_id = $1 AND date = $2",
            ATTENDANCE_COLUMNS
        ))
        .bind(employee_id)
        .bind(today)
        .fetch_optional(&pool)
        .await?;
        Ok(row)
    }

    async fn get_cached_attendance_for_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        employee_id: Option<&str>,
    ) -> Result<Vec<Attendance>, StoreError> {
        let pool = self.pool().await?;
        let rows = sqlx::query_as::<_, Attendance>(&format!(
            "SELECT {} FROM attendance \
             WHERE date BETWEEN $1 AND $2 AND ($3::text IS NULL OR employee_id = $3) \
             ORDER BY date DESC, check_in DESC",
            ATTENDANCE_COLUMNS
        ))
        .bind(start)
        .bind(end)
        .bind(employee_id)
        .fetch_all(&pool)
        .await?;
        Ok(rows)
    }

    /// Work hours are computed from the stored check-in inside the same statement
    async fn update_attendance_check_out(
        &self,
        employee_id: &str,
        date: NaiveDate,
        check_out: DateTime<Utc>,
        location: Option<&str>,
    ) -> Result<String, StoreError> {
        let pool = self.pool().await?;
        let hours: Option<f64> = sqlx::query_scalar(
            r#"
            UPDATE attendance SET
                check_out = $3::timestamptz,
                work_hours = ROUND((EXTRACT(EPOCH FROM ($3::timestamptz - check_in)) / 3600.0)::numeric, 1)::float8,
                status = $4,
                location_out = COALESCE($5, location_out),
                synced = FALSE,
                updated_at = NOW()
            WHERE employee_id = $1 AND date = $2
            RETURNING work_hours
            "#,
        )
        .bind(employee_id)
        .bind(date)
        .bind(check_out)
        .bind(AttendanceStatus::Left.as_str())
        .bind(location)
        .fetch_optional(&pool)
        .await?;

        match hours {
            Some(hours) => Ok(format_work_hours(hours)),
            None => {
                debug!(employee_id, %date, "No check-in to close");
                Ok(NO_WORK_HOURS.to_string())
            }
        }
    }

    async fn mark_attendance_synced(
        &self,
        employee_id: &str,
        date: NaiveDate,
        notion_id: Option<&str>,
        pushed_check_out: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        sqlx::query(
            "UPDATE attendance SET \
             synced = (synced OR check_out IS NOT DISTINCT FROM $4::timestamptz), \
             notion_id = COALESCE($3, notion_id), updated_at = NOW() \
             WHERE employee_id = $1 AND date = $2",
        )
        .bind(employee_id)
        .bind(date)
        .bind(notion_id)
        .bind(pushed_check_out)
        .execute(&pool)
        .await?;
        Ok(())
    }

    async fn get_cache_stats(&self) -> Result<CacheStats, StoreError> {
        stats_query(&self.pool).await
    }
}

/// Row counts plus database size, shared with the direct store
pub(crate) async fn stats_query(pool: &ConnectionPool) -> Result<CacheStats, StoreError> {
    let rows = pool
        .query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS users,
                (SELECT COUNT(*) FROM reports) AS reports,
                (SELECT COUNT(*) FROM tasks) AS tasks,
                (SELECT COUNT(*) FROM attendance) AS attendance,
                pg_database_size(current_database()) AS size_bytes
            "#,
            PgArguments::default(),
        )
        .await?;

    let row = rows
        .first()
        .ok_or_else(|| StoreError::Database(sqlx::Error::RowNotFound))?;

    Ok(CacheStats::from_bytes(
        row.try_get("users")?,
        row.try_get("reports")?,
        row.try_get("tasks")?,
        row.try_get("attendance")?,
        row.try_get("size_bytes")?,
    ))
}
