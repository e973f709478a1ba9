// Store seams used by the coalescing service
//
// `CacheStore` and `DirectStore` are backed by Postgres in production,
// `RemoteStore` by Notion. All three are held as `Arc<dyn ...>`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{RemoteError, StoreError};
use crate::models::{Attendance, CacheStats, Report, Task, TaskStatus, User};

/// Typed persistence of the four entities with upsert semantics
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Idempotent schema creation; must run before any other operation
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    // Users
    async fn cache_user(&self, user: &User) -> Result<(), StoreError>;
    async fn get_cached_user(&self, telegram_id: &str) -> Result<Option<User>, StoreError>;

    // Reports
    async fn cache_report(&self, report: &Report) -> Result<(), StoreError>;
    async fn get_cached_today_report(
        &self,
        telegram_id: &str,
        today: NaiveDate,
    ) -> Result<Option<Report>, StoreError>;
    async fn get_cached_user_reports(
        &self,
        telegram_id: &str,
        limit: i64,
    ) -> Result<Vec<Report>, StoreError>;
    async fn get_cached_reports_for_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        employee_id: Option<&str>,
    ) -> Result<Vec<Report>, StoreError>;
    async fn get_cached_report(&self, id: &str) -> Result<Option<Report>, StoreError>;
    async fn get_unsynced_reports(&self) -> Result<Vec<Report>, StoreError>;
    async fn mark_report_synced(&self, id: &str, notion_id: Option<&str>) -> Result<(), StoreError>;

    // Tasks
    async fn cache_task(&self, task: &Task) -> Result<(), StoreError>;
    async fn get_cached_task(&self, id: &str) -> Result<Option<Task>, StoreError>;
    async fn get_cached_tasks_by_assignee(
        &self,
        assignee_id: &str,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, StoreError>;
    async fn get_all_cached_tasks(&self) -> Result<Vec<Task>, StoreError>;
    /// Returns false when no row matched
    async fn update_cached_task_status(&self, id: &str, status: TaskStatus) -> Result<bool, StoreError>;
    async fn get_unsynced_tasks(&self) -> Result<Vec<Task>, StoreError>;
    /// Records the Notion id; clears the unsynced flag only if the row still
    /// has the pushed status
    async fn mark_task_synced(
        &self,
        id: &str,
        notion_id: Option<&str>,
        pushed: TaskStatus,
    ) -> Result<(), StoreError>;

    // Attendance
    async fn cache_attendance(&self, attendance: &Attendance) -> Result<(), StoreError>;
    async fn get_cached_today_attendance(
        &self,
        employee_id: &str,
        today: NaiveDate,
    ) -> Result<Option<Attendance>, StoreError>;
    async fn get_cached_attendance_for_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        employee_id: Option<&str>,
    ) -> Result<Vec<Attendance>, StoreError>;
    /// Returns the formatted work hours, or `"0"` when there is no check-in
    async fn update_attendance_check_out(
        &self,
        employee_id: &str,
        date: NaiveDate,
        check_out: DateTime<Utc>,
        location: Option<&str>,
    ) -> Result<String, StoreError>;
    /// Clears the unsynced flag only if the check-out is still the pushed one
    async fn mark_attendance_synced(
        &self,
        employee_id: &str,
        date: NaiveDate,
        notion_id: Option<&str>,
        pushed_check_out: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    async fn get_cache_stats(&self) -> Result<CacheStats, StoreError>;
}

/// Lean direct read path for the hottest queries.
///
/// Errors are returned, not swallowed, so callers can tell "no rows" apart
/// from "store unavailable".
#[async_trait]
pub trait DirectStore: Send + Sync {
    async fn get_user_by_telegram_id(&self, telegram_id: &str) -> Result<Option<User>, StoreError>;
    async fn get_tasks_by_assignee(
        &self,
        assignee_id: &str,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, StoreError>;
    async fn create_user(&self, user: &User) -> Result<User, StoreError>;
    async fn get_all_tasks(&self) -> Result<Vec<Task>, StoreError>;
    async fn get_stats(&self) -> Result<CacheStats, StoreError>;
}

/// The system of record. Creates return the remote-assigned id.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn create_user(&self, user: &User) -> Result<String, RemoteError>;
    async fn get_user_by_telegram_id(&self, telegram_id: &str) -> Result<Option<User>, RemoteError>;
    async fn update_user(&self, notion_id: &str, user: &User) -> Result<(), RemoteError>;

    async fn create_report(&self, report: &Report) -> Result<String, RemoteError>;
    async fn get_today_report(
        &self,
        telegram_id: &str,
        today: NaiveDate,
    ) -> Result<Option<Report>, RemoteError>;
    async fn get_user_reports(&self, telegram_id: &str, limit: i64) -> Result<Vec<Report>, RemoteError>;
    async fn get_reports_for_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        employee_id: Option<&str>,
    ) -> Result<Vec<Report>, RemoteError>;

    async fn create_task(&self, task: &Task) -> Result<String, RemoteError>;
    async fn get_tasks_by_assignee(
        &self,
        assignee_id: &str,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, RemoteError>;
    async fn get_all_tasks(&self) -> Result<Vec<Task>, RemoteError>;
    async fn update_task_status(
        &self,
        notion_id: &str,
        status: TaskStatus,
        note: Option<&str>,
    ) -> Result<(), RemoteError>;

    async fn create_attendance(&self, attendance: &Attendance) -> Result<String, RemoteError>;
    async fn get_today_attendance(
        &self,
        employee_id: &str,
        today: NaiveDate,
    ) -> Result<Option<Attendance>, RemoteError>;
    async fn update_attendance_check_out(
        &self,
        notion_id: &str,
        check_out: DateTime<Utc>,
        work_hours: f64,
        location: Option<&str>,
    ) -> Result<(), RemoteError>;
    async fn get_attendance_for_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        employee_id: Option<&str>,
    ) -> Result<Vec<Attendance>, RemoteError>;
}
