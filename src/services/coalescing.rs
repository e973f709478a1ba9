// Coalescing service - single entry point for users, reports, tasks and attendance
//
// Reads try DirectStore, then the local cache, then Notion. Writes land in the
// local cache first and are mirrored to Notion best-effort.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use futures::future::join_all;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::SyncMode;
use crate::error::{RemoteError, ServiceError, ServiceResult};
use crate::models::{
    compute_work_hours, format_work_hours, Attendance, AttendanceKey, CacheStats, CheckIn,
    NewReport, NewTask, NewUser, ReconcileSummary, Report, StatusUpdate, Task,
    TaskDatabaseProbe, TaskStatus, User, NO_WORK_HOURS,
};
use crate::services::store::{CacheStore, DirectStore, RemoteStore};
use crate::services::sync_locks::{attendance_key, report_key, task_key, user_key, SyncLocks};

/// Titles listed per source by the tasks database probe
const PROBE_SAMPLE_SIZE: usize = 5;

/// Lifecycle of the service; moves forward only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Uninitialized,
    Initializing,
    Ready,
}

impl ServiceState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ServiceState::Uninitialized,
            1 => ServiceState::Initializing,
            _ => ServiceState::Ready,
        }
    }
}

pub struct CoalescingService {
    remote: Arc<dyn RemoteStore>,
    cache: Option<Arc<dyn CacheStore>>,
    direct: Option<Arc<dyn DirectStore>>,
    init: OnceCell<()>,
    state: AtomicU8,
    cache_enabled: AtomicBool,
    timezone: Tz,
    sync_mode: SyncMode,
    locks: Arc<SyncLocks>,
    last_task_millis: AtomicI64,
}

/// Tracks one pass through the fallback chain of a read
struct Attempts {
    operation: &'static str,
    failures: Vec<String>,
    answered: bool,
}

impl Attempts {
    fn new(operation: &'static str) -> Self {
        Self {
            operation,
            failures: Vec::new(),
            answered: false,
        }
    }

    fn failed(&mut self, source: &str, error: impl Display) {
        warn!(operation = self.operation, source, error = %error, "Read failed, trying next source");
        self.failures.push(format!("{}: {}", source, error));
    }

    fn miss(&mut self, source: &str) {
        debug!(operation = self.operation, source, "No result, trying next source");
        self.answered = true;
    }

    /// Empty result when any source answered, error when every source failed
    fn finish<T>(self, empty: T) -> ServiceResult<T> {
        if self.answered {
            Ok(empty)
        } else {
            Err(ServiceError::Unavailable(format!(
                "{}: {}",
                self.operation,
                self.failures.join("; ")
            )))
        }
    }
}

impl CoalescingService {
    pub fn new(remote: Arc<dyn RemoteStore>, timezone: Tz, sync_mode: SyncMode) -> Self {
        Self {
            remote,
            cache: None,
            direct: None,
            init: OnceCell::new(),
            state: AtomicU8::new(ServiceState::Uninitialized as u8),
            cache_enabled: AtomicBool::new(false),
            timezone,
            sync_mode,
            locks: Arc::new(SyncLocks::new()),
            last_task_millis: AtomicI64::new(0),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_direct(mut self, direct: Arc<dyn DirectStore>) -> Self {
        self.direct = Some(direct);
        self
    }

    /// Prepare the cache schema. Always ends in `Ready`; a cache that cannot
    /// be prepared leaves the service running against Notion alone.
    pub async fn initialize(&self) {
        self.init
            .get_or_init(|| async {
                self.state
                    .store(ServiceState::Initializing as u8, Ordering::SeqCst);

                match &self.cache {
                    Some(cache) => match cache.ensure_schema().await {
                        Ok(()) => {
                            self.cache_enabled.store(true, Ordering::SeqCst);
                            info!("Local cache ready");
                        }
                        Err(e) => {
                            warn!(error = %e, "Local cache unavailable, running cache-disabled");
                        }
                    },
                    None => info!("No local cache configured, running cache-disabled"),
                }

                self.state.store(ServiceState::Ready as u8, Ordering::SeqCst);
                info!(
                    cache_enabled = self.is_cache_enabled(),
                    direct_store = self.direct.is_some(),
                    "Coalescing service ready"
                );
            })
            .await;
    }

    pub fn state(&self) -> ServiceState {
        ServiceState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_cache_enabled(&self) -> bool {
        self.cache_enabled.load(Ordering::SeqCst)
    }

    /// Current date in the configured timezone
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    async fn cache(&self) -> Option<Arc<dyn CacheStore>> {
        self.initialize().await;
        if self.is_cache_enabled() {
            self.cache.clone()
        } else {
            None
        }
    }

    /// Run a best-effort side effect according to the sync mode
    async fn dispatch<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.sync_mode {
            SyncMode::Background => {
                tokio::spawn(work);
            }
            SyncMode::Inline => work.await,
        }
    }

    fn syncer(&self, cache: Arc<dyn CacheStore>) -> Syncer {
        Syncer {
            remote: Arc::clone(&self.remote),
            cache,
            locks: Arc::clone(&self.locks),
        }
    }

    /// `task-<millis>`, strictly increasing within the process
    fn next_task_id(&self, now: DateTime<Utc>) -> String {
        let millis = now.timestamp_millis();
        let next = |last: i64| last.max(millis - 1) + 1;
        let previous = self
            .last_task_millis
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(next(last)))
            .unwrap_or_else(|last| last);
        format!("task-{}", next(previous))
    }

    // =========================================================================
    // USERS
    // =========================================================================

    pub async fn get_user_by_telegram_id(&self, telegram_id: &str) -> ServiceResult<Option<User>> {
        let mut attempts = Attempts::new("get_user_by_telegram_id");

        if let Some(direct) = &self.direct {
            match direct.get_user_by_telegram_id(telegram_id).await {
                Ok(user) => return Ok(user),
                Err(e) => attempts.failed("direct", e),
            }
        }

        let cache = self.cache().await;
        if let Some(cache) = &cache {
            match cache.get_cached_user(telegram_id).await {
                Ok(Some(user)) => return Ok(Some(user)),
                Ok(None) => attempts.miss("cache"),
                Err(e) => attempts.failed("cache", e),
            }
        }

        match self.remote.get_user_by_telegram_id(telegram_id).await {
            Ok(Some(user)) => {
                if let Some(cache) = cache {
                    let cached = user.clone();
                    self.dispatch(async move {
                        if let Err(e) = cache.cache_user(&cached).await {
                            warn!(telegram_id = %cached.telegram_id, error = %e, "Failed to cache user");
                        }
                    })
                    .await;
                }
                Ok(Some(user))
            }
            Ok(None) => {
                attempts.miss("remote");
                attempts.finish(None)
            }
            Err(e) => {
                attempts.failed("remote", e);
                attempts.finish(None)
            }
        }
    }

    /// Register or refresh a user locally, then mirror to Notion
    pub async fn create_user(&self, new_user: NewUser) -> ServiceResult<User> {
        new_user.validate().map_err(ServiceError::Validation)?;
        let user = new_user.into_user(Utc::now());

        let cache = self.cache().await;
        let stored = if let Some(direct) = &self.direct {
            direct.create_user(&user).await?
        } else if let Some(cache) = &cache {
            cache.cache_user(&user).await?;
            let refreshed = cache.get_cached_user(&user.telegram_id).await?;
            refreshed.unwrap_or(user)
        } else {
            // Notion is the only store
            let mut user = user;
            user.notion_id = Some(push_user(self.remote.as_ref(), &user).await?);
            return Ok(user);
        };

        match cache {
            Some(cache) => {
                let syncer = self.syncer(cache);
                let synced = stored.clone();
                self.dispatch(async move {
                    syncer.user(&synced).await;
                })
                .await;
            }
            None => {
                // Direct store without a cache: nowhere to record the Notion id
                let remote = Arc::clone(&self.remote);
                let synced = stored.clone();
                self.dispatch(async move {
                    if let Err(e) = push_user(remote.as_ref(), &synced).await {
                        warn!(telegram_id = %synced.telegram_id, error = %e, "User sync to Notion failed");
                    }
                })
                .await;
            }
        }

        Ok(stored)
    }

    // =========================================================================
    // REPORTS
    // =========================================================================

    /// At most one report per user per day, as far as the local cache knows
    pub async fn create_report(&self, new_report: NewReport) -> ServiceResult<Report> {
        new_report.validate().map_err(ServiceError::Validation)?;
        let today = self.today();

        let Some(cache) = self.cache().await else {
            let mut report = new_report.into_report(today, Utc::now());
            report.notion_id = Some(self.remote.create_report(&report).await?);
            report.synced = true;
            return Ok(report);
        };

        match cache.get_cached_today_report(&new_report.telegram_id, today).await {
            Ok(Some(existing)) => {
                info!(
                    telegram_id = %existing.telegram_id,
                    report_id = %existing.id,
                    "Report already submitted today"
                );
                return Ok(existing);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Duplicate report check failed"),
        }

        let report = new_report.into_report(today, Utc::now());
        cache.cache_report(&report).await?;
        info!(report_id = %report.id, telegram_id = %report.telegram_id, "Report saved locally");

        let syncer = self.syncer(cache);
        let id = report.id.clone();
        self.dispatch(async move {
            syncer.report(&id).await;
        })
        .await;

        Ok(report)
    }

    pub async fn get_today_report(&self, telegram_id: &str) -> ServiceResult<Option<Report>> {
        let today = self.today();
        let mut attempts = Attempts::new("get_today_report");

        let cache = self.cache().await;
        if let Some(cache) = &cache {
            match cache.get_cached_today_report(telegram_id, today).await {
                Ok(Some(report)) => return Ok(Some(report)),
                Ok(None) => attempts.miss("cache"),
                Err(e) => attempts.failed("cache", e),
            }
        }

        match self.remote.get_today_report(telegram_id, today).await {
            Ok(Some(report)) => {
                self.recache_reports(cache, vec![report.clone()]).await;
                Ok(Some(report))
            }
            Ok(None) => {
                attempts.miss("remote");
                attempts.finish(None)
            }
            Err(e) => {
                attempts.failed("remote", e);
                attempts.finish(None)
            }
        }
    }

    pub async fn get_user_reports(&self, telegram_id: &str, limit: i64) -> ServiceResult<Vec<Report>> {
        let mut attempts = Attempts::new("get_user_reports");

        let cache = self.cache().await;
        if let Some(cache) = &cache {
            match cache.get_cached_user_reports(telegram_id, limit).await {
                Ok(reports) if !reports.is_empty() => return Ok(reports),
                Ok(_) => attempts.miss("cache"),
                Err(e) => attempts.failed("cache", e),
            }
        }

        match self.remote.get_user_reports(telegram_id, limit).await {
            Ok(reports) => {
                self.recache_reports(cache, reports.clone()).await;
                Ok(reports)
            }
            Err(e) => {
                attempts.failed("remote", e);
                attempts.finish(Vec::new())
            }
        }
    }

    pub async fn get_reports_for_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        employee_id: Option<&str>,
    ) -> ServiceResult<Vec<Report>> {
        let mut attempts = Attempts::new("get_reports_for_period");

        let cache = self.cache().await;
        if let Some(cache) = &cache {
            match cache.get_cached_reports_for_period(start, end, employee_id).await {
                Ok(reports) if !reports.is_empty() => return Ok(reports),
                Ok(_) => attempts.miss("cache"),
                Err(e) => attempts.failed("cache", e),
            }
        }

        match self.remote.get_reports_for_period(start, end, employee_id).await {
            Ok(reports) => {
                self.recache_reports(cache, reports.clone()).await;
                Ok(reports)
            }
            Err(e) => {
                attempts.failed("remote", e);
                attempts.finish(Vec::new())
            }
        }
    }

    pub async fn get_unsynced_reports(&self) -> ServiceResult<Vec<Report>> {
        match self.cache().await {
            Some(cache) => Ok(cache.get_unsynced_reports().await?),
            None => Ok(Vec::new()),
        }
    }

    async fn recache_reports(&self, cache: Option<Arc<dyn CacheStore>>, reports: Vec<Report>) {
        let Some(cache) = cache else { return };
        if reports.is_empty() {
            return;
        }
        self.dispatch(async move {
            let results = join_all(reports.iter().map(|r| cache.cache_report(r))).await;
            for (report, result) in reports.iter().zip(results) {
                if let Err(e) = result {
                    warn!(report_id = %report.id, error = %e, "Failed to cache report");
                }
            }
        })
        .await;
    }

    // =========================================================================
    // TASKS
    // =========================================================================

    pub async fn create_task(&self, new_task: NewTask) -> ServiceResult<Task> {
        new_task.validate().map_err(ServiceError::Validation)?;
        let now = Utc::now();
        let task = new_task.into_task(self.next_task_id(now), now);

        let Some(cache) = self.cache().await else {
            let mut task = task;
            task.notion_id = Some(self.remote.create_task(&task).await?);
            task.synced = true;
            return Ok(task);
        };

        cache.cache_task(&task).await?;
        info!(task_id = %task.id, assignee_id = %task.assignee_id, "Task saved locally");

        let syncer = self.syncer(cache);
        let id = task.id.clone();
        self.dispatch(async move {
            syncer.task(&id, None).await;
        })
        .await;

        Ok(task)
    }

    pub async fn get_tasks_by_assignee(
        &self,
        assignee_id: &str,
        status: Option<TaskStatus>,
    ) -> ServiceResult<Vec<Task>> {
        let mut attempts = Attempts::new("get_tasks_by_assignee");

        if let Some(direct) = &self.direct {
            match direct.get_tasks_by_assignee(assignee_id, status).await {
                Ok(tasks) => return Ok(tasks),
                Err(e) => attempts.failed("direct", e),
            }
        }

        let cache = self.cache().await;
        if let Some(cache) = &cache {
            match cache.get_cached_tasks_by_assignee(assignee_id, status).await {
                Ok(tasks) if !tasks.is_empty() => return Ok(tasks),
                Ok(_) => attempts.miss("cache"),
                Err(e) => attempts.failed("cache", e),
            }
        }

        match self.remote.get_tasks_by_assignee(assignee_id, status).await {
            Ok(tasks) => {
                self.recache_tasks(cache, tasks.clone()).await;
                Ok(tasks)
            }
            Err(e) => {
                attempts.failed("remote", e);
                attempts.finish(Vec::new())
            }
        }
    }

    /// Rejects unknown status labels before touching any store
    pub async fn update_task_status(&self, task_id: &str, status: &str) -> ServiceResult<StatusUpdate> {
        let status: TaskStatus = status.parse().map_err(ServiceError::Validation)?;
        self.set_task_status(task_id, status, None).await
    }

    pub async fn complete_task(&self, task_id: &str, note: Option<&str>) -> ServiceResult<StatusUpdate> {
        self.set_task_status(task_id, TaskStatus::Completed, note).await
    }

    async fn set_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        note: Option<&str>,
    ) -> ServiceResult<StatusUpdate> {
        let cache = self.cache().await;

        let mut cached = None;
        if let Some(cache) = &cache {
            if cache.update_cached_task_status(task_id, status).await? {
                cached = cache.get_cached_task(task_id).await?;
            }
        }

        let (Some(cache), Some(task)) = (cache, cached) else {
            // Unknown locally: the id must be a Notion page id
            self.remote.update_task_status(task_id, status, note).await?;
            info!(task_id, status = %status, "Task status updated in Notion");
            return Ok(StatusUpdate { success: true });
        };

        info!(task_id = %task.id, status = %status, "Task status updated locally");

        let syncer = self.syncer(cache);
        let note = note.map(|n| n.to_string());
        self.dispatch(async move {
            syncer.task(&task.id, note.as_deref()).await;
        })
        .await;

        Ok(StatusUpdate { success: true })
    }

    pub async fn get_unsynced_tasks(&self) -> ServiceResult<Vec<Task>> {
        match self.cache().await {
            Some(cache) => Ok(cache.get_unsynced_tasks().await?),
            None => Ok(Vec::new()),
        }
    }

    async fn recache_tasks(&self, cache: Option<Arc<dyn CacheStore>>, tasks: Vec<Task>) {
        let Some(cache) = cache else { return };
        if tasks.is_empty() {
            return;
        }
        self.dispatch(async move {
            let results = join_all(tasks.iter().map(|t| cache.cache_task(t))).await;
            for (task, result) in tasks.iter().zip(results) {
                if let Err(e) = result {
                    warn!(task_id = %task.id, error = %e, "Failed to cache task");
                }
            }
        })
        .await;
    }

    // =========================================================================
    // ATTENDANCE
    // =========================================================================

    /// Check in for today. A second check-in keeps the first one's row.
    pub async fn create_attendance(&self, check_in: CheckIn) -> ServiceResult<Attendance> {
        check_in.validate().map_err(ServiceError::Validation)?;
        let today = self.today();

        let Some(cache) = self.cache().await else {
            if let Some(existing) = self
                .remote
                .get_today_attendance(&check_in.employee_id, today)
                .await?
            {
                return Ok(existing);
            }
            let mut attendance = check_in.into_attendance(today, Utc::now());
            attendance.notion_id = Some(self.remote.create_attendance(&attendance).await?);
            attendance.synced = true;
            return Ok(attendance);
        };

        let attendance = check_in.into_attendance(today, Utc::now());
        cache.cache_attendance(&attendance).await?;
        let stored = cache
            .get_cached_today_attendance(&attendance.employee_id, today)
            .await?
            .unwrap_or(attendance);
        info!(employee_id = %stored.employee_id, date = %stored.date, "Check-in saved locally");

        if !stored.synced {
            let syncer = self.syncer(cache);
            let (employee_id, date) = (stored.employee_id.clone(), stored.date);
            self.dispatch(async move {
                syncer.attendance(&employee_id, date).await;
            })
            .await;
        }

        Ok(stored)
    }

    pub async fn get_today_attendance(&self, employee_id: &str) -> ServiceResult<Option<Attendance>> {
        let today = self.today();
        let mut attempts = Attempts::new("get_today_attendance");

        let cache = self.cache().await;
        if let Some(cache) = &cache {
            match cache.get_cached_today_attendance(employee_id, today).await {
                Ok(Some(row)) => return Ok(Some(row)),
                Ok(None) => attempts.miss("cache"),
                Err(e) => attempts.failed("cache", e),
            }
        }

        match self.remote.get_today_attendance(employee_id, today).await {
            Ok(Some(row)) => {
                self.recache_attendance(cache, vec![row.clone()]).await;
                Ok(Some(row))
            }
            Ok(None) => {
                attempts.miss("remote");
                attempts.finish(None)
            }
            Err(e) => {
                attempts.failed("remote", e);
                attempts.finish(None)
            }
        }
    }

    /// Close the day and return the worked hours formatted to one decimal
    pub async fn update_attendance_check_out(
        &self,
        key: AttendanceKey,
        check_out: DateTime<Utc>,
        location: Option<String>,
    ) -> ServiceResult<String> {
        let Some(cache) = self.cache().await else {
            return self.remote_check_out(&key, check_out, location.as_deref()).await;
        };

        let hours = cache
            .update_attendance_check_out(&key.employee_id, key.date, check_out, location.as_deref())
            .await?;
        if hours == NO_WORK_HOURS {
            warn!(employee_id = %key.employee_id, date = %key.date, "Check-out without check-in");
            return Ok(hours);
        }
        info!(employee_id = %key.employee_id, date = %key.date, work_hours = %hours, "Check-out saved locally");

        let syncer = self.syncer(cache);
        self.dispatch(async move {
            syncer.attendance(&key.employee_id, key.date).await;
        })
        .await;

        Ok(hours)
    }

    async fn remote_check_out(
        &self,
        key: &AttendanceKey,
        check_out: DateTime<Utc>,
        location: Option<&str>,
    ) -> ServiceResult<String> {
        let Some(row) = self
            .remote
            .get_today_attendance(&key.employee_id, key.date)
            .await?
        else {
            return Ok(NO_WORK_HOURS.to_string());
        };
        let Some(notion_id) = row.notion_id.as_deref() else {
            return Ok(NO_WORK_HOURS.to_string());
        };

        let hours = compute_work_hours(row.check_in, check_out);
        self.remote
            .update_attendance_check_out(notion_id, check_out, hours, location)
            .await?;
        Ok(format_work_hours(hours))
    }

    pub async fn get_attendance_for_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        employee_id: Option<&str>,
    ) -> ServiceResult<Vec<Attendance>> {
        let mut attempts = Attempts::new("get_attendance_for_period");

        let cache = self.cache().await;
        if let Some(cache) = &cache {
            match cache.get_cached_attendance_for_period(start, end, employee_id).await {
                Ok(rows) if !rows.is_empty() => return Ok(rows),
                Ok(_) => attempts.miss("cache"),
                Err(e) => attempts.failed("cache", e),
            }
        }

        match self.remote.get_attendance_for_period(start, end, employee_id).await {
            Ok(rows) => {
                self.recache_attendance(cache, rows.clone()).await;
                Ok(rows)
            }
            Err(e) => {
                attempts.failed("remote", e);
                attempts.finish(Vec::new())
            }
        }
    }

    async fn recache_attendance(&self, cache: Option<Arc<dyn CacheStore>>, rows: Vec<Attendance>) {
        let Some(cache) = cache else { return };
        if rows.is_empty() {
            return;
        }
        self.dispatch(async move {
            let results = join_all(rows.iter().map(|r| cache.cache_attendance(r))).await;
            for (row, result) in rows.iter().zip(results) {
                if let Err(e) = result {
                    warn!(employee_id = %row.employee_id, error = %e, "Failed to cache attendance");
                }
            }
        })
        .await;
    }

    // =========================================================================
    // STATS / DIAGNOSTICS
    // =========================================================================

    pub async fn get_stats(&self) -> ServiceResult<CacheStats> {
        let mut attempts = Attempts::new("get_stats");

        if let Some(direct) = &self.direct {
            match direct.get_stats().await {
                Ok(stats) => return Ok(stats),
                Err(e) => attempts.failed("direct", e),
            }
        }

        match self.cache().await {
            Some(cache) => match cache.get_cache_stats().await {
                Ok(stats) => Ok(stats),
                Err(e) => {
                    attempts.failed("cache", e);
                    attempts.finish(CacheStats::default())
                }
            },
            None if self.direct.is_none() => Ok(CacheStats::default()),
            None => attempts.finish(CacheStats::default()),
        }
    }

    pub async fn debug_get_all_tasks(&self) -> ServiceResult<Vec<Task>> {
        let mut attempts = Attempts::new("debug_get_all_tasks");

        if let Some(direct) = &self.direct {
            match direct.get_all_tasks().await {
                Ok(tasks) => return Ok(tasks),
                Err(e) => attempts.failed("direct", e),
            }
        }

        let cache = self.cache().await;
        if let Some(cache) = &cache {
            match cache.get_all_cached_tasks().await {
                Ok(tasks) if !tasks.is_empty() => return Ok(tasks),
                Ok(_) => attempts.miss("cache"),
                Err(e) => attempts.failed("cache", e),
            }
        }

        match self.remote.get_all_tasks().await {
            Ok(tasks) => {
                self.recache_tasks(cache, tasks.clone()).await;
                Ok(tasks)
            }
            Err(e) => {
                attempts.failed("remote", e);
                attempts.finish(Vec::new())
            }
        }
    }

    /// Query every configured task source and report what each one returns
    pub async fn test_tasks_database(&self) -> Vec<TaskDatabaseProbe> {
        let mut probes = Vec::new();

        if let Some(direct) = &self.direct {
            probes.push(probe("direct", direct.get_all_tasks().await));
        }
        if let Some(cache) = self.cache().await {
            probes.push(probe("cache", cache.get_all_cached_tasks().await));
        }
        probes.push(probe("notion", self.remote.get_all_tasks().await));

        probes
    }

    // =========================================================================
    // RECONCILIATION
    // =========================================================================

    /// Push every unsynced report and task to Notion
    pub async fn reconcile_unsynced(&self) -> ServiceResult<ReconcileSummary> {
        let mut summary = ReconcileSummary::default();
        let Some(cache) = self.cache().await else {
            return Ok(summary);
        };
        let syncer = self.syncer(Arc::clone(&cache));

        for report in cache.get_unsynced_reports().await? {
            if syncer.report(&report.id).await {
                summary.reports_synced += 1;
            } else {
                summary.reports_failed += 1;
            }
        }

        for task in cache.get_unsynced_tasks().await? {
            if syncer.task(&task.id, None).await {
                summary.tasks_synced += 1;
            } else {
                summary.tasks_failed += 1;
            }
        }

        if summary != ReconcileSummary::default() {
            info!(
                reports_synced = summary.reports_synced,
                reports_failed = summary.reports_failed,
                tasks_synced = summary.tasks_synced,
                tasks_failed = summary.tasks_failed,
                "Reconciliation pass finished"
            );
        }
        Ok(summary)
    }
}

// =============================================================================
// SYNC STEPS
// =============================================================================

/// Pushes one cached row to Notion while holding that row's sync lock.
///
/// Every step re-reads the row after taking the lock, so the push carries the
/// latest local state and a page created by an earlier sync gets updated
/// instead of created a second time.
struct Syncer {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<dyn CacheStore>,
    locks: Arc<SyncLocks>,
}

impl Syncer {
    async fn user(&self, user: &User) -> bool {
        let _guard = self.locks.lock(user_key(&user.telegram_id)).await;
        let current = match self.cache.get_cached_user(&user.telegram_id).await {
            Ok(Some(current)) => current,
            Ok(None) => user.clone(),
            Err(e) => {
                warn!(telegram_id = %user.telegram_id, error = %e, "Failed to re-read user before sync");
                user.clone()
            }
        };

        let notion_id = match push_user(self.remote.as_ref(), &current).await {
            Ok(id) => id,
            Err(e) => {
                warn!(telegram_id = %current.telegram_id, error = %e, "User sync to Notion failed");
                return false;
            }
        };
        if current.notion_id.as_deref() == Some(notion_id.as_str()) {
            return true;
        }

        let user = User {
            notion_id: Some(notion_id),
            ..current
        };
        match self.cache.cache_user(&user).await {
            Ok(()) => true,
            Err(e) => {
                warn!(telegram_id = %user.telegram_id, error = %e, "Failed to record user Notion id");
                false
            }
        }
    }

    /// Returns true when the report is now marked synced
    async fn report(&self, id: &str) -> bool {
        let _guard = self.locks.lock(report_key(id)).await;
        let report = match self.cache.get_cached_report(id).await {
            Ok(Some(report)) => report,
            Ok(None) => {
                warn!(report_id = id, "Report to sync is not cached");
                return false;
            }
            Err(e) => {
                warn!(report_id = id, error = %e, "Failed to read report for sync");
                return false;
            }
        };
        if report.synced {
            return true;
        }

        let notion_id = match &report.notion_id {
            Some(id) => id.clone(),
            None => match self.remote.create_report(&report).await {
                Ok(id) => id,
                Err(e) => {
                    warn!(report_id = %report.id, error = %e, "Report sync to Notion failed");
                    return false;
                }
            },
        };

        match self.cache.mark_report_synced(&report.id, Some(&notion_id)).await {
            Ok(()) => {
                debug!(report_id = %report.id, notion_id = %notion_id, "Report synced");
                true
            }
            Err(e) => {
                warn!(report_id = %report.id, error = %e, "Failed to mark report synced");
                false
            }
        }
    }

    /// Creates the Notion page when none is known yet, otherwise pushes the status
    async fn task(&self, id: &str, note: Option<&str>) -> bool {
        let _guard = self.locks.lock(task_key(id)).await;
        let task = match self.cache.get_cached_task(id).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                warn!(task_id = id, "Task to sync is not cached");
                return false;
            }
            Err(e) => {
                warn!(task_id = id, error = %e, "Failed to read task for sync");
                return false;
            }
        };
        if task.synced && note.is_none() {
            return true;
        }

        let result = match &task.notion_id {
            Some(notion_id) => self
                .remote
                .update_task_status(notion_id, task.status, note)
                .await
                .map(|()| notion_id.clone()),
            None => self.create_task_page(&task, note).await,
        };

        let notion_id = match result {
            Ok(id) => id,
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Task sync to Notion failed");
                return false;
            }
        };

        match self
            .cache
            .mark_task_synced(&task.id, Some(&notion_id), task.status)
            .await
        {
            Ok(()) => {
                debug!(task_id = %task.id, notion_id = %notion_id, status = %task.status, "Task synced");
                true
            }
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Failed to mark task synced");
                false
            }
        }
    }

    async fn create_task_page(&self, task: &Task, note: Option<&str>) -> Result<String, RemoteError> {
        let notion_id = self.remote.create_task(task).await?;
        // A new page carries the status but not the completion note
        if let Some(note) = note.filter(|n| !n.is_empty()) {
            if let Err(e) = self
                .remote
                .update_task_status(&notion_id, task.status, Some(note))
                .await
            {
                warn!(task_id = %task.id, error = %e, "Failed to attach completion note");
            }
        }
        Ok(notion_id)
    }

    async fn attendance(&self, employee_id: &str, date: NaiveDate) -> bool {
        let _guard = self.locks.lock(attendance_key(employee_id, date)).await;
        let row = match self.cache.get_cached_today_attendance(employee_id, date).await {
            Ok(Some(row)) => row,
            Ok(None) => {
                warn!(employee_id, %date, "Attendance to sync is not cached");
                return false;
            }
            Err(e) => {
                warn!(employee_id, %date, error = %e, "Failed to read attendance for sync");
                return false;
            }
        };
        if row.synced {
            return true;
        }

        let result = match (&row.notion_id, row.check_out) {
            (Some(id), Some(check_out)) => self
                .remote
                .update_attendance_check_out(
                    id,
                    check_out,
                    row.work_hours.unwrap_or_default(),
                    row.location_out.as_deref(),
                )
                .await
                .map(|()| id.clone()),
            (Some(id), None) => Ok(id.clone()),
            (None, _) => self.remote.create_attendance(&row).await,
        };

        let notion_id = match result {
            Ok(id) => id,
            Err(e) => {
                warn!(employee_id, %date, error = %e, "Attendance sync to Notion failed");
                return false;
            }
        };

        match self
            .cache
            .mark_attendance_synced(employee_id, date, Some(&notion_id), row.check_out)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(employee_id, error = %e, "Failed to mark attendance synced");
                false
            }
        }
    }
}

/// Updates the user's page when Notion already has one, otherwise creates it
async fn push_user(remote: &dyn RemoteStore, user: &User) -> Result<String, RemoteError> {
    let known = match &user.notion_id {
        Some(id) => Some(id.clone()),
        None => remote
            .get_user_by_telegram_id(&user.telegram_id)
            .await?
            .and_then(|existing| existing.notion_id),
    };

    match known {
        Some(id) => {
            remote.update_user(&id, user).await?;
            Ok(id)
        }
        None => remote.create_user(user).await,
    }
}

fn probe<E: Display>(source: &str, result: Result<Vec<Task>, E>) -> TaskDatabaseProbe {
    match result {
        Ok(tasks) => TaskDatabaseProbe {
            source: source.to_string(),
            ok: true,
            task_count: tasks.len(),
            sample_titles: tasks
                .iter()
                .take(PROBE_SAMPLE_SIZE)
                .map(|t| t.title.clone())
                .collect(),
            error: None,
        },
        Err(e) => TaskDatabaseProbe {
            source: source.to_string(),
            ok: false,
            task_count: 0,
            sample_titles: Vec::new(),
            error: Some(e.to_string()),
        },
    }
}
