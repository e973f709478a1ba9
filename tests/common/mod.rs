// In-memory stores for exercising the coalescing service without Postgres or Notion

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use staff_hub_backend::config::SyncMode;
use staff_hub_backend::error::{RemoteError, StoreError};
use staff_hub_backend::models::{
    compute_work_hours, format_work_hours, Attendance, AttendanceStatus, CacheStats, Report, Task,
    TaskStatus, User, NO_WORK_HOURS,
};
use staff_hub_backend::services::{CacheStore, CoalescingService, DirectStore, RemoteStore};

// ============================================================================
// Local cache
// ============================================================================

/// Mirrors the upsert rules of the Postgres cache
#[derive(Default)]
pub struct MemoryCache {
    pub users: Mutex<HashMap<String, User>>,
    pub reports: Mutex<Vec<Report>>,
    pub tasks: Mutex<Vec<Task>>,
    pub attendance: Mutex<Vec<Attendance>>,
    pub fail_schema: bool,
}

impl MemoryCache {
    pub fn unavailable() -> Self {
        Self {
            fail_schema: true,
            ..Default::default()
        }
    }

    pub fn task(&self, id: &str) -> Option<Task> {
        self.tasks.lock().unwrap().iter().find(|t| t.id == id).cloned()
    }

    pub fn report_count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }

    pub fn attendance_count(&self) -> usize {
        self.attendance.lock().unwrap().len()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        if self.fail_schema {
            return Err(StoreError::Connection("connection refused".into()));
        }
        Ok(())
    }

    async fn cache_user(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.lock().unwrap();
        let notion_id = user.notion_id.clone().or_else(|| {
            users
                .get(&user.telegram_id)
                .and_then(|existing| existing.notion_id.clone())
        });
        users.insert(
            user.telegram_id.clone(),
            User {
                notion_id,
                ..user.clone()
            },
        );
        Ok(())
    }

    async fn get_cached_user(&self, telegram_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().unwrap().get(telegram_id).cloned())
    }

    async fn cache_report(&self, report: &Report) -> Result<(), StoreError> {
        let mut reports = self.reports.lock().unwrap();
        match reports.iter_mut().find(|r| r.id == report.id) {
            Some(existing) => {
                if report.notion_id.is_some() {
                    existing.notion_id = report.notion_id.clone();
                }
                existing.synced = report.synced;
            }
            None => reports.push(report.clone()),
        }
        Ok(())
    }

    async fn get_cached_today_report(
        &self,
        telegram_id: &str,
        today: NaiveDate,
    ) -> Result<Option<Report>, StoreError> {
        Ok(self
            .reports
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.telegram_id == telegram_id && r.date == today)
            .max_by_key(|r| r.timestamp)
            .cloned())
    }

    async fn get_cached_user_reports(&self, telegram_id: &str, limit: i64) -> Result<Vec<Report>, StoreError> {
        let mut reports: Vec<Report> = self
            .reports
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.telegram_id == telegram_id)
            .cloned()
            .collect();
        reports.sort_by(|a, b| b.date.cmp(&a.date));
        reports.truncate(limit.max(0) as usize);
        Ok(reports)
    }

    async fn get_cached_reports_for_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        employee_id: Option<&str>,
    ) -> Result<Vec<Report>, StoreError> {
        Ok(self
            .reports
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.date >= start && r.date <= end)
            .filter(|r| employee_id.map_or(true, |id| r.telegram_id == id))
            .cloned()
            .collect())
    }

    async fn get_cached_report(&self, id: &str) -> Result<Option<Report>, StoreError> {
        Ok(self.reports.lock().unwrap().iter().find(|r| r.id == id).cloned())
    }

    async fn get_unsynced_reports(&self) -> Result<Vec<Report>, StoreError> {
        Ok(self
            .reports
            .lock()
            .unwrap()
            .iter()
            .filter(|r| !r.synced)
            .cloned()
            .collect())
    }

    async fn mark_report_synced(&self, id: &str, notion_id: Option<&str>) -> Result<(), StoreError> {
        if let Some(report) = self.reports.lock().unwrap().iter_mut().find(|r| r.id == id) {
            report.synced = true;
            if let Some(notion_id) = notion_id {
                report.notion_id = Some(notion_id.to_string());
            }
        }
        Ok(())
    }

    async fn cache_task(&self, task: &Task) -> Result<(), StoreError> {
        let mut tasks = self.tasks.lock().unwrap();
        match tasks.iter_mut().find(|t| t.id == task.id) {
            // A synced copy never overwrites an unpushed local edit
            Some(existing) if !existing.synced && task.synced => {}
            Some(existing) => {
                if task.notion_id.is_some() {
                    existing.notion_id = task.notion_id.clone();
                }
                existing.status = task.status;
                existing.completed_date = task.completed_date.or(existing.completed_date);
                existing.synced = task.synced;
            }
            None => tasks.push(task.clone()),
        }
        Ok(())
    }

    async fn get_cached_task(&self, id: &str) -> Result<Option<Task>, StoreError> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id || t.notion_id.as_deref() == Some(id))
            .cloned())
    }

    async fn get_cached_tasks_by_assignee(
        &self,
        assignee_id: &str,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.assignee_id == assignee_id)
            .filter(|t| status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_date.cmp(&a.created_date));
        Ok(tasks)
    }

    async fn get_all_cached_tasks(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.tasks.lock().unwrap().clone())
    }

    async fn update_cached_task_status(&self, id: &str, status: TaskStatus) -> Result<bool, StoreError> {
        let mut tasks = self.tasks.lock().unwrap();
        let Some(task) = tasks
            .iter_mut()
            .find(|t| t.id == id || t.notion_id.as_deref() == Some(id))
        else {
            return Ok(false);
        };
        task.status = status;
        if status == TaskStatus::Completed {
            task.completed_date = Some(Utc::now());
        }
        task.synced = false;
        Ok(true)
    }

    async fn get_unsynced_tasks(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| !t.synced)
            .cloned()
            .collect())
    }

    async fn mark_task_synced(
        &self,
        id: &str,
        notion_id: Option<&str>,
        pushed: TaskStatus,
    ) -> Result<(), StoreError> {
        if let Some(task) = self.tasks.lock().unwrap().iter_mut().find(|t| t.id == id) {
            task.synced |= task.status == pushed;
            if let Some(notion_id) = notion_id {
                task.notion_id = Some(notion_id.to_string());
            }
        }
        Ok(())
    }

    async fn cache_attendance(&self, attendance: &Attendance) -> Result<(), StoreError> {
        let mut rows = self.attendance.lock().unwrap();
        match rows
            .iter_mut()
            .find(|a| a.employee_id == attendance.employee_id && a.date == attendance.date)
        {
            Some(existing) if !existing.synced && attendance.synced => {}
            Some(existing) => {
                if attendance.notion_id.is_some() {
                    existing.notion_id = attendance.notion_id.clone();
                }
                if attendance.check_out.is_some() {
                    existing.check_out = attendance.check_out;
                    existing.status = attendance.status;
                    existing.synced = attendance.synced;
                }
                existing.work_hours = attendance.work_hours.or(existing.work_hours);
                if attendance.location_out.is_some() {
                    existing.location_out = attendance.location_out.clone();
                }
            }
            None => rows.push(attendance.clone()),
        }
        Ok(())
    }

    async fn get_cached_today_attendance(
        &self,
        employee_id: &str,
        today: NaiveDate,
    ) -> Result<Option<Attendance>, StoreError> {
        Ok(self
            .attendance
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.employee_id == employee_id && a.date == today)
            .cloned())
    }

    async fn get_cached_attendance_for_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        employee_id: Option<&str>,
    ) -> Result<Vec<Attendance>, StoreError> {
        Ok(self
            .attendance
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.date >= start && a.date <= end)
            .filter(|a| employee_id.map_or(true, |id| a.employee_id == id))
            .cloned()
            .collect())
    }

    async fn update_attendance_check_out(
        &self,
        employee_id: &str,
        date: NaiveDate,
        check_out: DateTime<Utc>,
        location: Option<&str>,
    ) -> Result<String, StoreError> {
        let mut rows = self.attendance.lock().unwrap();
        let Some(row) = rows
            .iter_mut()
            .find(|a| a.employee_id == employee_id && a.date == date)
        else {
            return Ok(NO_WORK_HOURS.to_string());
        };
        let hours = compute_work_hours(row.check_in, check_out);
        row.check_out = Some(check_out);
        row.work_hours = Some(hours);
        row.status = AttendanceStatus::Left;
        if let Some(location) = location {
            row.location_out = Some(location.to_string());
        }
        row.synced = false;
        Ok(format_work_hours(hours))
    }

    async fn mark_attendance_synced(
        &self,
        employee_id: &str,
        date: NaiveDate,
        notion_id: Option<&str>,
        pushed_check_out: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        if let Some(row) = self
            .attendance
            .lock()
            .unwrap()
            .iter_mut()
            .find(|a| a.employee_id == employee_id && a.date == date)
        {
            row.synced |= row.check_out == pushed_check_out;
            if let Some(notion_id) = notion_id {
                row.notion_id = Some(notion_id.to_string());
            }
        }
        Ok(())
    }

    async fn get_cache_stats(&self) -> Result<CacheStats, StoreError> {
        Ok(CacheStats::from_bytes(
            self.users.lock().unwrap().len() as i64,
            self.reports.lock().unwrap().len() as i64,
            self.tasks.lock().unwrap().len() as i64,
            self.attendance.lock().unwrap().len() as i64,
            0,
        ))
    }
}

// ============================================================================
// Direct store
// ============================================================================

/// Every call fails as if the pool could not be acquired
pub struct FailingDirect;

#[async_trait]
impl DirectStore for FailingDirect {
    async fn get_user_by_telegram_id(&self, _telegram_id: &str) -> Result<Option<User>, StoreError> {
        Err(StoreError::Connection("pool timed out".into()))
    }

    async fn get_tasks_by_assignee(
        &self,
        _assignee_id: &str,
        _status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, StoreError> {
        Err(StoreError::Connection("pool timed out".into()))
    }

    async fn create_user(&self, _user: &User) -> Result<User, StoreError> {
        Err(StoreError::Connection("pool timed out".into()))
    }

    async fn get_all_tasks(&self) -> Result<Vec<Task>, StoreError> {
        Err(StoreError::Connection("pool timed out".into()))
    }

    async fn get_stats(&self) -> Result<CacheStats, StoreError> {
        Err(StoreError::Connection("pool timed out".into()))
    }
}

/// Answers every read with "no rows"
pub struct EmptyDirect;

#[async_trait]
impl DirectStore for EmptyDirect {
    async fn get_user_by_telegram_id(&self, _telegram_id: &str) -> Result<Option<User>, StoreError> {
        Ok(None)
    }

    async fn get_tasks_by_assignee(
        &self,
        _assignee_id: &str,
        _status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, StoreError> {
        Ok(Vec::new())
    }

    async fn create_user(&self, user: &User) -> Result<User, StoreError> {
        Ok(user.clone())
    }

    async fn get_all_tasks(&self) -> Result<Vec<Task>, StoreError> {
        Ok(Vec::new())
    }

    async fn get_stats(&self) -> Result<CacheStats, StoreError> {
        Ok(CacheStats::default())
    }
}

// ============================================================================
// Remote system
// ============================================================================

/// Notion stand-in with a failure switch and call counters
#[derive(Default)]
pub struct MemoryRemote {
    pub users: Mutex<Vec<User>>,
    pub reports: Mutex<Vec<Report>>,
    pub tasks: Mutex<Vec<Task>>,
    pub attendance: Mutex<Vec<Attendance>>,
    pub fail: AtomicBool,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
    next_id: AtomicUsize,
    create_delay_ms: AtomicU64,
}

impl MemoryRemote {
    pub fn failing() -> Self {
        let remote = Self::default();
        remote.set_fail(true);
        remote
    }

    /// Page creation takes this long, like a slow Notion round trip
    pub fn slow(create_delay: Duration) -> Self {
        let remote = Self::default();
        remote
            .create_delay_ms
            .store(create_delay.as_millis() as u64, Ordering::SeqCst);
        remote
    }

    async fn create_latency(&self) {
        let ms = self.create_delay_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn read(&self) -> Result<(), RemoteError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check()
    }

    fn write(&self) -> Result<String, RemoteError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(format!("notion-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
    }

    fn check(&self) -> Result<(), RemoteError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RemoteError::Api {
                status: 502,
                body: "bad gateway".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn create_user(&self, user: &User) -> Result<String, RemoteError> {
        self.create_latency().await;
        let id = self.write()?;
        self.users.lock().unwrap().push(User {
            notion_id: Some(id.clone()),
            ..user.clone()
        });
        Ok(id)
    }

    async fn get_user_by_telegram_id(&self, telegram_id: &str) -> Result<Option<User>, RemoteError> {
        self.read()?;
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.telegram_id == telegram_id)
            .cloned())
    }

    async fn update_user(&self, notion_id: &str, user: &User) -> Result<(), RemoteError> {
        self.write()?;
        let mut users = self.users.lock().unwrap();
        let page = users
            .iter_mut()
            .find(|u| u.notion_id.as_deref() == Some(notion_id))
            .ok_or_else(|| RemoteError::Api {
                status: 404,
                body: format!("page {} not found", notion_id),
            })?;
        page.name = user.name.clone();
        page.username = user.username.clone();
        page.position = user.position.clone();
        page.is_active = user.is_active;
        Ok(())
    }

    async fn create_report(&self, report: &Report) -> Result<String, RemoteError> {
        self.create_latency().await;
        let id = self.write()?;
        self.reports.lock().unwrap().push(Report {
            notion_id: Some(id.clone()),
            synced: true,
            ..report.clone()
        });
        Ok(id)
    }

    async fn get_today_report(&self, telegram_id: &str, today: NaiveDate) -> Result<Option<Report>, RemoteError> {
        self.read()?;
        Ok(self
            .reports
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.telegram_id == telegram_id && r.date == today)
            .cloned())
    }

    async fn get_user_reports(&self, telegram_id: &str, limit: i64) -> Result<Vec<Report>, RemoteError> {
        self.read()?;
        Ok(self
            .reports
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.telegram_id == telegram_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn get_reports_for_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        employee_id: Option<&str>,
    ) -> Result<Vec<Report>, RemoteError> {
        self.read()?;
        Ok(self
            .reports
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.date >= start && r.date <= end)
            .filter(|r| employee_id.map_or(true, |id| r.telegram_id == id))
            .cloned()
            .collect())
    }

    async fn create_task(&self, task: &Task) -> Result<String, RemoteError> {
        self.create_latency().await;
        let id = self.write()?;
        self.tasks.lock().unwrap().push(Task {
            notion_id: Some(id.clone()),
            synced: true,
            ..task.clone()
        });
        Ok(id)
    }

    async fn get_tasks_by_assignee(
        &self,
        assignee_id: &str,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, RemoteError> {
        self.read()?;
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.assignee_id == assignee_id)
            .filter(|t| status.map_or(true, |s| t.status == s))
            .cloned()
            .collect())
    }

    async fn get_all_tasks(&self) -> Result<Vec<Task>, RemoteError> {
        self.read()?;
        Ok(self.tasks.lock().unwrap().clone())
    }

    async fn update_task_status(
        &self,
        notion_id: &str,
        status: TaskStatus,
        _note: Option<&str>,
    ) -> Result<(), RemoteError> {
        self.write()?;
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .iter_mut()
            .find(|t| t.notion_id.as_deref() == Some(notion_id))
            .ok_or_else(|| RemoteError::Api {
                status: 404,
                body: format!("page {} not found", notion_id),
            })?;
        task.status = status;
        Ok(())
    }

    async fn create_attendance(&self, attendance: &Attendance) -> Result<String, RemoteError> {
        self.create_latency().await;
        let id = self.write()?;
        self.attendance.lock().unwrap().push(Attendance {
            notion_id: Some(id.clone()),
            synced: true,
            ..attendance.clone()
        });
        Ok(id)
    }

    async fn get_today_attendance(
        &self,
        employee_id: &str,
        today: NaiveDate,
    ) -> Result<Option<Attendance>, RemoteError> {
        self.read()?;
        Ok(self
            .attendance
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.employee_id == employee_id && a.date == today)
            .cloned())
    }

    async fn update_attendance_check_out(
        &self,
        notion_id: &str,
        check_out: DateTime<Utc>,
        work_hours: f64,
        location: Option<&str>,
    ) -> Result<(), RemoteError> {
        self.write()?;
        if let Some(row) = self
            .attendance
            .lock()
            .unwrap()
            .iter_mut()
            .find(|a| a.notion_id.as_deref() == Some(notion_id))
        {
            row.check_out = Some(check_out);
            row.work_hours = Some(work_hours);
            row.status = AttendanceStatus::Left;
            row.location_out = location.map(|l| l.to_string());
        }
        Ok(())
    }

    async fn get_attendance_for_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        employee_id: Option<&str>,
    ) -> Result<Vec<Attendance>, RemoteError> {
        self.read()?;
        Ok(self
            .attendance
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.date >= start && a.date <= end)
            .filter(|a| employee_id.map_or(true, |id| a.employee_id == id))
            .cloned()
            .collect())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Service with inline sync so remote effects are visible when a call returns
pub async fn service(
    remote: Arc<MemoryRemote>,
    cache: Option<Arc<MemoryCache>>,
    direct: Option<Arc<dyn DirectStore>>,
) -> CoalescingService {
    service_with_mode(remote, cache, direct, SyncMode::Inline).await
}

/// Service as deployed: Notion writes run on spawned tasks
pub async fn background_service(remote: Arc<MemoryRemote>, cache: Arc<MemoryCache>) -> CoalescingService {
    service_with_mode(remote, Some(cache), None, SyncMode::Background).await
}

async fn service_with_mode(
    remote: Arc<MemoryRemote>,
    cache: Option<Arc<MemoryCache>>,
    direct: Option<Arc<dyn DirectStore>>,
    sync_mode: SyncMode,
) -> CoalescingService {
    let mut service = CoalescingService::new(remote, chrono_tz::Europe::Moscow, sync_mode);
    if let Some(cache) = cache {
        service = service.with_cache(cache);
    }
    if let Some(direct) = direct {
        service = service.with_direct(direct);
    }
    service.initialize().await;
    service
}

pub fn user(telegram_id: &str, name: &str) -> User {
    User {
        telegram_id: telegram_id.to_string(),
        notion_id: None,
        name: name.to_string(),
        username: None,
        position: None,
        is_active: true,
        registration_date: Utc::now(),
    }
}

/// Poll until `condition` holds, giving spawned syncs time to finish
pub async fn eventually(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 2s");
}
