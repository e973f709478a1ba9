// Notion service - the system of record for users, reports, tasks and attendance
// Uses the Notion REST API directly: one database per entity

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde_json::{json, Map, Value};

use crate::config::NotionSettings;
use crate::error::RemoteError;
use crate::models::{
    attendance_id, Attendance, AttendanceStatus, Report, Task, TaskPriority, TaskStatus, User,
    REPORT_SUBMITTED,
};
use crate::services::store::RemoteStore;

pub const NOTION_VERSION: &str = "2022-06-28";

/// Notion caps page_size at 100
const MAX_PAGE_SIZE: usize = 100;

/// Notion caps a single rich text segment at 2000 characters
const MAX_TEXT_LEN: usize = 2000;

/// Property names used in the Notion databases
pub mod props {
    pub const NAME: &str = "Name";
    pub const TELEGRAM_ID: &str = "Telegram ID";
    pub const USERNAME: &str = "Username";
    pub const POSITION: &str = "Position";
    pub const ACTIVE: &str = "Active";
    pub const REGISTRATION_DATE: &str = "Registration Date";

    pub const EMPLOYEE: &str = "Employee";
    pub const REPORT_ID: &str = "Report ID";
    pub const DATE: &str = "Date";
    pub const WHAT_DONE: &str = "What Done";
    pub const PROBLEMS: &str = "Problems";
    pub const GOALS: &str = "Goals";
    pub const TIMESTAMP: &str = "Timestamp";
    pub const STATUS: &str = "Status";

    pub const TITLE: &str = "Title";
    pub const TASK_ID: &str = "Task ID";
    pub const DESCRIPTION: &str = "Description";
    pub const ASSIGNEE_ID: &str = "Assignee ID";
    pub const ASSIGNEE: &str = "Assignee";
    pub const CREATOR_ID: &str = "Creator ID";
    pub const CREATOR: &str = "Creator";
    pub const PRIORITY: &str = "Priority";
    pub const CREATED: &str = "Created";
    pub const DEADLINE: &str = "Deadline";
    pub const COMPLETED: &str = "Completed";
    pub const COMPLETION_NOTE: &str = "Completion Note";

    pub const EMPLOYEE_ID: &str = "Employee ID";
    pub const CHECK_IN: &str = "Check In";
    pub const CHECK_OUT: &str = "Check Out";
    pub const WORK_HOURS: &str = "Work Hours";
    pub const LOCATION_IN: &str = "Location In";
    pub const LOCATION_OUT: &str = "Location Out";
}

/// Notion REST API client
pub struct NotionService {
    client: Client,
    settings: NotionSettings,
}

impl NotionService {
    /// Create a new Notion service; a missing token is reported per call
    pub fn new(settings: NotionSettings) -> Result<Self, RemoteError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        if settings.token.is_none() {
            tracing::warn!("Notion token missing - every remote call will fail");
        }

        Ok(Self { client, settings })
    }

    fn base_url(&self) -> &str {
        self.settings.api_url.trim_end_matches('/')
    }

    fn database(&self, id: &Option<String>, name: &'static str) -> Result<String, RemoteError> {
        id.clone().ok_or(RemoteError::NotConfigured(name))
    }

    /// Build request with auth and version headers
    fn build_request(&self, method: reqwest::Method, url: &str) -> Result<reqwest::RequestBuilder, RemoteError> {
        let token = self
            .settings
            .token
            .as_deref()
            .ok_or(RemoteError::NotConfigured("NOTION_TOKEN"))?;

        Ok(self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header("Notion-Version", NOTION_VERSION))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, RemoteError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Notion API error {}: {}", status, body);
            return Err(RemoteError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    // =========================================================================
    // PAGES
    // =========================================================================

    /// Create a page in a database, returning the page id
    async fn create_page(&self, database_id: &str, properties: Value) -> Result<String, RemoteError> {
        let body = json!({
            "parent": {"database_id": database_id},
            "properties": properties
        });

        let url = format!("{}/pages", self.base_url());
        let page = self
            .send(self.build_request(reqwest::Method::POST, &url)?.json(&body))
            .await?;

        page_id(&page).ok_or_else(|| RemoteError::Parse("created page has no id".to_string()))
    }

    async fn update_page(&self, page_id: &str, properties: Value) -> Result<(), RemoteError> {
        let url = format!("{}/pages/{}", self.base_url(), page_id);
        self.send(
            self.build_request(reqwest::Method::PATCH, &url)?
                .json(&json!({"properties": properties})),
        )
        .await?;
        Ok(())
    }

    /// Query a database, following cursors until `limit` pages are collected
    async fn query_database(
        &self,
        database_id: &str,
        filter: Option<Value>,
        sorts: Vec<Value>,
        limit: Option<usize>,
    ) -> Result<Vec<Value>, RemoteError> {
        let url = format!("{}/databases/{}/query", self.base_url(), database_id);
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let remaining = limit.map(|l| l.saturating_sub(pages.len()));
            if remaining == Some(0) {
                break;
            }

            let mut body = json!({
                "page_size": remaining.unwrap_or(MAX_PAGE_SIZE).min(MAX_PAGE_SIZE),
            });
            if let Some(filter) = &filter {
                body["filter"] = filter.clone();
            }
            if !sorts.is_empty() {
                body["sorts"] = Value::Array(sorts.clone());
            }
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }

            tracing::debug!("Notion query: {}", body);

            let result = self
                .send(self.build_request(reqwest::Method::POST, &url)?.json(&body))
                .await?;

            if let Some(results) = result.get("results").and_then(|r| r.as_array()) {
                pages.extend(results.iter().cloned());
            }

            let has_more = result.get("has_more").and_then(|v| v.as_bool()).unwrap_or(false);
            cursor = result
                .get("next_cursor")
                .and_then(|c| c.as_str())
                .map(|c| c.to_string());

            if !has_more || cursor.is_none() {
                break;
            }
        }

        if let Some(limit) = limit {
            pages.truncate(limit);
        }
        Ok(pages)
    }

    /// Parse every page, skipping (and logging) the ones that do not fit the model
    fn parse_all<T>(
        &self,
        pages: Vec<Value>,
        parse: fn(&Value) -> Result<T, RemoteError>,
        kind: &str,
    ) -> Vec<T> {
        pages
            .iter()
            .filter_map(|page| match parse(page) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!("Failed to parse {} page: {}", kind, e);
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl RemoteStore for NotionService {
    // =========================================================================
    // USERS
    // =========================================================================

    async fn create_user(&self, user: &User) -> Result<String, RemoteError> {
        let db = self.database(&self.settings.users_db, "NOTION_USERS_DB")?;
        let id = self.create_page(&db, user_properties(user)).await?;
        tracing::info!("Created Notion user {} for {}", id, user.telegram_id);
        Ok(id)
    }

    async fn get_user_by_telegram_id(&self, telegram_id: &str) -> Result<Option<User>, RemoteError> {
        let db = self.database(&self.settings.users_db, "NOTION_USERS_DB")?;
        let pages = self
            .query_database(&db, Some(text_equals(props::TELEGRAM_ID, telegram_id)), vec![], Some(1))
            .await?;
        Ok(self.parse_all(pages, parse_user, "user").into_iter().next())
    }

    async fn update_user(&self, notion_id: &str, user: &User) -> Result<(), RemoteError> {
        self.update_page(notion_id, Value::Object(profile_properties(user))).await?;
        tracing::info!("Updated Notion user {} for {}", notion_id, user.telegram_id);
        Ok(())
    }

    // =========================================================================
    // REPORTS
    // =========================================================================

    async fn create_report(&self, report: &Report) -> Result<String, RemoteError> {
        let db = self.database(&self.settings.reports_db, "NOTION_REPORTS_DB")?;
        let id = self.create_page(&db, report_properties(report)).await?;
        tracing::info!("Created Notion report {} for {}", id, report.telegram_id);
        Ok(id)
    }

    async fn get_today_report(
        &self,
        telegram_id: &str,
        today: NaiveDate,
    ) -> Result<Option<Report>, RemoteError> {
        let db = self.database(&self.settings.reports_db, "NOTION_REPORTS_DB")?;
        let filter = json!({"and": [
            text_equals(props::TELEGRAM_ID, telegram_id),
            date_filter(props::DATE, "equals", today),
        ]});
        let pages = self.query_database(&db, Some(filter), vec![], Some(1)).await?;
        Ok(self.parse_all(pages, parse_report, "report").into_iter().next())
    }

    async fn get_user_reports(&self, telegram_id: &str, limit: i64) -> Result<Vec<Report>, RemoteError> {
        let db = self.database(&self.settings.reports_db, "NOTION_REPORTS_DB")?;
        let pages = self
            .query_database(
                &db,
                Some(text_equals(props::TELEGRAM_ID, telegram_id)),
                vec![sort_descending(props::DATE)],
                Some(limit.max(0) as usize),
            )
            .await?;
        Ok(self.parse_all(pages, parse_report, "report"))
    }

    async fn get_reports_for_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        employee_id: Option<&str>,
    ) -> Result<Vec<Report>, RemoteError> {
        let db = self.database(&self.settings.reports_db, "NOTION_REPORTS_DB")?;
        let mut filters = vec![
            date_filter(props::DATE, "on_or_after", start),
            date_filter(props::DATE, "on_or_before", end),
        ];
        if let Some(id) = employee_id {
            filters.push(text_equals(props::TELEGRAM_ID, id));
        }
        let pages = self
            .query_database(&db, Some(json!({"and": filters})), vec![sort_descending(props::DATE)], None)
            .await?;
        Ok(self.parse_all(pages, parse_report, "report"))
    }

    // =========================================================================
    // TASKS
    // =========================================================================

    async fn create_task(&self, task: &Task) -> Result<String, RemoteError> {
        let db = self.database(&self.settings.tasks_db, "NOTION_TASKS_DB")?;
        let id = self.create_page(&db, task_properties(task)).await?;
        tracing::info!("Created Notion task {} for assignee {}", id, task.assignee_id);
        Ok(id)
    }

    async fn get_tasks_by_assignee(
        &self,
        assignee_id: &str,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, RemoteError> {
        let db = self.database(&self.settings.tasks_db, "NOTION_TASKS_DB")?;
        let filter = match status {
            Some(status) => json!({"and": [
                text_equals(props::ASSIGNEE_ID, assignee_id),
                select_equals(props::STATUS, status.as_str()),
            ]}),
            None => text_equals(props::ASSIGNEE_ID, assignee_id),
        };
        let pages = self
            .query_database(&db, Some(filter), vec![sort_descending(props::CREATED)], None)
            .await?;
        Ok(self.parse_all(pages, parse_task, "task"))
    }

    async fn get_all_tasks(&self) -> Result<Vec<Task>, RemoteError> {
        let db = self.database(&self.settings.tasks_db, "NOTION_TASKS_DB")?;
        let pages = self
            .query_database(&db, None, vec![sort_descending(props::CREATED)], None)
            .await?;
        Ok(self.parse_all(pages, parse_task, "task"))
    }

    async fn update_task_status(
        &self,
        notion_id: &str,
        status: TaskStatus,
        note: Option<&str>,
    ) -> Result<(), RemoteError> {
        let mut properties = Map::new();
        properties.insert(props::STATUS.into(), select(status.as_str()));
        if status == TaskStatus::Completed {
            properties.insert(props::COMPLETED.into(), date_time(Utc::now()));
        }
        if let Some(note) = note.filter(|n| !n.is_empty()) {
            properties.insert(props::COMPLETION_NOTE.into(), rich_text(note));
        }

        self.update_page(notion_id, Value::Object(properties)).await?;
        tracing::info!("Updated Notion task {} to {}", notion_id, status);
        Ok(())
    }

    // =========================================================================
    // ATTENDANCE
    // =========================================================================

    async fn create_attendance(&self, attendance: &Attendance) -> Result<String, RemoteError> {
        let db = self.database(&self.settings.attendance_db, "NOTION_ATTENDANCE_DB")?;
        let id = self.create_page(&db, attendance_properties(attendance)).await?;
        tracing::info!("Created Notion attendance {} for {}", id, attendance.employee_id);
        Ok(id)
    }

    async fn get_today_attendance(
        &self,
        employee_id: &str,
        today: NaiveDate,
    ) -> Result<Option<Attendance>, RemoteError> {
        let db = self.database(&self.settings.attendance_db, "NOTION_ATTENDANCE_DB")?;
        let filter = json!({"and": [
            text_equals(props::EMPLOYEE_ID, employee_id),
            date_filter(props::DATE, "equals", today),
        ]});
        let pages = self.query_database(&db, Some(filter), vec![], Some(1)).await?;
        Ok(self.parse_all(pages, parse_attendance, "attendance").into_iter().next())
    }

    async fn update_attendance_check_out(
        &self,
        notion_id: &str,
        check_out: DateTime<Utc>,
        work_hours: f64,
        location: Option<&str>,
    ) -> Result<(), RemoteError> {
        let mut properties = Map::new();
        properties.insert(props::CHECK_OUT.into(), date_time(check_out));
        properties.insert(props::WORK_HOURS.into(), json!({"number": work_hours}));
        properties.insert(props::STATUS.into(), select(AttendanceStatus::Left.as_str()));
        if let Some(location) = location {
            properties.insert(props::LOCATION_OUT.into(), rich_text(location));
        }

        self.update_page(notion_id, Value::Object(properties)).await?;
        tracing::info!("Recorded Notion check-out for page {}", notion_id);
        Ok(())
    }

    async fn get_attendance_for_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        employee_id: Option<&str>,
    ) -> Result<Vec<Attendance>, RemoteError> {
        let db = self.database(&self.settings.attendance_db, "NOTION_ATTENDANCE_DB")?;
        let mut filters = vec![
            date_filter(props::DATE, "on_or_after", start),
            date_filter(props::DATE, "on_or_before", end),
        ];
        if let Some(id) = employee_id {
            filters.push(text_equals(props::EMPLOYEE_ID, id));
        }
        let pages = self
            .query_database(&db, Some(json!({"and": filters})), vec![sort_descending(props::DATE)], None)
            .await?;
        Ok(self.parse_all(pages, parse_attendance, "attendance"))
    }
}

// =============================================================================
// PROPERTY BUILDERS
// =============================================================================

fn title(value: &str) -> Value {
    json!({"title": [{"text": {"content": truncate(value)}}]})
}

fn rich_text(value: &str) -> Value {
    json!({"rich_text": [{"text": {"content": truncate(value)}}]})
}

fn select(value: &str) -> Value {
    json!({"select": {"name": value}})
}

fn date(value: NaiveDate) -> Value {
    json!({"date": {"start": value.format("%Y-%m-%d").to_string()}})
}

fn date_time(value: DateTime<Utc>) -> Value {
    json!({"date": {"start": value.to_rfc3339()}})
}

fn truncate(value: &str) -> String {
    value.chars().take(MAX_TEXT_LEN).collect()
}

fn text_equals(property: &str, value: &str) -> Value {
    json!({"property": property, "rich_text": {"equals": value}})
}

fn select_equals(property: &str, value: &str) -> Value {
    json!({"property": property, "select": {"equals": value}})
}

fn date_filter(property: &str, op: &str, value: NaiveDate) -> Value {
    json!({"property": property, "date": {(op): value.format("%Y-%m-%d").to_string()}})
}

fn sort_descending(property: &str) -> Value {
    json!({"property": property, "direction": "descending"})
}

fn user_properties(user: &User) -> Value {
    let mut properties = profile_properties(user);
    properties.insert(props::TELEGRAM_ID.into(), rich_text(&user.telegram_id));
    properties.insert(props::REGISTRATION_DATE.into(), date_time(user.registration_date));
    Value::Object(properties)
}

/// The editable side of a user page
fn profile_properties(user: &User) -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert(props::NAME.into(), title(&user.name));
    properties.insert(props::ACTIVE.into(), json!({"checkbox": user.is_active}));
    if let Some(username) = &user.username {
        properties.insert(props::USERNAME.into(), rich_text(username));
    }
    if let Some(position) = &user.position {
        properties.insert(props::POSITION.into(), rich_text(position));
    }
    properties
}

fn report_properties(report: &Report) -> Value {
    json!({
        (props::EMPLOYEE): title(&report.employee_name),
        (props::REPORT_ID): rich_text(&report.id),
        (props::TELEGRAM_ID): rich_text(&report.telegram_id),
        (props::DATE): date(report.date),
        (props::WHAT_DONE): rich_text(&report.what_done),
        (props::PROBLEMS): rich_text(&report.problems),
        (props::GOALS): rich_text(&report.goals),
        (props::TIMESTAMP): date_time(report.timestamp),
        (props::STATUS): select(&report.status),
    })
}

fn task_properties(task: &Task) -> Value {
    let mut properties = Map::new();
    properties.insert(props::TITLE.into(), title(&task.title));
    properties.insert(props::TASK_ID.into(), rich_text(&task.id));
    properties.insert(props::DESCRIPTION.into(), rich_text(&task.description));
    properties.insert(props::ASSIGNEE_ID.into(), rich_text(&task.assignee_id));
    properties.insert(props::ASSIGNEE.into(), rich_text(&task.assignee_name));
    properties.insert(props::CREATOR_ID.into(), rich_text(&task.creator_id));
    properties.insert(props::CREATOR.into(), rich_text(&task.creator_name));
    properties.insert(props::STATUS.into(), select(task.status.as_str()));
    properties.insert(props::PRIORITY.into(), select(task.priority.as_str()));
    properties.insert(props::CREATED.into(), date_time(task.created_date));
    if let Some(deadline) = task.deadline {
        properties.insert(props::DEADLINE.into(), date(deadline));
    }
    if let Some(completed) = task.completed_date {
        properties.insert(props::COMPLETED.into(), date_time(completed));
    }
    Value::Object(properties)
}

fn attendance_properties(attendance: &Attendance) -> Value {
    let mut properties = Map::new();
    properties.insert(props::EMPLOYEE.into(), title(&attendance.employee_name));
    properties.insert(props::EMPLOYEE_ID.into(), rich_text(&attendance.employee_id));
    properties.insert(props::DATE.into(), date(attendance.date));
    properties.insert(props::CHECK_IN.into(), date_time(attendance.check_in));
    properties.insert(props::STATUS.into(), select(attendance.status.as_str()));
    if let Some(check_out) = attendance.check_out {
        properties.insert(props::CHECK_OUT.into(), date_time(check_out));
    }
    if let Some(hours) = attendance.work_hours {
        properties.insert(props::WORK_HOURS.into(), json!({"number": hours}));
    }
    if let Some(location) = &attendance.location_in {
        properties.insert(props::LOCATION_IN.into(), rich_text(location));
    }
    if let Some(location) = &attendance.location_out {
        properties.insert(props::LOCATION_OUT.into(), rich_text(location));
    }
    Value::Object(properties)
}

// =============================================================================
// PAGE PARSERS
// =============================================================================

fn page_id(page: &Value) -> Option<String> {
    page.get("id").and_then(|id| id.as_str()).map(|id| id.to_string())
}

fn properties(page: &Value) -> Result<&Value, RemoteError> {
    page.get("properties")
        .ok_or_else(|| RemoteError::Parse("page has no properties".to_string()))
}

fn plain_text(segments: Option<&Value>) -> Option<String> {
    let text: String = segments?
        .as_array()?
        .iter()
        .filter_map(|s| s.get("plain_text").or_else(|| s.get("text")?.get("content")))
        .filter_map(|s| s.as_str())
        .collect();
    (!text.is_empty()).then_some(text)
}

fn parse_title(props: &Value, key: &str) -> Option<String> {
    plain_text(props.get(key)?.get("title"))
}

fn parse_text(props: &Value, key: &str) -> Option<String> {
    plain_text(props.get(key)?.get("rich_text"))
}

fn parse_select(props: &Value, key: &str) -> Option<String> {
    props
        .get(key)?
        .get("select")?
        .get("name")?
        .as_str()
        .map(|s| s.to_string())
}

fn parse_checkbox(props: &Value, key: &str) -> Option<bool> {
    props.get(key)?.get("checkbox")?.as_bool()
}

fn parse_number(props: &Value, key: &str) -> Option<f64> {
    props.get(key)?.get("number")?.as_f64()
}

fn parse_date_start<'a>(props: &'a Value, key: &str) -> Option<&'a str> {
    props.get(key)?.get("date")?.get("start")?.as_str()
}

fn parse_date(props: &Value, key: &str) -> Option<NaiveDate> {
    let start = parse_date_start(props, key)?;
    NaiveDate::parse_from_str(start.get(..10)?, "%Y-%m-%d").ok()
}

/// Accepts full RFC 3339 timestamps and bare dates (midnight UTC)
fn parse_timestamp(props: &Value, key: &str) -> Option<DateTime<Utc>> {
    let start = parse_date_start(props, key)?;
    DateTime::parse_from_rfc3339(start)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(start, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })
}

fn created_time(page: &Value) -> DateTime<Utc> {
    page.get("created_time")
        .and_then(|t| t.as_str())
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

fn require<T>(value: Option<T>, field: &str) -> Result<T, RemoteError> {
    value.ok_or_else(|| RemoteError::Parse(format!("missing {}", field)))
}

fn parse_user(page: &Value) -> Result<User, RemoteError> {
    let p = properties(page)?;
    let notion_id = require(page_id(page), "id")?;

    Ok(User {
        telegram_id: require(parse_text(p, props::TELEGRAM_ID), props::TELEGRAM_ID)?,
        notion_id: Some(notion_id),
        name: parse_title(p, props::NAME).unwrap_or_default(),
        username: parse_text(p, props::USERNAME),
        position: parse_text(p, props::POSITION),
        is_active: parse_checkbox(p, props::ACTIVE).unwrap_or(true),
        registration_date: parse_timestamp(p, props::REGISTRATION_DATE)
            .unwrap_or_else(|| created_time(page)),
    })
}

fn parse_report(page: &Value) -> Result<Report, RemoteError> {
    let p = properties(page)?;
    let notion_id = require(page_id(page), "id")?;

    Ok(Report {
        id: parse_text(p, props::REPORT_ID).unwrap_or_else(|| notion_id.clone()),
        notion_id: Some(notion_id),
        telegram_id: require(parse_text(p, props::TELEGRAM_ID), props::TELEGRAM_ID)?,
        employee_name: parse_title(p, props::EMPLOYEE).unwrap_or_default(),
        date: require(parse_date(p, props::DATE), props::DATE)?,
        what_done: parse_text(p, props::WHAT_DONE).unwrap_or_default(),
        problems: parse_text(p, props::PROBLEMS).unwrap_or_default(),
        goals: parse_text(p, props::GOALS).unwrap_or_default(),
        timestamp: parse_timestamp(p, props::TIMESTAMP).unwrap_or_else(|| created_time(page)),
        status: parse_select(p, props::STATUS).unwrap_or_else(|| REPORT_SUBMITTED.to_string()),
        synced: true,
    })
}

fn parse_task(page: &Value) -> Result<Task, RemoteError> {
    let p = properties(page)?;
    let notion_id = require(page_id(page), "id")?;
    let id = parse_text(p, props::TASK_ID).unwrap_or_else(|| notion_id.clone());

    let status = match parse_select(p, props::STATUS) {
        Some(s) => s.parse().map_err(RemoteError::Parse)?,
        None => TaskStatus::New,
    };
    let priority = match parse_select(p, props::PRIORITY) {
        Some(s) => s.parse().map_err(RemoteError::Parse)?,
        None => TaskPriority::default(),
    };

    Ok(Task {
        task_id: id.clone(),
        id,
        notion_id: Some(notion_id),
        title: require(parse_title(p, props::TITLE), props::TITLE)?,
        description: parse_text(p, props::DESCRIPTION).unwrap_or_default(),
        assignee_id: parse_text(p, props::ASSIGNEE_ID).unwrap_or_default(),
        assignee_name: parse_text(p, props::ASSIGNEE).unwrap_or_default(),
        creator_id: parse_text(p, props::CREATOR_ID).unwrap_or_default(),
        creator_name: parse_text(p, props::CREATOR).unwrap_or_default(),
        status,
        priority,
        created_date: parse_timestamp(p, props::CREATED).unwrap_or_else(|| created_time(page)),
        deadline: parse_date(p, props::DEADLINE),
        completed_date: parse_timestamp(p, props::COMPLETED),
        synced: true,
    })
}

fn parse_attendance(page: &Value) -> Result<Attendance, RemoteError> {
    let p = properties(page)?;
    let notion_id = require(page_id(page), "id")?;
    let employee_id = require(parse_text(p, props::EMPLOYEE_ID), props::EMPLOYEE_ID)?;
    let date = require(parse_date(p, props::DATE), props::DATE)?;

    let check_out = parse_timestamp(p, props::CHECK_OUT);
    let status = match parse_select(p, props::STATUS) {
        Some(s) => s.parse().map_err(RemoteError::Parse)?,
        None if check_out.is_some() => AttendanceStatus::Left,
        None => AttendanceStatus::AtWork,
    };

    Ok(Attendance {
        id: attendance_id(&employee_id, date),
        notion_id: Some(notion_id),
        employee_name: parse_title(p, props::EMPLOYEE).unwrap_or_default(),
        check_in: require(parse_timestamp(p, props::CHECK_IN), props::CHECK_IN)?,
        check_out,
        work_hours: parse_number(p, props::WORK_HOURS),
        status,
        location_in: parse_text(p, props::LOCATION_IN),
        location_out: parse_text(p, props::LOCATION_OUT),
        synced: true,
        employee_id,
        date,
    })
}
