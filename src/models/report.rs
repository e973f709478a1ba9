// Daily report models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Status written on every freshly submitted report
pub const REPORT_SUBMITTED: &str = "Отправлен";

/// A daily report; one per (telegram_id, date) is intended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// `report-<telegramId>-<date>-<timestamp>`
    pub id: String,
    pub notion_id: Option<String>,
    pub telegram_id: String,
    pub employee_name: String,
    pub date: NaiveDate,
    pub what_done: String,
    pub problems: String,
    pub goals: String,
    pub timestamp: DateTime<Utc>,
    pub status: String,
    pub synced: bool,
}

/// Request body for submitting a report
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    pub telegram_id: String,
    pub employee_name: String,
    pub what_done: String,
    pub problems: Option<String>,
    pub goals: Option<String>,
}

impl NewReport {
    pub fn validate(&self) -> Result<(), String> {
        if self.telegram_id.trim().is_empty() {
            return Err("telegramId is required".to_string());
        }
        if self.what_done.trim().is_empty() {
            return Err("whatDone is required".to_string());
        }
        Ok(())
    }

    pub fn into_report(self, date: NaiveDate, now: DateTime<Utc>) -> Report {
        let telegram_id = self.telegram_id.trim().to_string();
        Report {
            id: report_id(&telegram_id, date, now.timestamp_millis()),
            notion_id: None,
            telegram_id,
            employee_name: self.employee_name,
            date,
            what_done: self.what_done,
            problems: self.problems.unwrap_or_default(),
            goals: self.goals.unwrap_or_default(),
            timestamp: now,
            status: REPORT_SUBMITTED.to_string(),
            synced: false,
        }
    }
}

pub fn report_id(telegram_id: &str, date: NaiveDate, millis: i64) -> String {
    format!("report-{}-{}-{}", telegram_id, date.format("%Y-%m-%d"), millis)
}
