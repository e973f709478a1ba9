// Attendance models - one row per (employee_id, date)

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Work hours reported when no check-in exists for the day
pub const NO_WORK_HOURS: &str = "0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    #[serde(rename = "На работе")]
    AtWork,
    #[serde(rename = "Ушел")]
    Left,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::AtWork => "На работе",
            AttendanceStatus::Left => "Ушел",
        }
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "На работе" => Ok(AttendanceStatus::AtWork),
            "Ушел" => Ok(AttendanceStatus::Left),
            other => Err(format!("Invalid attendance status: {}", other)),
        }
    }
}

impl TryFrom<String> for AttendanceStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    /// `attendance-<employeeId>-<date>`
    pub id: String,
    pub notion_id: Option<String>,
    pub employee_id: String,
    pub employee_name: String,
    pub date: NaiveDate,
    pub check_in: DateTime<Utc>,
    pub check_out: Option<DateTime<Utc>>,
    /// Computed at check-out only
    pub work_hours: Option<f64>,
    #[sqlx(try_from = "String")]
    pub status: AttendanceStatus,
    /// Serialized geolocation
    pub location_in: Option<String>,
    pub location_out: Option<String>,
    pub synced: bool,
}

/// Natural key of an attendance row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceKey {
    pub employee_id: String,
    pub date: NaiveDate,
}

/// Request body for a check-in
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckIn {
    pub employee_id: String,
    pub employee_name: String,
    /// Defaults to now
    pub check_in: Option<DateTime<Utc>>,
    pub location: Option<String>,
}

impl CheckIn {
    pub fn validate(&self) -> Result<(), String> {
        if self.employee_id.trim().is_empty() {
            return Err("employeeId is required".to_string());
        }
        Ok(())
    }

    pub fn into_attendance(self, date: NaiveDate, now: DateTime<Utc>) -> Attendance {
        let employee_id = self.employee_id.trim().to_string();
        Attendance {
            id: attendance_id(&employee_id, date),
            notion_id: None,
            employee_id,
            employee_name: self.employee_name,
            date,
            check_in: self.check_in.unwrap_or(now),
            check_out: None,
            work_hours: None,
            status: AttendanceStatus::AtWork,
            location_in: self.location,
            location_out: None,
            synced: false,
        }
    }
}

/// Request body for a check-out
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOut {
    pub employee_id: String,
    /// Defaults to today in the business timezone
    pub date: Option<NaiveDate>,
    /// Defaults to now
    pub check_out: Option<DateTime<Utc>>,
    pub location: Option<String>,
}

pub fn attendance_id(employee_id: &str, date: NaiveDate) -> String {
    format!("attendance-{}-{}", employee_id, date.format("%Y-%m-%d"))
}

/// Hours between check-in and check-out, rounded to one decimal
pub fn compute_work_hours(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> f64 {
    let seconds = (check_out - check_in).num_seconds() as f64;
    (seconds / 3600.0 * 10.0).round() / 10.0
}

pub fn format_work_hours(hours: f64) -> String {
    format!("{:.1}", hours)
}
