// Task models - assigned by a creator to an assignee

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Task lifecycle: New -> InProgress -> Completed, or Cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "Новая")]
    New,
    #[serde(rename = "В работе")]
    InProgress,
    #[serde(rename = "Выполнена")]
    Completed,
    #[serde(rename = "Отменена")]
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::New,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::New => "Новая",
            TaskStatus::InProgress => "В работе",
            TaskStatus::Completed => "Выполнена",
            TaskStatus::Cancelled => "Отменена",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| format!("Invalid task status: {}", s))
    }
}

impl TryFrom<String> for TaskStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TaskPriority {
    #[serde(rename = "Высокий")]
    High,
    #[default]
    #[serde(rename = "Средний")]
    Medium,
    #[serde(rename = "Низкий")]
    Low,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::High => "Высокий",
            TaskPriority::Medium => "Средний",
            TaskPriority::Low => "Низкий",
        }
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Высокий" => Ok(TaskPriority::High),
            "Средний" => Ok(TaskPriority::Medium),
            "Низкий" => Ok(TaskPriority::Low),
            other => Err(format!("Invalid task priority: {}", other)),
        }
    }
}

impl TryFrom<String> for TaskPriority {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Task as cached locally and mirrored to Notion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// `task-<timestamp>` for local creates, or the id carried by the remote page
    pub id: String,
    pub notion_id: Option<String>,
    /// Display id shown in the bot and dashboard
    pub task_id: String,
    pub title: String,
    pub description: String,
    pub assignee_id: String,
    pub assignee_name: String,
    pub creator_id: String,
    pub creator_name: String,
    #[sqlx(try_from = "String")]
    pub status: TaskStatus,
    #[sqlx(try_from = "String")]
    pub priority: TaskPriority,
    pub created_date: DateTime<Utc>,
    pub deadline: Option<NaiveDate>,
    /// Set when status becomes Completed
    pub completed_date: Option<DateTime<Utc>>,
    pub synced: bool,
}

/// Request body for creating a task
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub assignee_id: String,
    pub assignee_name: Option<String>,
    pub creator_id: Option<String>,
    pub creator_name: Option<String>,
    pub priority: Option<TaskPriority>,
    pub deadline: Option<NaiveDate>,
}

impl NewTask {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title is required".to_string());
        }
        if self.assignee_id.trim().is_empty() {
            return Err("assigneeId is required".to_string());
        }
        Ok(())
    }

    /// Every new task starts as `Новая`; priority defaults to `Средний`
    pub fn into_task(self, id: String, now: DateTime<Utc>) -> Task {
        Task {
            task_id: id.clone(),
            id,
            notion_id: None,
            title: self.title.trim().to_string(),
            description: self.description.unwrap_or_default(),
            assignee_id: self.assignee_id.trim().to_string(),
            assignee_name: self.assignee_name.unwrap_or_default(),
            creator_id: self.creator_id.unwrap_or_default(),
            creator_name: self.creator_name.unwrap_or_default(),
            status: TaskStatus::New,
            priority: self.priority.unwrap_or_default(),
            created_date: now,
            deadline: self.deadline,
            completed_date: None,
            synced: false,
        }
    }
}

/// Outcome of a status update
#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdate {
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_display() {
        for status in TaskStatus::ALL {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
        assert!("Done".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn status_serializes_as_russian_label() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"В работе\"");
        let parsed: TaskPriority = serde_json::from_str("\"Высокий\"").unwrap();
        assert_eq!(parsed, TaskPriority::High);
    }

    #[test]
    fn new_task_defaults() {
        let task = NewTask {
            title: "T".into(),
            assignee_id: "42".into(),
            ..Default::default()
        }
        .into_task("task-1".into(), Utc::now());

        assert_eq!(task.status, TaskStatus::New);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert_eq!(task.task_id, "task-1");
        assert!(!task.synced);
        assert!(task.completed_date.is_none());
    }

    #[test]
    fn task_without_assignee_is_rejected() {
        let req = NewTask {
            title: "T".into(),
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }
}
