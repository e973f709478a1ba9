// Operational statistics and diagnostics

use serde::Serialize;

/// Per-entity row counts plus approximate store size
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub users: i64,
    pub reports: i64,
    pub tasks: i64,
    pub attendance: i64,
    /// Megabytes, two decimals
    #[serde(rename = "sizeMB")]
    pub size_mb: String,
}

impl CacheStats {
    pub fn from_bytes(users: i64, reports: i64, tasks: i64, attendance: i64, bytes: i64) -> Self {
        Self {
            users,
            reports,
            tasks,
            attendance,
            size_mb: format!("{:.2}", bytes as f64 / (1024.0 * 1024.0)),
        }
    }
}

/// Result of one reconciliation sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    pub reports_synced: usize,
    pub reports_failed: usize,
    pub tasks_synced: usize,
    pub tasks_failed: usize,
}

/// Diagnostic view of the task tables
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDatabaseProbe {
    /// Which backing store answered: "direct", "cache" or "notion"
    pub source: String,
    pub ok: bool,
    pub task_count: usize,
    pub sample_titles: Vec<String>,
    pub error: Option<String>,
}
