// Stats, reconciliation and diagnostic routes
// Endpoints: GET /api/stats, POST /api/admin/sync, GET /api/debug/tasks, GET /api/debug/tasks-db

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::error::ServiceError;
use crate::models::{CacheStats, ReconcileSummary, Task, TaskDatabaseProbe};
use crate::AppState;

#[derive(Serialize)]
pub struct DebugTasksResponse {
    pub count: usize,
    pub tasks: Vec<Task>,
}

/// GET /api/stats
async fn get_stats(State(state): State<AppState>) -> Result<Json<CacheStats>, ServiceError> {
    Ok(Json(state.service.get_stats().await?))
}

/// POST /api/admin/sync - Run a reconciliation pass now
async fn sync_now(State(state): State<AppState>) -> Result<Json<ReconcileSummary>, ServiceError> {
    tracing::info!("Manual reconciliation requested");
    Ok(Json(state.service.reconcile_unsynced().await?))
}

/// GET /api/debug/tasks
async fn debug_tasks(State(state): State<AppState>) -> Json<DebugTasksResponse> {
    let tasks = match state.service.debug_get_all_tasks().await {
        Ok(tasks) => tasks,
        Err(e) => {
            tracing::error!("Failed to list tasks: {}", e);
            Vec::new()
        }
    };
    Json(DebugTasksResponse {
        count: tasks.len(),
        tasks,
    })
}

/// GET /api/debug/tasks-db
async fn debug_tasks_db(State(state): State<AppState>) -> Json<Vec<TaskDatabaseProbe>> {
    Json(state.service.test_tasks_database().await)
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/stats", get(get_stats))
        .route("/api/admin/sync", post(sync_now))
        .route("/api/debug/tasks", get(debug_tasks))
        .route("/api/debug/tasks-db", get(debug_tasks_db))
}
