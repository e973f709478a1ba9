// Task routes
// Endpoints: POST /api/tasks, GET /api/tasks/assignee/:telegram_id,
//            PATCH /api/tasks/:id/status, POST /api/tasks/:id/complete

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;

use crate::error::ServiceError;
use crate::models::{NewTask, StatusUpdate, Task, TaskStatus};
use crate::AppState;

#[derive(Deserialize)]
pub struct AssigneeTasksQuery {
    /// Status label, e.g. "В работе"
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Deserialize, Default)]
pub struct CompleteTaskRequest {
    #[serde(default)]
    pub note: Option<String>,
}

/// POST /api/tasks
async fn create_task(
    State(state): State<AppState>,
    Json(request): Json<NewTask>,
) -> Result<Json<Task>, ServiceError> {
    tracing::info!("Creating task '{}' for {}", request.title, request.assignee_id);
    let task = state.service.create_task(request).await?;
    Ok(Json(task))
}

/// GET /api/tasks/assignee/:telegram_id?status=
async fn get_tasks_by_assignee(
    State(state): State<AppState>,
    Path(telegram_id): Path<String>,
    Query(query): Query<AssigneeTasksQuery>,
) -> Result<Json<Vec<Task>>, StatusCode> {
    let status = match query.status.as_deref() {
        Some(s) => Some(s.parse::<TaskStatus>().map_err(|e| {
            tracing::warn!("Rejected task filter: {}", e);
            StatusCode::BAD_REQUEST
        })?),
        None => None,
    };

    match state.service.get_tasks_by_assignee(&telegram_id, status).await {
        Ok(tasks) => Ok(Json(tasks)),
        Err(e) => {
            tracing::error!("Failed to get tasks for {}: {}", telegram_id, e);
            Ok(Json(Vec::new()))
        }
    }
}

/// PATCH /api/tasks/:id/status
async fn update_task_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<StatusUpdate>, ServiceError> {
    tracing::info!("Updating task {} to {}", id, request.status);
    let result = state.service.update_task_status(&id, &request.status).await?;
    Ok(Json(result))
}

/// POST /api/tasks/:id/complete
async fn complete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CompleteTaskRequest>,
) -> Result<Json<StatusUpdate>, ServiceError> {
    tracing::info!("Completing task {}", id);
    let result = state.service.complete_task(&id, request.note.as_deref()).await?;
    Ok(Json(result))
}

pub fn tasks_routes() -> Router<AppState> {
    Router::new()
        .route("/api/tasks", post(create_task))
        .route("/api/tasks/assignee/:telegram_id", get(get_tasks_by_assignee))
        .route("/api/tasks/:id/status", patch(update_task_status))
        .route("/api/tasks/:id/complete", post(complete_task))
}
