// User routes
// Endpoints: POST /api/users, GET /api/users/:telegram_id

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::error::ServiceError;
use crate::models::{NewUser, User};
use crate::AppState;

/// POST /api/users - Register or refresh an employee
async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<NewUser>,
) -> Result<Json<User>, ServiceError> {
    tracing::info!("Registering user {}", request.telegram_id);
    let user = state.service.create_user(request).await?;
    Ok(Json(user))
}

/// GET /api/users/:telegram_id
async fn get_user(
    State(state): State<AppState>,
    Path(telegram_id): Path<String>,
) -> Result<Json<User>, StatusCode> {
    match state.service.get_user_by_telegram_id(&telegram_id).await {
        Ok(Some(user)) => Ok(Json(user)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to get user {}: {}", telegram_id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub fn users_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", post(create_user))
        .route("/api/users/:telegram_id", get(get_user))
}
