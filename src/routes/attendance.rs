// Attendance routes
// Endpoints: POST /api/attendance/check-in, POST /api/attendance/check-out,
//            GET /api/attendance/today/:employee_id, GET /api/attendance

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;

use crate::error::ServiceError;
use crate::models::{Attendance, AttendanceKey, CheckIn, CheckOut};
use crate::routes::reports::PeriodQuery;
use crate::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutResponse {
    pub work_hours: String,
}

/// POST /api/attendance/check-in
async fn check_in(
    State(state): State<AppState>,
    Json(request): Json<CheckIn>,
) -> Result<Json<Attendance>, ServiceError> {
    tracing::info!("Check-in for {}", request.employee_id);
    let attendance = state.service.create_attendance(request).await?;
    Ok(Json(attendance))
}

/// POST /api/attendance/check-out - defaults to today and now
async fn check_out(
    State(state): State<AppState>,
    Json(request): Json<CheckOut>,
) -> Result<Json<CheckOutResponse>, ServiceError> {
    let key = AttendanceKey {
        date: request.date.unwrap_or_else(|| state.service.today()),
        employee_id: request.employee_id,
    };
    tracing::info!("Check-out for {} on {}", key.employee_id, key.date);

    let work_hours = state
        .service
        .update_attendance_check_out(key, request.check_out.unwrap_or_else(Utc::now), request.location)
        .await?;
    Ok(Json(CheckOutResponse { work_hours }))
}

/// GET /api/attendance/today/:employee_id
async fn get_today_attendance(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
) -> Json<Option<Attendance>> {
    match state.service.get_today_attendance(&employee_id).await {
        Ok(row) => Json(row),
        Err(e) => {
            tracing::error!("Failed to get today's attendance for {}: {}", employee_id, e);
            Json(None)
        }
    }
}

/// GET /api/attendance?start=&end=&employee_id=
async fn get_attendance_for_period(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> Json<Vec<Attendance>> {
    match state
        .service
        .get_attendance_for_period(query.start, query.end, query.employee_id.as_deref())
        .await
    {
        Ok(rows) => Json(rows),
        Err(e) => {
            tracing::error!("Failed to get attendance {}..{}: {}", query.start, query.end, e);
            Json(Vec::new())
        }
    }
}

pub fn attendance_routes() -> Router<AppState> {
    Router::new()
        .route("/api/attendance", get(get_attendance_for_period))
        .route("/api/attendance/check-in", post(check_in))
        .route("/api/attendance/check-out", post(check_out))
        .route("/api/attendance/today/:employee_id", get(get_today_attendance))
}
