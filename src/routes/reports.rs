// Daily report routes
// Endpoints: POST /api/reports, GET /api/reports, GET /api/reports/today/:telegram_id,
//            GET /api/reports/user/:telegram_id

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::ServiceError;
use crate::models::{NewReport, Report};
use crate::AppState;

#[derive(Deserialize)]
pub struct UserReportsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    10
}

#[derive(Deserialize)]
pub struct PeriodQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub employee_id: Option<String>,
}

/// POST /api/reports - Submit today's report (returns the existing one on resubmit)
async fn create_report(
    State(state): State<AppState>,
    Json(request): Json<NewReport>,
) -> Result<Json<Report>, ServiceError> {
    tracing::info!("Creating report for {}", request.telegram_id);
    let report = state.service.create_report(request).await?;
    Ok(Json(report))
}

/// GET /api/reports/today/:telegram_id
async fn get_today_report(
    State(state): State<AppState>,
    Path(telegram_id): Path<String>,
) -> Json<Option<Report>> {
    match state.service.get_today_report(&telegram_id).await {
        Ok(report) => Json(report),
        Err(e) => {
            tracing::error!("Failed to get today's report for {}: {}", telegram_id, e);
            Json(None)
        }
    }
}

/// GET /api/reports/user/:telegram_id?limit=
async fn get_user_reports(
    State(state): State<AppState>,
    Path(telegram_id): Path<String>,
    Query(query): Query<UserReportsQuery>,
) -> Json<Vec<Report>> {
    match state
        .service
        .get_user_reports(&telegram_id, query.limit.clamp(1, 100))
        .await
    {
        Ok(reports) => Json(reports),
        Err(e) => {
            tracing::error!("Failed to get reports for {}: {}", telegram_id, e);
            Json(Vec::new())
        }
    }
}

/// GET /api/reports?start=&end=&employee_id=
async fn get_reports_for_period(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> Json<Vec<Report>> {
    match state
        .service
        .get_reports_for_period(query.start, query.end, query.employee_id.as_deref())
        .await
    {
        Ok(reports) => Json(reports),
        Err(e) => {
            tracing::error!("Failed to get reports {}..{}: {}", query.start, query.end, e);
            Json(Vec::new())
        }
    }
}

pub fn reports_routes() -> Router<AppState> {
    Router::new()
        .route("/api/reports", get(get_reports_for_period).post(create_report))
        .route("/api/reports/today/:telegram_id", get(get_today_report))
        .route("/api/reports/user/:telegram_id", get(get_user_reports))
}
