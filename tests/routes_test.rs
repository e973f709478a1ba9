//! HTTP routes driven through the router without a listener.

mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::*;
use staff_hub_backend::config::Config;
use staff_hub_backend::{app, AppState};

async fn router(remote: Arc<MemoryRemote>, cache: Option<Arc<MemoryCache>>) -> Router {
    let service = service(remote, cache, None).await;
    app(AppState {
        service: Arc::new(service),
        config: Arc::new(Config::from_env()),
    })
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_reports_ready() {
    let router = router(Arc::new(MemoryRemote::default()), Some(Arc::new(MemoryCache::default()))).await;
    let (status, body) = send(&router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["ready"], true);
    assert_eq!(body["cacheEnabled"], true);
}

#[tokio::test]
async fn create_and_list_tasks() {
    let router = router(Arc::new(MemoryRemote::default()), Some(Arc::new(MemoryCache::default()))).await;

    let (status, created) = send(
        &router,
        "POST",
        "/api/tasks",
        Some(json!({"title": "T", "assigneeId": "42", "priority": "Высокий", "deadline": "2025-09-15"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["status"], "Новая");
    assert_eq!(created["priority"], "Высокий");

    let (status, tasks) = send(&router, "GET", "/api/tasks/assignee/42", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tasks.as_array().unwrap().len(), 1);
    assert_eq!(tasks[0]["title"], "T");

    let id = created["id"].as_str().unwrap();
    let (status, result) = send(
        &router,
        "POST",
        &format!("/api/tasks/{}/complete", id),
        Some(json!({"note": "ok"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["success"], true);
}

#[tokio::test]
async fn invalid_status_is_bad_request() {
    let router = router(Arc::new(MemoryRemote::default()), Some(Arc::new(MemoryCache::default()))).await;

    let (status, _) = send(
        &router,
        "PATCH",
        "/api/tasks/task-1/status",
        Some(json!({"status": "Bogus"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&router, "GET", "/api/tasks/assignee/42?status=Bogus", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_title_is_bad_request() {
    let router = router(Arc::new(MemoryRemote::default()), Some(Arc::new(MemoryCache::default()))).await;
    let (status, _) = send(
        &router,
        "POST",
        "/api/tasks",
        Some(json!({"title": "", "assigneeId": "42"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_fails_with_server_error_when_nothing_can_store_it() {
    let router = router(Arc::new(MemoryRemote::failing()), None).await;
    let (status, _) = send(
        &router,
        "POST",
        "/api/tasks",
        Some(json!({"title": "T", "assigneeId": "42"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn failed_list_read_degrades_to_empty() {
    let router = router(Arc::new(MemoryRemote::failing()), None).await;
    let (status, body) = send(&router, "GET", "/api/reports?start=2025-09-01&end=2025-09-30", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let router = router(Arc::new(MemoryRemote::default()), Some(Arc::new(MemoryCache::default()))).await;
    let (status, _) = send(&router, "GET", "/api/users/404404", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn register_user_then_fetch() {
    let router = router(Arc::new(MemoryRemote::default()), Some(Arc::new(MemoryCache::default()))).await;
    let (status, _) = send(
        &router,
        "POST",
        "/api/users",
        Some(json!({"telegramId": "123", "name": "Анна", "position": "Аналитик"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, user) = send(&router, "GET", "/api/users/123", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["name"], "Анна");
    assert_eq!(user["position"], "Аналитик");
}

#[tokio::test]
async fn check_in_then_check_out() {
    let router = router(Arc::new(MemoryRemote::default()), Some(Arc::new(MemoryCache::default()))).await;

    let (status, row) = send(
        &router,
        "POST",
        "/api/attendance/check-in",
        Some(json!({"employeeId": "77", "employeeName": "Олег", "checkIn": "2025-09-01T06:00:00Z"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(row["status"], "На работе");

    let (status, body) = send(
        &router,
        "POST",
        "/api/attendance/check-out",
        Some(json!({"employeeId": "77", "checkOut": "2025-09-01T14:30:00Z"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["workHours"], "8.5");

    let (status, today) = send(&router, "GET", "/api/attendance/today/77", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(today["status"], "Ушел");
}

#[tokio::test]
async fn stats_and_manual_sync() {
    let remote = Arc::new(MemoryRemote::failing());
    let router = router(remote.clone(), Some(Arc::new(MemoryCache::default()))).await;
    send(
        &router,
        "POST",
        "/api/tasks",
        Some(json!({"title": "T", "assigneeId": "42"})),
    )
    .await;

    let (status, stats) = send(&router, "GET", "/api/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["tasks"], 1);
    assert_eq!(stats["sizeMB"], "0.00");

    remote.set_fail(false);
    let (status, summary) = send(&router, "POST", "/api/admin/sync", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["tasksSynced"], 1);

    let (status, debug) = send(&router, "GET", "/api/debug/tasks", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(debug["count"], 1);
}
