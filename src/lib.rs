// Staff hub backend - cache-coalescing layer in front of Notion

pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::{admin_routes, attendance_routes, health_routes, reports_routes, tasks_routes, users_routes};
use services::CoalescingService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CoalescingService>,
    pub config: Arc<Config>,
}

/// Build the HTTP router with CORS and request tracing
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(health_routes())
        .merge(users_routes())
        .merge(reports_routes())
        .merge(tasks_routes())
        .merge(attendance_routes())
        .merge(admin_routes())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
