// Error types for the cache, the Notion client and the coalescing service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Failures of the Postgres-backed stores (LocalCache / DirectStore)
#[derive(Debug, Error)]
pub enum StoreError {
    /// Pool could not be established or a connection could not be acquired
    #[error("Connection error: {0}")]
    Connection(String),

    /// A query failed after a connection was obtained
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    /// Pool-level failures become `Connection`, everything else `Database`
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => StoreError::Connection(err.to_string()),
            other => StoreError::Database(other),
        }
    }
}

/// Failures talking to the system of record (Notion)
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse remote record: {0}")]
    Parse(String),

    #[error("Remote system not configured: {0}")]
    NotConfigured(&'static str),
}

/// Errors surfaced by `CoalescingService` to HTTP/bot callers
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Caller-supplied data rejected before any write
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The local write itself failed, so nothing was recorded anywhere
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Remote failure in a path where the remote is the only backing store
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Every fallback failed
    #[error("All backing stores failed: {0}")]
    Unavailable(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            ServiceError::Validation(msg) => msg.clone(),
            _ => {
                tracing::error!("Request failed: {}", self);
                "Server error".to_string()
            }
        };

        (status, body).into_response()
    }
}
