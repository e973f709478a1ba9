// Lazily initialized Postgres connection pool with a keep-alive heartbeat

use std::sync::Mutex;

use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::PoolSettings;
use crate::error::StoreError;

/// Shared pool, created on first use.
///
/// Concurrent callers that arrive while the pool is being created all wait on
/// the same initialization. A failed initialization leaves the cell empty, so
/// the next caller retries; there is no automatic reconnect once a pool exists.
pub struct ConnectionPool {
    name: &'static str,
    url: String,
    settings: PoolSettings,
    pool: OnceCell<PgPool>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionPool {
    pub fn new(name: &'static str, url: impl Into<String>, settings: PoolSettings) -> Self {
        Self {
            name,
            url: url.into(),
            settings,
            pool: OnceCell::new(),
            heartbeat: Mutex::new(None),
        }
    }

    /// Return the pool, initializing it if needed
    pub async fn acquire(&self) -> Result<PgPool, StoreError> {
        self.pool
            .get_or_try_init(|| self.initialize())
            .await
            .cloned()
    }

    /// Run a parameterized query. Never retries; callers decide.
    pub async fn query(&self, sql: &str, args: PgArguments) -> Result<Vec<PgRow>, StoreError> {
        let pool = self.acquire().await?;
        sqlx::query_with(sql, args)
            .fetch_all(&pool)
            .await
            .map_err(StoreError::from)
    }

    pub fn is_initialized(&self) -> bool {
        self.pool.initialized()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stop the heartbeat and close all connections
    pub async fn close(&self) {
        if let Ok(mut guard) = self.heartbeat.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
        if let Some(pool) = self.pool.get() {
            pool.close().await;
            info!(pool = self.name, "Connection pool closed");
        }
    }

    async fn initialize(&self) -> Result<PgPool, StoreError> {
        info!(
            pool = self.name,
            max_connections = self.settings.max_connections,
            "Initializing connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(self.settings.max_connections)
            .acquire_timeout(self.settings.acquire_timeout)
            .idle_timeout(Some(self.settings.idle_timeout))
            .test_before_acquire(true)
            .connect(&self.url)
            .await
            .map_err(|e| {
                warn!(pool = self.name, error = %e, "Failed to establish connection pool");
                StoreError::Connection(e.to_string())
            })?;

        let alive: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| StoreError::Connection(format!("liveness query failed: {}", e)))?;
        debug!(pool = self.name, result = alive, "Liveness query passed");

        self.spawn_heartbeat(pool.clone());

        info!(pool = self.name, "Connection pool ready");
        Ok(pool)
    }

    fn spawn_heartbeat(&self, pool: PgPool) {
        let interval = self.settings.heartbeat_interval;
        if interval.is_zero() {
            return;
        }

        let name = self.name;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if pool.is_closed() {
                    break;
                }
                match sqlx::query("SELECT 1").execute(&pool).await {
                    Ok(_) => debug!(pool = name, "Heartbeat ok"),
                    Err(e) => warn!(pool = name, error = %e, "Heartbeat query failed"),
                }
            }
        });

        if let Ok(mut guard) = self.heartbeat.lock() {
            if let Some(previous) = guard.replace(handle) {
                previous.abort();
            }
        }
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.heartbeat.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}
