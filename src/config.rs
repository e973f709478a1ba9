// Configuration - Environment variables

use std::env;
use std::time::Duration;

use chrono_tz::Tz;

/// How the best-effort Notion write is scheduled after the local write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Local write returns immediately; remote sync runs on a spawned task
    Background,
    /// Remote sync is awaited before returning (its failure is still swallowed)
    Inline,
}

impl SyncMode {
    fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "background" | "instant" => Ok(SyncMode::Background),
            "inline" => Ok(SyncMode::Inline),
            other => Err(format!("Invalid SYNC_MODE: {}", other)),
        }
    }
}

/// Connection pool settings shared by the cache and direct-store pools
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    /// Acquisition timeout; fails the acquire, never cancels in-flight queries
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    /// Interval of the keep-alive query
    pub heartbeat_interval: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(300),
            heartbeat_interval: Duration::from_secs(240),
        }
    }
}

/// Notion databases backing each entity
#[derive(Debug, Clone, Default)]
pub struct NotionSettings {
    pub api_url: String,
    pub token: Option<String>,
    pub users_db: Option<String>,
    pub reports_db: Option<String>,
    pub tasks_db: Option<String>,
    pub attendance_db: Option<String>,
}

/// Application configuration loaded from environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Postgres cache; absent means cache-disabled mode
    pub database_url: Option<String>,
    /// Postgres for the direct read path, defaults to `database_url`
    pub direct_database_url: Option<String>,
    pub pool: PoolSettings,
    pub notion: NotionSettings,
    /// Timezone that defines "today" for reports and attendance
    pub timezone: Tz,
    pub sync_mode: SyncMode,
    /// Reconciliation sweep interval, `None` when disabled
    pub reconcile_interval: Option<Duration>,
    pub log_file: String,
    invalid: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut invalid = Vec::new();
        let defaults = PoolSettings::default();

        let database_url = non_empty("DATABASE_URL");
        let direct_database_url = non_empty("DIRECT_DATABASE_URL").or_else(|| database_url.clone());

        let timezone = match env::var("TIMEZONE") {
            Ok(tz) => tz.parse::<Tz>().unwrap_or_else(|e| {
                invalid.push(format!("Invalid TIMEZONE {}: {}", tz, e));
                chrono_tz::Europe::Moscow
            }),
            Err(_) => chrono_tz::Europe::Moscow,
        };

        let sync_mode = match env::var("SYNC_MODE") {
            Ok(mode) => SyncMode::parse(&mode).unwrap_or_else(|e| {
                invalid.push(e);
                SyncMode::Background
            }),
            Err(_) => SyncMode::Background,
        };

        let reconcile_secs = parse_or("RECONCILE_INTERVAL_SECS", 300u64, &mut invalid);

        Self {
            port: parse_or("PORT", 8080, &mut invalid),
            database_url,
            direct_database_url,
            pool: PoolSettings {
                max_connections: parse_or("DB_MAX_CONNECTIONS", defaults.max_connections, &mut invalid),
                acquire_timeout: Duration::from_secs(parse_or(
                    "DB_ACQUIRE_TIMEOUT_SECS",
                    defaults.acquire_timeout.as_secs(),
                    &mut invalid,
                )),
                idle_timeout: Duration::from_secs(parse_or(
                    "DB_IDLE_TIMEOUT_SECS",
                    defaults.idle_timeout.as_secs(),
                    &mut invalid,
                )),
                heartbeat_interval: Duration::from_secs(parse_or(
                    "DB_HEARTBEAT_SECS",
                    defaults.heartbeat_interval.as_secs(),
                    &mut invalid,
                )),
            },
            notion: NotionSettings {
                api_url: env::var("NOTION_API_URL")
                    .unwrap_or_else(|_| "https://api.notion.com/v1".to_string()),
                token: non_empty("NOTION_TOKEN"),
                users_db: non_empty("NOTION_USERS_DB"),
                reports_db: non_empty("NOTION_REPORTS_DB"),
                tasks_db: non_empty("NOTION_TASKS_DB"),
                attendance_db: non_empty("NOTION_ATTENDANCE_DB"),
            },
            timezone,
            sync_mode,
            reconcile_interval: (reconcile_secs > 0).then(|| Duration::from_secs(reconcile_secs)),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "/tmp/staff-hub.log".to_string()),
            invalid,
        }
    }

    /// Validate configuration; missing optional settings only warn
    pub fn validate(&self) -> Result<(), String> {
        if self.database_url.is_none() {
            tracing::warn!("DATABASE_URL not set - running in cache-disabled mode");
        }
        if self.notion.token.is_none() {
            tracing::warn!("NOTION_TOKEN not set - remote sync will fail and records stay unsynced");
        }
        if self.pool.max_connections == 0 {
            return Err("DB_MAX_CONNECTIONS must be at least 1".to_string());
        }
        if !self.invalid.is_empty() {
            return Err(self.invalid.join("; "));
        }
        Ok(())
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(key: &str, default: T, invalid: &mut Vec<String>) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
            invalid.push(format!("Invalid {} value {}: {}", key, raw, e));
            default
        }),
        Err(_) => default,
    }
}
