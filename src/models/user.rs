// User models - one row per Telegram account, never hard-deleted

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Employee registered through the bot or the web dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Telegram account id (primary key)
    pub telegram_id: String,
    /// Notion page id, set once the user has been mirrored
    pub notion_id: Option<String>,
    pub name: String,
    pub username: Option<String>,
    pub position: Option<String>,
    /// Soft-deactivation flag
    pub is_active: bool,
    pub registration_date: DateTime<Utc>,
}

/// Request body for registering a user
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub telegram_id: String,
    pub name: String,
    pub username: Option<String>,
    pub position: Option<String>,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), String> {
        if self.telegram_id.trim().is_empty() {
            return Err("telegramId is required".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        Ok(())
    }

    /// New users start active and unsynced
    pub fn into_user(self, now: DateTime<Utc>) -> User {
        User {
            telegram_id: self.telegram_id.trim().to_string(),
            notion_id: None,
            name: self.name.trim().to_string(),
            username: self.username.filter(|u| !u.is_empty()),
            position: self.position.filter(|p| !p.is_empty()),
            is_active: true,
            registration_date: now,
        }
    }
}
