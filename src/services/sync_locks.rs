// Per-row sync locks
//
// At most one Notion sync runs for a given row at a time. Entries are dropped
// once nobody holds or waits on them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct SyncLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of one sync
pub struct SyncGuard<'a> {
    key: String,
    owner: &'a SyncLocks,
    _held: OwnedMutexGuard<()>,
}

impl SyncLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: String) -> SyncGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        let held = lock.lock_owned().await;
        SyncGuard {
            key,
            owner: self,
            _held: held,
        }
    }

    fn release(&self, key: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // The map and the releasing guard hold the only references
        if locks.get(key).is_some_and(|lock| Arc::strong_count(lock) <= 2) {
            locks.remove(key);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.owner.release(&self.key);
    }
}

pub fn task_key(id: &str) -> String {
    format!("task:{}", id)
}

pub fn report_key(id: &str) -> String {
    format!("report:{}", id)
}

pub fn user_key(telegram_id: &str) -> String {
    format!("user:{}", telegram_id)
}

pub fn attendance_key(employee_id: &str, date: chrono::NaiveDate) -> String {
    format!("attendance:{}:{}", employee_id, date)
}
