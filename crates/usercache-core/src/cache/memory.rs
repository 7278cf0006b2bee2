//! In-process snapshot store.
//!
//! Same upsert-by-id semantics as the SQLite store, but nothing survives the
//! process. Useful for tests and for embedding without a writable disk.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::UserRecord;

use super::{SnapshotInfo, SnapshotStore, StoreError};

type Entries = HashMap<String, (UserRecord, DateTime<Utc>)>;

#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    records: Mutex<Entries>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Entries>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Background("snapshot mutex poisoned".to_string()))
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn persist(&self, records: &[UserRecord]) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut map = self.lock()?;
        for user in records {
            map.insert(user.id.storage_key(), (user.clone(), now));
        }
        Ok(())
    }

    async fn load(&self) -> Result<Vec<UserRecord>, StoreError> {
        Ok(self.lock()?.values().map(|(user, _)| user.clone()).collect())
    }

    async fn info(&self) -> Result<SnapshotInfo, StoreError> {
        let map = self.lock()?;
        Ok(SnapshotInfo {
            record_count: map.len(),
            last_written_at: map.values().map(|(_, at)| *at).max(),
        })
    }
}
