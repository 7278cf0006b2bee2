//! SQLite-backed snapshot store.
//!
//! Every operation opens its own connection on a blocking thread and awaits
//! the join handle, so callers see one future per operation. Nothing is
//! pooled between calls.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, TransactionBehavior};
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::models::UserRecord;

use super::{SnapshotInfo, SnapshotStore, StoreError};

/// How long a connection waits on another writer's lock before failing
const BUSY_TIMEOUT_MS: u64 = 5_000;

fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Durable snapshot store.
///
/// The database file lives at `StoreConfig::db_path()`. The container is a
/// single table keyed by the user id's storage key.
#[derive(Debug, Clone)]
pub struct SqliteSnapshotStore {
    config: StoreConfig,
}

impl SqliteSnapshotStore {
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        if !is_valid_identifier(&config.container) {
            return Err(StoreError::InvalidConfig(format!(
                "container name {:?} is not a plain identifier",
                config.container
            )));
        }
        if config.version == 0 {
            return Err(StoreError::InvalidConfig(
                "store version must be at least 1".to_string(),
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Run a blocking store operation and await its result
    async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&StoreConfig) -> Result<T, StoreError> + Send + 'static,
    {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || op(&config))
            .await
            .map_err(|e| StoreError::Background(e.to_string()))?
    }
}

fn open_connection(config: &StoreConfig) -> Result<Connection, StoreError> {
    let path = config.db_path();
    std::fs::create_dir_all(&config.dir).map_err(|e| StoreError::open(&path, e))?;
    let mut conn = Connection::open(&path).map_err(|e| StoreError::open(&path, e))?;
    conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))
        .map_err(|e| StoreError::open(&path, e))?;
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(|e| StoreError::open(&path, e))?;
    ensure_schema(&mut conn, config)?;
    Ok(conn)
}

/// Create or upgrade the container. Reopening an up-to-date store only
/// re-runs the idempotent `CREATE TABLE IF NOT EXISTS`.
fn ensure_schema(conn: &mut Connection, config: &StoreConfig) -> Result<(), StoreError> {
    let path = config.db_path();
    let found: u32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| StoreError::open(&path, e))?;

    if found > config.version {
        return Err(StoreError::VersionMismatch {
            found,
            expected: config.version,
        });
    }

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| StoreError::open(&path, e))?;
    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            key TEXT PRIMARY KEY NOT NULL,
            record_json TEXT NOT NULL,
            stored_at_ms INTEGER NOT NULL
        );",
        config.container
    ))
    .map_err(|e| StoreError::open(&path, e))?;

    // Only version 1 exists, so upgrading is just stamping the new version.
    if found < config.version {
        debug!(
            path = %path.display(),
            from = found,
            to = config.version,
            "Initializing snapshot store schema"
        );
        tx.pragma_update(None, "user_version", config.version)
            .map_err(|e| StoreError::open(&path, e))?;
    }

    tx.commit().map_err(|e| StoreError::open(&path, e))?;
    Ok(())
}

fn persist_rows(config: &StoreConfig, rows: Vec<(String, String)>) -> Result<(), StoreError> {
    let mut conn = open_connection(config)?;
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| StoreError::transaction("begin tx", e))?;
    {
        let mut stmt = tx
            .prepare(&format!(
                "INSERT INTO {} (key, record_json, stored_at_ms) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                    record_json = excluded.record_json,
                    stored_at_ms = excluded.stored_at_ms",
                config.container
            ))
            .map_err(|e| StoreError::transaction("prepare upsert", e))?;
        let now_ms = Utc::now().timestamp_millis();
        for (key, json) in &rows {
            stmt.execute(params![key, json, now_ms])
                .map_err(|e| StoreError::transaction("upsert record", e))?;
        }
    }
    tx.commit()
        .map_err(|e| StoreError::transaction("commit tx", e))?;
    Ok(())
}

fn load_rows(config: &StoreConfig) -> Result<Vec<UserRecord>, StoreError> {
    let mut conn = open_connection(config)?;
    let tx = conn
        .transaction()
        .map_err(|e| StoreError::transaction("begin read", e))?;
    let rows = {
        let mut stmt = tx
            .prepare(&format!("SELECT key, record_json FROM {}", config.container))
            .map_err(|e| StoreError::transaction("prepare scan", e))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(|e| StoreError::transaction("query scan", e))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| StoreError::transaction("read row", e))?);
        }
        out
    };
    tx.commit()
        .map_err(|e| StoreError::transaction("end read", e))?;

    let mut users = Vec::with_capacity(rows.len());
    for (key, json) in rows {
        let user: UserRecord = serde_json::from_str(&json).map_err(|e| {
            warn!(key = %key, error = %e, "Stored user record does not decode");
            StoreError::Corrupt {
                key,
                message: e.to_string(),
            }
        })?;
        users.push(user);
    }
    Ok(users)
}

fn read_info(config: &StoreConfig) -> Result<SnapshotInfo, StoreError> {
    let conn = open_connection(config)?;
    let (count, last_ms): (i64, Option<i64>) = conn
        .query_row(
            &format!(
                "SELECT COUNT(*), MAX(stored_at_ms) FROM {}",
                config.container
            ),
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(|e| StoreError::transaction("read info", e))?;

    Ok(SnapshotInfo {
        record_count: count.max(0) as usize,
        last_written_at: last_ms.and_then(DateTime::from_timestamp_millis),
    })
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn persist(&self, records: &[UserRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut rows = Vec::with_capacity(records.len());
        for user in records {
            let key = user.id.storage_key();
            let json = serde_json::to_string(user).map_err(|source| StoreError::Serialize {
                key: key.clone(),
                source,
            })?;
            rows.push((key, json));
        }

        let count = rows.len();
        self.run(move |config| persist_rows(config, rows)).await?;
        debug!(count, "Persisted user snapshot");
        Ok(())
    }

    async fn load(&self) -> Result<Vec<UserRecord>, StoreError> {
        let users = self.run(load_rows).await?;
        debug!(count = users.len(), "Loaded user snapshot");
        Ok(users)
    }

    async fn info(&self) -> Result<SnapshotInfo, StoreError> {
        self.run(read_info).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::models::UserId;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> SqliteSnapshotStore {
        SqliteSnapshotStore::new(StoreConfig::in_dir(dir.path())).unwrap()
    }

    fn by_id(users: Vec<UserRecord>) -> HashMap<UserId, UserRecord> {
        users.into_iter().map(|u| (u.id.clone(), u)).collect()
    }

    #[tokio::test]
    async fn test_load_on_fresh_store_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(store.load().await.unwrap().is_empty());
        assert_eq!(store.info().await.unwrap(), SnapshotInfo::default());
    }

    #[tokio::test]
    async fn test_persist_then_load_returns_same_records() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let users = vec![
            UserRecord::new(1).with_field("name", "a"),
            UserRecord::new(2).with_field("name", "b"),
            UserRecord::new("x-3").with_field("email", "c@example.com"),
        ];

        store.persist(&users).await.unwrap();

        let loaded = by_id(store.load().await.unwrap());
        assert_eq!(loaded, by_id(users));
    }

    #[tokio::test]
    async fn test_persist_upserts_last_write_wins() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store
            .persist(&[UserRecord::new(1).with_field("name", "a")])
            .await
            .unwrap();
        store
            .persist(&[UserRecord::new(1).with_field("name", "b")])
            .await
            .unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, vec![UserRecord::new(1).with_field("name", "b")]);
    }

    #[tokio::test]
    async fn test_persist_keeps_keys_missing_from_newer_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.persist(&[UserRecord::new(1)]).await.unwrap();
        store.persist(&[UserRecord::new(2)]).await.unwrap();

        let loaded = by_id(store.load().await.unwrap());
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains_key(&UserId::from(1)));
        assert!(loaded.contains_key(&UserId::from(2)));
        assert_eq!(store.info().await.unwrap().record_count, 2);
    }

    #[tokio::test]
    async fn test_stray_id_field_does_not_poison_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut user = UserRecord::new(1).with_field("name", "a");
        user.fields.insert("id".to_string(), serde_json::json!(5));

        store.persist(&[user]).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, vec![UserRecord::new(1).with_field("name", "a")]);
    }

    #[tokio::test]
    async fn test_float_and_equal_numeric_ids() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let users: Vec<UserRecord> = serde_json::from_str(
            r#"[{"id": 1.5, "name": "half"}, {"id": 18446744073709551615}, {"id": 2.0, "name": "old"}]"#,
        )
        .unwrap();
        store.persist(&users).await.unwrap();
        store
            .persist(&[UserRecord::new(2).with_field("name", "new")])
            .await
            .unwrap();

        let loaded = by_id(store.load().await.unwrap());
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[&UserId::from(2)].name(), Some("new"));
        assert!(loaded.contains_key(&UserId::from(u64::MAX)));
        let half = loaded.values().find(|u| u.id.storage_key() == "1.5").unwrap();
        assert_eq!(half.name(), Some("half"));
    }

    #[tokio::test]
    async fn test_numeric_and_string_ids_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store
            .persist(&[UserRecord::new(1), UserRecord::new("1")])
            .await
            .unwrap();

        assert_eq!(store.load().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_survives_new_store_instance() {
        let dir = TempDir::new().unwrap();
        store_in(&dir)
            .persist(&[UserRecord::new(9).with_field("name", "kept")])
            .await
            .unwrap();

        let reopened = store_in(&dir);
        let loaded = reopened.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name(), Some("kept"));

        let info = reopened.info().await.unwrap();
        assert_eq!(info.record_count, 1);
        assert_eq!(info.age_display(), "just now");
    }

    #[tokio::test]
    async fn test_empty_persist_does_not_touch_disk() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.persist(&[]).await.unwrap();
        assert!(!store.config().db_path().exists());
    }

    #[tokio::test]
    async fn test_newer_on_disk_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut newer = StoreConfig::in_dir(dir.path());
        newer.version = 2;
        SqliteSnapshotStore::new(newer)
            .unwrap()
            .persist(&[UserRecord::new(1)])
            .await
            .unwrap();

        let err = store_in(&dir).load().await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionMismatch {
                found: 2,
                expected: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_upgrade_keeps_existing_records() {
        let dir = TempDir::new().unwrap();
        store_in(&dir).persist(&[UserRecord::new(1)]).await.unwrap();

        let mut upgraded = StoreConfig::in_dir(dir.path());
        upgraded.version = 2;
        let store = SqliteSnapshotStore::new(upgraded).unwrap();
        assert_eq!(store.load().await.unwrap(), vec![UserRecord::new(1)]);
    }

    #[tokio::test]
    async fn test_distinct_store_names_are_isolated() {
        let dir = TempDir::new().unwrap();
        let mut other = StoreConfig::in_dir(dir.path());
        other.name = "other-cache".to_string();

        store_in(&dir).persist(&[UserRecord::new(1)]).await.unwrap();

        let other = SqliteSnapshotStore::new(other).unwrap();
        assert!(other.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unopenable_store_reports_open_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        // A regular file cannot serve as the store directory
        let store = SqliteSnapshotStore::new(StoreConfig::in_dir(file.path())).unwrap();

        assert!(matches!(store.load().await, Err(StoreError::Open { .. })));
        assert!(matches!(
            store.persist(&[UserRecord::new(1)]).await,
            Err(StoreError::Open { .. })
        ));
    }

    #[tokio::test]
    async fn test_corrupt_row_is_reported() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.persist(&[UserRecord::new(1)]).await.unwrap();

        let conn = Connection::open(store.config().db_path()).unwrap();
        conn.execute("UPDATE users SET record_json = 'not json'", [])
            .unwrap();
        drop(conn);

        assert!(matches!(
            store.load().await,
            Err(StoreError::Corrupt { ref key, .. }) if key == "1"
        ));
    }

    #[tokio::test]
    async fn test_concurrent_persists_interleave() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let batch_a: Vec<_> = (0..50i64).map(UserRecord::new).collect();
        let batch_b: Vec<_> = (50..100i64).map(UserRecord::new).collect();
        let (a, b) = tokio::join!(store.persist(&batch_a), store.persist(&batch_b));
        a.unwrap();
        b.unwrap();

        assert_eq!(store.load().await.unwrap().len(), 100);
    }

    #[test]
    fn test_container_name_must_be_identifier() {
        let mut config = StoreConfig::in_dir("/tmp/unused");
        config.container = "users; DROP TABLE users".to_string();
        assert!(matches!(
            SqliteSnapshotStore::new(config),
            Err(StoreError::InvalidConfig(_))
        ));

        assert!(is_valid_identifier("users"));
        assert!(is_valid_identifier("_users_v2"));
        assert!(!is_valid_identifier("2users"));
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn test_version_zero_is_rejected() {
        let mut config = StoreConfig::in_dir("/tmp/unused");
        config.version = 0;
        assert!(matches!(
            SqliteSnapshotStore::new(config),
            Err(StoreError::InvalidConfig(_))
        ));
    }
}
