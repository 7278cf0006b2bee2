//! Network-first user retrieval with a local snapshot fallback.
//!
//! `SmartUserFetcher::get_users` tries the remote endpoint once. A parsed
//! response is upserted into the snapshot store and returned; any network,
//! status, or parse failure returns whatever the snapshot holds instead.
//! Only a failing snapshot read on that fallback path reaches the caller.

use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiError, UserApiClient};
use crate::cache::{SnapshotInfo, SnapshotStore, SqliteSnapshotStore, StoreError};
use crate::config::{FetcherConfig, PersistPolicy, StoreConfig};
use crate::models::UserRecord;

/// Failure building a fetcher
#[derive(Error, Debug)]
pub enum FetcherError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Where a `get_users` result came from
#[derive(Debug)]
pub enum UserOrigin {
    /// Fresh from the endpoint. `persisted` is false only when the snapshot
    /// write failed under `PersistPolicy::BestEffort`.
    Network { persisted: bool },
    /// The fetch failed and the local snapshot was returned instead
    Snapshot { reason: ApiError },
}

#[derive(Debug)]
pub struct FetchedUsers {
    pub records: Vec<UserRecord>,
    pub origin: UserOrigin,
}

impl FetchedUsers {
    pub fn is_fresh(&self) -> bool {
        matches!(self.origin, UserOrigin::Network { .. })
    }
}

pub struct SmartUserFetcher<S = SqliteSnapshotStore> {
    api: UserApiClient,
    store: S,
    persist_policy: PersistPolicy,
}

impl SmartUserFetcher<SqliteSnapshotStore> {
    /// Fetcher backed by the durable SQLite snapshot store
    pub fn new(config: &FetcherConfig, store_config: StoreConfig) -> Result<Self, FetcherError> {
        let store = SqliteSnapshotStore::new(store_config)?;
        Ok(Self::with_store(config, store)?)
    }
}

impl<S: SnapshotStore> SmartUserFetcher<S> {
    pub fn with_store(config: &FetcherConfig, store: S) -> Result<Self, ApiError> {
        Ok(Self {
            api: UserApiClient::new(config)?,
            store,
            persist_policy: config.persist_policy,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Upsert `records` into the snapshot. Existing keys not in `records`
    /// are left alone.
    pub async fn persist_snapshot(&self, records: &[UserRecord]) -> Result<(), StoreError> {
        self.store.persist(records).await
    }

    /// Everything in the snapshot, in unspecified order
    pub async fn load_snapshot(&self) -> Result<Vec<UserRecord>, StoreError> {
        self.store.load().await
    }

    pub async fn snapshot_info(&self) -> Result<SnapshotInfo, StoreError> {
        self.store.info().await
    }

    /// Users from the network if reachable, otherwise from the snapshot
    pub async fn get_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        Ok(self.get_users_with_origin().await?.records)
    }

    pub async fn get_users_with_origin(&self) -> Result<FetchedUsers, StoreError> {
        let reason = match self.api.fetch_users().await {
            Ok(records) => {
                let persisted = self.persist_fetched(&records).await?;
                return Ok(FetchedUsers {
                    records,
                    origin: UserOrigin::Network { persisted },
                });
            }
            Err(reason) => reason,
        };

        if reason.is_status() {
            warn!(
                url = %self.api.endpoint(),
                error = %reason,
                "User endpoint returned an error status, falling back to local snapshot"
            );
        } else {
            info!(
                url = %self.api.endpoint(),
                error = %reason,
                "User fetch failed, falling back to local snapshot"
            );
        }
        let records = self.store.load().await?;
        Ok(FetchedUsers {
            records,
            origin: UserOrigin::Snapshot { reason },
        })
    }

    /// Returns whether the write landed. Errors only under `Required`.
    async fn persist_fetched(&self, records: &[UserRecord]) -> Result<bool, StoreError> {
        match self.store.persist(records).await {
            Ok(()) => Ok(true),
            Err(e) => match self.persist_policy {
                PersistPolicy::Required => Err(e),
                PersistPolicy::BestEffort => {
                    warn!(
                        error = %e,
                        count = records.len(),
                        "Failed to persist user snapshot, returning fetched users anyway"
                    );
                    Ok(false)
                }
            },
        }
    }
}
