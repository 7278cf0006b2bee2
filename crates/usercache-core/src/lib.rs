//! usercache-core - fetch a user list over HTTP, falling back to a local
//! snapshot when the network is unavailable.
//!
//! ```no_run
//! use usercache_core::{FetcherConfig, SmartUserFetcher, StoreConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = SmartUserFetcher::new(&FetcherConfig::default(), StoreConfig::default())?;
//! let users = fetcher.get_users().await?;
//! println!("{} users", users.len());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod fetcher;
pub mod models;

pub use api::{ApiError, UserApiClient};
pub use cache::{MemorySnapshotStore, SnapshotInfo, SnapshotStore, SqliteSnapshotStore, StoreError};
pub use config::{FetcherConfig, PersistPolicy, StoreConfig};
pub use fetcher::{FetchedUsers, FetcherError, SmartUserFetcher, UserOrigin};
pub use models::{UserId, UserRecord};
