//! Local snapshot storage for offline access to the user list.
//!
//! The snapshot is every `UserRecord` ever fetched, keyed by id. Writes are
//! upserts and never purge keys missing from the newer list, so the snapshot
//! only grows or changes in place. There is no staleness or expiry; the
//! `SnapshotInfo` age is informational.
//!
//! - `SnapshotStore`: the async seam the fetcher talks to
//! - `SqliteSnapshotStore`: durable store, one SQLite connection per operation
//! - `MemorySnapshotStore`: in-process store with the same upsert semantics

pub mod error;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use error::StoreError;
pub use memory::MemorySnapshotStore;
pub use sqlite::SqliteSnapshotStore;
pub use store::{SnapshotInfo, SnapshotStore};
