//! Fetcher and snapshot store configuration.
//!
//! Nothing here is read from the environment or from disk. Callers build the
//! structs directly (or take the defaults) and hand them to the constructors,
//! which keeps distinct store instances fully isolated from each other.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Application name used for the default cache directory
const APP_NAME: &str = "usercache";

/// Remote user collection endpoint
pub const DEFAULT_ENDPOINT: &str = "https://jsonplaceholder.typicode.com/users";

/// Default database name (file stem of the SQLite file)
pub const DEFAULT_STORE_NAME: &str = "api-cache";

/// Default container (table) holding the snapshot
pub const DEFAULT_CONTAINER: &str = "users";

/// Current schema version. Bump together with an upgrade step in
/// `cache::sqlite` whenever the container layout changes.
pub const DEFAULT_STORE_VERSION: u32 = 1;

/// What to do when the snapshot write after a successful fetch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistPolicy {
    /// Log the failure and still return the freshly fetched users
    #[default]
    BestEffort,
    /// Fail the whole call even though fresh data is in hand
    Required,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetcherConfig {
    pub endpoint: String,
    /// Transport-level timeout. `None` leaves the client default (no timeout).
    pub request_timeout: Option<Duration>,
    pub persist_policy: PersistPolicy,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: None,
            persist_policy: PersistPolicy::default(),
        }
    }
}

impl FetcherConfig {
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub dir: PathBuf,
    pub name: String,
    pub version: u32,
    pub container: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::in_dir(Self::default_dir())
    }
}

impl StoreConfig {
    /// Default names and version, rooted at `dir`
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            name: DEFAULT_STORE_NAME.to_string(),
            version: DEFAULT_STORE_VERSION,
            container: DEFAULT_CONTAINER.to_string(),
        }
    }

    /// Platform cache directory, falling back to `./cache` when the platform
    /// has none.
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .map(|dir| dir.join(APP_NAME))
            .unwrap_or_else(|| PathBuf::from("./cache"))
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.join(format!("{}.sqlite3", self.name))
    }
}
