use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::UserRecord;

use super::StoreError;

/// Durable home of the user snapshot.
///
/// Implementations upsert by `UserRecord::id` and never delete. `load`
/// returns records in whatever order the backing scan yields.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Upsert every record in one all-or-nothing write.
    async fn persist(&self, records: &[UserRecord]) -> Result<(), StoreError>;

    /// Every stored record. Empty if nothing was ever written.
    async fn load(&self) -> Result<Vec<UserRecord>, StoreError>;

    async fn info(&self) -> Result<SnapshotInfo, StoreError>;
}

/// Size and age of the stored snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub record_count: usize,
    pub last_written_at: Option<DateTime<Utc>>,
}

impl SnapshotInfo {
    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    pub fn age_minutes(&self) -> Option<i64> {
        self.last_written_at
            .map(|written| (Utc::now() - written).num_minutes())
    }

    pub fn age_display(&self) -> String {
        let Some(minutes) = self.age_minutes() else {
            return "never".to_string();
        };
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}
