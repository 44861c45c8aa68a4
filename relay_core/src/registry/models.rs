use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One pending transfer, keyed by its share code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareEntry {
    pub code: String,
    pub stored_name: String,
    pub original_name: String,
    pub size: u64,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

impl ShareEntry {
    pub fn expires_at(&self, retention: std::time::Duration) -> DateTime<Utc> {
        let retention = chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX);
        self.created_at
            .checked_add_signed(retention)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Metadata of a committed upload, before a code has been assigned.
#[derive(Debug, Clone)]
pub struct NewShare {
    pub stored_name: String,
    pub original_name: String,
    pub size: u64,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lease {
    Acquired(ShareEntry),
    Busy,
    Missing,
}

#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub entry: ShareEntry,
    /// When the current download lease was taken, if any.
    pub leased_at: Option<DateTime<Utc>>,
}

impl Slot {
    pub fn new(entry: ShareEntry) -> Self {
        Self {
            entry,
            leased_at: None,
        }
    }

    pub fn is_leased(&self) -> bool {
        self.leased_at.is_some()
    }
}
