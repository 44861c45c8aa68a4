//! Response bodies for the share endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::ShareEntry;

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub code: String,
    pub message: String,
    pub filename: String,
    pub size: u64,
}

impl From<ShareEntry> for UploadResponse {
    fn from(entry: ShareEntry) -> Self {
        Self {
            code: entry.code,
            message: "File uploaded successfully".to_string(),
            filename: entry.original_name,
            size: entry.size,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckResponse {
    pub valid: bool,
    pub filename: String,
    pub size: u64,
    pub expires_at: DateTime<Utc>,
}

impl CheckResponse {
    pub fn new(entry: ShareEntry, retention: std::time::Duration) -> Self {
        Self {
            valid: true,
            expires_at: entry.expires_at(retention),
            filename: entry.original_name,
            size: entry.size,
        }
    }
}
