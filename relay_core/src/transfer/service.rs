use bytes::Bytes;
use chrono::Utc;
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::registry::{CodeGenerator, CodeRegistry, Lease, NewShare, ShareEntry};
use crate::storage::naming::is_generated_stored_name;
use crate::storage::{stored_name_for, FileStorage};
use super::download::{DownloadStream, LeaseGuard};

/// A resolved download: the share metadata plus the body that streams it.
pub struct Download {
    pub entry: ShareEntry,
    pub body: DownloadStream,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub expired_entries: usize,
    pub stale_leases: usize,
    pub files_removed: usize,
    pub orphans_removed: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired_entries == 0
            && self.stale_leases == 0
            && self.files_removed == 0
            && self.orphans_removed == 0
    }
}

#[derive(Clone)]
pub struct TransferService {
    registry: CodeRegistry,
    storage: FileStorage,
    max_upload_bytes: u64,
    retention: Duration,
    lease_timeout: Duration,
}

impl TransferService {
    pub fn new(
        registry: CodeRegistry,
        storage: FileStorage,
        max_upload_bytes: u64,
        retention: Duration,
    ) -> Self {
        Self {
            registry,
            storage,
            max_upload_bytes,
            retention,
            lease_timeout: retention,
        }
    }

    /// Overrides how long a download may hold its lease before the sweep
    /// reclaims the share. Defaults to the retention window.
    pub fn with_lease_timeout(mut self, lease_timeout: Duration) -> Self {
        self.lease_timeout = lease_timeout;
        self
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let generator = CodeGenerator::new(config.codes.alphabet, config.codes.length);
        Self::new(
            CodeRegistry::new(generator, config.codes.max_attempts),
            FileStorage::new(config.storage.upload_dir.clone()),
            config.storage.max_upload_bytes,
            config.sweep.retention(),
        )
        .with_lease_timeout(config.sweep.lease_timeout())
    }

    pub async fn initialize(&self) -> Result<()> {
        self.storage.initialize().await
    }

    pub fn registry(&self) -> &CodeRegistry {
        &self.registry
    }

    pub fn storage(&self) -> &FileStorage {
        &self.storage
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Streams `body` to storage and registers it under a fresh share code.
    ///
    /// Nothing is registered unless every byte was written and synced; a
    /// failed or oversized upload leaves no file behind.
    pub async fn upload<S, E>(
        &self,
        original_name: &str,
        content_type: Option<&str>,
        body: S,
    ) -> Result<ShareEntry>
    where
        S: Stream<Item = std::result::Result<Bytes, E>>,
        E: Into<AppError>,
    {
        let original_name = original_name.trim();
        if original_name.is_empty() {
            return Err(AppError::BadRequest("Missing filename".to_string()));
        }

        let content_type = resolve_content_type(content_type, original_name);
        let stored_name = stored_name_for(original_name);
        let mut staged = self.storage.stage(&stored_name).await?;

        let mut body = std::pin::pin!(body);
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(Into::<AppError>::into)?;
            if staged.written() + chunk.len() as u64 > self.max_upload_bytes {
                warn!(
                    filename = %original_name,
                    limit = self.max_upload_bytes,
                    "Rejecting upload over the size limit"
                );
                return Err(AppError::PayloadTooLarge(format!(
                    "File exceeds the maximum size of {} bytes",
                    self.max_upload_bytes
                )));
            }
            staged.write(&chunk).await?;
        }
        let size = staged.commit().await?;

        let share = NewShare {
            stored_name: stored_name.clone(),
            original_name: original_name.to_string(),
            size,
            content_type,
        };
        let entry = match self.registry.issue(share) {
            Ok(entry) => entry,
            Err(e) => {
                if let Err(remove_err) = self.storage.remove(&stored_name).await {
                    warn!(stored_name = %stored_name, "Failed to remove unregistered upload: {}", remove_err);
                }
                return Err(e);
            }
        };

        info!(
            code = %entry.code,
            stored_name = %entry.stored_name,
            size = entry.size,
            "Upload registered"
        );
        Ok(entry)
    }

    pub fn check(&self, code: &str) -> Result<ShareEntry> {
        if !self.registry.generator().is_well_formed(code) {
            return Err(AppError::share_not_found());
        }
        self.registry.lookup(code).ok_or_else(AppError::share_not_found)
    }

    /// Leases the share and opens its file.
    ///
    /// A share whose file has vanished, or whose file no longer matches the
    /// recorded size, is purged and reported as not found.
    pub async fn download(&self, code: &str) -> Result<Download> {
        if !self.registry.generator().is_well_formed(code) {
            return Err(AppError::share_not_found());
        }

        let entry = match self.registry.lease(code) {
            Lease::Acquired(entry) => entry,
            Lease::Busy => {
                return Err(AppError::Conflict(
                    "A download for this code is already in progress".to_string(),
                ))
            }
            Lease::Missing => return Err(AppError::share_not_found()),
        };
        let lease = LeaseGuard::new(self.registry.clone(), self.storage.clone(), &entry);

        match self.storage.open(&entry.stored_name).await? {
            Some((file, len)) if len == entry.size => {
                let body = DownloadStream::new(file, &entry, lease);
                Ok(Download { entry, body })
            }
            Some((_, len)) => {
                warn!(
                    code = %entry.code,
                    stored_name = %entry.stored_name,
                    expected = entry.size,
                    actual = len,
                    "Stored file does not match recorded size, purging share"
                );
                lease.retire();
                Err(AppError::share_not_found())
            }
            None => {
                warn!(
                    code = %entry.code,
                    stored_name = %entry.stored_name,
                    "Stored file missing, purging share"
                );
                lease.retire();
                Err(AppError::share_not_found())
            }
        }
    }

    /// Evicts shares older than the retention window and shares whose
    /// download lease has been held past the lease timeout, together with
    /// their files. Then removes unreferenced stored files older than the
    /// retention window.
    pub async fn sweep_expired(&self) -> Result<SweepReport> {
        let expired = self.registry.sweep(self.retention);
        let stalled = self.registry.reclaim_stale_leases(self.lease_timeout);
        let mut report = SweepReport {
            expired_entries: expired.len(),
            stale_leases: stalled.len(),
            ..SweepReport::default()
        };

        for entry in &stalled {
            warn!(code = %entry.code, "Reclaiming share held by a stalled download");
        }

        for entry in expired.iter().chain(&stalled) {
            match self.storage.remove(&entry.stored_name).await {
                Ok(true) => report.files_removed += 1,
                Ok(false) => {}
                Err(e) => warn!(code = %entry.code, "Failed to delete expired file: {}", e),
            }
        }

        let retention = chrono::Duration::from_std(self.retention).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(retention)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
        let live = self.registry.stored_names();

        for file in self.storage.list().await? {
            if live.contains(&file.name) || file.modified > cutoff || !is_generated_stored_name(&file.name) {
                continue;
            }
            match self.storage.remove(&file.name).await {
                Ok(true) => {
                    info!(stored_name = %file.name, size = file.size, "Removed orphaned file");
                    report.orphans_removed += 1;
                }
                Ok(false) => {}
                Err(e) => warn!(stored_name = %file.name, "Failed to delete orphaned file: {}", e),
            }
        }

        Ok(report)
    }
}

fn resolve_content_type(declared: Option<&str>, filename: &str) -> String {
    declared
        .map(str::trim)
        .filter(|ct| !ct.is_empty())
        .and_then(|ct| ct.parse::<mime::Mime>().ok())
        .unwrap_or_else(|| mime_guess::from_path(filename).first_or_octet_stream())
        .to_string()
}
