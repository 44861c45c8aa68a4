//! In-memory registry mapping share codes to uploaded file metadata.

pub mod codes;
pub mod models;

pub use codes::{CodeAlphabet, CodeGenerator};
pub use models::{Lease, NewShare, ShareEntry};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{AppError, Result};
use models::Slot;

#[derive(Clone)]
pub struct CodeRegistry {
    entries: Arc<RwLock<HashMap<String, Slot>>>,
    generator: CodeGenerator,
    max_attempts: u32,
}

impl CodeRegistry {
    pub fn new(generator: CodeGenerator, max_attempts: u32) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            generator,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn generator(&self) -> &CodeGenerator {
        &self.generator
    }

    /// Draws codes until one is free and registers `share` under it.
    ///
    /// Generation, the collision check and the insert all happen under the
    /// write lock, so two concurrent callers can never end up with the same
    /// code.
    pub fn issue(&self, share: NewShare) -> Result<ShareEntry> {
        let mut entries = self.entries.write();

        let live = entries.len();
        if live as u64 >= self.generator.capacity() {
            return Err(AppError::CodeSpaceExhausted { attempts: 0, live });
        }

        for attempt in 1..=self.max_attempts {
            let code = self.generator.generate();
            if entries.contains_key(&code) {
                debug!(attempt, "Share code collision, drawing again");
                continue;
            }

            let entry = ShareEntry {
                code: code.clone(),
                stored_name: share.stored_name,
                original_name: share.original_name,
                size: share.size,
                content_type: share.content_type,
                created_at: Utc::now(),
            };
            entries.insert(code, Slot::new(entry.clone()));
            return Ok(entry);
        }

        Err(AppError::CodeSpaceExhausted {
            attempts: self.max_attempts,
            live,
        })
    }

    pub fn lookup(&self, code: &str) -> Option<ShareEntry> {
        self.entries.read().get(code).map(|slot| slot.entry.clone())
    }

    pub fn remove(&self, code: &str) -> Option<ShareEntry> {
        self.entries.write().remove(code).map(|slot| slot.entry)
    }

    /// Marks the entry as being downloaded. A leased entry is skipped by
    /// [`CodeRegistry::sweep`] and cannot be leased a second time.
    pub fn lease(&self, code: &str) -> Lease {
        let mut entries = self.entries.write();
        match entries.get_mut(code) {
            Some(slot) if slot.is_leased() => Lease::Busy,
            Some(slot) => {
                slot.leased_at = Some(Utc::now());
                Lease::Acquired(slot.entry.clone())
            }
            None => Lease::Missing,
        }
    }

    pub fn release(&self, code: &str) {
        if let Some(slot) = self.entries.write().get_mut(code) {
            slot.leased_at = None;
        }
    }

    /// Like [`CodeRegistry::release`], but only if `code` still maps to the
    /// file named `stored_name`. A lease that outlived a sweep must not touch
    /// a newer share that happens to reuse the code.
    pub fn release_share(&self, code: &str, stored_name: &str) {
        if let Some(slot) = self.entries.write().get_mut(code) {
            if slot.entry.stored_name == stored_name {
                slot.leased_at = None;
            }
        }
    }

    pub fn remove_share(&self, code: &str, stored_name: &str) -> Option<ShareEntry> {
        let mut entries = self.entries.write();
        let matches = entries
            .get(code)
            .is_some_and(|slot| slot.entry.stored_name == stored_name);
        if matches {
            entries.remove(code).map(|slot| slot.entry)
        } else {
            None
        }
    }

    /// Removes and returns every unleased entry created at or before
    /// `now - max_age`.
    pub fn sweep(&self, max_age: Duration) -> Vec<ShareEntry> {
        let cutoff = cutoff_for(max_age);
        self.drain_where(|slot| !slot.is_leased() && slot.entry.created_at <= cutoff)
    }

    /// Removes and returns every entry whose lease was taken at or before
    /// `now - max_age`. A download that stalls that long gives up its share.
    pub fn reclaim_stale_leases(&self, max_age: Duration) -> Vec<ShareEntry> {
        let cutoff = cutoff_for(max_age);
        self.drain_where(|slot| slot.leased_at.is_some_and(|at| at <= cutoff))
    }

    fn drain_where(&self, stale: impl Fn(&Slot) -> bool) -> Vec<ShareEntry> {
        let mut entries = self.entries.write();
        let codes: Vec<String> = entries
            .iter()
            .filter(|(_, slot)| stale(slot))
            .map(|(code, _)| code.clone())
            .collect();

        codes
            .into_iter()
            .filter_map(|code| entries.remove(&code).map(|slot| slot.entry))
            .collect()
    }

    pub fn stored_names(&self) -> HashSet<String> {
        self.entries
            .read()
            .values()
            .map(|slot| slot.entry.stored_name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn cutoff_for(max_age: Duration) -> DateTime<Utc> {
    let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
    Utc::now()
        .checked_sub_signed(max_age)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl Default for CodeRegistry {
    fn default() -> Self {
        Self::new(CodeGenerator::default(), 32)
    }
}
