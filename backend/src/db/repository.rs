//! Abstract interface over the archive index.
//!
//! The index is the queryable catalog half of the archive; the object store
//! holds the actual files. Implementations must keep each operation
//! internally atomic so a concurrent reader observes either the pre- or
//! post-state of any single write, never an intermediate one.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{ArchiveEntry, RecordKey};

use super::error::ArchiveResult;

/// Conjunction of optional key-field filters.
///
/// An entry matches when every specified field equals the entry's value.
/// A criteria with no fields set is rejected by the archive facade to
/// avoid unintentional full scans.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub flight_number: Option<String>,
    pub date: Option<NaiveDate>,
    pub device_id: Option<String>,
}

impl SearchCriteria {
    pub fn by_flight_number(flight_number: impl Into<String>) -> Self {
        Self {
            flight_number: Some(flight_number.into()),
            ..Self::default()
        }
    }

    pub fn by_key(key: &RecordKey) -> Self {
        Self {
            flight_number: Some(key.flight_number.clone()),
            date: Some(key.date),
            device_id: Some(key.device_id.clone()),
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.flight_number.is_none() && self.date.is_none() && self.device_id.is_none()
    }

    pub fn matches(&self, entry: &ArchiveEntry) -> bool {
        if let Some(ref flight_number) = self.flight_number {
            if &entry.flight_number != flight_number {
                return false;
            }
        }
        if let Some(date) = self.date {
            if entry.date != date {
                return false;
            }
        }
        if let Some(ref device_id) = self.device_id {
            if &entry.device_id != device_id {
                return false;
            }
        }
        true
    }
}

/// Repository trait for the archive index.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait ArchiveIndexRepository: Send + Sync {
    /// Insert a new entry.
    ///
    /// # Returns
    /// * `Err(ArchiveError::DuplicateKey)` if an entry with the same key
    ///   already exists.
    async fn insert(&self, entry: &ArchiveEntry) -> ArchiveResult<()>;

    /// Insert or atomically replace the entry with the same key.
    async fn replace(&self, entry: &ArchiveEntry) -> ArchiveResult<()>;

    /// Fetch the entry for a key, if any.
    async fn get(&self, key: &RecordKey) -> ArchiveResult<Option<ArchiveEntry>>;

    /// Remove the entry for a key.
    ///
    /// # Returns
    /// * `Ok(true)` if a row was removed, `Ok(false)` if none existed.
    async fn remove(&self, key: &RecordKey) -> ArchiveResult<bool>;

    /// All entries matching the criteria, in stable (data_id) order.
    async fn search(&self, criteria: &SearchCriteria) -> ArchiveResult<Vec<ArchiveEntry>>;

    /// All data_ids in the index, in stable order.
    async fn list_ids(&self) -> ArchiveResult<Vec<String>>;

    /// Cheap liveness probe of the backend.
    async fn health_check(&self) -> ArchiveResult<bool>;
}
