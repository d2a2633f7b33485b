//! In-memory archive index for unit testing and local development.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::db::error::{ArchiveError, ArchiveResult};
use crate::db::repository::{ArchiveIndexRepository, SearchCriteria};
use crate::models::{ArchiveEntry, RecordKey};

/// Map-backed index. Writes clone-then-swap whole entries, so readers see
/// either the previous or the new row, never a partial one.
#[derive(Default)]
pub struct LocalRepository {
    entries: RwLock<HashMap<String, ArchiveEntry>>,
}

impl LocalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl ArchiveIndexRepository for LocalRepository {
    async fn insert(&self, entry: &ArchiveEntry) -> ArchiveResult<()> {
        let mut entries = self.entries.write();
        if entries.contains_key(&entry.data_id) {
            return Err(ArchiveError::DuplicateKey(entry.data_id.clone()));
        }
        entries.insert(entry.data_id.clone(), entry.clone());
        Ok(())
    }

    async fn replace(&self, entry: &ArchiveEntry) -> ArchiveResult<()> {
        self.entries
            .write()
            .insert(entry.data_id.clone(), entry.clone());
        Ok(())
    }

    async fn get(&self, key: &RecordKey) -> ArchiveResult<Option<ArchiveEntry>> {
        Ok(self.entries.read().get(&key.data_id()).cloned())
    }

    async fn remove(&self, key: &RecordKey) -> ArchiveResult<bool> {
        Ok(self.entries.write().remove(&key.data_id()).is_some())
    }

    async fn search(&self, criteria: &SearchCriteria) -> ArchiveResult<Vec<ArchiveEntry>> {
        let mut matches: Vec<ArchiveEntry> = self
            .entries
            .read()
            .values()
            .filter(|e| criteria.matches(e))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.data_id.cmp(&b.data_id));
        Ok(matches)
    }

    async fn list_ids(&self) -> ArchiveResult<Vec<String>> {
        let mut ids: Vec<String> = self.entries.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn health_check(&self) -> ArchiveResult<bool> {
        Ok(true)
    }
}
