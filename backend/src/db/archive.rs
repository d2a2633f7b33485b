//! The archive facade: object store + index behind one handle.
//!
//! A process opens one [`Archive`] handle with an explicit
//! [`Archive::open`] / [`Archive::close`] lifecycle; there is no ambient
//! global state. Operations on the same key are serialized by a per-key
//! lock; operations on different keys proceed concurrently, and `search`
//! runs against the index without taking key locks.
//!
//! Write ordering is files-first, index-second. A crash between the two
//! leaves an orphan file (never a dangling index row pointing at nothing
//! durable), and [`Archive::consistency_check`] reports such divergence for
//! operator review — it never repairs silently.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::format::{parse_processed_log, render_processed_log};
use crate::models::{ArchiveEntry, FlightRecord, RecordKey};

use super::checksum::calculate_checksum;
use super::error::{ArchiveError, ArchiveResult};
use super::repository::{ArchiveIndexRepository, SearchCriteria};
use super::store::{AttachmentTree, ObjectStore};

/// Original uploads to back up alongside the processed record.
#[derive(Debug, Clone, Default)]
pub struct RecordAttachments {
    /// Raw detector upload: (file name, content).
    pub raw: Option<(String, Vec<u8>)>,
    /// Trajectory/reference upload: (file name, content).
    pub reference: Option<(String, Vec<u8>)>,
}

/// Divergence between index and object store, as found by a scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    /// Index rows whose processed file is missing on disk.
    pub missing_files: Vec<String>,
    /// Processed files on disk with no index row.
    pub orphan_files: Vec<String>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.missing_files.is_empty() && self.orphan_files.is_empty()
    }
}

pub struct Archive {
    store: ObjectStore,
    index: Arc<dyn ArchiveIndexRepository>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Archive {
    /// Open the archive at `root` over the given index backend, creating
    /// the storage trees if needed.
    pub fn open(
        root: impl Into<PathBuf>,
        index: Arc<dyn ArchiveIndexRepository>,
    ) -> ArchiveResult<Self> {
        let store = ObjectStore::open(root)?;
        log::info!("archive opened at {}", store.root().display());
        Ok(Self {
            store,
            index,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Release the handle. Storage is flushed on every write, so closing
    /// is just the explicit end of the lifecycle.
    pub fn close(self) {
        log::info!("archive closed at {}", self.store.root().display());
    }

    fn key_lock(&self, data_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(data_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Add a new record.
    ///
    /// # Errors
    /// [`ArchiveError::DuplicateKey`] when an entry with the same
    /// (flight_number, date, device_id) already exists.
    pub async fn add(
        &self,
        record: &FlightRecord,
        attachments: &RecordAttachments,
    ) -> ArchiveResult<ArchiveEntry> {
        let key = record.key();
        let lock = self.key_lock(&key.data_id());
        let _guard = lock.lock().await;

        if self.index.get(&key).await?.is_some() {
            return Err(ArchiveError::DuplicateKey(key.data_id()));
        }

        let entry = self.write_record(record, attachments).await?;
        self.index.insert(&entry).await?;
        log::info!("archived {}", entry.data_id);
        Ok(entry)
    }

    /// Atomically replace the record under `key`, or add it when absent.
    ///
    /// The new files are durably written before anything old is removed;
    /// the index row is swapped in a single backend operation.
    ///
    /// # Errors
    /// [`ArchiveError::InvalidQuery`] when `record` carries a different key.
    pub async fn reprocess(
        &self,
        key: &RecordKey,
        record: &FlightRecord,
        attachments: &RecordAttachments,
    ) -> ArchiveResult<ArchiveEntry> {
        if record.key() != *key {
            return Err(ArchiveError::InvalidQuery(format!(
                "reprocess key mismatch: record is {}, requested {}",
                record.key(),
                key
            )));
        }

        let lock = self.key_lock(&key.data_id());
        let _guard = lock.lock().await;

        let previous = self.index.get(key).await?;

        // Same key means same deterministic paths: the processed log and
        // same-named attachments are replaced in place by atomic rename.
        let entry = self.write_record(record, attachments).await?;
        self.index.replace(&entry).await?;

        // Deliberate cleanup step: stale attachments whose names changed.
        if let Some(previous) = previous {
            for old in [&previous.raw_path, &previous.reference_path] {
                if let Some(old) = old {
                    let still_used = entry.raw_path.as_deref() == Some(old.as_str())
                        || entry.reference_path.as_deref() == Some(old.as_str());
                    if !still_used {
                        self.store.remove_rel(old)?;
                    }
                }
            }
            log::info!("reprocessed {}", entry.data_id);
        } else {
            log::info!("archived {} (reprocess of absent key)", entry.data_id);
        }

        Ok(entry)
    }

    /// Delete the record under `key`.
    ///
    /// Files are removed before the index row so a retry after a partial
    /// failure still finds the row and converges; re-deleting
    /// already-absent files is not an error. A retry that finds no index
    /// row but leftover files cleans them up and succeeds.
    ///
    /// # Errors
    /// [`ArchiveError::NotFound`] when nothing exists for the key at all.
    pub async fn delete(&self, key: &RecordKey) -> ArchiveResult<()> {
        let data_id = key.data_id();
        let lock = self.key_lock(&data_id);
        let _guard = lock.lock().await;

        if self.index.get(key).await?.is_none() {
            // leftover files from a partially failed prior delete or add
            if self.store.list_processed_ids()?.contains(&data_id) {
                self.store.remove_record(&data_id)?;
                log::info!("deleted leftover files for {data_id}");
                return Ok(());
            }
            return Err(ArchiveError::NotFound(data_id));
        }

        self.store.remove_record(&data_id)?;
        self.index.remove(key).await?;
        log::info!("deleted {data_id}");
        Ok(())
    }

    /// Entries matching a non-empty conjunction of key-field criteria.
    ///
    /// # Errors
    /// [`ArchiveError::InvalidQuery`] on empty criteria — a full-archive
    /// scan must be asked for via [`Archive::list_ids`], not stumbled into.
    pub async fn search(&self, criteria: &SearchCriteria) -> ArchiveResult<Vec<ArchiveEntry>> {
        if criteria.is_empty() {
            return Err(ArchiveError::InvalidQuery(
                "search requires at least one of flight_number, date, device_id".to_string(),
            ));
        }
        self.index.search(criteria).await
    }

    /// The entry for a key, if any.
    pub async fn get(&self, key: &RecordKey) -> ArchiveResult<Option<ArchiveEntry>> {
        self.index.get(key).await
    }

    /// All data_ids in the index.
    pub async fn list_ids(&self) -> ArchiveResult<Vec<String>> {
        self.index.list_ids().await
    }

    /// Load the full record back from the object store.
    pub async fn load_record(&self, key: &RecordKey) -> ArchiveResult<FlightRecord> {
        let data_id = key.data_id();
        if self.index.get(key).await?.is_none() {
            return Err(ArchiveError::NotFound(data_id));
        }
        let content = self.store.read_processed(&data_id)?;
        Ok(parse_processed_log(&content)?)
    }

    /// Copy matching records (processed log + backups) into
    /// `dest/export/<data_id>/`, overwriting same-named prior exports.
    pub async fn export(
        &self,
        criteria: &SearchCriteria,
        dest: &Path,
    ) -> ArchiveResult<Vec<PathBuf>> {
        let entries = self.search(criteria).await?;

        let export_root = dest.join("export");
        fs::create_dir_all(&export_root).map_err(|e| ArchiveError::storage(&export_root, e))?;

        let mut exported = Vec::with_capacity(entries.len());
        for entry in &entries {
            let folder = export_root.join(&entry.data_id);
            if folder.exists() {
                fs::remove_dir_all(&folder).map_err(|e| ArchiveError::storage(&folder, e))?;
            }
            fs::create_dir_all(&folder).map_err(|e| ArchiveError::storage(&folder, e))?;

            let processed_dest = folder.join(format!("Data {}.log", entry.data_id));
            copy_file(&self.store.absolute(&entry.processed_path), &processed_dest)?;

            for backup in [&entry.raw_path, &entry.reference_path].into_iter().flatten() {
                let src = self.store.absolute(backup);
                let name = src
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "backup".to_string());
                let backup_dir = folder.join("backup");
                fs::create_dir_all(&backup_dir)
                    .map_err(|e| ArchiveError::storage(&backup_dir, e))?;
                copy_file(&src, &backup_dir.join(name))?;
            }

            exported.push(folder);
        }
        Ok(exported)
    }

    /// Compare index rows against stored files and report divergence.
    ///
    /// Reports only; repair is an operator decision.
    pub async fn consistency_check(&self) -> ArchiveResult<ConsistencyReport> {
        let index_ids = self.index.list_ids().await?;
        let file_ids = self.store.list_processed_ids()?;

        let report = ConsistencyReport {
            missing_files: index_ids
                .iter()
                .filter(|id| !file_ids.contains(id))
                .cloned()
                .collect(),
            orphan_files: file_ids
                .iter()
                .filter(|id| !index_ids.contains(id))
                .cloned()
                .collect(),
        };

        if !report.is_consistent() {
            log::warn!(
                "archive divergence: {} index rows without files, {} files without rows",
                report.missing_files.len(),
                report.orphan_files.len()
            );
        }
        Ok(report)
    }

    /// Write the record's files and build its index entry. Caller holds
    /// the key lock and decides insert vs replace.
    async fn write_record(
        &self,
        record: &FlightRecord,
        attachments: &RecordAttachments,
    ) -> ArchiveResult<ArchiveEntry> {
        let key = record.key();
        let data_id = key.data_id();

        let content = render_processed_log(record);
        let checksum = calculate_checksum(&content);
        let processed_path = self.store.write_processed(&data_id, &content)?;

        let raw_path = match &attachments.raw {
            Some((name, bytes)) => {
                Some(self.store.write_attachment(AttachmentTree::Raw, &data_id, name, bytes)?)
            }
            None => None,
        };
        let reference_path = match &attachments.reference {
            Some((name, bytes)) => Some(self.store.write_attachment(
                AttachmentTree::Reference,
                &data_id,
                name,
                bytes,
            )?),
            None => None,
        };

        Ok(ArchiveEntry {
            data_id,
            flight_number: key.flight_number.clone(),
            date: key.date,
            device_id: key.device_id.clone(),
            origin_icao: record.meta.origin_icao.clone(),
            destination_icao: record.meta.destination_icao.clone(),
            takeoff_utc: record.meta.takeoff_utc,
            landing_utc: record.meta.landing_utc,
            fit_r2: record.alignment.map(|a| a.fit_r2),
            citizen_id: record.meta.citizen_id.clone(),
            processed_path,
            raw_path,
            reference_path,
            checksum,
        })
    }
}

fn copy_file(src: &Path, dest: &Path) -> ArchiveResult<()> {
    fs::copy(src, dest).map_err(|e| ArchiveError::storage(src, e))?;
    Ok(())
}
