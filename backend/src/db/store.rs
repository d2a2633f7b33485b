//! On-disk object store for archived flight files.
//!
//! Layout under the archive root:
//!
//! ```text
//! <root>/
//!   processed/<data_id>.log      calibrated record, processedCOA format
//!   raw/<data_id>/<file>         backed-up raw detector upload
//!   reference/<data_id>/<file>   backed-up trajectory/reference upload
//!   coa.db                       index (sqlite backend)
//! ```
//!
//! Every write lands in a temporary sibling first and is renamed into
//! place, so a reader never sees a half-written file and a replace is
//! atomic at the filesystem level.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::error::{ArchiveError, ArchiveResult};

const PROCESSED_TREE: &str = "processed";
const RAW_TREE: &str = "raw";
const REFERENCE_TREE: &str = "reference";

/// Which backup tree an attachment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentTree {
    Raw,
    Reference,
}

impl AttachmentTree {
    fn dir_name(&self) -> &'static str {
        match self {
            AttachmentTree::Raw => RAW_TREE,
            AttachmentTree::Reference => REFERENCE_TREE,
        }
    }
}

pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    /// Open the store, creating the tree roots if they do not exist.
    pub fn open(root: impl Into<PathBuf>) -> ArchiveResult<Self> {
        let root = root.into();
        for tree in [PROCESSED_TREE, RAW_TREE, REFERENCE_TREE] {
            let dir = root.join(tree);
            fs::create_dir_all(&dir).map_err(|e| ArchiveError::storage(&dir, e))?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative path of the processed log for a data_id.
    pub fn processed_rel(data_id: &str) -> String {
        format!("{PROCESSED_TREE}/{data_id}.log")
    }

    fn attachment_rel(tree: AttachmentTree, data_id: &str, filename: &str) -> String {
        format!("{}/{data_id}/{filename}", tree.dir_name())
    }

    /// Absolute path for a stored relative path.
    pub fn absolute(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Durably write the processed log, replacing any previous version
    /// atomically. Returns the relative path.
    pub fn write_processed(&self, data_id: &str, content: &str) -> ArchiveResult<String> {
        let rel = Self::processed_rel(data_id);
        let path = self.absolute(&rel);
        self.write_atomic(&path, content.as_bytes())?;
        Ok(rel)
    }

    /// Read a processed log back.
    pub fn read_processed(&self, data_id: &str) -> ArchiveResult<String> {
        let path = self.absolute(&Self::processed_rel(data_id));
        fs::read_to_string(&path).map_err(|e| ArchiveError::storage(&path, e))
    }

    /// Write one backup attachment, replacing a same-named previous file
    /// atomically. Returns the relative path.
    pub fn write_attachment(
        &self,
        tree: AttachmentTree,
        data_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> ArchiveResult<String> {
        let rel = Self::attachment_rel(tree, data_id, filename);
        let path = self.absolute(&rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ArchiveError::storage(parent, e))?;
        }
        self.write_atomic(&path, bytes)?;
        Ok(rel)
    }

    /// Remove everything stored for a data_id. Already-absent files are
    /// not an error, so a retried delete converges.
    pub fn remove_record(&self, data_id: &str) -> ArchiveResult<()> {
        let processed = self.absolute(&Self::processed_rel(data_id));
        remove_file_idempotent(&processed)?;
        for tree in [AttachmentTree::Raw, AttachmentTree::Reference] {
            let dir = self.root.join(tree.dir_name()).join(data_id);
            remove_dir_idempotent(&dir)?;
        }
        Ok(())
    }

    /// Remove a single stored file by relative path, tolerating absence.
    pub fn remove_rel(&self, rel: &str) -> ArchiveResult<()> {
        remove_file_idempotent(&self.absolute(rel))
    }

    /// data_ids that have a processed log on disk, in sorted order.
    pub fn list_processed_ids(&self) -> ArchiveResult<Vec<String>> {
        let dir = self.root.join(PROCESSED_TREE);
        let entries = fs::read_dir(&dir).map_err(|e| ArchiveError::storage(&dir, e))?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ArchiveError::storage(&dir, e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(id) = name.strip_suffix(".log") {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> ArchiveResult<()> {
        let tmp = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp).map_err(|e| ArchiveError::storage(&tmp, e))?;
            file.write_all(bytes).map_err(|e| ArchiveError::storage(&tmp, e))?;
            file.sync_all().map_err(|e| ArchiveError::storage(&tmp, e))?;
        }
        fs::rename(&tmp, path).map_err(|e| ArchiveError::storage(path, e))?;
        Ok(())
    }
}

fn remove_file_idempotent(path: &Path) -> ArchiveResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ArchiveError::storage(path, e)),
    }
}

fn remove_dir_idempotent(path: &Path) -> ArchiveResult<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ArchiveError::storage(path, e)),
    }
}
