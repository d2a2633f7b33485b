//! Archive index and storage for calibrated flight records.
//!
//! This module provides the durable catalog over
//! [`crate::models::FlightRecord`]s via the Repository pattern, allowing
//! different index backends to be swapped easily.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Application Layer (batch service, archive CLI)         │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Archive Facade (archive.rs)                            │
//! │  - per-key locking, files-first write ordering          │
//! │  - add / search / reprocess / delete / export           │
//! │  - consistency scan                                     │
//! └─────────┬──────────────────────────────┬────────────────┘
//!           │                              │
//! ┌─────────▼──────────┐        ┌──────────▼────────────────┐
//! │  Object Store      │        │  Index Repository Trait   │
//! │  (store.rs)        │        │  (repository.rs)          │
//! │  raw / reference / │        │   ├── local (in-memory)   │
//! │  processed trees   │        │   └── sqlite (coa.db)     │
//! └────────────────────┘        └───────────────────────────┘
//! ```
//!
//! # Recommended Usage
//!
//! ```ignore
//! use coa_rust::db::{Archive, RepositoryFactory, RepositoryType};
//!
//! let index = RepositoryFactory::create(RepositoryType::Sqlite, root)?;
//! let archive = Archive::open(root, index)?;
//! let entries = archive.search(&criteria).await?;
//! archive.close();
//! ```

// Feature flag guard: at least one index backend must be compiled in.
#[cfg(not(any(feature = "sqlite-repo", feature = "local-repo")))]
compile_error!("Enable at least one index backend feature.");

pub mod archive;
pub mod checksum;
pub mod error;
pub mod factory;
pub mod repositories;
pub mod repository;
pub mod store;

pub use archive::{Archive, ConsistencyReport, RecordAttachments};
pub use checksum::calculate_checksum;
pub use error::{ArchiveError, ArchiveResult};
pub use factory::{RepositoryFactory, RepositoryType, INDEX_FILE_NAME};
pub use repositories::LocalRepository;
#[cfg(feature = "sqlite-repo")]
pub use repositories::SqliteRepository;
pub use repository::{ArchiveIndexRepository, SearchCriteria};
pub use store::{AttachmentTree, ObjectStore};
