//! Factory for archive index backends.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use super::error::ArchiveResult;
use super::repositories::LocalRepository;
#[cfg(feature = "sqlite-repo")]
use super::repositories::SqliteRepository;
use super::repository::ArchiveIndexRepository;

/// Index file name inside the archive root.
pub const INDEX_FILE_NAME: &str = "coa.db";

/// Selectable index backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryType {
    Local,
    Sqlite,
}

impl FromStr for RepositoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(RepositoryType::Local),
            "sqlite" => Ok(RepositoryType::Sqlite),
            other => Err(format!("unknown repository type: {other}")),
        }
    }
}

pub struct RepositoryFactory;

impl RepositoryFactory {
    /// In-memory index, used by tests and local development.
    pub fn create_local() -> Arc<dyn ArchiveIndexRepository> {
        Arc::new(LocalRepository::new())
    }

    /// Durable SQLite index stored as `coa.db` under the archive root.
    #[cfg(feature = "sqlite-repo")]
    pub fn create_sqlite(archive_root: &Path) -> ArchiveResult<Arc<dyn ArchiveIndexRepository>> {
        let repo = SqliteRepository::open(archive_root.join(INDEX_FILE_NAME))?;
        Ok(Arc::new(repo))
    }

    /// Create the backend selected by configuration.
    pub fn create(
        repo_type: RepositoryType,
        archive_root: &Path,
    ) -> ArchiveResult<Arc<dyn ArchiveIndexRepository>> {
        match repo_type {
            RepositoryType::Local => {
                let _ = archive_root;
                Ok(Self::create_local())
            }
            #[cfg(feature = "sqlite-repo")]
            RepositoryType::Sqlite => Self::create_sqlite(archive_root),
            #[cfg(not(feature = "sqlite-repo"))]
            RepositoryType::Sqlite => Err(super::error::ArchiveError::Configuration(
                "sqlite index requested but the sqlite-repo feature is not enabled".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repository_types() {
        assert_eq!(RepositoryType::from_str("local").unwrap(), RepositoryType::Local);
        assert_eq!(RepositoryType::from_str("SQLite").unwrap(), RepositoryType::Sqlite);
        assert!(RepositoryType::from_str("postgres").is_err());
    }

    #[tokio::test]
    async fn local_factory_produces_healthy_repo() {
        let repo = RepositoryFactory::create_local();
        assert!(repo.health_check().await.unwrap());
    }
}
