use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

use super::file::{FileError, MigrationFile};
use super::graph::{GraphError, MigrationGraph};

/// The on-disk migration directory. Rebuilt from scratch on every
/// invocation; never cached between runs.
pub struct MigrationDirectory {
    path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("failed to access migration directory {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl MigrationDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every `.sql` file in the directory. Other files are ignored.
    /// A missing directory reads as an empty set.
    pub fn load(&self) -> Result<Vec<MigrationFile>, DirectoryError> {
        if !self.path.exists() {
            debug!("migration directory {:?} does not exist", self.path);
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&self.path).map_err(|e| DirectoryError::Io {
            path: self.path.clone(),
            source: e,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DirectoryError::Io {
                path: self.path.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.extension().map(|e| e == "sql").unwrap_or(false) {
                let content = std::fs::read_to_string(&path).map_err(|e| FileError::Io {
                    path: path.clone(),
                    source: e,
                })?;
                files.push(MigrationFile::parse(&path, &content)?);
            }
        }

        debug!("loaded {} migration files from {:?}", files.len(), self.path);
        Ok(files)
    }

    /// Load and resolve the full chain in upgrade order.
    pub fn chain(&self) -> Result<Vec<MigrationFile>, DirectoryError> {
        Ok(MigrationGraph::resolve(self.load()?)?)
    }

    /// Create a blank migration file whose parent is the current chain
    /// tip. Returns the path of the new file.
    pub fn create_blank(&self, description: &str) -> Result<PathBuf, DirectoryError> {
        let chain = self.chain()?;
        let parent = chain.last().map(|m| m.identity.as_str());

        let now = Utc::now();
        let identity = MigrationFile::new_identity(now);
        let body = MigrationFile::template(parent, now);

        std::fs::create_dir_all(&self.path).map_err(|e| DirectoryError::Io {
            path: self.path.clone(),
            source: e,
        })?;

        let path = self.path.join(MigrationFile::file_name(&identity, description));
        std::fs::write(&path, body).map_err(|e| DirectoryError::Io {
            path: path.clone(),
            source: e,
        })?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_directory_is_empty() {
        let dir = MigrationDirectory::new("/nonexistent/migrations");
        assert!(dir.load().unwrap().is_empty());
    }

    #[test]
    fn test_load_ignores_non_sql() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("20240101120000_init.sql"),
            "-- migrate:up\nSELECT 1;\n-- migrate:down\n",
        )
        .unwrap();
        fs::write(tmp.path().join("notes.txt"), "not a migration").unwrap();
        fs::write(tmp.path().join("backup.sql.bak"), "ignored").unwrap();

        let dir = MigrationDirectory::new(tmp.path());
        let files = dir.load().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].identity, "20240101120000");
    }

    #[test]
    fn test_create_blank_in_empty_directory_is_root() {
        let tmp = TempDir::new().unwrap();
        let dir = MigrationDirectory::new(tmp.path().join("migrations"));

        let path = dir.create_blank("create_users").unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("-- parent: none"));

        let files = dir.load().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].description, "create_users");
        assert!(files[0].parent_identity.is_none());
    }

    #[test]
    fn test_create_blank_links_to_tip() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("20240101120000_init.sql"),
            "-- parent: none\n-- migrate:up\nSELECT 1;\n-- migrate:down\n",
        )
        .unwrap();

        let dir = MigrationDirectory::new(tmp.path());
        let path = dir.create_blank("add_index").unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("-- parent: 20240101120000"));

        // The new file extends the chain.
        let chain = dir.chain().unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1].description, "add_index");
    }
}
