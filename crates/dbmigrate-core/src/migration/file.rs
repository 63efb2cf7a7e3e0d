use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Header line declaring the parent migration. `none` marks the chain root.
const PARENT_MARKER: &str = "-- parent:";
const UP_MARKER: &str = "-- migrate:up";
const DOWN_MARKER: &str = "-- migrate:down";

/// A single discovered migration unit.
///
/// One `.sql` file per migration, named `{identity}_{description}.sql`,
/// where identity is a UTC timestamp (`%Y%m%d%H%M%S`). The file body
/// carries a `-- parent:` header plus `-- migrate:up` / `-- migrate:down`
/// sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// Unique, stable identifier derived from the filename.
    pub identity: String,
    /// Identity of the migration that must precede this one.
    pub parent_identity: Option<String>,
    /// Human-readable label from the filename.
    pub description: String,
    /// Forward action.
    pub upgrade_sql: String,
    /// Backward action.
    pub downgrade_sql: String,
    /// Source file, kept for error reporting.
    pub path: PathBuf,
}

/// Migration file parse errors.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("invalid migration filename {0:?}: expected {{identity}}_{{description}}.sql")]
    InvalidName(PathBuf),

    #[error("migration {0:?} has no `-- migrate:up` section")]
    MissingUpMarker(PathBuf),

    #[error("failed to read migration {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl MigrationFile {
    /// Parse a migration from its file contents.
    pub fn parse(path: &Path, content: &str) -> Result<Self, FileError> {
        let (identity, description) = split_file_stem(path)?;

        let mut parent_identity = None;
        let mut upgrade = Vec::new();
        let mut downgrade = Vec::new();
        let mut section = Section::Header;

        for line in content.lines() {
            let trimmed = line.trim();
            if section == Section::Header {
                if let Some(value) = trimmed.strip_prefix(PARENT_MARKER) {
                    let value = value.trim();
                    if !value.is_empty() && value != "none" {
                        parent_identity = Some(value.to_string());
                    }
                    continue;
                }
            }
            if trimmed == UP_MARKER {
                section = Section::Up;
                continue;
            }
            if trimmed == DOWN_MARKER {
                section = Section::Down;
                continue;
            }
            match section {
                Section::Header => {}
                Section::Up => upgrade.push(line),
                Section::Down => downgrade.push(line),
            }
        }

        if section == Section::Header {
            return Err(FileError::MissingUpMarker(path.to_path_buf()));
        }

        Ok(Self {
            identity,
            parent_identity,
            description,
            upgrade_sql: upgrade.join("\n").trim().to_string(),
            downgrade_sql: downgrade.join("\n").trim().to_string(),
            path: path.to_path_buf(),
        })
    }

    /// Render a blank migration file body for `touch`.
    pub fn template(parent: Option<&str>, created_at: DateTime<Utc>) -> String {
        format!(
            "-- parent: {}\n-- created: {}\n\n{}\n\n\n{}\n\n",
            parent.unwrap_or("none"),
            created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            UP_MARKER,
            DOWN_MARKER,
        )
    }

    /// Generate a fresh identity from the current time.
    pub fn new_identity(now: DateTime<Utc>) -> String {
        now.format("%Y%m%d%H%M%S").to_string()
    }

    /// The canonical filename for an identity/description pair.
    pub fn file_name(identity: &str, description: &str) -> String {
        format!("{}_{}.sql", identity, description)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Up,
    Down,
}

/// Split `{identity}_{description}` out of the file stem. The identity is
/// the leading digit run; everything after the first underscore is the
/// description.
fn split_file_stem(path: &Path) -> Result<(String, String), FileError> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| FileError::InvalidName(path.to_path_buf()))?;

    let (identity, description) = stem
        .split_once('_')
        .ok_or_else(|| FileError::InvalidName(path.to_path_buf()))?;

    if identity.is_empty() || !identity.chars().all(|c| c.is_ascii_digit()) {
        return Err(FileError::InvalidName(path.to_path_buf()));
    }

    Ok((identity.to_string(), description.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(name: &str, content: &str) -> Result<MigrationFile, FileError> {
        MigrationFile::parse(Path::new(name), content)
    }

    #[test]
    fn test_parse_full_file() {
        let content = "\
-- parent: 20240101120000

-- migrate:up
CREATE TABLE users (id BIGINT PRIMARY KEY);

-- migrate:down
DROP TABLE users;
";
        let m = parse("20240102090000_create_users.sql", content).unwrap();
        assert_eq!(m.identity, "20240102090000");
        assert_eq!(m.parent_identity.as_deref(), Some("20240101120000"));
        assert_eq!(m.description, "create_users");
        assert_eq!(m.upgrade_sql, "CREATE TABLE users (id BIGINT PRIMARY KEY);");
        assert_eq!(m.downgrade_sql, "DROP TABLE users;");
    }

    #[test]
    fn test_parse_root_migration() {
        let content = "-- parent: none\n-- migrate:up\nSELECT 1;\n-- migrate:down\n";
        let m = parse("20240101120000_init.sql", content).unwrap();
        assert!(m.parent_identity.is_none());
        assert_eq!(m.downgrade_sql, "");
    }

    #[test]
    fn test_parse_missing_parent_header_is_root() {
        let content = "-- migrate:up\nSELECT 1;\n-- migrate:down\nSELECT 2;\n";
        let m = parse("20240101120000_init.sql", content).unwrap();
        assert!(m.parent_identity.is_none());
    }

    #[test]
    fn test_parse_missing_up_marker() {
        let err = parse("20240101120000_init.sql", "SELECT 1;").unwrap_err();
        assert!(matches!(err, FileError::MissingUpMarker(_)));
    }

    #[test]
    fn test_parse_rejects_bad_filenames() {
        for name in ["create_users.sql", "nounderscore.sql", "_empty.sql"] {
            let content = "-- migrate:up\nSELECT 1;\n";
            assert!(
                matches!(parse(name, content), Err(FileError::InvalidName(_))),
                "expected {name} to be rejected"
            );
        }
    }

    #[test]
    fn test_template_round_trips() {
        let now = Utc::now();
        let body = MigrationFile::template(Some("20240101120000"), now);
        let m = parse("20240102090000_add_index.sql", &body).unwrap();
        assert_eq!(m.parent_identity.as_deref(), Some("20240101120000"));
        assert_eq!(m.upgrade_sql, "");
        assert_eq!(m.downgrade_sql, "");
    }

    #[test]
    fn test_new_identity_format() {
        let identity = MigrationFile::new_identity(Utc::now());
        assert_eq!(identity.len(), 14);
        assert!(identity.chars().all(|c| c.is_ascii_digit()));
    }
}
