use std::path::Path;

use tokio::process::Command;
use tracing::info;

use dbmigrate_core::TargetConfig;

#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error("failed to run pg_dump: {0}")]
    Spawn(std::io::Error),

    #[error("pg_dump exited with {status}: {stderr}")]
    Failed {
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("failed to write {path:?}: {source}")]
    Write {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

/// Dump the target schema's table structure to `out_path` via `pg_dump`.
pub async fn dump_schema(target: &TargetConfig, out_path: &Path) -> Result<(), DumpError> {
    let output = Command::new("pg_dump")
        .arg("--schema-only")
        .arg("--no-owner")
        .arg("--schema")
        .arg(&target.schema)
        .arg(target.connection_uri())
        .output()
        .await
        .map_err(DumpError::Spawn)?;

    if !output.status.success() {
        return Err(DumpError::Failed {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    tokio::fs::write(out_path, &output.stdout)
        .await
        .map_err(|e| DumpError::Write {
            path: out_path.to_path_buf(),
            source: e,
        })?;

    info!("schema dumped to {:?}", out_path);
    Ok(())
}
