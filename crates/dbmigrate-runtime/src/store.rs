use sqlx::postgres::PgPool;
use sqlx::PgConnection;
use tracing::debug;

/// Name of the per-schema tracking table.
pub const TRACKING_TABLE: &str = "dbmigrate_applied";

/// SQLSTATE for insufficient_privilege.
const PERMISSION_DENIED: &str = "42501";

/// Tracking-table access problems.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to connect: {0}")]
    ConnectionFailed(String),

    #[error("permission denied by database: {0}")]
    PermissionDenied(String),

    #[error("tracking table {schema}.{TRACKING_TABLE} does not exist; run `dbmigrate init` first")]
    NotInitialized { schema: String },

    #[error("tracking table query failed: {0}")]
    Sql(String),
}

fn map_sqlx(e: sqlx::Error) -> StoreError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.code().as_deref() == Some(PERMISSION_DENIED) {
            return StoreError::PermissionDenied(db_err.to_string());
        }
    }
    match e {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::Tls(_) => {
            StoreError::ConnectionFailed(e.to_string())
        }
        other => StoreError::Sql(other.to_string()),
    }
}

/// Quote a PostgreSQL identifier.
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Per-target persistent record of which migrations have been applied.
///
/// Lives in a dedicated table inside the target schema itself, shape
/// `{identity, applied_at}` with identity as primary key. A row is
/// inserted when an upgrade commits and deleted when a downgrade commits.
pub struct AppliedMigrationStore {
    schema: String,
}

impl AppliedMigrationStore {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
        }
    }

    fn table(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), TRACKING_TABLE)
    }

    /// Idempotent creation of the tracking table (the `init` operation).
    /// Also creates the schema so `init` works against a fresh database.
    pub async fn ensure_table_exists(&self, pool: &PgPool) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "CREATE SCHEMA IF NOT EXISTS {}",
            quote_ident(&self.schema)
        ))
        .execute(pool)
        .await
        .map_err(map_sqlx)?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                identity VARCHAR(255) PRIMARY KEY,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            self.table()
        ))
        .execute(pool)
        .await
        .map_err(map_sqlx)?;

        debug!("tracking table {} ready", self.table());
        Ok(())
    }

    /// Applied identities in application order (`applied_at`, ties broken
    /// by identity). A missing tracking table is `NotInitialized`, which
    /// is not the same thing as zero rows: `upgrade` before `init` must
    /// fail loudly rather than silently re-run everything.
    pub async fn load_applied(&self, pool: &PgPool) -> Result<Vec<String>, StoreError> {
        let exists: Option<String> = sqlx::query_scalar("SELECT to_regclass($1)::text")
            .bind(self.table())
            .fetch_one(pool)
            .await
            .map_err(map_sqlx)?;
        if exists.is_none() {
            return Err(StoreError::NotInitialized {
                schema: self.schema.clone(),
            });
        }

        let rows: Vec<(String,)> = sqlx::query_as(&format!(
            "SELECT identity FROM {} ORDER BY applied_at, identity",
            self.table()
        ))
        .fetch_all(pool)
        .await
        .map_err(map_sqlx)?;

        Ok(rows.into_iter().map(|(identity,)| identity).collect())
    }

    /// Insert the tracking row for one identity. Runs on the caller's
    /// connection so it can share the migration step's transaction.
    pub async fn record_applied(
        &self,
        conn: &mut PgConnection,
        identity: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO {} (identity) VALUES ($1)",
            self.table()
        ))
        .bind(identity)
        .execute(conn)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    /// Delete the tracking row for one identity (downgrade path).
    pub async fn record_unapplied(
        &self,
        conn: &mut PgConnection,
        identity: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(&format!("DELETE FROM {} WHERE identity = $1", self.table()))
            .bind(identity)
            .execute(conn)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("public"), "\"public\"");
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    }

    #[test]
    fn test_table_is_schema_qualified() {
        let store = AppliedMigrationStore::new("tenant_a");
        assert_eq!(store.table(), "\"tenant_a\".dbmigrate_applied");
    }
}
