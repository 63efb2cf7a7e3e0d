use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Executor;

use dbmigrate_core::TargetConfig;

use crate::store::{quote_ident, StoreError};

const ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Open a pool for one target. Each target's pool is exclusively owned by
/// the engine instance handling it; migrations run strictly sequentially,
/// so a single connection is all that is ever checked out.
pub async fn connect(target: &TargetConfig) -> Result<PgPool, StoreError> {
    let schema = target.schema.clone();
    PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
        .after_connect(move |conn, _meta| {
            // Pin the search path so unqualified statements in migration
            // bodies land in the target schema.
            let set_path = format!("SET search_path TO {}", quote_ident(&schema));
            Box::pin(async move {
                conn.execute(set_path.as_str()).await?;
                Ok(())
            })
        })
        .connect(&target.connection_uri())
        .await
        .map_err(|e| StoreError::ConnectionFailed(e.to_string()))
}
