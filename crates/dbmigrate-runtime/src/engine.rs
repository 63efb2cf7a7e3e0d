use sqlx::postgres::PgPool;
use tracing::{debug, info, warn};

use dbmigrate_core::{GraphError, MigrationFile, MigrationGraph, TargetConfig};

use crate::db;
use crate::report::{Direction, MigrationReport, StepOutcome};
use crate::sql::{requires_autocommit, split_statements};
use crate::store::{AppliedMigrationStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The migration directory is structurally broken; no work is
    /// attempted against any database.
    #[error("invalid migration chain: {0}")]
    GraphInvalid(#[from] GraphError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The tracking table does not form a prefix of the resolved chain.
    /// Never auto-corrected: guessing here could corrupt schema state.
    #[error(
        "applied state diverges from migration chain at position {position}: \
         tracking table has {found}, chain expects {}",
        expected.as_deref().unwrap_or("end of chain")
    )]
    StateDivergence {
        position: usize,
        expected: Option<String>,
        found: String,
    },
}

/// Error for a single migration step; surfaced verbatim in the report.
#[derive(Debug, thiserror::Error)]
enum StepError {
    #[error("{0}")]
    Sql(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Orchestrates one target: load applied state, diff against the chain,
/// execute pending steps transactionally, update the tracking table.
pub struct MigrationEngine<'a> {
    target: &'a TargetConfig,
    chain: &'a [MigrationFile],
    store: AppliedMigrationStore,
}

impl<'a> MigrationEngine<'a> {
    pub fn new(target: &'a TargetConfig, chain: &'a [MigrationFile]) -> Self {
        let store = AppliedMigrationStore::new(target.schema.clone());
        Self {
            target,
            chain,
            store,
        }
    }

    /// Resolve the discovered file set into the chain every engine run
    /// works from.
    pub fn resolve_chain(files: Vec<MigrationFile>) -> Result<Vec<MigrationFile>, EngineError> {
        Ok(MigrationGraph::resolve(files)?)
    }

    /// Run one direction against this engine's target.
    ///
    /// Target-level failures (connect, uninitialized store, divergence)
    /// surface as `Err`; a step whose own SQL fails is recorded in the
    /// report and halts further steps for this target.
    pub async fn run(&self, direction: Direction) -> Result<MigrationReport, EngineError> {
        let pool = db::connect(self.target).await?;
        let result = self.run_with_pool(&pool, direction).await;
        pool.close().await;
        result
    }

    /// Create the tracking table (the `init` operation). Idempotent.
    pub async fn init(&self) -> Result<(), EngineError> {
        let pool = db::connect(self.target).await?;
        let result = self.store.ensure_table_exists(&pool).await;
        pool.close().await;
        Ok(result?)
    }

    async fn run_with_pool(
        &self,
        pool: &PgPool,
        direction: Direction,
    ) -> Result<MigrationReport, EngineError> {
        let applied = self.store.load_applied(pool).await?;
        validate_prefix(self.chain, &applied)?;

        let mut report = MigrationReport::new(self.target.label(), direction);

        match direction {
            Direction::Upgrade => {
                let pending = &self.chain[applied.len()..];
                if pending.is_empty() {
                    info!("{}: nothing to migrate", report.target);
                    return Ok(report);
                }
                debug!("{}: {} pending migration(s)", report.target, pending.len());
                for file in pending {
                    match self.apply_step(pool, file).await {
                        Ok(()) => {
                            report
                                .steps
                                .push((file.identity.clone(), StepOutcome::Applied));
                        }
                        Err(e) => {
                            // Earlier steps in this run committed and stay
                            // recorded; stop here.
                            report
                                .steps
                                .push((file.identity.clone(), StepOutcome::Failed(e.to_string())));
                            break;
                        }
                    }
                }
            }
            Direction::Downgrade => {
                let Some(file) = downgrade_candidate(self.chain, &applied) else {
                    info!("{}: nothing to roll back", report.target);
                    return Ok(report);
                };
                match self.revert_step(pool, file).await {
                    Ok(()) => {
                        report
                            .steps
                            .push((file.identity.clone(), StepOutcome::RolledBack));
                    }
                    Err(e) => {
                        report
                            .steps
                            .push((file.identity.clone(), StepOutcome::Failed(e.to_string())));
                    }
                }
            }
        }

        Ok(report)
    }

    /// Execute one upgrade action and record it, in a single transaction
    /// where the statements allow it.
    async fn apply_step(&self, pool: &PgPool, file: &MigrationFile) -> Result<(), StepError> {
        info!("applying {} ({})", file.identity, file.description);
        let statements = split_statements(&file.upgrade_sql);
        self.execute_step(pool, file, &statements, StepKind::Apply)
            .await
    }

    /// Execute one downgrade action and drop its tracking row.
    async fn revert_step(&self, pool: &PgPool, file: &MigrationFile) -> Result<(), StepError> {
        info!("rolling back {} ({})", file.identity, file.description);
        let statements = split_statements(&file.downgrade_sql);
        self.execute_step(pool, file, &statements, StepKind::Revert)
            .await
    }

    async fn execute_step(
        &self,
        pool: &PgPool,
        file: &MigrationFile,
        statements: &[String],
        kind: StepKind,
    ) -> Result<(), StepError> {
        if statements.iter().any(|s| requires_autocommit(s)) {
            // Postgres refuses these inside a transaction block. Run the
            // body on a plain connection and write the tracking row right
            // after; the atomicity guarantee narrows to best-effort for
            // this step.
            warn!(
                "{} contains statements that cannot run in a transaction; \
                 tracking update is best-effort",
                file.identity
            );
            for stmt in statements {
                sqlx::query(stmt)
                    .execute(pool)
                    .await
                    .map_err(|e| StepError::Sql(e.to_string()))?;
            }
            let mut conn = pool
                .acquire()
                .await
                .map_err(|e| StepError::Sql(e.to_string()))?;
            match kind {
                StepKind::Apply => self.store.record_applied(&mut conn, &file.identity).await?,
                StepKind::Revert => {
                    self.store
                        .record_unapplied(&mut conn, &file.identity)
                        .await?
                }
            }
            return Ok(());
        }

        // Body and tracking row commit together or not at all; dropping
        // the transaction on any error path rolls both back.
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| StepError::Sql(e.to_string()))?;
        for stmt in statements {
            sqlx::query(stmt)
                .execute(&mut *tx)
                .await
                .map_err(|e| StepError::Sql(e.to_string()))?;
        }
        match kind {
            StepKind::Apply => self.store.record_applied(&mut tx, &file.identity).await?,
            StepKind::Revert => self.store.record_unapplied(&mut tx, &file.identity).await?,
        }
        tx.commit()
            .await
            .map_err(|e| StepError::Sql(e.to_string()))?;
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum StepKind {
    Apply,
    Revert,
}

/// The single migration a downgrade invocation reverts: the chain-order
/// tail of the applied prefix. One step per invocation; rollback is the
/// riskier operation, so multi-step rollback takes multiple explicit
/// calls. Assumes the prefix invariant has already been validated.
fn downgrade_candidate<'c>(
    chain: &'c [MigrationFile],
    applied: &[String],
) -> Option<&'c MigrationFile> {
    if applied.is_empty() {
        return None;
    }
    Some(&chain[applied.len() - 1])
}

/// The applied-identity sequence must equal an initial segment of the
/// chain, in order, with no holes.
fn validate_prefix(chain: &[MigrationFile], applied: &[String]) -> Result<(), EngineError> {
    for (position, found) in applied.iter().enumerate() {
        match chain.get(position) {
            Some(expected) if expected.identity == *found => {}
            Some(expected) => {
                return Err(EngineError::StateDivergence {
                    position,
                    expected: Some(expected.identity.clone()),
                    found: found.clone(),
                })
            }
            None => {
                return Err(EngineError::StateDivergence {
                    position,
                    expected: None,
                    found: found.clone(),
                })
            }
        }
    }
    Ok(())
}
