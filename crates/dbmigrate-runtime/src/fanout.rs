use tracing::{info, warn};

use dbmigrate_core::{MigrationFile, TargetConfig};

use crate::engine::{EngineError, MigrationEngine};
use crate::report::{Direction, MigrationReport};

/// Applies the engine across the configured targets, one at a time.
///
/// Targets are independent: a failure on one is captured in its report
/// and the remaining targets still run. There is no cross-target
/// atomicity, so the aggregate report is how an operator sees exactly
/// which databases are out of sync.
#[derive(Debug)]
pub struct TargetFanOut {
    chain: Vec<MigrationFile>,
}

/// Per-target outcome of `init`.
#[derive(Debug)]
pub struct InitReport {
    pub target: String,
    pub error: Option<String>,
}

impl InitReport {
    pub fn ok(&self) -> bool {
        self.error.is_none()
    }
}

impl TargetFanOut {
    /// Resolve the chain once up front; a malformed directory aborts
    /// before any database is touched.
    pub fn new(files: Vec<MigrationFile>) -> Result<Self, EngineError> {
        Ok(Self {
            chain: MigrationEngine::resolve_chain(files)?,
        })
    }

    pub fn chain(&self) -> &[MigrationFile] {
        &self.chain
    }

    /// Run one direction on every target, in order, best-effort.
    pub async fn run_all(
        &self,
        targets: &[TargetConfig],
        direction: Direction,
    ) -> Vec<MigrationReport> {
        let mut reports = Vec::with_capacity(targets.len());
        for target in targets {
            info!("{} on {}", direction, target.label());
            let engine = MigrationEngine::new(target, &self.chain);
            let report = match engine.run(direction).await {
                Ok(report) => report,
                Err(e) => {
                    warn!("{}: {}", target.label(), e);
                    MigrationReport::failed(target.label(), direction, e.to_string())
                }
            };
            reports.push(report);
        }
        reports
    }

    /// Create the tracking table on every target. Requires no chain, so
    /// `init` works even while the migration directory is still empty.
    pub async fn init_all(targets: &[TargetConfig]) -> Vec<InitReport> {
        let mut reports = Vec::with_capacity(targets.len());
        for target in targets {
            info!("init on {}", target.label());
            let engine = MigrationEngine::new(target, &[]);
            let error = match engine.init().await {
                Ok(()) => None,
                Err(e) => {
                    warn!("{}: {}", target.label(), e);
                    Some(e.to_string())
                }
            };
            reports.push(InitReport {
                target: target.label(),
                error,
            });
        }
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbmigrate_core::GraphError;
    use std::path::PathBuf;

    fn mig(identity: &str, parent: Option<&str>) -> MigrationFile {
        MigrationFile {
            identity: identity.to_string(),
            parent_identity: parent.map(String::from),
            description: String::new(),
            upgrade_sql: String::new(),
            downgrade_sql: String::new(),
            path: PathBuf::new(),
        }
    }

    #[test]
    fn test_new_resolves_chain_order() {
        let fanout =
            TargetFanOut::new(vec![mig("b", Some("a")), mig("a", None), mig("c", Some("b"))])
                .unwrap();
        let ids: Vec<&str> = fanout.chain().iter().map(|m| m.identity.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn test_new_rejects_malformed_directory() {
        // Structural errors abort before any target is contacted.
        let err = TargetFanOut::new(vec![mig("a", Some("missing"))]).unwrap_err();
        assert!(matches!(
            err,
            EngineError::GraphInvalid(GraphError::DanglingParent { .. })
        ));
    }
}
