use std::fmt;

/// Which way the engine is walking the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Apply pending migrations, root to tip.
    Upgrade,
    /// Roll back the most recently applied migration.
    Downgrade,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upgrade => write!(f, "upgrade"),
            Direction::Downgrade => write!(f, "downgrade"),
        }
    }
}

/// Outcome of one migration step within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Upgrade action committed and recorded.
    Applied,
    /// Downgrade action committed and the tracking row removed.
    RolledBack,
    /// The step's own SQL failed; the transaction was rolled back.
    Failed(String),
}

/// Per-target result of one engine run.
#[derive(Debug)]
pub struct MigrationReport {
    /// Target label (host:port/db [schema]).
    pub target: String,
    pub direction: Direction,
    /// Executed steps in order, with their outcomes. Empty when there was
    /// nothing to do.
    pub steps: Vec<(String, StepOutcome)>,
    /// Target-level failure that prevented or halted the run (connect
    /// failure, uninitialized store, state divergence). Step-level SQL
    /// failures live in `steps`.
    pub error: Option<String>,
}

impl MigrationReport {
    pub fn new(target: String, direction: Direction) -> Self {
        Self {
            target,
            direction,
            steps: Vec::new(),
            error: None,
        }
    }

    pub fn failed(target: String, direction: Direction, error: String) -> Self {
        Self {
            target,
            direction,
            steps: Vec::new(),
            error: Some(error),
        }
    }

    /// True when the run completed with no target-level error and no
    /// failed step. Zero steps counts as success: absence of pending work
    /// is not an error.
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
            && self
                .steps
                .iter()
                .all(|(_, outcome)| !matches!(outcome, StepOutcome::Failed(_)))
    }

    /// True when the run succeeded without executing any step.
    pub fn nothing_to_do(&self) -> bool {
        self.succeeded() && self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_report_is_noop_success() {
        let report = MigrationReport::new("db [public]".into(), Direction::Upgrade);
        assert!(report.succeeded());
        assert!(report.nothing_to_do());
    }

    #[test]
    fn test_failed_step_fails_report() {
        let mut report = MigrationReport::new("db [public]".into(), Direction::Upgrade);
        report.steps.push(("1".into(), StepOutcome::Applied));
        report
            .steps
            .push(("2".into(), StepOutcome::Failed("syntax error".into())));
        assert!(!report.succeeded());
        assert!(!report.nothing_to_do());
    }

    #[test]
    fn test_target_error_fails_report() {
        let report = MigrationReport::failed(
            "db [public]".into(),
            Direction::Downgrade,
            "connect refused".into(),
        );
        assert!(!report.succeeded());
    }
}
