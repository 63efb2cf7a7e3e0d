pub mod db;
pub mod dump;
pub mod engine;
pub mod fanout;
pub mod report;
pub mod sql;
pub mod store;

pub use dump::{dump_schema, DumpError};
pub use engine::{EngineError, MigrationEngine};
pub use fanout::{InitReport, TargetFanOut};
pub use report::{Direction, MigrationReport, StepOutcome};
pub use store::{AppliedMigrationStore, StoreError};
