pub mod config;
pub mod migration;

pub use config::{
    resolve_targets, ConfigError, ConnectionFields, CredentialSource, Credentials, EnvSource,
    ResolvedTargets, SystemEnv, TargetConfig,
};
pub use migration::{
    DirectoryError, FileError, GraphError, MigrationDirectory, MigrationFile, MigrationGraph,
};
