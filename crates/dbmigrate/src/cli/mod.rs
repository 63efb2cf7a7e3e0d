mod dump;
mod run;
mod touch;

use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dialoguer::Confirm;

use dbmigrate_core::{resolve_targets, MigrationDirectory, SystemEnv, TargetConfig};
use dbmigrate_runtime::Direction;

/// Track, order, and apply schema migrations across one or more
/// PostgreSQL databases.
#[derive(Parser)]
#[command(name = "dbmigrate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Migrations directory path.
    #[arg(short, long, default_value = "migrations", global = true)]
    pub migrations_dir: String,

    /// Credentials file consulted when neither DATABASE_URI nor DB_USER
    /// is set in the environment.
    #[arg(long, default_value = "db_creds.json", global = true)]
    pub creds_file: String,

    /// Skip confirmation prompts.
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a blank migration file; name words are joined by underscores.
    Touch {
        /// Short name for the migration, space or underscore separated.
        name: Vec<String>,
    },

    /// Create the migration tracking table on every configured target.
    Init,

    /// Apply all pending migrations on every configured target.
    Upgrade,

    /// Roll back the most recently applied migration on every target.
    Downgrade,

    /// Dump the first target's schema structure to schema.sql.
    Dump,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        dotenvy::dotenv().ok();
        tracing_subscriber::fmt()
            .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string()))
            .init();

        let directory = MigrationDirectory::new(&self.migrations_dir);

        match self.command {
            Commands::Touch { ref name } => touch::execute(&directory, name),
            Commands::Init => {
                let targets = self.targets()?;
                run::init(&targets).await
            }
            Commands::Upgrade => {
                let targets = self.targets()?;
                run::migrate(&directory, &targets, Direction::Upgrade, self.yes).await
            }
            Commands::Downgrade => {
                let targets = self.targets()?;
                run::migrate(&directory, &targets, Direction::Downgrade, self.yes).await
            }
            Commands::Dump => {
                let targets = self.targets()?;
                dump::execute(&targets, self.yes).await
            }
        }
    }

    fn targets(&self) -> Result<Vec<TargetConfig>> {
        let resolved = resolve_targets(&SystemEnv, Path::new(&self.creds_file))?;
        Ok(resolved.targets)
    }
}

/// Two-column schema/URI table shown before any confirmation.
pub(crate) fn format_targets(targets: &[TargetConfig]) -> String {
    let mut rows = vec![
        ("DB Schema".to_string(), "Database URI".to_string()),
        ("=".repeat(9), "=".repeat(12)),
    ];
    rows.extend(
        targets
            .iter()
            .map(|t| (t.schema.clone(), t.connection_uri())),
    );
    rows.iter()
        .map(|(schema, uri)| format!("{:<50}{:<50}", schema, uri))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt the operator; a decline aborts before touching any target.
pub(crate) fn confirm(prompt: &str, yes: bool) -> Result<()> {
    if yes {
        return Ok(());
    }
    let confirmed = Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?;
    if !confirmed {
        anyhow::bail!("aborted by operator");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbmigrate_core::{Credentials, TargetConfig};

    #[test]
    fn test_cli_parse_touch() {
        let cli = Cli::try_parse_from(["dbmigrate", "touch", "create", "users"]).unwrap();
        match cli.command {
            Commands::Touch { name } => assert_eq!(name, ["create", "users"]),
            _ => panic!("expected touch"),
        }
    }

    #[test]
    fn test_cli_parse_touch_allows_empty_name() {
        // Guidance for the empty case is handled in the command, not clap.
        let cli = Cli::try_parse_from(["dbmigrate", "touch"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_parse_upgrade_with_flags() {
        let cli = Cli::try_parse_from(["dbmigrate", "upgrade", "-y", "-m", "db/migrations"])
            .unwrap();
        assert!(cli.yes);
        assert_eq!(cli.migrations_dir, "db/migrations");
        assert!(matches!(cli.command, Commands::Upgrade));
    }

    #[test]
    fn test_cli_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["dbmigrate", "sideways"]).is_err());
    }

    #[test]
    fn test_format_targets_layout() {
        let targets = vec![TargetConfig {
            credentials: Credentials::Uri("postgres://u:p@h:5432/d".into()),
            schema: "tenant_a".into(),
        }];
        let table = format_targets(&targets);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("DB Schema"));
        assert!(lines[0].contains("Database URI"));
        assert!(lines[1].starts_with("========="));
        assert!(lines[2].starts_with("tenant_a"));
        assert!(lines[2].contains("postgres://u:p@h:5432/d"));
    }
}
