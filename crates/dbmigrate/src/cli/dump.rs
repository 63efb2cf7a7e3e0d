use std::path::Path;

use anyhow::Result;
use console::style;

use dbmigrate_core::TargetConfig;
use dbmigrate_runtime::dump_schema;

use super::confirm;

const OUT_FILE: &str = "schema.sql";

/// `dump`: schema-only structure dump of the first configured target.
pub async fn execute(targets: &[TargetConfig], yes: bool) -> Result<()> {
    let target = targets
        .first()
        .ok_or_else(|| anyhow::anyhow!("no targets configured"))?;

    println!(
        "Dumping schema from database: {}, and schema: {}",
        target.connection_uri(),
        target.schema
    );
    confirm("Do you want to continue?", yes)?;

    dump_schema(target, Path::new(OUT_FILE)).await?;
    println!(
        "  {} Schema written to {}",
        style("✓").green(),
        style(OUT_FILE).cyan()
    );
    Ok(())
}
