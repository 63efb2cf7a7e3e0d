use anyhow::Result;
use console::style;

use dbmigrate_core::{MigrationDirectory, TargetConfig};
use dbmigrate_runtime::{Direction, MigrationReport, StepOutcome, TargetFanOut};

use super::{confirm, format_targets};

/// `init`: create the tracking table on every target. No confirmation;
/// the operation is idempotent and creates nothing but the table.
pub async fn init(targets: &[TargetConfig]) -> Result<()> {
    let reports = TargetFanOut::init_all(targets).await;

    let mut failures = 0;
    for report in &reports {
        match &report.error {
            None => println!("  {} {} initialized", style("✓").green(), report.target),
            Some(e) => {
                failures += 1;
                println!("  {} {}: {}", style("✗").red(), report.target, e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("init failed on {failures} of {} target(s)", reports.len());
    }
    Ok(())
}

/// `upgrade` / `downgrade`: confirm against the resolved target list,
/// then fan the engine out across every target.
pub async fn migrate(
    directory: &MigrationDirectory,
    targets: &[TargetConfig],
    direction: Direction,
    yes: bool,
) -> Result<()> {
    // Resolve the chain before prompting so a malformed directory fails
    // fast, before any database is named in a prompt.
    let fanout = TargetFanOut::new(directory.load()?)?;

    let verb = match direction {
        Direction::Upgrade => "apply forward-migration",
        Direction::Downgrade => "roll back the last applied migration",
    };
    println!(
        "Will {} on the following databases:\n\n{}\n",
        verb,
        format_targets(targets)
    );
    confirm("Do you want to continue?", yes)?;

    let reports = fanout.run_all(targets, direction).await;
    print_reports(&reports);

    let failures = reports.iter().filter(|r| !r.succeeded()).count();
    if failures > 0 {
        anyhow::bail!("{failures} of {} target(s) failed", reports.len());
    }
    Ok(())
}

fn print_reports(reports: &[MigrationReport]) {
    for report in reports {
        println!();
        println!("  {} ({})", style(&report.target).bold(), report.direction);

        if report.nothing_to_do() {
            println!("    {} nothing to do", style("ℹ").blue());
            continue;
        }

        for (identity, outcome) in &report.steps {
            match outcome {
                StepOutcome::Applied => {
                    println!("    {} applied {}", style("✓").green(), style(identity).cyan())
                }
                StepOutcome::RolledBack => println!(
                    "    {} rolled back {}",
                    style("✓").green(),
                    style(identity).cyan()
                ),
                StepOutcome::Failed(e) => {
                    println!("    {} {} failed: {}", style("✗").red(), identity, e)
                }
            }
        }

        if let Some(e) = &report.error {
            println!("    {} {}", style("✗").red(), e);
        }
    }
    println!();
}
