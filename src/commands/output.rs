//! @acp:module "Output Formatting"
//! @acp:summary "Human and JSON rendering of run outcomes"
//! @acp:domain cli
//! @acp:layer handler

use anyhow::Result;
use console::style;

use crate::drift::DriftReport;
use crate::pipeline::{RunOutcome, RunReport, RunResult};
use crate::version::join_versions;

/// Print a run outcome, either styled for a terminal or as a JSON report
pub fn print_outcome(outcome: &RunOutcome, json: bool) -> Result<()> {
    if json {
        let report = RunReport::from_outcome(outcome);
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match &outcome.result {
        RunResult::NoChangeNeeded => {
            println!(
                "{} Allow-list already matches the supported versions",
                style("✓").green()
            );
        }
        RunResult::Updated(id) => {
            println!("{} Published {}", style("✓").green(), style(id).bold());
            if let Some(drift) = &outcome.drift {
                print_drift(drift);
            }
        }
        RunResult::Failed(e) => {
            eprintln!("{} {}", style("✗").red(), e);
            eprintln!("  kind: {}", e.kind());
        }
    }
    Ok(())
}

/// Print added/removed versions
pub fn print_drift(drift: &DriftReport) {
    if !drift.has_drift() {
        println!("  {}", style("no version drift").dim());
        return;
    }
    if !drift.added.is_empty() {
        println!("  {} {}", style("+").green(), join_versions(&drift.added));
    }
    if !drift.removed.is_empty() {
        println!("  {} {}", style("-").red(), join_versions(&drift.removed));
    }
}
