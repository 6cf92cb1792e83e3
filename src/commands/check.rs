//! @acp:module "Check Command"
//! @acp:summary "Dry run: report drift and preview the rewrite"
//! @acp:domain cli
//! @acp:layer handler
//!
//! Implements `version-gate check`. Nothing is written or published.
//! Exit status: 0 when the allow-list is current, 2 when an update is due.

use std::path::PathBuf;

use anyhow::Result;
use console::style;
use serde::Serialize;
use similar::TextDiff;

use super::{build_source, print_drift};
use crate::config::Config;
use crate::pipeline::{Pipeline, Plan};
use crate::publish::{GitPublisher, WorkdirPublisher};
use crate::writer::WriterOptions;

/// Options for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Read release data from a local file instead of the API
    pub source_file: Option<PathBuf>,
    /// Read the variables file from disk instead of the committed tree
    pub workdir: bool,
    /// Output as JSON
    pub json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckReport {
    path: String,
    revision: String,
    committed: Vec<String>,
    supported: Vec<String>,
    added: Vec<String>,
    removed: Vec<String>,
    update_required: bool,
    diff: String,
}

/// Execute the check command, returning the process exit code
pub fn execute_check(options: CheckOptions, config: &Config) -> Result<i32> {
    let source = build_source(config, options.source_file.as_deref());
    let writer = WriterOptions::from_config(&config.module);
    let plan = if options.workdir {
        Pipeline::new(source, WorkdirPublisher::new(config.variables_file()), writer).plan()?
    } else {
        Pipeline::new(source, GitPublisher::from_config(config), writer).plan()?
    };

    let diff = render_diff(&plan);
    let update_required = plan.changes_artifact();

    if options.json {
        let report = CheckReport {
            path: plan.snapshot.path.display().to_string(),
            revision: plan.snapshot.revision.clone(),
            committed: plan.record.versions.iter().map(ToString::to_string).collect(),
            supported: plan.latest.iter().map(ToString::to_string).collect(),
            added: plan.drift.added.iter().map(ToString::to_string).collect(),
            removed: plan.drift.removed.iter().map(ToString::to_string).collect(),
            update_required,
            diff,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} {} @ {}",
            style("→").cyan(),
            plan.snapshot.path.display(),
            style(&plan.snapshot.revision).dim()
        );
        println!("  Committed: {}", plan.record.joined());
        println!("  Supported: {}", plan.latest.joined());
        print_drift(&plan.drift);

        if update_required {
            println!("\n{} Update required:\n", style("!").yellow());
            print!("{}", diff);
        } else {
            println!("{} Allow-list is current", style("✓").green());
        }
    }

    Ok(if update_required { 2 } else { 0 })
}

/// Unified diff of the committed artifact against the rewrite
pub fn render_diff(plan: &Plan) -> String {
    let path = plan.snapshot.path.display().to_string();
    TextDiff::from_lines(&plan.snapshot.content, &plan.updated)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{}", path), &format!("b/{}", path))
        .to_string()
}
