//! @acp:module "Show Command"
//! @acp:summary "Print the committed allow-list"
//! @acp:domain cli
//! @acp:layer handler

use anyhow::Result;
use console::style;
use serde::Serialize;

use crate::config::Config;
use crate::publish::{ChangePublisher, GitPublisher, WorkdirPublisher};
use crate::registry::ConstraintRecord;

/// Options for the show command
#[derive(Debug, Clone, Default)]
pub struct ShowOptions {
    /// Read the variables file from disk instead of the committed tree
    pub workdir: bool,
    /// Output as JSON
    pub json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShowReport<'a> {
    path: String,
    revision: &'a str,
    versions: Vec<String>,
    error_message: Option<&'a str>,
}

/// Execute the show command
pub fn execute_show(options: ShowOptions, config: &Config) -> Result<()> {
    let snapshot = if options.workdir {
        WorkdirPublisher::new(config.variables_file()).read_artifact()?
    } else {
        GitPublisher::from_config(config).read_artifact()?
    };
    let record = ConstraintRecord::from_snapshot(&snapshot, &config.module.variable_name)?;

    if options.json {
        let report = ShowReport {
            path: snapshot.path.display().to_string(),
            revision: &snapshot.revision,
            versions: record.versions.iter().map(ToString::to_string).collect(),
            error_message: record.error_message.as_deref(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} {} @ {}",
        style("→").cyan(),
        snapshot.path.display(),
        style(&snapshot.revision).dim()
    );
    if record.versions.is_empty() {
        println!("  {} allow-list is empty", style("⚠").yellow());
    }
    for version in &record.versions {
        println!("  {}", version);
    }
    if let Some(message) = &record.error_message {
        println!("  Error message: {}", style(message).dim());
    }
    Ok(())
}
