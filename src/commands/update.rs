//! @acp:module "Update Command"
//! @acp:summary "Rewrite the variables file in the working tree"
//! @acp:domain cli
//! @acp:layer handler
//!
//! Implements `version-gate update`: same pipeline as `run`, but the result
//! is written to disk instead of committed.

use std::path::PathBuf;

use anyhow::Result;

use super::{build_source, print_outcome};
use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::publish::WorkdirPublisher;
use crate::writer::WriterOptions;

/// Options for the update command
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Variables file to patch; defaults to the configured one
    pub file: Option<PathBuf>,
    /// Read release data from a local file instead of the API
    pub source_file: Option<PathBuf>,
    /// Print a JSON run report
    pub json: bool,
}

/// Execute the update command, returning the process exit code
pub fn execute_update(options: UpdateOptions, config: &Config) -> Result<i32> {
    let file = options.file.unwrap_or_else(|| config.variables_file());
    let pipeline = Pipeline::new(
        build_source(config, options.source_file.as_deref()),
        WorkdirPublisher::new(file),
        WriterOptions::from_config(&config.module),
    );

    let outcome = pipeline.run();
    print_outcome(&outcome, options.json)?;
    Ok(outcome.result.exit_code())
}
