//! @acp:module "Run Command"
//! @acp:summary "Execute the pipeline once (manual dispatch)"
//! @acp:domain cli
//! @acp:layer handler
//!
//! Implements `version-gate run`. Exit status: 0 no change, 1 failed,
//! 2 updated.

use std::path::PathBuf;

use anyhow::Result;

use super::{build_source, print_outcome};
use crate::config::Config;
use crate::pipeline::{Pipeline, RunOutcome};
use crate::publish::GitPublisher;
use crate::scheduler::{Scheduler, Trigger};
use crate::writer::WriterOptions;

/// Options for the run command
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Read release data from a local file instead of the API
    pub source_file: Option<PathBuf>,
    /// Print a JSON run report
    pub json: bool,
}

/// Execute the run command, returning the process exit code
pub fn execute_run(options: RunOptions, config: &Config) -> Result<i32> {
    let pipeline = Pipeline::new(
        build_source(config, options.source_file.as_deref()),
        GitPublisher::from_config(config),
        WriterOptions::from_config(&config.module),
    );
    let mut scheduler = Scheduler::new(config.schedule.lock_file.clone());

    let mut details = (None, None);
    let result = scheduler.tick(Trigger::Manual, || {
        let outcome = pipeline.run();
        details = (outcome.drift, outcome.latest);
        outcome.result
    });

    let outcome = RunOutcome {
        result,
        drift: details.0,
        latest: details.1,
    };
    print_outcome(&outcome, options.json)?;
    Ok(outcome.result.exit_code())
}
