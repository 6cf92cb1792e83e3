//! @acp:module "Commands"
//! @acp:summary "CLI command implementations"
//! @acp:domain cli
//! @acp:layer handler
//!
//! Provides implementations for all CLI commands.
//! Each command is in its own submodule for maintainability.

pub mod check;
pub mod gate;
pub mod init;
pub mod output;
pub mod run;
pub mod schedule;
pub mod show;
pub mod update;

pub use check::{execute_check, CheckOptions};
pub use gate::{execute_gate, GateOptions};
pub use init::{execute_init, InitOptions};
pub use output::{print_drift, print_outcome};
pub use run::{execute_run, RunOptions};
pub use schedule::{execute_schedule, ScheduleOptions};
pub use show::{execute_show, ShowOptions};
pub use update::{execute_update, UpdateOptions};

use std::path::Path;

use crate::config::Config;
use crate::source::{EndOfLifeSource, FileSource, SupportSource};

/// Source used by a command: a local payload file if given, else the configured API
pub fn build_source(config: &Config, source_file: Option<&Path>) -> Box<dyn SupportSource + Send + Sync> {
    match source_file {
        Some(path) => Box::new(FileSource::new(path)),
        None => Box::new(EndOfLifeSource::from_config(&config.source)),
    }
}
