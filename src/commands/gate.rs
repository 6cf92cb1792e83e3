//! @acp:module "Gate Command"
//! @acp:summary "Check a cluster_version against the committed allow-list"
//! @acp:domain cli
//! @acp:layer handler
//!
//! Implements `version-gate gate`, the plan-time membership check the
//! module performs, usable before running Terraform.

use std::path::PathBuf;

use anyhow::{bail, Result};
use console::style;

use crate::config::Config;
use crate::gate::{ModuleInputs, ValidationGate};
use crate::registry::{ArtifactSnapshot, ConstraintRecord};

/// Options for the gate command
#[derive(Debug, Clone, Default)]
pub struct GateOptions {
    /// Version to check
    pub cluster_version: Option<String>,
    /// `.tfvars.json` holding the module inputs
    pub tfvars: Option<PathBuf>,
    /// Variables file; defaults to the configured one
    pub file: Option<PathBuf>,
}

/// Execute the gate command, returning the process exit code
pub fn execute_gate(options: GateOptions, config: &Config) -> Result<i32> {
    let version = match (options.cluster_version, &options.tfvars) {
        (Some(version), _) => version,
        (None, Some(path)) => ModuleInputs::load(path)?.cluster_version,
        (None, None) => bail!("Specify --cluster-version or --tfvars"),
    };

    let file = options.file.unwrap_or_else(|| config.variables_file());
    let snapshot = ArtifactSnapshot::read_workdir(&file)?;
    let record = ConstraintRecord::from_snapshot(&snapshot, &config.module.variable_name)?;
    let gate = ValidationGate::from_record(&config.module.variable_name, &record);

    match gate.check_version(&version) {
        Ok(()) => {
            println!(
                "{} {} = \"{}\" is allowed",
                style("✓").green(),
                config.module.variable_name,
                version
            );
            Ok(0)
        }
        Err(violation) => {
            eprintln!("{} {}", style("✗").red(), violation);
            Ok(1)
        }
    }
}
