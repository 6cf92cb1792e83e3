//! @acp:module "Validation Gate"
//! @acp:summary "Plan-time membership check for the module's cluster_version input"
//! @acp:domain cli
//! @acp:layer service
//!
//! Mirrors what `contains([...], var.cluster_version)` does inside the
//! Terraform module: an exact string membership test against the committed
//! allow-list, failing with the configured error message.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::error::{GateError, Result};
use crate::registry::ConstraintRecord;

/// @acp:summary "Input variables of the EKS module"
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModuleInputs {
    pub cluster_name: String,
    pub cluster_role_arn: String,
    pub subnet_ids: Vec<String>,
    pub cluster_version: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl ModuleInputs {
    /// @acp:summary "Load inputs from a `.tfvars.json` file"
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| GateError::Config(format!("{}: {}", path.display(), e)))
    }
}

/// @acp:summary "A rejected plan input"
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid value for variable \"{variable}\": {message}")]
pub struct GateViolation {
    pub variable: String,
    pub value: String,
    pub message: String,
}

/// @acp:summary "Allow-list populated from the committed record"
#[derive(Debug, Clone)]
pub struct ValidationGate {
    variable: String,
    allowed: HashSet<String>,
    error_message: String,
}

impl ValidationGate {
    pub fn from_record(variable: &str, record: &ConstraintRecord) -> Self {
        let allowed: HashSet<String> = record.versions.iter().map(|v| v.to_string()).collect();
        let error_message = record.error_message.clone().unwrap_or_else(|| {
            format!("The {} must be one of: {}.", variable, record.joined())
        });
        Self {
            variable: variable.to_string(),
            allowed,
            error_message,
        }
    }

    pub fn allows(&self, version: &str) -> bool {
        self.allowed.contains(version)
    }

    pub fn check_version(&self, version: &str) -> std::result::Result<(), GateViolation> {
        if self.allows(version) {
            Ok(())
        } else {
            Err(GateViolation {
                variable: self.variable.clone(),
                value: version.to_string(),
                message: self.error_message.clone(),
            })
        }
    }

    pub fn check(&self, inputs: &ModuleInputs) -> std::result::Result<(), GateViolation> {
        self.check_version(&inputs.cluster_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const VARIABLES: &str = r#"variable "cluster_version" {
  type = string

  validation {
    condition     = contains(["1.32", "1.33", "1.34", "1.35"], var.cluster_version)
    error_message = "The cluster_version must be one of: 1.32, 1.33, 1.34, 1.35."
  }
}
"#;

    fn gate() -> ValidationGate {
        let record =
            ConstraintRecord::parse(VARIABLES, "cluster_version", &PathBuf::from("variables.tf"))
                .unwrap();
        ValidationGate::from_record("cluster_version", &record)
    }

    #[test]
    fn test_retired_version_rejected() {
        let err = gate().check_version("1.31").unwrap_err();
        assert_eq!(err.value, "1.31");
        assert_eq!(
            err.message,
            "The cluster_version must be one of: 1.32, 1.33, 1.34, 1.35."
        );
        assert!(err.to_string().contains("cluster_version"));
    }

    #[test]
    fn test_supported_version_accepted() {
        assert!(gate().check_version("1.33").is_ok());
    }

    #[test]
    fn test_membership_is_exact() {
        assert!(gate().check_version(" 1.33").is_err());
        assert!(gate().check_version("1.33.0").is_err());
    }

    #[test]
    fn test_check_module_inputs() {
        let inputs: ModuleInputs = serde_json::from_str(
            r#"{
                "cluster_name": "prod",
                "cluster_role_arn": "arn:aws:iam::123456789012:role/eks",
                "subnet_ids": ["subnet-a", "subnet-b"],
                "cluster_version": "1.34"
            }"#,
        )
        .unwrap();
        assert!(inputs.tags.is_empty());
        assert!(gate().check(&inputs).is_ok());
    }

    #[test]
    fn test_default_message_when_missing() {
        let record = ConstraintRecord {
            versions: ["1.33".parse().unwrap()].into_iter().collect(),
            error_message: None,
        };
        let err = ValidationGate::from_record("cluster_version", &record)
            .check_version("1.20")
            .unwrap_err();
        assert_eq!(err.message, "The cluster_version must be one of: 1.33.");
    }
}
