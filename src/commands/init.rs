//! @acp:module "Init Command"
//! @acp:summary "Write a default configuration file"
//! @acp:domain cli
//! @acp:layer handler
//!
//! Implements `version-gate init`.

use std::path::PathBuf;

use anyhow::{bail, Result};
use console::style;

use crate::config::{Config, DEFAULT_CONFIG_FILE};

/// Options for the init command
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Where to write the config
    pub path: PathBuf,
    /// Force overwrite existing config
    pub force: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CONFIG_FILE),
            force: false,
        }
    }
}

/// Execute the init command
pub fn execute_init(options: InitOptions, config: &Config) -> Result<()> {
    if options.path.exists() && !options.force {
        bail!(
            "{} already exists. Use --force to overwrite.",
            options.path.display()
        );
    }

    config.save(&options.path)?;
    println!(
        "{} Created {}",
        style("✓").green(),
        options.path.display()
    );
    println!("  Variables file: {}", config.variables_file().display());
    println!("  Source: {}", config.source.url);
    println!(
        "  Publish: {}/{} (push: {})",
        config.publish.remote, config.publish.branch, config.publish.push
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        let options = InitOptions {
            path: path.clone(),
            force: false,
        };

        execute_init(options.clone(), &Config::default()).unwrap();
        assert!(Config::load(&path).is_ok());
        assert!(execute_init(options.clone(), &Config::default()).is_err());
        execute_init(InitOptions { force: true, ..options }, &Config::default()).unwrap();
    }
}
