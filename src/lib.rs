#![forbid(unsafe_code)]

//! @acp:module "Version Gate Library"
//! @acp:summary "Keeps an EKS module's cluster_version allow-list on standard support"
//! @acp:domain cli
//! @acp:layer api
//! @acp:stability stable
//!
//! # version-gate
//!
//! Periodically checks which managed Kubernetes versions are still under
//! standard (non-extended) support and rewrites the `cluster_version`
//! validation of a Terraform module to match, publishing the change via git.
//!
//! ## Pipeline
//!
//! - **Source**: fetch the supported set ([`source`])
//! - **Registry**: read the committed allow-list ([`registry`])
//! - **Drift**: compare both sets ([`drift`])
//! - **Writer**: patch the variables file in memory ([`writer`])
//! - **Publisher**: commit and push the change ([`publish`])
//!
//! ## Example
//!
//! ```rust,no_run
//! use version_gate::{Config, EndOfLifeSource, GitPublisher, Pipeline, WriterOptions};
//!
//! let config = Config::load_or_default();
//! let pipeline = Pipeline::new(
//!     EndOfLifeSource::from_config(&config.source),
//!     GitPublisher::from_config(&config),
//!     WriterOptions::from_config(&config.module),
//! );
//!
//! std::process::exit(pipeline.run_once().exit_code());
//! ```

pub mod commands;
pub mod config;
pub mod drift;
pub mod error;
pub mod gate;
pub mod pipeline;
pub mod publish;
pub mod registry;
pub mod scheduler;
pub mod source;
pub mod version;
pub mod writer;

// Re-exports
pub use config::Config;
pub use drift::{detect_drift, DriftReport};
pub use error::{ErrorKind, GateError, Result};
pub use gate::{GateViolation, ModuleInputs, ValidationGate};
pub use pipeline::{CancelFlag, Pipeline, Plan, RunOutcome, RunReport, RunResult};
pub use publish::{ChangePublisher, CommitMessage, GitPublisher, WorkdirPublisher};
pub use registry::{ArtifactSnapshot, ConstraintRecord};
pub use scheduler::{RunLock, Scheduler, SchedulerState, Trigger};
pub use source::{EndOfLifeSource, FileSource, StaticSource, SupportSource};
pub use version::{SupportedVersionSet, VersionToken};
pub use writer::{write_constraint, WriterOptions};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
