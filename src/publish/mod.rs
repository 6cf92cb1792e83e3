//! @acp:module "Change Publisher"
//! @acp:summary "Persist a rewritten constraint as a version-controlled change"
//! @acp:domain cli
//! @acp:layer service
//!
//! A publisher owns both ends of the only durable state in the system: it
//! hands out the artifact as last committed (with the revision it was read
//! at) and later writes the new content only if that revision is still
//! current. Divergence is reported as `PublishConflict`, never resolved.

mod git;

pub use git::GitPublisher;

use std::fmt;
use std::path::PathBuf;

use tracing::info;

use crate::drift::DriftReport;
use crate::error::{GateError, Result};
use crate::registry::{content_digest, ArtifactSnapshot};
use crate::version::{join_versions, SupportedVersionSet};

/// @acp:summary "Reads the committed artifact and publishes replacements"
pub trait ChangePublisher {
    /// Current committed artifact plus its revision
    fn read_artifact(&self) -> Result<ArtifactSnapshot>;

    /// Replace the artifact read as `base` with `updated`.
    /// Returns the identifier of the published change.
    fn publish(&self, base: &ArtifactSnapshot, updated: &str, message: &CommitMessage) -> Result<String>;

    /// Human-readable target, for logs
    fn describe(&self) -> String;
}

/// @acp:summary "Deterministic commit message for an allow-list update"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMessage {
    pub subject: String,
    pub body: Vec<String>,
}

impl CommitMessage {
    pub fn for_update(variable: &str, report: &DriftReport, latest: &SupportedVersionSet) -> Self {
        Self {
            subject: format!("chore(eks): sync {} with standard support", variable),
            body: vec![
                format!("Added: {}", or_none(join_versions(&report.added))),
                format!("Removed: {}", or_none(join_versions(&report.removed))),
                format!("Supported: {}", latest.joined()),
            ],
        }
    }
}

fn or_none(list: String) -> String {
    if list.is_empty() {
        "none".to_string()
    } else {
        list
    }
}

impl fmt::Display for CommitMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n\n{}\n", self.subject, self.body.join("\n"))
    }
}

/// @acp:summary "Writes the artifact in the working tree without committing"
///
/// The returned identifier is the sha256 of the written content. A file
/// whose digest changed since it was read is a conflict.
#[derive(Debug, Clone)]
pub struct WorkdirPublisher {
    path: PathBuf,
}

impl WorkdirPublisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ChangePublisher for WorkdirPublisher {
    fn read_artifact(&self) -> Result<ArtifactSnapshot> {
        ArtifactSnapshot::read_workdir(&self.path)
    }

    fn publish(&self, base: &ArtifactSnapshot, updated: &str, _message: &CommitMessage) -> Result<String> {
        let current = ArtifactSnapshot::read_workdir(&self.path)?;
        if current.revision != base.revision {
            return Err(GateError::PublishConflict(format!(
                "{} changed on disk since it was read",
                self.path.display()
            )));
        }

        // Write beside the target and rename so readers never see a partial file.
        let staging = self.path.with_extension("tf.version-gate.tmp");
        std::fs::write(&staging, updated)?;
        if let Err(e) = std::fs::rename(&staging, &self.path) {
            let _ = std::fs::remove_file(&staging);
            return Err(e.into());
        }

        let digest = content_digest(updated.as_bytes());
        info!(path = %self.path.display(), revision = %digest, "Updated constraint file");
        Ok(digest)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
