//! @acp:module "Pipeline"
//! @acp:summary "One linear run: source -> drift -> writer -> publisher"
//! @acp:domain cli
//! @acp:layer service
//!
//! [`Pipeline::run_once`] is the single entry point used by both the manual
//! command and the recurring trigger. The rewritten artifact stays in
//! memory until the publisher commits it; a cancelled run publishes nothing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::drift::{detect_drift, DriftReport};
use crate::error::{ErrorKind, GateError, Result};
use crate::publish::{ChangePublisher, CommitMessage};
use crate::registry::{ArtifactSnapshot, ConstraintRecord};
use crate::source::SupportSource;
use crate::version::SupportedVersionSet;
use crate::writer::{write_constraint, WriterOptions};

/// @acp:summary "Outcome of one pipeline execution"
#[derive(Debug)]
pub enum RunResult {
    NoChangeNeeded,
    /// Identifier of the published change
    Updated(String),
    Failed(GateError),
}

impl RunResult {
    /// 0 = no change, 1 = failed, 2 = updated
    pub fn exit_code(&self) -> i32 {
        match self {
            RunResult::NoChangeNeeded => 0,
            RunResult::Failed(_) => 1,
            RunResult::Updated(_) => 2,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, RunResult::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunResult::NoChangeNeeded => "no_change_needed",
            RunResult::Updated(_) => "updated",
            RunResult::Failed(_) => "failed",
        }
    }
}

/// @acp:summary "Cooperative cancellation checked between steps"
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// @acp:summary "Everything computed before publishing"
#[derive(Debug, Clone)]
pub struct Plan {
    pub snapshot: ArtifactSnapshot,
    pub record: ConstraintRecord,
    pub latest: SupportedVersionSet,
    pub drift: DriftReport,
    /// Rewritten artifact content
    pub updated: String,
}

impl Plan {
    /// The rewrite differs from what is committed
    pub fn changes_artifact(&self) -> bool {
        self.updated != self.snapshot.content
    }
}

/// @acp:summary "Run result plus the details gathered on the way"
#[derive(Debug)]
pub struct RunOutcome {
    pub result: RunResult,
    pub drift: Option<DriftReport>,
    pub latest: Option<SupportedVersionSet>,
}

/// @acp:summary "The version-lifecycle enforcement pipeline"
pub struct Pipeline<S, P> {
    source: S,
    publisher: P,
    writer: WriterOptions,
    cancel: CancelFlag,
}

impl<S: SupportSource, P: ChangePublisher> Pipeline<S, P> {
    pub fn new(source: S, publisher: P, writer: WriterOptions) -> Self {
        Self {
            source,
            publisher,
            writer,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    fn checkpoint(&self, step: &'static str) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(GateError::Cancelled { step });
        }
        Ok(())
    }

    /// @acp:summary "Fetch, compare and rewrite without publishing"
    pub fn plan(&self) -> Result<Plan> {
        self.checkpoint("fetch")?;
        let latest = self.source.fetch_supported_versions()?;

        self.checkpoint("read")?;
        let snapshot = self.publisher.read_artifact()?;
        let record = ConstraintRecord::from_snapshot(&snapshot, &self.writer.variable)?;
        info!(
            path = %snapshot.path.display(),
            revision = %snapshot.revision,
            committed = %record.joined(),
            "Read committed constraint"
        );

        let drift = detect_drift(&record, &latest);
        info!(%drift, "Compared committed constraint with supported versions");

        self.checkpoint("write")?;
        let updated = write_constraint(&snapshot, &latest, &self.writer)?;

        Ok(Plan {
            snapshot,
            record,
            latest,
            drift,
            updated,
        })
    }

    /// @acp:summary "Execute one run and keep the intermediate results"
    pub fn run(&self) -> RunOutcome {
        let mut outcome = RunOutcome {
            result: RunResult::NoChangeNeeded,
            drift: None,
            latest: None,
        };

        outcome.result = match self.plan() {
            Ok(plan) => {
                outcome.drift = Some(plan.drift.clone());
                outcome.latest = Some(plan.latest.clone());
                self.finish(plan)
            }
            Err(e) => RunResult::Failed(e),
        };

        match &outcome.result {
            RunResult::NoChangeNeeded => info!("Constraint already matches supported versions"),
            RunResult::Updated(id) => info!(change = %id, "Constraint updated"),
            RunResult::Failed(e) => error!(kind = %e.kind(), cause = %e, "Run failed"),
        }
        outcome
    }

    /// @acp:summary "Execute one run"
    pub fn run_once(&self) -> RunResult {
        self.run().result
    }

    fn finish(&self, plan: Plan) -> RunResult {
        if !plan.changes_artifact() {
            return RunResult::NoChangeNeeded;
        }
        if let Err(e) = self.checkpoint("publish") {
            return RunResult::Failed(e);
        }

        let message = CommitMessage::for_update(&self.writer.variable, &plan.drift, &plan.latest);
        info!(destination = %self.publisher.describe(), "Publishing constraint update");
        match self.publisher.publish(&plan.snapshot, &plan.updated, &message) {
            Ok(id) => RunResult::Updated(id),
            Err(e) => RunResult::Failed(e),
        }
    }
}

/// @acp:summary "Machine-readable summary of a run, for CI output and alerting"
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub supported: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn from_outcome(outcome: &RunOutcome) -> Self {
        let (commit, error_kind, error) = match &outcome.result {
            RunResult::NoChangeNeeded => (None, None, None),
            RunResult::Updated(id) => (Some(id.clone()), None, None),
            RunResult::Failed(e) => (None, Some(e.kind()), Some(e.to_string())),
        };
        let (added, removed): (Vec<String>, Vec<String>) = outcome
            .drift
            .as_ref()
            .map(|d| {
                (
                    d.added.iter().map(ToString::to_string).collect(),
                    d.removed.iter().map(ToString::to_string).collect(),
                )
            })
            .unwrap_or_default();
        let supported: Vec<String> = outcome
            .latest
            .as_ref()
            .map(|l| l.iter().map(ToString::to_string).collect())
            .unwrap_or_default();

        Self {
            outcome: outcome.result.label(),
            commit,
            added,
            removed,
            supported,
            error_kind,
            error,
            finished_at: Utc::now(),
        }
    }
}
