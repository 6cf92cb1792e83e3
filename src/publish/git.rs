//! @acp:module "Git Publisher"
//! @acp:summary "Commit and push constraint updates with git2"
//! @acp:domain cli
//! @acp:layer service
//!
//! When pushing is enabled the artifact is read from the remote branch tip
//! (freshly fetched), so every run starts from what is actually published.
//! The update is committed on top of that tip without moving any local
//! branch, pushed through a temporary ref without force, and only then
//! reflected in the local branch and working tree.

use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use git2::build::{CheckoutBuilder, TreeUpdateBuilder};
use git2::{
    Cred, CredentialType, ErrorCode, FetchOptions, FileMode, Oid, PushOptions, RemoteCallbacks,
    Repository, Signature,
};
use tracing::{debug, info, warn};

use super::{ChangePublisher, CommitMessage};
use crate::config::Config;
use crate::error::{GateError, Result};
use crate::registry::ArtifactSnapshot;

const PENDING_REF: &str = "refs/version-gate/pending";

/// @acp:summary "Publishes constraint updates to a git remote"
#[derive(Debug, Clone)]
pub struct GitPublisher {
    repo: PathBuf,
    /// Artifact path relative to the repository root
    artifact: PathBuf,
    remote: String,
    branch: String,
    author_name: String,
    author_email: String,
    push: bool,
    timeout: Duration,
}

impl GitPublisher {
    pub fn new(repo: impl Into<PathBuf>, artifact: impl Into<PathBuf>) -> Self {
        let defaults = Config::default().publish;
        let timeout = defaults.timeout();
        Self {
            repo: repo.into(),
            artifact: artifact.into(),
            remote: defaults.remote,
            branch: defaults.branch,
            author_name: defaults.author_name,
            author_email: defaults.author_email,
            push: defaults.push,
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            repo: config.publish.repo.clone(),
            artifact: config.module.variables_path.clone(),
            remote: config.publish.remote.clone(),
            branch: config.publish.branch.clone(),
            author_name: config.publish.author_name.clone(),
            author_email: config.publish.author_email.clone(),
            push: config.publish.push,
            timeout: config.publish.timeout(),
        }
    }

    pub fn with_remote(mut self, remote: impl Into<String>, branch: impl Into<String>) -> Self {
        self.remote = remote.into();
        self.branch = branch.into();
        self
    }

    pub fn with_push(mut self, push: bool) -> Self {
        self.push = push;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn local_ref(&self) -> String {
        format!("refs/heads/{}", self.branch)
    }

    fn tracking_ref(&self) -> String {
        format!("refs/remotes/{}/{}", self.remote, self.branch)
    }

    fn open(&self) -> Result<Repository> {
        Repository::open(&self.repo).map_err(|e| {
            GateError::Config(format!(
                "{} is not a git repository: {}",
                self.repo.display(),
                e.message()
            ))
        })
    }

    /// Tree path with forward slashes; must stay inside the repository.
    fn tree_path(&self) -> Result<String> {
        let mut parts = Vec::new();
        for component in self.artifact.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => {
                    return Err(GateError::Config(format!(
                        "artifact path {} must be relative to the repository root",
                        self.artifact.display()
                    )))
                }
            }
        }
        if parts.is_empty() {
            return Err(GateError::Config("artifact path is empty".to_string()));
        }
        Ok(parts.join("/"))
    }

    /// Fetch the remote branch and return its tip, `None` if it does not exist.
    fn fetch_remote_tip(&self) -> Result<Option<Oid>> {
        let this = self.clone();
        with_deadline(self.timeout, "fetch", move || {
            let repo = this.open()?;
            let mut remote = repo.find_remote(&this.remote).map_err(unavailable)?;
            let refspec = format!("+refs/heads/{}:{}", this.branch, this.tracking_ref());

            let mut options = FetchOptions::new();
            options.remote_callbacks(credential_callbacks(&repo)?);
            remote
                .fetch(&[refspec.as_str()], Some(&mut options), Some("version-gate: fetch"))
                .map_err(|e| {
                    GateError::PublishUnavailable(format!(
                        "fetch from {} failed: {}",
                        this.remote,
                        e.message()
                    ))
                })?;

            match repo.refname_to_id(&this.tracking_ref()) {
                Ok(id) => Ok(Some(id)),
                Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
                Err(e) => Err(unavailable(e)),
            }
        })
    }

    fn push_commit(&self, commit: Oid) -> Result<()> {
        let this = self.clone();
        with_deadline(self.timeout, "push", move || {
            let repo = this.open()?;
            repo.reference(PENDING_REF, commit, true, "version-gate: pending update")
                .map_err(unavailable)?;
            let result = this.push_pending(&repo);
            if let Ok(mut pending) = repo.find_reference(PENDING_REF) {
                let _ = pending.delete();
            }
            result
        })
    }

    fn push_pending(&self, repo: &Repository) -> Result<()> {
        let mut remote = repo.find_remote(&self.remote).map_err(unavailable)?;
        let refspec = format!("{}:{}", PENDING_REF, self.local_ref());

        let mut rejection: Option<String> = None;
        let outcome = {
            let mut callbacks = credential_callbacks(repo)?;
            callbacks.push_update_reference(|refname, status| {
                if let Some(status) = status {
                    rejection = Some(format!("{} rejected: {}", refname, status));
                }
                Ok(())
            });
            let mut options = PushOptions::new();
            options.remote_callbacks(callbacks);
            remote.push(&[refspec.as_str()], Some(&mut options))
        };

        match outcome {
            Err(e) if e.code() == ErrorCode::NotFastForward => Err(GateError::PublishConflict(
                format!("remote {} rejected a non-fast-forward update: {}", self.remote, e.message()),
            )),
            Err(e) => Err(GateError::PublishUnavailable(format!(
                "push to {} failed: {}",
                self.remote,
                e.message()
            ))),
            Ok(()) => match rejection {
                Some(reason) => Err(GateError::PublishConflict(reason)),
                None => Ok(()),
            },
        }
    }

    /// Move the local branch forward and refresh the working copy, when the
    /// branch still sits on the base the update was built from.
    fn sync_local(&self, repo: &Repository, base: Oid, commit: Oid) -> Result<()> {
        let local_ref = self.local_ref();
        match repo.refname_to_id(&local_ref) {
            Ok(tip) if tip == base => {}
            Ok(_) => {
                info!(branch = %self.branch, "Local branch is not at the published base; leaving it alone");
                return Ok(());
            }
            Err(_) => return Ok(()),
        }

        repo.reference(&local_ref, commit, true, "version-gate: fast-forward")
            .map_err(unavailable)?;

        let head_is_branch = repo
            .find_reference("HEAD")
            .ok()
            .and_then(|head| head.symbolic_target().map(|t| t == local_ref))
            .unwrap_or(false);
        if head_is_branch && !repo.is_bare() {
            let tree_path = self.tree_path()?;
            if self.workdir_has_local_edits(repo, base, &tree_path) {
                warn!(
                    path = %tree_path,
                    "Published, but the working copy has uncommitted edits; leaving it alone"
                );
                return Ok(());
            }
            let mut checkout = CheckoutBuilder::new();
            checkout.force().path(tree_path.as_str());
            if let Err(e) = repo.checkout_head(Some(&mut checkout)) {
                warn!(error = %e.message(), "Published, but refreshing the working copy failed");
            }
        }
        Ok(())
    }

    /// The working-tree file differs from the artifact committed at `base`.
    /// A missing file counts as unedited.
    fn workdir_has_local_edits(&self, repo: &Repository, base: Oid, tree_path: &str) -> bool {
        let Some(workdir) = repo.workdir() else {
            return false;
        };
        let on_disk = match std::fs::read(workdir.join(tree_path)) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        let committed = repo
            .find_commit(base)
            .and_then(|commit| commit.tree())
            .and_then(|tree| tree.get_path(Path::new(tree_path)))
            .and_then(|entry| repo.find_blob(entry.id()))
            .map(|blob| blob.content().to_vec());
        match committed {
            Ok(bytes) => bytes != on_disk,
            Err(_) => true,
        }
    }
}

impl ChangePublisher for GitPublisher {
    fn read_artifact(&self) -> Result<ArtifactSnapshot> {
        let tree_path = self.tree_path()?;
        let remote_tip = if self.push { self.fetch_remote_tip()? } else { None };

        let repo = self.open()?;
        let base = match remote_tip {
            Some(tip) => tip,
            None => repo.refname_to_id(&self.local_ref()).map_err(|e| {
                GateError::Config(format!("branch {} not found: {}", self.branch, e.message()))
            })?,
        };

        let commit = repo.find_commit(base).map_err(unavailable)?;
        let tree = commit.tree().map_err(unavailable)?;
        let entry = tree
            .get_path(Path::new(&tree_path))
            .map_err(|_| GateError::WriteTargetMissing {
                path: self.artifact.clone(),
            })?;
        let object = entry.to_object(&repo).map_err(unavailable)?;
        let blob = object
            .as_blob()
            .ok_or_else(|| GateError::malformed(&self.artifact, "tree entry is not a file"))?;
        let content = String::from_utf8(blob.content().to_vec())
            .map_err(|_| GateError::malformed(&self.artifact, "file is not valid UTF-8"))?;

        debug!(revision = %base, path = %tree_path, "Read committed constraint");
        Ok(ArtifactSnapshot {
            path: self.artifact.clone(),
            content,
            revision: base.to_string(),
        })
    }

    fn publish(&self, base: &ArtifactSnapshot, updated: &str, message: &CommitMessage) -> Result<String> {
        let base_id = Oid::from_str(&base.revision)
            .map_err(|e| GateError::Config(format!("invalid base revision: {}", e.message())))?;

        if self.push {
            if let Some(tip) = self.fetch_remote_tip()? {
                if tip != base_id {
                    return Err(GateError::PublishConflict(format!(
                        "{}/{} moved from {} to {} since it was read",
                        self.remote, self.branch, base_id, tip
                    )));
                }
            }
        } else {
            let tip = self.open()?.refname_to_id(&self.local_ref()).map_err(unavailable)?;
            if tip != base_id {
                return Err(GateError::PublishConflict(format!(
                    "branch {} moved from {} to {} since it was read",
                    self.branch, base_id, tip
                )));
            }
        }

        let repo = self.open()?;
        let parent = repo.find_commit(base_id).map_err(unavailable)?;
        let blob = repo.blob(updated.as_bytes()).map_err(unavailable)?;
        let tree_id = TreeUpdateBuilder::new()
            .upsert(self.tree_path()?, blob, FileMode::Blob)
            .create_updated(&repo, &parent.tree().map_err(unavailable)?)
            .map_err(unavailable)?;
        let tree = repo.find_tree(tree_id).map_err(unavailable)?;
        let signature =
            Signature::now(&self.author_name, &self.author_email).map_err(unavailable)?;

        let commit = repo
            .commit(None, &signature, &signature, &message.to_string(), &tree, &[&parent])
            .map_err(unavailable)?;
        debug!(commit = %commit, "Created commit");

        if self.push {
            self.push_commit(commit)?;
            repo.reference(&self.tracking_ref(), commit, true, "version-gate: published")
                .map_err(unavailable)?;
            info!(commit = %commit, remote = %self.remote, branch = %self.branch, "Pushed constraint update");
        } else {
            info!(commit = %commit, branch = %self.branch, "Committed constraint update (push disabled)");
        }

        self.sync_local(&repo, base_id, commit)?;
        Ok(commit.to_string())
    }

    fn describe(&self) -> String {
        format!("{} ({}/{})", self.repo.display(), self.remote, self.branch)
    }
}

fn unavailable(e: git2::Error) -> GateError {
    GateError::PublishUnavailable(e.message().to_string())
}

/// Credential helper for https, ssh-agent for ssh; gives up after a few
/// attempts instead of letting libgit2 retry forever.
fn credential_callbacks<'cb>(repo: &Repository) -> Result<RemoteCallbacks<'cb>> {
    let config = repo.config().map_err(unavailable)?;
    let mut attempts = 0;
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, username, allowed| {
        attempts += 1;
        if attempts > 3 {
            return Err(git2::Error::from_str("authentication failed"));
        }
        if allowed.contains(CredentialType::SSH_KEY) {
            Cred::ssh_key_from_agent(username.unwrap_or("git"))
        } else if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
            Cred::credential_helper(&config, url, username)
        } else {
            Cred::default()
        }
    });
    Ok(callbacks)
}

/// Run a network step on a worker thread and give up after `timeout`.
fn with_deadline<T, F>(timeout: Duration, step: &str, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(op());
    });
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(GateError::PublishUnavailable(format!(
            "{} timed out after {}s",
            step,
            timeout.as_secs()
        ))),
        Err(RecvTimeoutError::Disconnected) => Err(GateError::PublishUnavailable(format!(
            "{} worker exited without a result",
            step
        ))),
    }
}
