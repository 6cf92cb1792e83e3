//! @acp:module "Scheduler"
//! @acp:summary "Run-state machine and single-run lock for the trigger"
//! @acp:domain cli
//! @acp:layer service
//!
//! States: Idle -> Running -> Succeeded | Failed. Neither end state is
//! terminal; the next tick re-enters Running. An exclusive lock on a file
//! guarantees that at most one run is active across processes.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, info, warn};

use crate::error::{GateError, Result};
use crate::pipeline::RunResult;

/// @acp:summary "Scheduler run state"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// @acp:summary "What started a run"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Cadence,
    Manual,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Cadence => "cadence",
            Trigger::Manual => "manual",
        }
    }
}

/// @acp:summary "Drives runs and tracks their state"
#[derive(Debug)]
pub struct Scheduler {
    state: SchedulerState,
    lock_path: PathBuf,
    runs: u64,
    failures: u64,
}

impl Scheduler {
    pub fn new(lock_path: impl Into<PathBuf>) -> Self {
        Self {
            state: SchedulerState::Idle,
            lock_path: lock_path.into(),
            runs: 0,
            failures: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn runs(&self) -> u64 {
        self.runs
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// @acp:summary "Execute one run under the lock"
    ///
    /// If another run holds the lock the tick is skipped: the state is left
    /// as it was and `Failed(RunInProgress)` is returned.
    pub fn tick<F>(&mut self, trigger: Trigger, run: F) -> RunResult
    where
        F: FnOnce() -> RunResult,
    {
        let _lock = match RunLock::acquire(&self.lock_path) {
            Ok(lock) => lock,
            Err(e) => {
                warn!(trigger = trigger.as_str(), cause = %e, "Skipping run");
                return RunResult::Failed(e);
            }
        };

        self.state = SchedulerState::Running;
        self.runs += 1;
        info!(trigger = trigger.as_str(), run = self.runs, "Run started");

        let result = run();
        self.state = if result.is_success() {
            SchedulerState::Succeeded
        } else {
            self.failures += 1;
            SchedulerState::Failed
        };
        info!(state = ?self.state, outcome = result.label(), "Run finished");
        result
    }
}

/// @acp:summary "Exclusive run lock backed by an OS file lock"
///
/// The lock is an advisory exclusive lock on the file, held for the lifetime
/// of the value. The operating system releases it when the holder exits, so
/// a crashed run never leaves a lock behind. The file itself is left in
/// place; it only records the pid of the current holder.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == IoErrorKind::WouldBlock
                || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
            {
                return Err(GateError::RunInProgress {
                    lock: path.to_path_buf(),
                });
            }
            return Err(GateError::Io(e));
        }

        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        file.flush()?;
        debug!(lock = %path.display(), "Acquired run lock");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = self.file.set_len(0);
        let _ = FileExt::unlock(&self.file);
    }
}
