//! @acp:module "Schedule Command"
//! @acp:summary "Run the pipeline on a recurring cadence"
//! @acp:domain cli
//! @acp:layer handler
//!
//! Implements `version-gate schedule`. Each tick runs the blocking pipeline
//! on the blocking pool; Ctrl-C cancels an in-flight run at its next step
//! boundary and stops the loop.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use console::style;
use tokio::time::MissedTickBehavior;
use tracing::info;

use super::{build_source, print_outcome};
use crate::config::Config;
use crate::pipeline::{CancelFlag, Pipeline, RunOutcome};
use crate::publish::GitPublisher;
use crate::scheduler::{Scheduler, Trigger};
use crate::writer::WriterOptions;

/// Options for the schedule command
#[derive(Debug, Clone, Default)]
pub struct ScheduleOptions {
    /// Cadence override
    pub interval: Option<Duration>,
    /// Read release data from a local file instead of the API
    pub source_file: Option<PathBuf>,
    /// Print a JSON run report per run
    pub json: bool,
}

/// Execute the schedule command until interrupted
pub async fn execute_schedule(options: ScheduleOptions, config: Config) -> Result<i32> {
    let interval = options.interval.unwrap_or_else(|| config.schedule.interval());
    if interval.is_zero() {
        return Err(anyhow!("schedule interval must be greater than zero"));
    }

    let cancel = CancelFlag::new();
    let pipeline = Arc::new(
        Pipeline::new(
            build_source(&config, options.source_file.as_deref()),
            GitPublisher::from_config(&config),
            WriterOptions::from_config(&config.module),
        )
        .with_cancel(cancel.clone()),
    );
    let scheduler = Arc::new(Mutex::new(Scheduler::new(config.schedule.lock_file.clone())));

    println!(
        "{} Running every {}s (Ctrl-C to stop)",
        style("→").cyan(),
        interval.as_secs()
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
        }

        let mut job = {
            let pipeline = Arc::clone(&pipeline);
            let scheduler = Arc::clone(&scheduler);
            tokio::task::spawn_blocking(move || -> Result<RunOutcome> {
                let mut scheduler = scheduler
                    .lock()
                    .map_err(|_| anyhow!("scheduler state poisoned"))?;
                let mut details = (None, None);
                let result = scheduler.tick(Trigger::Cadence, || {
                    let outcome = pipeline.run();
                    details = (outcome.drift, outcome.latest);
                    outcome.result
                });
                Ok(RunOutcome {
                    result,
                    drift: details.0,
                    latest: details.1,
                })
            })
        };

        let (outcome, interrupted) = tokio::select! {
            joined = &mut job => (joined??, false),
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received; cancelling at the next step boundary");
                cancel.cancel();
                (job.await??, true)
            }
        };

        print_outcome(&outcome, options.json)?;
        if interrupted {
            break;
        }
    }

    info!("Scheduler stopped");
    Ok(0)
}
