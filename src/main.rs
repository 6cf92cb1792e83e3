#![forbid(unsafe_code)]
//! version-gate Command Line Interface

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use version_gate::commands::{
    execute_check, execute_gate, execute_init, execute_run, execute_schedule, execute_show,
    execute_update, CheckOptions, GateOptions, InitOptions, RunOptions, ScheduleOptions,
    ShowOptions, UpdateOptions,
};
use version_gate::Config;

#[derive(Parser)]
#[command(name = "version-gate")]
#[command(about = "Keep a Terraform EKS module's cluster_version allow-list on standard support")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true, default_value = ".version-gate.json")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Repository root (overrides publish.repo)
    #[arg(long, global = true, env = "VERSION_GATE_REPO")]
    repo: Option<PathBuf>,

    /// Branch to read and publish (overrides publish.branch)
    #[arg(long, global = true, env = "VERSION_GATE_BRANCH")]
    branch: Option<String>,

    /// Variables file relative to the repository root (overrides module.variablesPath)
    #[arg(long, global = true, env = "VERSION_GATE_VARIABLES")]
    variables: Option<PathBuf>,

    /// Support-status endpoint (overrides source.url)
    #[arg(long, global = true, env = "VERSION_GATE_SOURCE_URL")]
    source_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Run the pipeline once and publish any update
    Run {
        /// Read release data from a local JSON file
        #[arg(long)]
        source_file: Option<PathBuf>,

        /// Commit locally without pushing
        #[arg(long)]
        no_push: bool,

        /// Output a JSON run report
        #[arg(long)]
        json: bool,
    },

    /// Report drift and preview the rewrite without publishing
    Check {
        /// Read release data from a local JSON file
        #[arg(long)]
        source_file: Option<PathBuf>,

        /// Read the variables file from disk instead of git
        #[arg(long)]
        workdir: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rewrite the variables file on disk without committing
    Update {
        /// Variables file to patch
        file: Option<PathBuf>,

        /// Read release data from a local JSON file
        #[arg(long)]
        source_file: Option<PathBuf>,

        /// Output a JSON run report
        #[arg(long)]
        json: bool,
    },

    /// Print the committed allow-list
    Show {
        /// Read the variables file from disk instead of git
        #[arg(long)]
        workdir: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a cluster_version against the allow-list
    Gate {
        /// Version to check
        #[arg(long, conflicts_with = "tfvars")]
        cluster_version: Option<String>,

        /// Module inputs as .tfvars.json
        #[arg(long)]
        tfvars: Option<PathBuf>,

        /// Variables file to read
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Run the pipeline on a recurring cadence
    Schedule {
        /// Seconds between runs (overrides schedule.intervalSecs)
        #[arg(long)]
        interval: Option<u64>,

        /// Read release data from a local JSON file
        #[arg(long)]
        source_file: Option<PathBuf>,

        /// Output a JSON run report per run
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Load config
    let mut config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };
    if let Some(repo) = cli.repo {
        config.publish.repo = repo;
    }
    if let Some(branch) = cli.branch {
        config.publish.branch = branch;
    }
    if let Some(variables) = cli.variables {
        config.module.variables_path = variables;
    }
    if let Some(url) = cli.source_url {
        config.source.url = url;
    }

    let code = match cli.command {
        Commands::Init { force } => {
            execute_init(
                InitOptions {
                    path: cli.config,
                    force,
                },
                &config,
            )?;
            0
        }

        Commands::Run {
            source_file,
            no_push,
            json,
        } => {
            if no_push {
                config.publish.push = false;
            }
            execute_run(RunOptions { source_file, json }, &config)?
        }

        Commands::Check {
            source_file,
            workdir,
            json,
        } => execute_check(
            CheckOptions {
                source_file,
                workdir,
                json,
            },
            &config,
        )?,

        Commands::Update {
            file,
            source_file,
            json,
        } => execute_update(
            UpdateOptions {
                file,
                source_file,
                json,
            },
            &config,
        )?,

        Commands::Show { workdir, json } => {
            execute_show(ShowOptions { workdir, json }, &config)?;
            0
        }

        Commands::Gate {
            cluster_version,
            tfvars,
            file,
        } => execute_gate(
            GateOptions {
                cluster_version,
                tfvars,
                file,
            },
            &config,
        )?,

        Commands::Schedule {
            interval,
            source_file,
            json,
        } => {
            execute_schedule(
                ScheduleOptions {
                    interval: interval.map(Duration::from_secs),
                    source_file,
                    json,
                },
                config,
            )
            .await?
        }
    };

    std::process::exit(code);
}
