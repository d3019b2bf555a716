//! exec-pool v0.1 — CLI wrapper around the library pool.
//!
//! A single `run` subcommand reads a pool configuration plus a list of Job
//! descriptors from a TOML file, submits every Job, and blocks until the
//! pool drains or the global deadline fires. Exit code 0 on clean drain,
//! 1 otherwise.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use exec_pool::{ExecPool, Job, JobBuilder, OnTimeout, PoolConfig};

#[derive(Debug, Parser)]
#[command(name = "exec-pool")]
#[command(about = "Multi-process execution pool with timeouts, a memory budget, and NUMA-aware affinity", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv); logs go to stderr.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit the Jobs described in a TOML file and wait for the pool to drain.
    Run {
        /// Path to a TOML file with a `[pool]` table and `[[job]]` entries.
        #[arg(long)]
        jobs_file: PathBuf,
    },
}

/// On-disk shape of a `--jobs-file`.
#[derive(Debug, Deserialize)]
struct JobsFile {
    #[serde(default)]
    pool: PoolConfig,
    /// Passed to `ExecPool::join`; 0 means no global deadline.
    #[serde(default)]
    global_timeout_s: f64,
    #[serde(default, rename = "job")]
    jobs: Vec<JobSpec>,
}

#[derive(Debug, Deserialize)]
struct JobSpec {
    name: String,
    #[serde(default)]
    argv: Vec<String>,
    workdir: Option<String>,
    #[serde(default)]
    timeout_s: f64,
    #[serde(default)]
    on_timeout: OnTimeoutSpec,
    category: Option<String>,
    size: Option<u64>,
    #[serde(default = "default_slowdown")]
    slowdown: f64,
    #[serde(default)]
    omit_affinity: bool,
}

fn default_slowdown() -> f64 {
    1.0
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum OnTimeoutSpec {
    #[default]
    Terminate,
    Restart,
}

fn build_job(spec: JobSpec) -> Result<Job> {
    let mut builder = JobBuilder::new(spec.name, spec.argv)
        .timeout_s(spec.timeout_s)
        .slowdown(spec.slowdown)
        .omit_affinity(spec.omit_affinity)
        .on_timeout(match spec.on_timeout {
            OnTimeoutSpec::Terminate => OnTimeout::Terminate,
            OnTimeoutSpec::Restart => OnTimeout::Restart,
        });
    if let Some(dir) = spec.workdir {
        builder = builder.workdir(dir);
    }
    if let Some(cat) = spec.category {
        builder = builder.category(cat);
    }
    if let Some(size) = spec.size {
        builder = builder.size(size);
    }
    Ok(builder.build()?)
}

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    match try_main(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

fn try_main(cli: Cli) -> Result<bool> {
    match cli.command {
        Command::Run { jobs_file } => {
            let contents = std::fs::read_to_string(&jobs_file)
                .with_context(|| format!("reading jobs file {}", jobs_file.display()))?;
            let file: JobsFile = toml::from_str(&contents)
                .with_context(|| format!("parsing jobs file {}", jobs_file.display()))?;

            let mut pool = ExecPool::new(file.pool)?;
            for spec in file.jobs {
                let job = build_job(spec)?;
                pool.execute(job, false)?;
            }
            Ok(pool.join(file.global_timeout_s)?)
        }
    }
}
