mod collector;
mod config;
mod era;
mod executors;
mod jobs;
mod samples;

#[cfg(test)]
mod jobs_test;

use clap::Parser;
use config::{check_name, ConfigErrors, InvalidName, RunnerConfig, DEFAULT_ERAS};
use era::{resolve_files_per_job, EraConfigError};
use executors::Executors;
use jobs::{EmitError, JobEmitter, JobSummary};
use std::{io, num::NonZeroUsize, path::PathBuf, process::exit};
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Split the input files of every sample into HTCondor jobs and submit them
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// YAML runner config, built-in defaults are used if omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of input files per job, also written into each era config
    #[arg(short = 'n', long)]
    files_per_job: Option<NonZeroUsize>,

    /// Write all artifacts but don't submit anything
    #[arg(long)]
    dry_run: bool,

    /// Eras to process
    #[arg(value_parser = parse_era)]
    eras: Vec<String>,
}

fn parse_era(era: &str) -> Result<String, InvalidName> {
    check_name("era", era).map(String::from)
}

#[derive(Debug, Error)]
enum RunnerError {
    #[error(transparent)]
    Config(#[from] ConfigErrors),
    #[error(transparent)]
    EraConfig(#[from] EraConfigError),
    #[error(transparent)]
    InvalidName(#[from] InvalidName),
    #[error("Failed to read sample list")]
    Samples(#[from] io::Error),
    #[error(transparent)]
    Emit(#[from] EmitError),
}

fn run(cli: Cli) -> Result<(), RunnerError> {
    let mut config = match &cli.config {
        Some(path) => RunnerConfig::load(path)?,
        None => RunnerConfig::default(),
    };

    if cli.dry_run {
        config.submit.name = String::from("dry");
    }

    if config.preflight_checks() {
        return Err(ConfigErrors::PreflightFailed.into());
    }

    let eras = if cli.eras.is_empty() {
        DEFAULT_ERAS.iter().map(|era| era.to_string()).collect()
    } else {
        cli.eras
    };

    let executor = Executors::load(&config.submit)?;
    let mut emitter = JobEmitter::new(&config, executor)?;
    let mut total = JobSummary::default();

    for era in eras.iter() {
        let era_config = config.era_config_path(era)?;
        let files_per_job = match resolve_files_per_job(&era_config, cli.files_per_job) {
            Ok(files_per_job) => files_per_job,
            Err(EraConfigError::NotFound(path)) => {
                error!(
                    "Config file not found: {}, skipping era {era}",
                    path.to_string_lossy()
                );

                continue;
            }
            Err(e) => return Err(e.into()),
        };

        info!("Processing era {era} with {files_per_job} files per job");

        for sample in samples::load_samples(&config.paths.sample_lists, era)? {
            let list_dir = match config.sample_input_dir(era, &sample) {
                Ok(list_dir) => list_dir,
                Err(e) => {
                    error!("{e}, skipping it");

                    continue;
                }
            };

            total += emitter.create_jobs(era, &sample, &list_dir, files_per_job)?;
        }
    }

    info!(
        "Done with processing: {} input files, {} jobs written, {} submitted",
        total.input_files, total.written, total.submitted
    );

    if total.failed > 0 {
        warn!("{} jobs failed to submit", total.failed);
    }

    if let Executors::Dry(executor) = emitter.executor() {
        info!(
            "Dry run, {} jobs were not handed to the scheduler",
            executor.submitted().len()
        );
    }

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Cli::parse()) {
        error!(error = ?e, "{e}");

        exit(1)
    }
}
