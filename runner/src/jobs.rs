use crate::{
    collector::{collect_input_files, list_matcher, CollectorError},
    config::{FailurePolicy, InvalidName, RunnerConfig},
    executors::{ExecutorError, Executors},
};
use globset::GlobMatcher;
use std::{
    fs::{self, Permissions},
    io,
    num::NonZeroUsize,
    ops::AddAssign,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    slice::Chunks,
};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

const SUBMIT_DIR: &str = "Sub";
const LOG_DIR: &str = "Log";

#[derive(Debug, Error)]
pub enum EmitError {
    #[error(transparent)]
    InvalidName(#[from] InvalidName),
    #[error("Failed to collect input files")]
    Collect(#[from] CollectorError),
    #[error("Failed to write {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        error: io::Error,
    },
    #[error("Failed to submit job {job}")]
    Submit {
        job: String,
        #[source]
        error: ExecutorError,
    },
}

/// Split `items` into consecutive groups of at most `size` elements, keeping their order
pub fn partition<T>(items: &[T], size: NonZeroUsize) -> Chunks<'_, T> {
    items.chunks(size.get())
}

/// A single chunk of input files of a sample
#[derive(Debug, Clone)]
pub struct Job<'a> {
    pub era: &'a str,
    pub sample: &'a str,
    pub index: usize,
    pub files: &'a [String],
}

impl Job<'_> {
    pub fn name(&self) -> String {
        format!("{}_{}", self.sample, self.index)
    }

    /// content of `{job}.list`, one input file per line
    pub fn render_file_list(&self) -> String {
        self.files.iter().fold(String::new(), |mut list, file| {
            list.push_str(file);
            list.push('\n');
            list
        })
    }

    /// content of `{job}.sh`
    pub fn render_script(&self, config: &RunnerConfig) -> String {
        format!(
            "#!/bin/bash\nsource {}\ncd {}\n{} {} {} {}\n",
            config.paths.environment.display(),
            config.paths.install.display(),
            config.analyzer.display(),
            self.sample,
            self.era,
            self.index
        )
    }

    /// content of `{job}.sub`, the descriptor handed to the scheduler
    pub fn render_descriptor(&self, script: &Path, log_dir: &Path, transfer: &Path) -> String {
        let name = self.name();
        let log_dir = log_dir.display();

        format!(
            "Universe = vanilla\n\
             Executable = {}\n\
             Output = {log_dir}/{name}.out\n\
             Error  = {log_dir}/{name}.err\n\
             Log    = {log_dir}/{name}.log\n\
             should_transfer_files = YES\n\
             when_to_transfer_output = ON_EXIT\n\
             transfer_input_files = {}\n\
             queue 1\n",
            script.display(),
            transfer.display()
        )
    }
}

/// Counters of a single `create_jobs` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobSummary {
    pub input_files: usize,
    pub written: usize,
    pub submitted: usize,
    pub failed: usize,
}

impl AddAssign for JobSummary {
    fn add_assign(&mut self, other: Self) {
        self.input_files += other.input_files;
        self.written += other.written;
        self.submitted += other.submitted;
        self.failed += other.failed;
    }
}

fn write_file(path: &Path, content: &str) -> Result<(), EmitError> {
    fs::write(path, content).map_err(|error| EmitError::Write {
        path: path.to_path_buf(),
        error,
    })
}

fn create_dir(path: &Path) -> Result<PathBuf, EmitError> {
    fs::create_dir_all(path)
        .and_then(|()| fs::canonicalize(path))
        .map_err(|error| EmitError::Write {
            path: path.to_path_buf(),
            error,
        })
}

/// Writes the artifacts of every job of a sample and submits them
#[derive(Debug)]
pub struct JobEmitter<'a> {
    config: &'a RunnerConfig,
    executor: Executors,
    matcher: GlobMatcher,
}

impl<'a> JobEmitter<'a> {
    pub fn new(config: &'a RunnerConfig, executor: Executors) -> Result<Self, EmitError> {
        Ok(Self {
            config,
            executor,
            matcher: list_matcher(&config.list_extension)?,
        })
    }

    pub fn executor(&self) -> &Executors {
        &self.executor
    }

    /// Create, write and submit all jobs of `sample`
    ///
    /// Existing artifacts of a previous run are overwritten.
    #[instrument(skip(self, list_dir), level = "info")]
    pub fn create_jobs(
        &mut self,
        era: &str,
        sample: &str,
        list_dir: &Path,
        files_per_job: NonZeroUsize,
    ) -> Result<JobSummary, EmitError> {
        let output = self.config.sample_output_dir(era, sample)?;
        let submit_dir = create_dir(&output.join(SUBMIT_DIR))?;
        let log_dir = create_dir(&output.join(LOG_DIR))?;
        let transfer = self.config.era_config_path(era)?;

        let input_files = collect_input_files(list_dir, &self.matcher)?;
        info!(
            "Found {} input files for sample '{sample}'.",
            input_files.len()
        );

        let mut summary = JobSummary {
            input_files: input_files.len(),
            ..JobSummary::default()
        };

        for (index, files) in partition(&input_files, files_per_job).enumerate() {
            let job = Job {
                era,
                sample,
                index,
                files,
            };
            let name = job.name();

            write_file(
                &submit_dir.join(format!("{name}.list")),
                &job.render_file_list(),
            )?;

            let script = submit_dir.join(format!("{name}.sh"));
            write_file(&script, &job.render_script(self.config))?;
            fs::set_permissions(&script, Permissions::from_mode(0o755)).map_err(|error| {
                EmitError::Write {
                    path: script.clone(),
                    error,
                }
            })?;

            let descriptor = submit_dir.join(format!("{name}.sub"));
            write_file(
                &descriptor,
                &job.render_descriptor(&script, &log_dir, &transfer),
            )?;
            summary.written += 1;

            match self.executor.submit(&descriptor) {
                Ok(()) => summary.submitted += 1,
                Err(e) => match self.config.submit.on_failure {
                    FailurePolicy::Halt => {
                        error!(error = ?e, "Failed to submit {name}: {e}");

                        return Err(EmitError::Submit {
                            job: name,
                            error: e,
                        });
                    }
                    FailurePolicy::Continue => {
                        warn!(error = ?e, "Failed to submit {name}, continuing: {e}");
                        summary.failed += 1;
                    }
                },
            }
        }

        Ok(summary)
    }
}
