mod condor;
mod dry;

use crate::config::{ConfigErrors, SubmitConfig};
use std::{io, path::Path, process::ExitStatus, time::Duration};
use thiserror::Error;

pub use condor::CondorExecutor;
pub use dry::DryExecutor;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Failed to spawn submit command {command}")]
    Spawn {
        command: String,
        #[source]
        error: io::Error,
    },
    #[error("Failed to wait for the submit command")]
    Wait(#[from] io::Error),
    #[error("Submit command exited with {status}: {stderr}")]
    Rejected { status: ExitStatus, stderr: String },
    #[error("Submit command did not finish within {0:?}")]
    Timeout(Duration),
}

#[derive(Clone, Debug)]
pub enum Executors {
    Condor(CondorExecutor),
    Dry(DryExecutor),
}

impl Executors {
    pub fn load(config: &SubmitConfig) -> Result<Self, ConfigErrors> {
        match config.name.to_lowercase().as_str() {
            "condor" => Ok(Self::Condor(CondorExecutor::load(config))),
            "dry" => Ok(Self::Dry(DryExecutor::default())),
            _ => Err(ConfigErrors::UnsupportedExecutor(config.name.clone())),
        }
    }

    /// hand a submit descriptor to the scheduler
    pub fn submit(&mut self, descriptor: &Path) -> Result<(), ExecutorError> {
        match self {
            Self::Condor(executor) => executor.submit(descriptor),
            Self::Dry(executor) => {
                executor.submit(descriptor);

                Ok(())
            }
        }
    }
}
