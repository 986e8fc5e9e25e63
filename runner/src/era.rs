use crate::config::DEFAULT_FILES_PER_JOB;
use serde_json::{Map, Value};
use std::{
    fs, io,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info};

const PROCESSING: &str = "Processing";
const FILES_PER_JOB: &str = "FilesPerJob";

#[derive(Debug, Error)]
pub enum EraConfigError {
    #[error("Era config not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to access era config")]
    Io(#[from] io::Error),
    #[error("Era config is not valid JSON")]
    Json(#[from] serde_json::Error),
    #[error("Era config has an unexpected layout: {0}")]
    Layout(&'static str),
}

fn read(path: &Path) -> Result<Value, EraConfigError> {
    if !path.is_file() {
        return Err(EraConfigError::NotFound(path.to_path_buf()));
    }

    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

/// Set `Processing.FilesPerJob` of the era config at `path`, the file is rewritten in place
#[tracing::instrument(level = "debug")]
pub fn update_files_per_job(path: &Path, files_per_job: usize) -> Result<(), EraConfigError> {
    let mut config = read(path)?;

    let root = config
        .as_object_mut()
        .ok_or(EraConfigError::Layout("top level must be an object"))?;
    let processing = root
        .entry(PROCESSING)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or(EraConfigError::Layout("Processing must be an object"))?;

    processing.insert(FILES_PER_JOB.to_owned(), Value::from(files_per_job));

    let mut serialized = serde_json::to_string_pretty(&config)?;
    serialized.push('\n');
    fs::write(path, serialized)?;

    info!(path = ?path, "Set {FILES_PER_JOB} to {files_per_job}");

    Ok(())
}

/// Read `Processing.FilesPerJob` from the era config at `path`
pub fn files_per_job(path: &Path) -> Result<Option<usize>, EraConfigError> {
    let config = read(path)?;

    match config.get(PROCESSING).and_then(|value| value.get(FILES_PER_JOB)) {
        None => {
            debug!(path = ?path, "No {PROCESSING}.{FILES_PER_JOB} in era config");

            Ok(None)
        }
        Some(value) => value
            .as_u64()
            .filter(|number| *number > 0)
            .and_then(|number| usize::try_from(number).ok())
            .map(Some)
            .ok_or(EraConfigError::Layout(
                "Processing.FilesPerJob must be a positive integer",
            )),
    }
}

/// Decide the number of files per job of an era
///
/// A requested value is written into the era config, otherwise the era config
/// is consulted with `DEFAULT_FILES_PER_JOB` as fallback.
pub fn resolve_files_per_job(
    path: &Path,
    requested: Option<NonZeroUsize>,
) -> Result<NonZeroUsize, EraConfigError> {
    match requested {
        Some(files_per_job) => {
            update_files_per_job(path, files_per_job.get())?;

            Ok(files_per_job)
        }
        None => Ok(files_per_job(path)?
            .and_then(NonZeroUsize::new)
            .unwrap_or(DEFAULT_FILES_PER_JOB)),
    }
}
