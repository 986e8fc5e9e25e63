use crate::samples::parse_lines;
use globset::{GlobBuilder, GlobMatcher};
use ignore::{DirEntry, WalkBuilder};
use itertools::Itertools;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Input directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),
    #[error("List extension does not form a valid glob")]
    InvalidGlob(#[from] globset::Error),
    #[error("Failed to search for input lists")]
    Walk(#[from] ignore::Error),
    #[error("Failed to read input list {}", .0.display())]
    Read(PathBuf, #[source] io::Error),
}

/// build a matcher for `*.{extension}` file names
pub fn list_matcher(extension: &str) -> Result<GlobMatcher, CollectorError> {
    Ok(GlobBuilder::new(&format!("*.{extension}"))
        .literal_separator(true)
        .build()?
        .compile_matcher())
}

/// find all list files directly inside `dir`, ordered by file name
pub fn find_lists(dir: &Path, matcher: &GlobMatcher) -> Result<Vec<PathBuf>, CollectorError> {
    if !dir.is_dir() {
        return Err(CollectorError::MissingDirectory(dir.to_path_buf()));
    }

    let mut builder = WalkBuilder::new(dir);
    // hidden and ignored files are list files like any other
    builder
        .standard_filters(false)
        .max_depth(Some(1))
        .sort_by_file_name(|a, b| a.cmp(b));

    let lists = builder
        .build()
        .filter_ok(|entry| entry.file_type().map_or(false, |kind| kind.is_file()))
        .filter_ok(|entry| matcher.is_match(entry.file_name()))
        .map_ok(DirEntry::into_path)
        .collect::<Result<Vec<_>, _>>()?;

    debug!(dir = ?dir, "Found {} input lists", lists.len());

    Ok(lists)
}

/// Collect the input files of a sample from every list file in `dir`
///
/// Lists are read in file name order and their non-empty lines are concatenated.
#[tracing::instrument(level = "debug", skip(matcher))]
pub fn collect_input_files(
    dir: &Path,
    matcher: &GlobMatcher,
) -> Result<Vec<String>, CollectorError> {
    let mut input_files = Vec::new();

    for list in find_lists(dir, matcher)? {
        let content =
            fs::read_to_string(&list).map_err(|e| CollectorError::Read(list.clone(), e))?;
        let lines = parse_lines(&content).map(String::from).collect_vec();

        trace!(list = ?list, "Read {} input files", lines.len());
        input_files.extend(lines);
    }

    Ok(input_files)
}
