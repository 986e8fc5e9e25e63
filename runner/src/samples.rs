use std::{fs, io, path::Path};
use tracing::{debug, error};

/// split a list file into its non-empty, trimmed lines
pub fn parse_lines(content: &str) -> impl Iterator<Item = &str> {
    content.lines().map(str::trim).filter(|line| !line.is_empty())
}

/// Read the samples of an era from `{list_dir}/{era}.list`
///
/// A missing list is reported and treated as an era without samples.
#[tracing::instrument(level = "debug")]
pub fn load_samples(list_dir: &Path, era: &str) -> Result<Vec<String>, io::Error> {
    let list_path = list_dir.join(format!("{era}.list"));

    if !list_path.is_file() {
        error!(path = ?list_path, "Sample list file not found");

        return Ok(Vec::new());
    }

    let samples: Vec<String> = parse_lines(&fs::read_to_string(&list_path)?)
        .map(String::from)
        .collect();

    debug!(era = era, "Found {} samples", samples.len());

    Ok(samples)
}
