use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::Error,
    num::NonZeroUsize,
    os::unix::fs::MetadataExt,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, error, warn};

/// number of input files per job if neither the command line nor the era config name one
pub const DEFAULT_FILES_PER_JOB: NonZeroUsize = match NonZeroUsize::new(50) {
    Some(value) => value,
    None => unreachable!(),
};

/// eras processed when none are given on the command line
pub const DEFAULT_ERAS: [&str; 4] = ["2016_postVFP", "2016_preVFP", "2017", "2018"];

// check if a file is executable
pub fn check_executable(path: &Path) -> Result<bool, ConfigErrors> {
    if !path.is_file() {
        Err(ConfigErrors::FileNotFound(path.to_path_buf()))
    } else {
        match File::open(path).map(|file| file.metadata()) {
            Ok(Ok(metadata)) => Ok((metadata.mode() & 0o111) != 0),
            Ok(Err(e)) | Err(e) => Err(ConfigErrors::Io(e)),
        }
    }
}

/// an era or sample name that can't be used as a single directory name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} name {name:?} must be a plain directory name")]
pub struct InvalidName {
    pub kind: &'static str,
    pub name: String,
}

/// Check that `name` stays a single path component once joined onto a base directory
pub fn check_name<'a>(kind: &'static str, name: &'a str) -> Result<&'a str, InvalidName> {
    if name.is_empty() || name == "." || name == ".." || name.contains(&['/', '\0'][..]) {
        Err(InvalidName {
            kind,
            name: name.to_owned(),
        })
    } else {
        Ok(name)
    }
}

#[derive(Error, Debug)]
pub enum ConfigErrors {
    #[error("Executor not supported: {0}")]
    UnsupportedExecutor(String),
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("Failed to access file")]
    Io(#[from] Error),
    #[error("Failed to parse runner config")]
    InvalidConfig(#[from] serde_yaml::Error),
    #[error("Runner config failed preflight checks")]
    PreflightFailed,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    #[serde(default)]
    pub paths: PathConfig,
    // analyzer binary, relative to `paths.install` on the worker node
    #[serde(default = "default_analyzer")]
    pub analyzer: PathBuf,
    // extension of the files listing the input files of a sample
    #[serde(default = "default_list_extension")]
    pub list_extension: String,
    #[serde(default)]
    pub submit: SubmitConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            paths: PathConfig::default(),
            analyzer: default_analyzer(),
            list_extension: default_list_extension(),
            submit: SubmitConfig::default(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields, default)]
pub struct PathConfig {
    // directory holding one `{era}.list` sample list per era
    pub sample_lists: PathBuf,
    // root of the per era and per sample input directories
    pub inputs: PathBuf,
    // root of the per era `config.json` files
    pub era_configs: PathBuf,
    // root of the generated Sub/ and Log/ directories
    pub output: PathBuf,
    // script sourced by every job before running the analyzer
    pub environment: PathBuf,
    // working directory of every job
    pub install: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            sample_lists: PathBuf::from("./list"),
            inputs: PathBuf::from("./../input"),
            era_configs: PathBuf::from("../input/config"),
            output: PathBuf::from("./output"),
            environment: PathBuf::from("./envset.sh"),
            install: PathBuf::from("./install"),
        }
    }
}

/// What to do once a single submission failed
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// abort the whole run
    #[default]
    Halt,
    /// log the failure and go on with the next job
    Continue,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields, default)]
pub struct SubmitConfig {
    // Name of the selected executor, see Executors::load for the selection process
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    // timeout in milliseconds, waits forever if unset
    pub timeout: Option<u64>,
    pub on_failure: FailurePolicy,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            name: String::from("condor"),
            command: String::from("condor_submit"),
            args: Vec::new(),
            timeout: None,
            on_failure: FailurePolicy::Halt,
        }
    }
}

impl RunnerConfig {
    /// load the runner config from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigErrors> {
        if !path.is_file() {
            return Err(ConfigErrors::FileNotFound(path.to_path_buf()));
        }

        let file = File::open(path)?;
        let config: Self = serde_yaml::from_reader(file)?;
        debug!(path = ?path, "Loaded runner config");

        Ok(config)
    }

    /// directory of the input list files of a single sample
    pub fn sample_input_dir(&self, era: &str, sample: &str) -> Result<PathBuf, InvalidName> {
        Ok(self
            .paths
            .inputs
            .join(check_name("era", era)?)
            .join(check_name("sample", sample)?))
    }

    /// path of the JSON config of an era, also shipped with every job
    pub fn era_config_path(&self, era: &str) -> Result<PathBuf, InvalidName> {
        Ok(self
            .paths
            .era_configs
            .join(check_name("era", era)?)
            .join("config.json"))
    }

    /// root of the generated artifacts of a single sample
    pub fn sample_output_dir(&self, era: &str, sample: &str) -> Result<PathBuf, InvalidName> {
        Ok(self
            .paths
            .output
            .join(check_name("era", era)?)
            .join(check_name("sample", sample)?))
    }

    /// Check the config for problems, returns true if any error was found
    pub fn preflight_checks(&self) -> bool {
        // attempt to catch all errors instead of piece-by-piece to make debugging easier for users
        let mut contains_error = false;

        if self.analyzer.as_os_str().is_empty() {
            error!("analyzer must not be empty");
            contains_error = true;
        }

        if self.list_extension.is_empty() {
            error!("list_extension must not be empty");
            contains_error = true;
        } else if self.list_extension.starts_with('.') {
            error!(
                "list_extension ({}) must be given without a leading dot",
                self.list_extension
            );
            contains_error = true;
        }

        if self.submit.name == "condor" && self.submit.command.trim().is_empty() {
            error!("submit.command must not be empty for the condor executor");
            contains_error = true;
        }

        if self.submit.timeout == Some(0) {
            error!("submit.timeout cannot be 0, leave it unset to wait for the submit command");
            contains_error = true;
        }

        // the paths below are only resolved on the worker nodes, so a miss is not fatal here
        if !self.paths.environment.is_file() {
            warn!(
                "Environment script {} not found locally, jobs might fail to set up",
                self.paths.environment.to_string_lossy()
            );
        }

        let analyzer = self.paths.install.join(&self.analyzer);
        match check_executable(&analyzer) {
            Ok(true) => {}
            Ok(false) => warn!(
                "Analyzer {} is not executable, this might cause problems",
                analyzer.to_string_lossy()
            ),
            Err(e) => warn!(
                "Failed to determine if the analyzer ({}) is an executable: {e}",
                analyzer.to_string_lossy()
            ),
        }

        contains_error
    }
}

fn default_analyzer() -> PathBuf {
    PathBuf::from("./bin/Analyzer")
}

fn default_list_extension() -> String {
    String::from("list")
}
