use std::path::{Path, PathBuf};
use tracing::info;

/// Executor that only records the descriptors it was given
#[derive(Clone, Debug, Default)]
pub struct DryExecutor {
    submitted: Vec<PathBuf>,
}

impl DryExecutor {
    pub fn submit(&mut self, descriptor: &Path) {
        info!("Would submit {}", descriptor.to_string_lossy());

        self.submitted.push(descriptor.to_path_buf());
    }

    pub fn submitted(&self) -> &[PathBuf] {
        &self.submitted
    }
}
