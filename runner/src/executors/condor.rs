use super::ExecutorError;
use crate::config::SubmitConfig;
use std::{
    io::Read,
    path::Path,
    process::{Child, Command, ExitStatus, Stdio},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use tracing::{debug, info, instrument, trace};
use wait_timeout::ChildExt;

/// Executor that hands every descriptor to `condor_submit` (or a compatible command)
#[derive(Clone, Debug)]
pub struct CondorExecutor {
    command: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

/// read a captured pipe to the end on a separate thread, a broken pipe only loses log output
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut output = String::new();

        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_string(&mut output) {
                debug!("Failed to read output of submit command: {e}");
            }
        }

        output
    })
}

impl CondorExecutor {
    pub fn load(config: &SubmitConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            timeout: config.timeout.map(Duration::from_millis),
        }
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus, ExecutorError> {
        match self.timeout {
            None => Ok(child.wait()?),
            Some(timeout) => match child.wait_timeout(timeout)? {
                Some(status) => Ok(status),
                None => {
                    // child hasn't exited yet
                    child.kill()?;
                    child.wait()?;

                    Err(ExecutorError::Timeout(timeout))
                }
            },
        }
    }

    /// run the submit command for a single descriptor and wait for it
    #[instrument(skip(self), level = "debug")]
    pub fn submit(&self, descriptor: &Path) -> Result<(), ExecutorError> {
        let start = Instant::now();

        let mut child = Command::new(&self.command)
            .args(self.args.iter())
            .arg(descriptor)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| ExecutorError::Spawn {
                command: self.command.clone(),
                error,
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        // on timeout the readers are left behind, grandchildren may still hold the pipes
        let status = self.wait(&mut child)?;
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        debug!(
            "Finished in {} ms | status: {}",
            start.elapsed().as_millis(),
            status.success()
        );
        trace!("Output: {stdout}");

        if status.success() {
            info!("Submitted {}", descriptor.to_string_lossy());

            Ok(())
        } else {
            Err(ExecutorError::Rejected {
                status,
                stderr: stderr.trim().to_owned(),
            })
        }
    }
}
