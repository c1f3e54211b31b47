//! Launching the ripping executable in robot mode

use crate::robot::decoder::RobotParser;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::io::BufReader;
use tokio::process::{Child, ChildStdout, Command};
use tracing::debug;

/// Arguments passed ahead of every caller-supplied argument.
///
/// Fingerprints are derived from the titles the tool reports, and that set
/// depends on the minimum title length. The length is pinned to the tool's
/// own default so that every invocation sees the same titles.
pub const DEFAULT_ARGS: [&str; 4] = [
    "--minlength=120",
    "--robot",
    "--messages=-stdout",
    "--progress=-same",
];

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to start {executable}: {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Process has not been started")]
    NotStarted,
    #[error("Process stdout is not available")]
    NoStdout,
    #[error("{executable} exited with {status}")]
    Failed { executable: String, status: ExitStatus },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One invocation of the ripping tool
pub struct RobotProcess {
    executable: PathBuf,
    args: Vec<String>,
    child: Option<Child>,
}

impl RobotProcess {
    pub fn new(executable: impl Into<PathBuf>, args: &[String]) -> Self {
        let args = DEFAULT_ARGS
            .iter()
            .map(|arg| arg.to_string())
            .chain(args.iter().cloned())
            .collect();
        RobotProcess {
            executable: executable.into(),
            args,
            child: None,
        }
    }

    /// Full argument list, including the defaults
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Spawn the tool and hand back a parser over its stdout
    pub fn start(&mut self) -> Result<RobotParser<BufReader<ChildStdout>>, ProcessError> {
        debug!("Starting {} {:?}", self.executable.display(), self.args);
        let mut child = Command::new(&self.executable)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                executable: self.executable.display().to_string(),
                source,
            })?;
        let stdout = child.stdout.take().ok_or(ProcessError::NoStdout)?;
        self.child = Some(child);
        Ok(RobotParser::new(BufReader::new(stdout)))
    }

    /// Wait for the tool to exit; a non-zero exit is an error
    pub async fn wait(&mut self) -> Result<ExitStatus, ProcessError> {
        let child = self.child.as_mut().ok_or(ProcessError::NotStarted)?;
        let status = child.wait().await?;
        if status.success() {
            Ok(status)
        } else {
            Err(ProcessError::Failed {
                executable: self.executable.display().to_string(),
                status,
            })
        }
    }

    pub async fn kill(&mut self) -> Result<(), ProcessError> {
        let child = self.child.as_mut().ok_or(ProcessError::NotStarted)?;
        child.kill().await?;
        Ok(())
    }
}
