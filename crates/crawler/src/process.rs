//! External process invocation
//!
//! Crawlers never spawn processes directly; they describe the invocation as a
//! [`ProcessSpec`] and hand it to a [`ProcessRunner`], so tests can substitute
//! canned output for `git` and `cloc`.

use crate::{CrawlerError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// An external command to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl ProcessSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            timeout: None,
        }
    }

    pub fn current_dir(mut self, cwd: &Path) -> Self {
        self.cwd = Some(cwd.to_path_buf());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Command line for log and error messages
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when the process was terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external processes to completion
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run the process and capture its output
    ///
    /// A non-zero exit code is not an error here; callers decide how to treat
    /// it. Exceeding the timeout is an error and kills the process.
    async fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput>;
}

/// Runs processes on the host system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref cwd) = spec.cwd {
            command.current_dir(cwd);
        }

        let child = command.spawn().map_err(|source| CrawlerError::Spawn {
            command: spec.command_line(),
            source,
        })?;

        let output = match spec.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(output) => output?,
                Err(_) => {
                    return Err(CrawlerError::Timeout {
                        command: spec.command_line(),
                        secs: limit.as_secs(),
                    })
                }
            },
            None => child.wait_with_output().await?,
        };

        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Turn a finished process into an error unless it exited successfully
pub fn ensure_success(spec: &ProcessSpec, output: ProcessOutput) -> Result<ProcessOutput> {
    if output.success() {
        Ok(output)
    } else {
        Err(CrawlerError::Process {
            command: spec.command_line(),
            code: output.code,
            stderr: output.stderr.trim().to_string(),
        })
    }
}
