//! Runs the local project CLI for the CLI tools.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Sub-commands that get `--quiet` to keep output short.
const VERBOSE_COMMANDS: &[&str] = &["build", "compile", "docs", "parse", "run", "test", "list"];

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to start `{executable}`: {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read command output: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout: command took too long to complete.{}", selector_hint(.selectable))]
    Timeout { selectable: bool },
}

fn selector_hint(selectable: &bool) -> &'static str {
    if *selectable {
        " Try using a specific selector to narrow down the results."
    } else {
        ""
    }
}

/// One CLI call: sub-command arguments plus optional selection flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliInvocation {
    pub args: Vec<String>,
    /// Space separated selector, passed as `--select a b`
    pub selector: Option<String>,
    pub resource_types: Option<Vec<String>>,
    pub timeout: Option<Duration>,
    /// Whether a selector could narrow this command
    pub selectable: bool,
}

impl CliInvocation {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn selector(mut self, selector: Option<String>) -> Self {
        self.selector = selector.filter(|s| !s.trim().is_empty());
        self.selectable = true;
        self
    }

    pub fn resource_types(mut self, resource_types: Option<Vec<String>>) -> Self {
        self.resource_types = resource_types;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Full argument list handed to the executable.
    pub fn command_line(&self) -> Vec<String> {
        let mut args = self.args.clone();
        if let Some(selector) = &self.selector {
            args.push("--select".to_string());
            args.extend(selector.split(' ').filter(|s| !s.is_empty()).map(str::to_string));
        }
        if let Some(resource_types) = &self.resource_types {
            args.push("--resource-type".to_string());
            args.extend(resource_types.iter().cloned());
        }
        if args.first().is_some_and(|cmd| VERBOSE_COMMANDS.contains(&cmd.as_str())) {
            args.insert(1, "--quiet".to_string());
        }
        args
    }
}

#[derive(Debug, Clone)]
pub struct CliRunner {
    executable: String,
    project_dir: PathBuf,
}

impl CliRunner {
    pub fn new(executable: impl Into<String>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            project_dir: project_dir.into(),
        }
    }

    /// Run to completion and return stdout and stderr together, or `"OK"`
    /// when the command printed nothing.
    pub async fn run(&self, invocation: &CliInvocation) -> Result<String, CliError> {
        let args = invocation.command_line();
        info!("Running {} {}", self.executable, args.join(" "));

        let mut command = Command::new(&self.executable);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Relative paths would be resolved again by the CLI itself
        if self.project_dir.is_absolute() {
            command.current_dir(&self.project_dir);
        }

        let mut child = command.spawn().map_err(|source| CliError::Spawn {
            executable: self.executable.clone(),
            source,
        })?;
        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();

        let collect = async move {
            let output = read_merged(stdout.as_mut(), stderr.as_mut()).await?;
            child.wait().await?;
            Ok::<_, std::io::Error>(output)
        };

        let output = match invocation.timeout {
            Some(limit) => tokio::time::timeout(limit, collect).await.map_err(|_| CliError::Timeout {
                selectable: invocation.selectable,
            })??,
            None => collect.await?,
        };

        debug!("Command produced {} bytes", output.len());
        let text = String::from_utf8_lossy(&output).into_owned();
        if text.is_empty() {
            Ok("OK".to_string())
        } else {
            Ok(text)
        }
    }
}

/// Drain both pipes into one buffer in arrival order.
async fn read_merged<A, B>(mut out: Option<&mut A>, mut err: Option<&mut B>) -> std::io::Result<Vec<u8>>
where
    A: tokio::io::AsyncRead + Unpin,
    B: tokio::io::AsyncRead + Unpin,
{
    let mut merged = Vec::new();
    let mut out_buf = [0u8; 4096];
    let mut err_buf = [0u8; 4096];

    loop {
        match (out.as_deref_mut(), err.as_deref_mut()) {
            (None, None) => return Ok(merged),
            (Some(o), None) => {
                let n = o.read(&mut out_buf).await?;
                if n == 0 {
                    out = None;
                }
                merged.extend_from_slice(&out_buf[..n]);
            }
            (None, Some(e)) => {
                let n = e.read(&mut err_buf).await?;
                if n == 0 {
                    err = None;
                }
                merged.extend_from_slice(&err_buf[..n]);
            }
            (Some(o), Some(e)) => {
                tokio::select! {
                    read = o.read(&mut out_buf) => {
                        let n = read?;
                        if n == 0 {
                            out = None;
                        }
                        merged.extend_from_slice(&out_buf[..n]);
                    }
                    read = e.read(&mut err_buf) => {
                        let n = read?;
                        if n == 0 {
                            err = None;
                        }
                        merged.extend_from_slice(&err_buf[..n]);
                    }
                }
            }
        }
    }
}
