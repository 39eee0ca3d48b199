//! Command execution on the machine that owns the X display.
//!
//! [`LocalRunner`] runs programs directly with `DISPLAY` set.
//! [`SshRunner`] runs the same command line on a remote host through `ssh`.

use crate::{DesktopError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Captured output of a finished command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
    pub status: i32,
}

impl CommandOutput {
    /// Stdout decoded lossily as UTF-8
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Turn a non-zero exit into [`DesktopError::CommandFailed`].
    pub fn check(self, program: &str) -> Result<Self> {
        if self.status == 0 {
            Ok(self)
        } else {
            Err(DesktopError::CommandFailed {
                program: program.to_string(),
                status: self.status,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Runs a program against the target display.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;

    /// Where commands run, for logs
    fn describe(&self) -> String;
}

#[async_trait]
impl<R: CommandRunner + ?Sized> CommandRunner for Box<R> {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        (**self).run(program, args).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

async fn run_with_timeout(mut command: Command, program: &str, timeout: Duration) -> Result<CommandOutput> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, command.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            return Err(DesktopError::Spawn {
                program: program.to_string(),
                source,
            })
        }
        Err(_) => {
            return Err(DesktopError::Timeout {
                program: program.to_string(),
                timeout,
            })
        }
    };

    Ok(CommandOutput {
        stdout: output.stdout,
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        status: output.status.code().unwrap_or(-1),
    })
}

/// Runs commands on this machine.
#[derive(Debug, Clone)]
pub struct LocalRunner {
    display: String,
    timeout: Duration,
}

impl LocalRunner {
    pub fn new(display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl CommandRunner for LocalRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        debug!(display = %self.display, "{} {}", program, args.join(" "));
        let mut command = Command::new(program);
        command.args(args).env("DISPLAY", &self.display);
        run_with_timeout(command, program, self.timeout).await
    }

    fn describe(&self) -> String {
        format!("local display {}", self.display)
    }
}

/// Runs commands on a remote host over `ssh`.
#[derive(Debug, Clone)]
pub struct SshRunner {
    destination: String,
    display: String,
    timeout: Duration,
    ssh_options: Vec<String>,
}

impl SshRunner {
    pub fn new(destination: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            display: display.into(),
            timeout: Duration::from_secs(30),
            ssh_options: vec!["-o".to_string(), "BatchMode=yes".to_string()],
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Remote command line, quoted for the remote shell
    fn remote_command(&self, program: &str, args: &[String]) -> String {
        let mut line = format!("DISPLAY={} {}", shell_quote(&self.display), shell_quote(program));
        for arg in args {
            line.push(' ');
            line.push_str(&shell_quote(arg));
        }
        line
    }
}

#[async_trait]
impl CommandRunner for SshRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let remote = self.remote_command(program, args);
        debug!(host = %self.destination, "{}", remote);

        let mut command = Command::new("ssh");
        command
            .args(&self.ssh_options)
            .arg(&self.destination)
            .arg("--")
            .arg(remote);
        run_with_timeout(command, program, self.timeout).await
    }

    fn describe(&self) -> String {
        format!("{} display {}", self.destination, self.display)
    }
}

/// Single-quote a word for a POSIX shell.
pub fn shell_quote(word: &str) -> String {
    if !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_.,:/=+@%".contains(c))
    {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', r"'\''"))
}
