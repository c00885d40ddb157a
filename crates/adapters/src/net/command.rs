use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use domain::common::error::DomainError;
use ports::secondary::PortFuture;
use tokio::process::Command;
use tracing::debug;

/// Captured result of one external tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs host tools (`ip`, `tc`, `nsenter`, `bpftool`).
pub trait CommandRunner: Send + Sync {
    fn run<'a>(&'a self, program: &'a str, args: &'a [String]) -> PortFuture<'a, CommandOutput>;
}

/// `tokio::process` runner bounded by a per-invocation timeout.
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for ProcessRunner {
    fn run<'a>(&'a self, program: &'a str, args: &'a [String]) -> PortFuture<'a, CommandOutput> {
        Box::pin(async move {
            debug!(program, args = ?args, "exec");
            let mut cmd = Command::new(program);
            cmd.args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let output = tokio::time::timeout(self.timeout, cmd.output())
                .await
                .map_err(|_| {
                    DomainError::EngineError(format!(
                        "{program} timed out after {}s",
                        self.timeout.as_secs()
                    ))
                })?
                .map_err(|e| match e.kind() {
                    ErrorKind::NotFound => DomainError::ToolchainMissing(program.to_string()),
                    _ => DomainError::EngineError(format!("{program} spawn failed: {e}")),
                })?;

            Ok(CommandOutput {
                success: output.status.success(),
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        })
    }
}

/// Run and fail unless the tool exits zero.
pub async fn run_checked(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[String],
) -> Result<CommandOutput, DomainError> {
    let output = runner.run(program, args).await?;
    if output.success {
        Ok(output)
    } else {
        Err(DomainError::EngineError(format!(
            "{program} {} failed: {}",
            args.join(" "),
            output.stderr.trim()
        )))
    }
}

/// Run, treating a non-zero exit whose stderr mentions any of `benign` as
/// success.
pub async fn run_tolerant(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[String],
    benign: &[&str],
) -> Result<CommandOutput, DomainError> {
    let output = runner.run(program, args).await?;
    if output.success || benign.iter().any(|b| output.stderr.contains(b)) {
        Ok(output)
    } else {
        Err(DomainError::EngineError(format!(
            "{program} {} failed: {}",
            args.join(" "),
            output.stderr.trim()
        )))
    }
}

pub(crate) fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| (*s).to_string()).collect()
}
