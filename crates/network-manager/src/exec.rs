use std::process::{Output, Stdio};

/// Process execution, consumed as an opaque service so tests can record
/// and script command invocations.
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion, buffering stdout/stderr. The raw
    /// output is returned whatever the exit status; only a failure to
    /// launch is an error.
    async fn output(&self, program: &str, args: &[&str]) -> anyhow::Result<Output>;

    /// Run the command to completion, treating a non-zero exit as an error
    /// carrying the process's stderr.
    async fn run(&self, program: &str, args: &[&str]) -> anyhow::Result<Output> {
        let output = self.output(program, args).await?;
        if !output.status.success() {
            anyhow::bail!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim(),
            );
        }
        Ok(output)
    }
}

/// Runs commands on the host. The workspace cannot enable tokio's
/// `process` feature (https://github.com/tokio-rs/tokio/issues/3520), so
/// the blocking `std::process` API is driven from the blocking pool.
pub struct SystemRunner;

#[async_trait::async_trait]
impl CommandRunner for SystemRunner {
    async fn output(&self, program: &str, args: &[&str]) -> anyhow::Result<Output> {
        let mut command = std::process::Command::new(program);
        command.args(args).stdin(Stdio::null());

        tracing::debug!(%program, ?args, "running command");
        let output = tokio::task::spawn_blocking(move || command.output()).await??;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn output_returns_raw_result_for_failing_commands() {
        let output = SystemRunner.output("false", &[]).await.unwrap();
        assert!(!output.status.success());
    }

    #[tokio::test]
    async fn run_rejects_non_zero_exits() {
        let result = SystemRunner.run("false", &[]).await;
        assert!(result.is_err());

        let output = SystemRunner.run("echo", &["converged"]).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout), "converged\n");
    }
}
