//! External process invocation.
//!
//! Every collaborator binary (`sadf`, `bzip2`, `xz`, the renderer) is run
//! through [`ToolRunner`] so tests can substitute a deterministic double.

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Longest stderr excerpt carried in a [`ToolError::Failed`].
const STDERR_EXCERPT_LEN: usize = 512;

/// Errors from invoking an external tool.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("spawning {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} did not finish within {timeout:?}")]
    Timeout { tool: String, timeout: Duration },

    #[error("{tool} failed ({status}): {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },
}

impl ToolError {
    /// Name of the tool that failed.
    pub fn tool(&self) -> &str {
        match self {
            Self::Spawn { tool, .. } | Self::Timeout { tool, .. } | Self::Failed { tool, .. } => {
                tool
            }
        }
    }

    /// Whether the tool ran to completion and reported failure itself.
    pub fn is_exit_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Runs an external tool with arguments and optional stdin, returning stdout.
pub trait ToolRunner: Send + Sync + 'static {
    fn invoke(
        &self,
        tool: &str,
        args: &[String],
        input: Option<Vec<u8>>,
    ) -> impl Future<Output = Result<Vec<u8>, ToolError>> + Send;
}

/// [`ToolRunner`] backed by real child processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl ToolRunner for ProcessRunner {
    async fn invoke(
        &self,
        tool: &str,
        args: &[String],
        input: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, ToolError> {
        let mut command = Command::new(tool);
        command
            .args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(tool, ?args, "invoking external tool");

        let mut child = command.spawn().map_err(|source| ToolError::Spawn {
            tool: tool.to_string(),
            source,
        })?;

        if let (Some(mut stdin), Some(input)) = (child.stdin.take(), input) {
            let name = tool.to_string();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&input).await {
                    tracing::debug!(tool = %name, error = %e, "writing tool stdin");
                }
            });
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ToolError::Timeout {
                tool: tool.to_string(),
                timeout: self.timeout,
            })?
            .map_err(|source| ToolError::Spawn {
                tool: tool.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(ToolError::Failed {
                tool: tool.to_string(),
                status: output.status.to_string(),
                stderr: stderr_excerpt(&output.stderr),
            });
        }

        Ok(output.stdout)
    }
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    match text.char_indices().nth(STDERR_EXCERPT_LEN) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> ProcessRunner {
        ProcessRunner::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_invoke_pipes_stdin_to_stdout() {
        let out = runner()
            .invoke("cat", &[], Some(b"hello sadf".to_vec()))
            .await
            .expect("cat succeeds");
        assert_eq!(out, b"hello sadf");
    }

    #[tokio::test]
    async fn test_invoke_passes_args() {
        let out = runner()
            .invoke("echo", &["-n".to_string(), "a;b".to_string()], None)
            .await
            .expect("echo succeeds");
        assert_eq!(out, b"a;b");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failed() {
        let err = runner().invoke("false", &[], None).await.unwrap_err();
        assert!(err.is_exit_failure());
        assert_eq!(err.tool(), "false");
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let err = runner()
            .invoke("sysreport-no-such-tool", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
        assert!(!err.is_exit_failure());
    }

    #[tokio::test]
    async fn test_slow_tool_times_out() {
        let runner = ProcessRunner::new(Duration::from_millis(100));
        let err = runner
            .invoke("sleep", &["5".to_string()], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
        assert!(err.to_string().contains("sleep"));
    }

    #[test]
    fn test_stderr_excerpt_truncates() {
        let long = "x".repeat(STDERR_EXCERPT_LEN + 10);
        let excerpt = stderr_excerpt(long.as_bytes());
        assert!(excerpt.ends_with("..."));
        assert_eq!(excerpt.len(), STDERR_EXCERPT_LEN + 3);
        assert_eq!(stderr_excerpt(b"  bad file\n"), "bad file");
    }
}
