//! Injectable subprocess runner, so decision logic can be unit-tested
//! without actually invoking a transcoder binary.
//!
//! Follows `mcp/transport.rs::StdioTransport::spawn`'s shape
//! (`tokio::process::Command` construction + spawn-error mapping).

use async_trait::async_trait;
use std::process::Stdio;

#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub success: bool,
    pub stderr: String,
}

/// Abstracts "run this binary with these args and tell me if it exited 0".
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, binary: &str, args: &[String]) -> CommandOutcome;
}

/// Real implementation: shells out via `tokio::process::Command`.
pub struct RealCommandRunner;

#[async_trait]
impl CommandRunner for RealCommandRunner {
    async fn run(&self, binary: &str, args: &[String]) -> CommandOutcome {
        let result = tokio::process::Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        match result {
            Ok(output) => CommandOutcome {
                success: output.status.success(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            },
            Err(e) => CommandOutcome {
                success: false,
                stderr: format!("failed to spawn '{}': {}", binary, e),
            },
        }
    }
}
