//! Bounded invocation of the external agent process
//!
//! One invocation = one subprocess: prompt on stdin, final reply on stdout,
//! tool-usage trace on stderr. A global semaphore caps concurrent processes
//! (the agent host is memory-hungry) and a hard wall-clock timeout bounds
//! each call. The tool allow-list passed on the command line is a hard
//! capability boundary for the lifetime of the call.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::time::timeout;

/// External tool capabilities the agent process may use. Nothing outside
/// this list is enabled.
pub const ALLOWED_TOOLS: &[&str] = &[
    "mcp__db__execute_sql",
    "mcp__db__list_tables",
    "mcp__db__apply_migration",
    "mcp__stripe__*",
    "mcp__shippo__*",
];

#[derive(Clone)]
pub struct InvokerConfig {
    /// Program to launch (default: the agent CLI)
    pub command: String,
    /// Full argument vector. Empty for stub commands in tests.
    pub args: Vec<String>,
    /// Working directory, fixed so the process resolves its own tool config
    pub workdir: Option<PathBuf>,
    pub timeout: Duration,
    pub max_concurrent: usize,
}

impl InvokerConfig {
    /// Production configuration for the agent CLI.
    pub fn for_agent_cli(
        command: &str,
        workdir: &str,
        system_prompt_path: &str,
        timeout_secs: u64,
        max_concurrent: usize,
    ) -> Self {
        let mut args = vec![
            "--print".to_string(),
            "--output-format".to_string(),
            "text".to_string(),
            "--verbose".to_string(),
            "--allowedTools".to_string(),
            ALLOWED_TOOLS.join(","),
        ];

        // Inject the persona document when present; its absence is not fatal
        match std::fs::read_to_string(system_prompt_path) {
            Ok(system_prompt) if !system_prompt.trim().is_empty() => {
                args.push("--system-prompt".to_string());
                args.push(system_prompt);
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!(
                    "[INVOKER] system prompt not readable at {}: {}",
                    system_prompt_path,
                    e
                );
            }
        }

        Self {
            command: command.to_string(),
            args,
            workdir: Some(PathBuf::from(workdir)),
            timeout: Duration::from_secs(timeout_secs),
            max_concurrent,
        }
    }
}

/// Reply plus the stderr tool trace, retained for audit
pub struct AgentOutput {
    pub text: String,
    pub trace: String,
}

#[derive(Debug)]
pub enum InvokeError {
    /// Wall-clock deadline elapsed; the child was killed
    Timeout,
    /// Non-zero exit; stderr text is logged server-side, never shown to users
    Failed { exit_code: i32, stderr: String },
    Io(std::io::Error),
}

impl fmt::Display for InvokeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvokeError::Timeout => write!(f, "agent invocation timed out"),
            InvokeError::Failed { exit_code, stderr } => {
                write!(f, "agent exited with code {}: {}", exit_code, stderr)
            }
            InvokeError::Io(e) => write!(f, "agent process error: {}", e),
        }
    }
}

pub struct AgentInvoker {
    config: InvokerConfig,
    slots: Arc<Semaphore>,
}

impl AgentInvoker {
    pub fn new(config: InvokerConfig) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_concurrent));
        Self { config, slots }
    }

    /// Run one agent invocation. Blocks (async) until a slot frees, then
    /// until output is produced or the deadline elapses. One attempt, one
    /// outcome; retries are the caller's decision and none are made here.
    pub async fn invoke(&self, prompt: &str) -> Result<AgentOutput, InvokeError> {
        let _permit = match self.slots.acquire().await {
            Ok(p) => p,
            Err(_) => {
                // Semaphore is never closed while the invoker lives
                return Err(InvokeError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "invoker semaphore closed",
                )));
            }
        };

        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref workdir) = self.config.workdir {
            if workdir.exists() {
                cmd.current_dir(workdir);
            }
        }

        log::info!(
            "[INVOKER] launching {} (timeout: {}s, prompt: {} chars)",
            self.config.command,
            self.config.timeout.as_secs(),
            prompt.len()
        );

        let mut child = cmd.spawn().map_err(InvokeError::Io)?;
        let stdin = child.stdin.take();

        // The stdin write must sit inside the deadline too: a child that
        // never reads its input leaves write_all blocked once the prompt
        // exceeds the pipe buffer, and that stall counts against the same
        // wall clock as the wait.
        let run = async move {
            if let Some(mut stdin) = stdin {
                match stdin.write_all(prompt.as_bytes()).await {
                    Ok(()) => {}
                    // The child exited without reading; its output still decides the outcome
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                    Err(e) => return Err(e),
                }
                // Dropping stdin closes the pipe and lets the process run
            }
            child.wait_with_output().await
        };

        let output = match timeout(self.config.timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(InvokeError::Io(e)),
            Err(_) => {
                log::error!(
                    "[INVOKER] timed out after {}s, killing agent process",
                    self.config.timeout.as_secs()
                );
                // kill_on_drop reaps the child when the future is dropped
                return Err(InvokeError::Timeout);
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            log::error!(
                "[INVOKER] agent exited with code {}: {}",
                exit_code,
                stderr.trim()
            );
            return Err(InvokeError::Failed {
                exit_code,
                stderr: stderr.trim().to_string(),
            });
        }

        log::info!(
            "[INVOKER] agent replied ({} chars, {} chars of trace)",
            stdout.len(),
            stderr.len()
        );

        Ok(AgentOutput {
            text: stdout,
            trace: stderr,
        })
    }
}
