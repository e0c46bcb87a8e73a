//! Stdio transport for tool-server communication.
//!
//! Owns one child process and speaks newline-delimited JSON with it: one
//! document per line on stdin, one per line on stdout. Stderr is not part of
//! the protocol; it is drained in the background into the log and a short
//! tail buffer kept for startup diagnostics.

use crate::config::McpServerConfig;
use crate::error::McpError;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use wayfarer_types::preview;

/// Number of stderr lines retained for diagnostics.
const STDERR_TAIL_LINES: usize = 20;

/// How long `stop` waits for the stderr reader to reach end of stream.
const STDERR_DRAIN: Duration = Duration::from_millis(500);

/// Longest wire line echoed into debug logs.
const LOG_PREVIEW_BYTES: usize = 500;

/// A spawned server with its pipes.
struct RunningProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    stderr_task: JoinHandle<()>,
}

/// Line-delimited JSON channel to a single child process.
pub struct StdioTransport {
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    shutdown_timeout: Duration,
    process: Option<RunningProcess>,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
}

impl StdioTransport {
    /// Create a transport for `config`. Nothing is spawned until [`start`](Self::start).
    pub fn new(config: &McpServerConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            env: config.env.clone(),
            shutdown_timeout: Duration::from_millis(config.shutdown_timeout_ms),
            process: None,
            stderr_tail: Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES))),
        }
    }

    /// Spawn the process with all three standard streams piped.
    ///
    /// Calling this while the process is already running does nothing.
    pub fn start(&mut self) -> Result<(), McpError> {
        if self.process.is_some() {
            tracing::debug!("tool server '{}' already started", self.command);
            return Ok(());
        }

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| McpError::SpawnFailed {
                command: self.command.clone(),
                source,
            })?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = child.start_kill();
            return Err(McpError::Protocol(format!(
                "tool server '{}' spawned without piped stdio",
                self.command
            )));
        };

        let tail = Arc::clone(&self.stderr_tail);
        let label = self.command.clone();
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!("[{label} stderr] {line}");
                if let Ok(mut tail) = tail.lock() {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
        });

        tracing::info!(
            "started tool server '{}' (pid {:?})",
            self.command,
            child.id()
        );

        self.process = Some(RunningProcess {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            stderr_task,
        });
        Ok(())
    }

    /// Serialize `document` as a single line, write it and flush.
    pub async fn write_line<T: Serialize>(&mut self, document: &T) -> Result<(), McpError> {
        let process = self.process.as_mut().ok_or_else(|| McpError::NotRunning {
            name: self.command.clone(),
        })?;

        let mut line = serde_json::to_string(document)?;
        tracing::debug!("-> {}", preview(&line, LOG_PREVIEW_BYTES));
        line.push('\n');

        process.stdin.write_all(line.as_bytes()).await?;
        process.stdin.flush().await?;
        Ok(())
    }

    /// Read the next non-blank line from the process and parse it as JSON.
    ///
    /// Returns `Ok(None)` at end of stream. A line that is not valid JSON is
    /// reported as [`McpError::Decode`]; the stream stays usable afterwards.
    pub async fn read_line(&mut self) -> Result<Option<serde_json::Value>, McpError> {
        let process = self.process.as_mut().ok_or_else(|| McpError::NotRunning {
            name: self.command.clone(),
        })?;

        loop {
            let Some(line) = process.stdout.next_line().await? else {
                tracing::debug!("tool server '{}' closed stdout", self.command);
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            tracing::debug!("<- {}", preview(&line, LOG_PREVIEW_BYTES));
            return serde_json::from_str(&line)
                .map(Some)
                .map_err(|source| McpError::Decode { line, source });
        }
    }

    /// Whether the process was started and has not exited.
    #[cfg(test)]
    fn is_alive(&mut self) -> bool {
        match self.process.as_mut() {
            Some(process) => matches!(process.child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Last lines the process wrote to stderr, oldest first.
    pub fn stderr_tail(&self) -> Vec<String> {
        self.stderr_tail
            .lock()
            .map(|tail| tail.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Close stdin, wait for the process to exit within the grace period,
    /// then kill it if it is still alive.
    ///
    /// Safe to call at any time: before `start`, twice, or after a failure.
    pub async fn stop(&mut self) {
        let Some(process) = self.process.take() else {
            return;
        };
        let RunningProcess {
            mut child,
            stdin,
            stdout,
            mut stderr_task,
        } = process;

        // EOF on stdin is the graceful shutdown request for stdio servers
        drop(stdin);
        drop(stdout);

        match tokio::time::timeout(self.shutdown_timeout, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!("tool server '{}' exited ({status})", self.command);
            }
            Ok(Err(e)) => {
                tracing::warn!("failed to wait for tool server '{}': {e}", self.command);
            }
            Err(_) => {
                tracing::warn!(
                    "tool server '{}' did not exit within {}ms, killing",
                    self.command,
                    self.shutdown_timeout.as_millis()
                );
                if let Err(e) = child.kill().await {
                    tracing::warn!("failed to kill tool server '{}': {e}", self.command);
                }
            }
        }

        // A grandchild can hold stderr open after the server itself exits
        if tokio::time::timeout(STDERR_DRAIN, &mut stderr_task).await.is_err() {
            stderr_task.abort();
        }
    }
}
