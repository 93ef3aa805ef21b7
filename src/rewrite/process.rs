//
//  process.rs
//  Component Graphs
//
//  Created by hak (tharun)
//

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::RewriterConfig;
use crate::graph::ComponentId;

use super::{QueryRewriter, RewriteError};

/// Environment variable that overrides the configured rewriter program.
pub const PROGRAM_ENV: &str = "PROMQL_PARSER";

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Runs an external rewriter executable once per query:
///
/// ```text
/// <program> [args..] --promql <query> --component_id <component>
/// ```
///
/// Anything on stderr, or a non-zero exit, rejects the query. The child is
/// killed if it has not exited by the deadline.
#[derive(Debug, Clone)]
pub struct ProcessRewriter {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ProcessRewriter {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
        }
    }

    /// Leading arguments passed before the query flags.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Build from config; `PROMQL_PARSER` wins over `rewriter.program`.
    pub fn from_config(config: &RewriterConfig) -> Self {
        let program = std::env::var_os(PROGRAM_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| config.program());
        Self::new(program, config.timeout()).with_args(config.args.clone())
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn spawn(&self, component_id: &ComponentId, query: &str) -> std::io::Result<Child> {
        Command::new(&self.program)
            .args(&self.args)
            .arg("--promql")
            .arg(query)
            .arg("--component_id")
            .arg(component_id.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
    }
}

impl QueryRewriter for ProcessRewriter {
    fn rewrite(&self, component_id: &ComponentId, query: &str) -> Result<String, RewriteError> {
        let start = Instant::now();
        let deadline = start + self.timeout;
        let mut child = self.spawn(component_id, query)?;

        // Drain both pipes concurrently so a chatty child cannot block on a full pipe.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match wait_with_deadline(&mut child, deadline)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                warn!(
                    component = %component_id,
                    query,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "query rewrite timed out"
                );
                return Err(RewriteError::Timeout(self.timeout));
            }
        };

        // A process the rewriter left behind may still hold the pipes open.
        let (Some(stdout), Some(stderr)) = (collect(stdout, deadline), collect(stderr, deadline))
        else {
            warn!(
                component = %component_id,
                query,
                timeout_ms = self.timeout.as_millis() as u64,
                "rewriter output still open at deadline"
            );
            return Err(RewriteError::Timeout(self.timeout));
        };
        let stderr = stderr.trim();

        if !stderr.is_empty() || !status.success() {
            let detail = if stderr.is_empty() {
                format!("rewriter exited with {}", status)
            } else {
                stderr.to_string()
            };
            warn!(component = %component_id, query, error = %detail, "query rejected");
            return Err(RewriteError::Invalid(detail));
        }

        let rewritten = stdout.trim_end_matches(&['\n', '\r'][..]);
        if rewritten.trim().is_empty() {
            return Err(RewriteError::Invalid("rewriter returned no output".into()));
        }

        debug!(
            component = %component_id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "query rewritten"
        );
        Ok(rewritten.to_string())
    }
}

/// Poll the child until it exits or `deadline` passes. `None` means timed out.
fn wait_with_deadline(child: &mut Child, deadline: Instant) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<String>> {
    pipe.map(|mut pipe| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
        });
        rx
    })
}

/// Output of a drained pipe, or `None` if it is still open at `deadline`.
fn collect(output: Option<Receiver<String>>, deadline: Instant) -> Option<String> {
    let Some(output) = output else {
        return Some(String::new());
    };
    match output.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(text) => Some(text),
        Err(RecvTimeoutError::Timeout) => None,
        Err(RecvTimeoutError::Disconnected) => Some(String::new()),
    }
}
