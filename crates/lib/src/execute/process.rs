//! Builder process invocation.
//!
//! The engine never spawns processes directly; it hands an [`Invocation`] to
//! a [`ProcessRunner`]. [`SystemRunner`] is the real implementation on top of
//! `tokio::process`.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::execute::types::ExecuteError;

/// A fully resolved process call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub program: PathBuf,
  pub args: Vec<String>,
  /// Working directory override; `None` inherits the engine's.
  pub cwd: Option<PathBuf>,
  /// Bytes fed to the process on stdin; `None` means no stdin.
  pub stdin: Option<Vec<u8>>,
}

impl Invocation {
  pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
    Self {
      program: program.into(),
      args,
      cwd: None,
      stdin: None,
    }
  }

  pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
    self.cwd = Some(cwd.into());
    self
  }

  pub fn with_stdin(mut self, stdin: Vec<u8>) -> Self {
    self.stdin = Some(stdin);
    self
  }

  pub fn program_name(&self) -> String {
    self.program.display().to_string()
  }

  /// Shell-like rendering for progress and diagnostics.
  pub fn command_line(&self) -> String {
    let mut line = self.program_name();
    for arg in &self.args {
      line.push(' ');
      if arg.is_empty() || arg.contains(char::is_whitespace) {
        line.push_str(&format!("{:?}", arg));
      } else {
        line.push_str(arg);
      }
    }
    line
  }
}

/// What a finished process produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
  /// Exit code; `None` if the process was terminated by a signal.
  pub code: Option<i32>,
  pub stdout: Vec<u8>,
  pub stderr: Vec<u8>,
}

impl ProcessOutput {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }
}

/// Process-spawn primitive.
///
/// Implementations must terminate the child if the returned future is
/// dropped before completion.
pub trait ProcessRunner: Send + Sync {
  fn run(&self, invocation: &Invocation) -> impl Future<Output = Result<ProcessOutput, ExecuteError>> + Send;
}

/// Runs invocations as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
  async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ExecuteError> {
    let mut command = Command::new(&invocation.program);
    command
      .args(&invocation.args)
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .stdin(if invocation.stdin.is_some() {
        Stdio::piped()
      } else {
        Stdio::null()
      })
      // Cancelling the build must not leave the tool running.
      .kill_on_drop(true);

    if let Some(cwd) = &invocation.cwd {
      command.current_dir(cwd);
    }

    debug!(command = %invocation.command_line(), cwd = ?invocation.cwd, "spawning process");

    let mut child = command.spawn().map_err(|source| ExecuteError::ProcessSpawn {
      program: invocation.program_name(),
      source,
    })?;

    let stdin = child.stdin.take();
    let feed = async {
      if let (Some(mut pipe), Some(bytes)) = (stdin, invocation.stdin.as_deref()) {
        match pipe.write_all(bytes).await {
          // The tool may exit without reading all of its input.
          Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
          other => other?,
        }
      }
      Ok::<_, std::io::Error>(())
    };

    let (fed, output) = tokio::join!(feed, child.wait_with_output());
    let output = output?;
    fed?;

    let result = ProcessOutput {
      code: output.status.code(),
      stdout: output.stdout,
      stderr: output.stderr,
    };

    if !result.stderr.is_empty() {
      debug!(stderr = %String::from_utf8_lossy(&result.stderr), "process stderr");
    }

    Ok(result)
  }
}
