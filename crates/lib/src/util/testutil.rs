//! Test utilities for stagecraft-lib.
//!
//! Cross-platform shell helpers plus a [`RecordingRunner`] that captures
//! invocations instead of spawning processes.

use std::sync::{Mutex, PoisonError};

use crate::execute::process::{Invocation, ProcessOutput, ProcessRunner};
use crate::execute::types::ExecuteError;

/// Returns the shell command and args to execute a shell script.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), script.to_string()])
}

#[cfg(windows)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("cmd.exe", vec!["/C".to_string(), script.to_string()])
}

/// Runner that records every invocation and replies with a fixed output.
pub struct RecordingRunner {
  reply: ProcessOutput,
  calls: Mutex<Vec<Invocation>>,
}

impl RecordingRunner {
  pub fn new(reply: ProcessOutput) -> Self {
    Self {
      reply,
      calls: Mutex::new(Vec::new()),
    }
  }

  /// Exit code 0 with the given stdout.
  pub fn succeeding(stdout: &[u8]) -> Self {
    Self::new(ProcessOutput {
      code: Some(0),
      stdout: stdout.to_vec(),
      stderr: Vec::new(),
    })
  }

  pub fn invocations(&self) -> Vec<Invocation> {
    self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }
}

impl ProcessRunner for RecordingRunner {
  async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ExecuteError> {
    self
      .calls
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push(invocation.clone());
    Ok(self.reply.clone())
  }
}
