//! Types for target execution.
//!
//! This module defines the error types, result types, and configuration
//! for running a single target through the engine.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::execute::progress::Verbosity;
use crate::resource::ResourceError;
use crate::target::{BuilderKind, Target};
use crate::util::hash::ArgsDigest;

/// Errors that can occur while running a target.
#[derive(Debug, Error)]
pub enum ExecuteError {
  /// No executable is known for the builder.
  #[error("builder not found: {0}")]
  BuilderNotFound(BuilderKind),

  /// The flag interpreter could not produce an argument list.
  #[error("argument resolution failed: {0}")]
  ArgumentResolution(String),

  /// The builder process could not be started.
  #[error("failed to spawn {program}: {source}")]
  ProcessSpawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  /// The builder process exited unsuccessfully.
  #[error("{program} failed with exit code {code:?}")]
  ProcessExit {
    program: String,
    code: Option<i32>,
    stderr: String,
  },

  /// The target's inputs or outputs do not fit its builder's protocol.
  #[error("invalid target: {0}")]
  InvalidTarget(String),

  /// Resources could not be acquired.
  #[error("resource error: {0}")]
  Resource(#[from] ResourceError),

  /// I/O error while preparing inputs or writing outputs.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

impl ExecuteError {
  /// Captured error stream of a failed builder process.
  pub fn stderr(&self) -> Option<&str> {
    match self {
      ExecuteError::ProcessExit { stderr, .. } if !stderr.trim().is_empty() => Some(stderr),
      _ => None,
    }
  }

  /// Exit code of a failed builder process.
  pub fn exit_code(&self) -> Option<i32> {
    match self {
      ExecuteError::ProcessExit { code, .. } => *code,
      _ => None,
    }
  }
}

/// A target that could not be built.
///
/// This is the single failure value reported to the scheduler; the target
/// must not be considered fresh.
#[derive(Debug)]
pub struct BuildFailure {
  pub target: Target,
  pub error: ExecuteError,
}

impl BuildFailure {
  pub fn new(target: Target, error: ExecuteError) -> Self {
    Self { target, error }
  }
}

impl fmt::Display for BuildFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let context = self.target.context();
    write!(
      f,
      "failed to build {} for package {} ({}, way {}): {}",
      self.target.builder(),
      context.package,
      context.stage,
      context.way,
      self.error
    )?;
    if let Some(stderr) = self.error.stderr() {
      write!(f, "\n{}", stderr.trim_end())?;
    }
    Ok(())
  }
}

impl std::error::Error for BuildFailure {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    Some(&self.error)
  }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct BuildReport {
  /// The argument digest differed from the recorded one (or none existed).
  pub stale: bool,

  /// Digest now recorded for the target.
  pub digest: ArgsDigest,

  /// A stream-capturing protocol rewrote its output file.
  pub wrote_output: bool,
}

/// Configuration threaded into the engine at construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// How much progress to report.
  pub verbosity: Verbosity,

  /// Root that archive extraction resolves its input against.
  pub top_dir: PathBuf,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      verbosity: Verbosity::Normal,
      top_dir: PathBuf::from("."),
    }
  }
}
