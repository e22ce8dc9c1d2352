//! Builder protocol dispatch.
//!
//! Every builder is driven by one of four protocols (see [`Protocol`]). The
//! decision is made by [`plan_invocation`], a pure function of the target,
//! its resolved arguments, the tool path and the top-level directory; the
//! plan is then carried out by [`dispatch`].

use std::io;
use std::path::{Path, PathBuf};

use glob::Pattern;
use tokio::fs;
use tracing::debug;

use crate::consts::ARCHIVE_PATTERN;
use crate::execute::process::{Invocation, ProcessRunner};
use crate::execute::types::ExecuteError;
use crate::target::{Protocol, Target};

/// Which way an archiver target runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveMode {
  /// Create or update the archive named by the output.
  Create,
  /// Unpack the single input archive into the output directory.
  Extract,
}

/// Create mode for outputs that look like archives, extract otherwise.
pub fn archive_mode(output: &Path) -> ArchiveMode {
  let is_archive = Pattern::new(ARCHIVE_PATTERN)
    .map(|pattern| pattern.matches_path(output))
    .unwrap_or(false);
  if is_archive {
    ArchiveMode::Create
  } else {
    ArchiveMode::Extract
  }
}

/// A dispatch decision, before any I/O happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPlan {
  pub protocol: Protocol,
  pub invocation: Invocation,
  /// Set for archive extraction.
  pub archive_mode: Option<ArchiveMode>,
  /// Directory to create before running the tool.
  pub prepare_dir: Option<PathBuf>,
  /// File whose contents are fed on stdin.
  pub stdin_from: Option<PathBuf>,
  /// File that receives the captured stdout.
  pub capture_to: Option<PathBuf>,
}

impl DispatchPlan {
  fn new(protocol: Protocol, invocation: Invocation) -> Self {
    Self {
      protocol,
      invocation,
      archive_mode: None,
      prepare_dir: None,
      stdin_from: None,
      capture_to: None,
    }
  }
}

/// Decide how to invoke `tool` for `target`.
pub fn plan_invocation(target: &Target, args: &[String], tool: &Path, top_dir: &Path) -> Result<DispatchPlan, ExecuteError> {
  let protocol = target.builder().protocol();

  let plan = match protocol {
    Protocol::Archive => {
      let output = target.primary_output()?;
      match archive_mode(output) {
        ArchiveMode::Create => DispatchPlan {
          archive_mode: Some(ArchiveMode::Create),
          ..DispatchPlan::new(protocol, Invocation::new(tool, args.to_vec()))
        },
        ArchiveMode::Extract => {
          // The tool runs inside the output directory, so relative paths it is
          // handed would resolve against the wrong root.
          let archive = std::path::absolute(top_dir.join(target.single_input()?))?;
          let invocation = Invocation::new(
            program_for_cwd(tool)?,
            vec!["x".to_string(), archive.to_string_lossy().to_string()],
          )
          .with_cwd(output);
          DispatchPlan {
            archive_mode: Some(ArchiveMode::Extract),
            prepare_dir: Some(output.to_path_buf()),
            ..DispatchPlan::new(protocol, invocation)
          }
        }
      }
    }
    Protocol::CapturedStdout => DispatchPlan {
      capture_to: Some(target.primary_output()?.to_path_buf()),
      ..DispatchPlan::new(protocol, Invocation::new(tool, args.to_vec()))
    },
    Protocol::PipedCodegen => DispatchPlan {
      stdin_from: Some(target.single_input()?.to_path_buf()),
      capture_to: Some(target.primary_output()?.to_path_buf()),
      ..DispatchPlan::new(protocol, Invocation::new(tool, args.to_vec()))
    },
    Protocol::Generic => DispatchPlan::new(protocol, Invocation::new(tool, args.to_vec())),
  };

  Ok(plan)
}

/// Program path usable from a changed working directory.
///
/// Bare command names are left alone for `PATH` lookup.
fn program_for_cwd(tool: &Path) -> io::Result<PathBuf> {
  let is_bare = tool.parent().is_none_or(|parent| parent.as_os_str().is_empty());
  if tool.is_absolute() || is_bare {
    Ok(tool.to_path_buf())
  } else {
    std::path::absolute(tool)
  }
}

/// What a successful dispatch did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
  pub protocol: Protocol,
  pub archive_mode: Option<ArchiveMode>,
  /// The captured output file was written (its content changed).
  pub wrote_output: bool,
}

/// Run `target`'s builder according to its protocol.
pub async fn dispatch<R: ProcessRunner>(
  target: &Target,
  args: &[String],
  tool: &Path,
  top_dir: &Path,
  runner: &R,
) -> Result<DispatchOutcome, ExecuteError> {
  let plan = plan_invocation(target, args, tool, top_dir)?;
  execute_plan(plan, runner).await
}

/// Carry out a [`DispatchPlan`].
pub async fn execute_plan<R: ProcessRunner>(plan: DispatchPlan, runner: &R) -> Result<DispatchOutcome, ExecuteError> {
  let mut invocation = plan.invocation;

  if let Some(dir) = &plan.prepare_dir {
    fs::create_dir_all(dir).await?;
  }

  if let Some(input) = &plan.stdin_from {
    invocation.stdin = Some(fs::read(input).await?);
  }

  let output = runner.run(&invocation).await?;

  if !output.success() {
    return Err(ExecuteError::ProcessExit {
      program: invocation.program_name(),
      code: output.code,
      stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    });
  }

  let wrote_output = match &plan.capture_to {
    Some(path) => {
      let wrote = write_if_changed(path, &output.stdout).await?;
      if !wrote {
        debug!(path = ?path, "output unchanged, not rewriting");
      }
      wrote
    }
    None => false,
  };

  Ok(DispatchOutcome {
    protocol: plan.protocol,
    archive_mode: plan.archive_mode,
    wrote_output,
  })
}

/// Write `contents` to `path` only if they differ from what is there.
///
/// Returns whether the file was written. Leaving identical files alone keeps
/// their modification time, so timestamp-driven dependents stay fresh.
pub async fn write_if_changed(path: &Path, contents: &[u8]) -> io::Result<bool> {
  match fs::read(path).await {
    Ok(existing) if existing == contents => return Ok(false),
    Ok(_) => {}
    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
    Err(e) => return Err(e),
  }

  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    fs::create_dir_all(parent).await?;
  }

  fs::write(path, contents).await?;
  Ok(true)
}
