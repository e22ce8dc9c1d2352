//! Progress messages for running targets.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::target::Target;

/// How much the engine says about each target it runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
  /// One line per target, plus the command line when the target asks for it.
  #[default]
  Normal,
  /// One line per target.
  Brief,
  /// A boxed banner per target.
  Decorative,
  /// Nothing.
  Silent,
}

impl FromStr for Verbosity {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "normal" => Ok(Verbosity::Normal),
      "brief" => Ok(Verbosity::Brief),
      "decorative" => Ok(Verbosity::Decorative),
      "silent" => Ok(Verbosity::Silent),
      other => Err(format!("unknown verbosity: {}", other)),
    }
  }
}

impl fmt::Display for Verbosity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Verbosity::Normal => "normal",
      Verbosity::Brief => "brief",
      Verbosity::Decorative => "decorative",
      Verbosity::Silent => "silent",
    })
  }
}

/// Destination for rendered progress messages.
pub trait ProgressSink: Send + Sync {
  fn emit(&self, message: &str);
}

/// Emits progress as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
  fn emit(&self, message: &str) {
    for line in message.lines() {
      info!("{}", line);
    }
  }
}

/// Keeps every message; useful in tests and for summaries.
#[derive(Debug, Default)]
pub struct CollectingSink {
  messages: Mutex<Vec<String>>,
}

impl CollectingSink {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn messages(&self) -> Vec<String> {
    self.messages.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }
}

impl ProgressSink for CollectingSink {
  fn emit(&self, message: &str) {
    self
      .messages
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push(message.to_string());
  }
}

const MAX_LISTED_PATHS: usize = 3;

fn list_paths(paths: &[PathBuf]) -> String {
  if paths.is_empty() {
    return "(none)".to_string();
  }
  let shown: Vec<_> = paths
    .iter()
    .take(MAX_LISTED_PATHS)
    .map(|p| p.display().to_string())
    .collect();
  if paths.len() > MAX_LISTED_PATHS {
    format!("{}, ... ({} more)", shown.join(", "), paths.len() - MAX_LISTED_PATHS)
  } else {
    shown.join(", ")
  }
}

fn brief_line(target: &Target) -> String {
  format!(
    "| Run {} ({}): {} => {}",
    target.builder(),
    target.context(),
    list_paths(target.inputs()),
    list_paths(target.outputs())
  )
}

fn boxed(lines: &[String]) -> String {
  let width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
  let rule = "-".repeat(width + 2);
  let mut out = format!("/{}\\\n", rule);
  for line in lines {
    out.push_str(&format!("| {:<width$} |\n", line, width = width));
  }
  out.push_str(&format!("\\{}/", rule));
  out
}

/// Render the message announcing `target`, or `None` when silent.
///
/// `command_line` is shown at [`Verbosity::Normal`] when the flag interpreter
/// marked the target verbose.
pub fn render(verbosity: Verbosity, target: &Target, command_line: Option<&str>) -> Option<String> {
  match verbosity {
    Verbosity::Silent => None,
    Verbosity::Brief => Some(brief_line(target)),
    Verbosity::Normal => {
      let mut message = brief_line(target);
      if let Some(command_line) = command_line {
        message.push_str("\n  ");
        message.push_str(command_line);
      }
      Some(message)
    }
    Verbosity::Decorative => Some(boxed(&[
      format!("Run {}", target.builder()),
      format!("context: {}", target.context()),
      format!("    input: {}", list_paths(target.inputs())),
      format!(" => output: {}", list_paths(target.outputs())),
    ])),
  }
}
