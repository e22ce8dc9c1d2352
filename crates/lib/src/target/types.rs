use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::execute::types::ExecuteError;
use crate::util::hash::HashError;

/// Compiler stage ordinal (`stage0` is the bootstrap compiler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stage(pub u32);

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "stage{}", self.0)
  }
}

/// A build-variant tag, e.g. `vanilla`, `profiling` or `dynamic`.
///
/// Composite ways are plain tags too (`threaded-profiling`); the engine never
/// interprets them beyond equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Way(String);

impl Way {
  pub fn new(tag: impl Into<String>) -> Self {
    Self(tag.into())
  }

  pub fn vanilla() -> Self {
    Self::new("vanilla")
  }

  pub fn profiling() -> Self {
    Self::new("profiling")
  }

  pub fn dynamic() -> Self {
    Self::new("dynamic")
  }

  pub fn threaded() -> Self {
    Self::new("threaded")
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Way {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Build-variant coordinates distinguishing otherwise identical targets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Context {
  pub stage: Stage,
  pub package: String,
  pub way: Way,
}

impl Context {
  pub fn new(stage: u32, package: impl Into<String>, way: Way) -> Self {
    Self {
      stage: Stage(stage),
      package: package.into(),
      way,
    }
  }
}

impl fmt::Display for Context {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}, {}, {}", self.stage, self.package, self.way)
  }
}

/// How a builder's process is driven and how its outputs are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
  /// Create/update an archive, or extract one into a directory.
  Archive,
  /// Run without stdin, write stdout to the output when it changed.
  CapturedStdout,
  /// Feed the single input on stdin, write stdout to the output when it changed.
  PipedCodegen,
  /// Run directly; the exit status is the whole outcome.
  Generic,
}

/// The external tools the engine knows how to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuilderKind {
  Archiver,
  Preprocessor,
  PrimopGenerator,
  Compiler,
  CCompiler,
  Linker,
  PackageTool,
  LexerGenerator,
  ParserGenerator,
}

impl BuilderKind {
  pub const ALL: [BuilderKind; 9] = [
    BuilderKind::Archiver,
    BuilderKind::Preprocessor,
    BuilderKind::PrimopGenerator,
    BuilderKind::Compiler,
    BuilderKind::CCompiler,
    BuilderKind::Linker,
    BuilderKind::PackageTool,
    BuilderKind::LexerGenerator,
    BuilderKind::ParserGenerator,
  ];

  /// The invocation protocol for this builder.
  ///
  /// Adding a builder means adding one arm here; there is no fallback arm.
  pub fn protocol(self) -> Protocol {
    match self {
      BuilderKind::Archiver => Protocol::Archive,
      BuilderKind::Preprocessor => Protocol::CapturedStdout,
      BuilderKind::PrimopGenerator => Protocol::PipedCodegen,
      BuilderKind::Compiler => Protocol::Generic,
      BuilderKind::CCompiler => Protocol::Generic,
      BuilderKind::Linker => Protocol::Generic,
      BuilderKind::PackageTool => Protocol::Generic,
      BuilderKind::LexerGenerator => Protocol::Generic,
      BuilderKind::ParserGenerator => Protocol::Generic,
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      BuilderKind::Archiver => "archiver",
      BuilderKind::Preprocessor => "preprocessor",
      BuilderKind::PrimopGenerator => "primop-generator",
      BuilderKind::Compiler => "compiler",
      BuilderKind::CCompiler => "c-compiler",
      BuilderKind::Linker => "linker",
      BuilderKind::PackageTool => "package-tool",
      BuilderKind::LexerGenerator => "lexer-generator",
      BuilderKind::ParserGenerator => "parser-generator",
    }
  }
}

impl fmt::Display for BuilderKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// One unit of build work: a builder applied to inputs in a context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
  builder: BuilderKind,
  context: Context,
  #[serde(default)]
  inputs: Vec<PathBuf>,
  #[serde(default)]
  outputs: Vec<PathBuf>,
}

impl Target {
  pub fn new<I, O>(builder: BuilderKind, context: Context, inputs: I, outputs: O) -> Self
  where
    I: IntoIterator,
    I::Item: Into<PathBuf>,
    O: IntoIterator,
    O::Item: Into<PathBuf>,
  {
    Self {
      builder,
      context,
      inputs: inputs.into_iter().map(Into::into).collect(),
      outputs: outputs.into_iter().map(Into::into).collect(),
    }
  }

  pub fn builder(&self) -> BuilderKind {
    self.builder
  }

  pub fn context(&self) -> &Context {
    &self.context
  }

  pub fn inputs(&self) -> &[PathBuf] {
    &self.inputs
  }

  pub fn outputs(&self) -> &[PathBuf] {
    &self.outputs
  }

  /// Identity used by the hash cache and resource bookkeeping.
  pub fn key(&self) -> TargetKey {
    TargetKey {
      builder: self.builder,
      context: self.context.clone(),
      outputs: self.outputs.clone(),
    }
  }

  /// The first output, which stream-capturing protocols write to.
  pub fn primary_output(&self) -> Result<&Path, ExecuteError> {
    self
      .outputs
      .first()
      .map(PathBuf::as_path)
      .ok_or_else(|| ExecuteError::InvalidTarget(format!("{} has no outputs", self)))
  }

  /// The only input; protocols that consume one file reject anything else.
  pub fn single_input(&self) -> Result<&Path, ExecuteError> {
    match self.inputs.as_slice() {
      [input] => Ok(input),
      inputs => Err(ExecuteError::InvalidTarget(format!(
        "{} expects exactly one input, got {}",
        self,
        inputs.len()
      ))),
    }
  }
}

impl fmt::Display for Target {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.builder, self.context)
  }
}

/// Identity of a target: `(builder, context, outputs)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetKey {
  pub builder: BuilderKind,
  pub context: Context,
  pub outputs: Vec<PathBuf>,
}

impl TargetKey {
  /// Deterministic byte encoding used as the hash store key.
  ///
  /// Fails only for output paths that are not valid UTF-8.
  pub fn identity_bytes(&self) -> Result<Vec<u8>, HashError> {
    serde_json::to_vec(self)
  }
}
