//! Builder and argument resolution.
//!
//! The engine needs two answers it cannot compute itself: where a builder's
//! executable lives, and what the target's final argument list is. Both come
//! from collaborators behind the traits in this module.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::execute::types::ExecuteError;
use crate::target::{BuilderKind, Target, TargetKey};

/// Locates the executable for a builder.
pub trait BuilderResolver: Send + Sync {
  fn resolve(&self, builder: BuilderKind) -> Result<PathBuf, ExecuteError>;
}

/// Final, flattened arguments for one target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedArgs {
  pub args: Vec<String>,
  /// Show the full command line in progress output.
  #[serde(default)]
  pub verbose: bool,
}

impl ResolvedArgs {
  pub fn new<I, S>(args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      args: args.into_iter().map(Into::into).collect(),
      verbose: false,
    }
  }

  pub fn verbose(mut self, verbose: bool) -> Self {
    self.verbose = verbose;
    self
  }
}

/// Computes a target's argument list; must be a pure function of the target.
pub trait ArgumentInterpreter: Send + Sync {
  fn interpret(&self, target: &Target) -> Result<ResolvedArgs, ExecuteError>;
}

impl<F> ArgumentInterpreter for F
where
  F: Fn(&Target) -> Result<ResolvedArgs, ExecuteError> + Send + Sync,
{
  fn interpret(&self, target: &Target) -> Result<ResolvedArgs, ExecuteError> {
    self(target)
  }
}

/// Builder locations from a fixed table.
#[derive(Debug, Clone, Default)]
pub struct MapResolver {
  paths: HashMap<BuilderKind, PathBuf>,
}

impl MapResolver {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(mut self, builder: BuilderKind, path: impl Into<PathBuf>) -> Self {
    self.insert(builder, path);
    self
  }

  pub fn insert(&mut self, builder: BuilderKind, path: impl Into<PathBuf>) {
    self.paths.insert(builder, path.into());
  }
}

impl FromIterator<(BuilderKind, PathBuf)> for MapResolver {
  fn from_iter<T: IntoIterator<Item = (BuilderKind, PathBuf)>>(iter: T) -> Self {
    Self {
      paths: iter.into_iter().collect(),
    }
  }
}

impl BuilderResolver for MapResolver {
  fn resolve(&self, builder: BuilderKind) -> Result<PathBuf, ExecuteError> {
    self
      .paths
      .get(&builder)
      .cloned()
      .ok_or(ExecuteError::BuilderNotFound(builder))
  }
}

/// Precomputed argument lists keyed by target identity.
#[derive(Debug, Clone, Default)]
pub struct StaticArgs {
  args: HashMap<TargetKey, ResolvedArgs>,
}

impl StaticArgs {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(mut self, target: &Target, args: ResolvedArgs) -> Self {
    self.insert(target, args);
    self
  }

  pub fn insert(&mut self, target: &Target, args: ResolvedArgs) {
    self.args.insert(target.key(), args);
  }
}

impl ArgumentInterpreter for StaticArgs {
  fn interpret(&self, target: &Target) -> Result<ResolvedArgs, ExecuteError> {
    self
      .args
      .get(&target.key())
      .cloned()
      .ok_or_else(|| ExecuteError::ArgumentResolution(format!("no arguments for {}", target)))
  }
}
