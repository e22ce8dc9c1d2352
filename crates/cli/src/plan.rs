//! JSON build plans.
//!
//! A plan stands in for the real scheduler: it lists the builder
//! executables, the resource pools, and every target with its final
//! argument list.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use stagecraft_lib::cache::{FileHashStore, HashCache};
use stagecraft_lib::execute::process::SystemRunner;
use stagecraft_lib::execute::{Engine, EngineConfig, MapResolver, ResolvedArgs, StaticArgs};
use stagecraft_lib::resource::{Resource, ResourceRegistry, ResourceRequest};
use stagecraft_lib::target::{BuilderKind, Target};

use crate::EngineArgs;
use crate::output::ConsoleSink;

pub type PlanEngine = Engine<MapResolver, StaticArgs, FileHashStore, SystemRunner, ConsoleSink>;

#[derive(Debug, Clone, Deserialize)]
pub struct BuildPlan {
  /// Builder name (e.g. "c-compiler") to executable path.
  #[serde(default)]
  pub builders: BTreeMap<String, PathBuf>,
  #[serde(default)]
  pub resources: Vec<Resource>,
  #[serde(default)]
  pub targets: Vec<PlannedTarget>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlannedTarget {
  #[serde(flatten)]
  pub target: Target,
  #[serde(default)]
  pub args: Vec<String>,
  #[serde(default)]
  pub verbose: bool,
  #[serde(default)]
  pub resources: ResourceRequest,
}

impl BuildPlan {
  pub fn load(path: &Path) -> Result<Self> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read plan {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse plan {}", path.display()))
  }

  fn resolver(&self) -> Result<MapResolver> {
    self
      .builders
      .iter()
      .map(|(name, path)| -> Result<(BuilderKind, PathBuf)> {
        let kind: BuilderKind = serde_json::from_value(serde_json::Value::String(name.clone()))
          .with_context(|| format!("Unknown builder in plan: {}", name))?;
        Ok((kind, path.clone()))
      })
      .collect()
  }

  fn arguments(&self) -> StaticArgs {
    let mut args = StaticArgs::new();
    for planned in &self.targets {
      args.insert(
        &planned.target,
        ResolvedArgs::new(planned.args.iter().cloned()).verbose(planned.verbose),
      );
    }
    args
  }

  fn registry(&self) -> Result<ResourceRegistry> {
    ResourceRegistry::new(self.resources.iter().cloned()).context("Invalid resource declarations")
  }

  /// Build the engine that runs this plan's targets.
  pub fn engine(&self, opts: &EngineArgs) -> Result<PlanEngine> {
    let store = match &opts.cache_dir {
      Some(dir) => FileHashStore::new(dir),
      None => FileHashStore::default_store(),
    };
    let config = EngineConfig {
      verbosity: opts.verbosity,
      top_dir: opts.top_dir.clone(),
    };

    Ok(
      Engine::new(
        config,
        self.resolver()?,
        self.arguments(),
        HashCache::new(store),
        Arc::new(self.registry()?),
      )
      .with_progress(ConsoleSink),
    )
  }
}
