//! Target execution module.
//!
//! This module provides the engine the external scheduler calls once per
//! target. It handles:
//! - Builder and argument resolution
//! - Flag-change detection through the hash cache
//! - Resource acquisition with guaranteed release
//! - Protocol dispatch to the builder process

pub mod dispatch;
pub mod process;
pub mod progress;
pub mod resolver;
pub mod types;

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::cache::{HashCache, HashStore};
use crate::resource::{ResourceRegistry, ResourceRequest};
use crate::target::Target;

use dispatch::plan_invocation;
use process::{ProcessRunner, SystemRunner};
use progress::{ProgressSink, TracingSink, render};
use resolver::{ArgumentInterpreter, BuilderResolver};

pub use dispatch::{ArchiveMode, DispatchOutcome, DispatchPlan, dispatch, write_if_changed};
pub use process::{Invocation, ProcessOutput};
pub use progress::{CollectingSink, Verbosity};
pub use resolver::{MapResolver, ResolvedArgs, StaticArgs};
pub use types::{BuildFailure, BuildReport, EngineConfig, ExecuteError};

/// Runs targets: resolve, check the hash cache, acquire, dispatch, record.
///
/// The engine keeps no mutable state of its own. The resource registry and
/// the hash store are the only shared state, so one engine can serve any
/// number of concurrent [`run`](Self::run) calls.
pub struct Engine<B, A, S, R = SystemRunner, P = TracingSink> {
  config: EngineConfig,
  builders: B,
  interpreter: A,
  cache: Arc<HashCache<S>>,
  resources: Arc<ResourceRegistry>,
  runner: R,
  progress: P,
}

impl<B, A, S> Engine<B, A, S>
where
  B: BuilderResolver,
  A: ArgumentInterpreter,
  S: HashStore + 'static,
{
  /// Create an engine that spawns real processes and reports through `tracing`.
  pub fn new(
    config: EngineConfig,
    builders: B,
    interpreter: A,
    cache: HashCache<S>,
    resources: Arc<ResourceRegistry>,
  ) -> Self {
    Self {
      config,
      builders,
      interpreter,
      cache: Arc::new(cache),
      resources,
      runner: SystemRunner,
      progress: TracingSink,
    }
  }
}

impl<B, A, S, R, P> Engine<B, A, S, R, P>
where
  B: BuilderResolver,
  A: ArgumentInterpreter,
  S: HashStore + 'static,
  R: ProcessRunner,
  P: ProgressSink,
{
  /// Replace the process runner.
  pub fn with_runner<R2: ProcessRunner>(self, runner: R2) -> Engine<B, A, S, R2, P> {
    Engine {
      config: self.config,
      builders: self.builders,
      interpreter: self.interpreter,
      cache: self.cache,
      resources: self.resources,
      runner,
      progress: self.progress,
    }
  }

  /// Replace the progress sink.
  pub fn with_progress<P2: ProgressSink>(self, progress: P2) -> Engine<B, A, S, R, P2> {
    Engine {
      config: self.config,
      builders: self.builders,
      interpreter: self.interpreter,
      cache: self.cache,
      resources: self.resources,
      runner: self.runner,
      progress,
    }
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub fn cache(&self) -> &HashCache<S> {
    self.cache.as_ref()
  }

  pub fn progress(&self) -> &P {
    &self.progress
  }

  /// Whether the target's arguments changed since its last successful build.
  ///
  /// Phase one of the scheduler contract: consult this, then decide whether
  /// to [`run`](Self::run).
  pub fn is_stale(&self, target: &Target) -> Result<bool, BuildFailure> {
    let resolved = self
      .interpreter
      .interpret(target)
      .map_err(|e| BuildFailure::new(target.clone(), e))?;
    Ok(self.cache.is_stale(target, &resolved.args))
  }

  /// Build a target that declares no resources.
  pub async fn run(&self, target: &Target) -> Result<BuildReport, BuildFailure> {
    self.run_with_resources(target, &ResourceRequest::default()).await
  }

  /// Build a target while holding `request` for the duration of the builder
  /// invocation.
  ///
  /// The builder's argument digest is recorded only if the invocation
  /// succeeds. Partially written outputs of a failed invocation are left in
  /// place; the failure tells the scheduler not to treat them as fresh.
  pub async fn run_with_resources(
    &self,
    target: &Target,
    request: &ResourceRequest,
  ) -> Result<BuildReport, BuildFailure> {
    match self.build(target, request).await {
      Ok(report) => {
        info!(target = %target, stale = report.stale, "build succeeded");
        Ok(report)
      }
      Err(e) => {
        error!(target = %target, error = %e, "build failed");
        Err(BuildFailure::new(target.clone(), e))
      }
    }
  }

  async fn build(&self, target: &Target, request: &ResourceRequest) -> Result<BuildReport, ExecuteError> {
    let tool = self.builders.resolve(target.builder())?;
    let resolved = self.interpreter.interpret(target)?;
    let plan = plan_invocation(target, &resolved.args, &tool, &self.config.top_dir)?;

    let check = {
      let cache = self.cache.clone();
      let target = target.clone();
      let args = resolved.args.clone();
      // Hash stores may do blocking file I/O.
      tokio::task::spawn_blocking(move || cache.check_and_record(&target, &args))
        .await
        .map_err(|e| ExecuteError::Io(std::io::Error::other(e)))?
    };
    let stale = check.is_changed();
    debug!(target = %target, tool = ?tool, stale, "resolved target");

    let outcome = {
      let _guard = self.resources.acquire(request).await?;

      let command_line = resolved.verbose.then(|| plan.invocation.command_line());
      if let Some(message) = render(self.config.verbosity, target, command_line.as_deref()) {
        self.progress.emit(&message);
      }

      dispatch::execute_plan(plan, &self.runner).await?
    };

    let digest = check.digest();
    let cache = self.cache.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || cache.commit(check)).await {
      warn!(target = %target, error = %e, "hash record commit did not complete");
    }

    Ok(BuildReport {
      stale,
      digest,
      wrote_output: outcome.wrote_output,
    })
  }
}
