//! Implementation of the `stagecraft run` command.
//!
//! Loads a build plan and runs its targets concurrently, standing in for the
//! real scheduler.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::info;

use stagecraft_lib::target::Target;

use crate::EngineArgs;
use crate::output::{format_duration, print_error, print_skip, print_stat, print_success};
use crate::plan::{BuildPlan, PlanEngine, PlannedTarget};

#[derive(Debug, Default)]
struct RunSummary {
  built: usize,
  flags_changed: usize,
  skipped: usize,
  failed: usize,
}

/// Execute the run command.
///
/// Every target in the plan is handed to the engine, at most `--jobs` at a
/// time. With `only_stale`, targets whose flags are unchanged and whose
/// outputs all exist are skipped.
///
/// Fails if any target failed.
pub fn cmd_run(plan_path: &Path, only_stale: bool, opts: &EngineArgs) -> Result<()> {
  let plan = BuildPlan::load(plan_path)?;
  let engine = Arc::new(plan.engine(opts)?);
  let jobs = opts.jobs.unwrap_or_else(default_jobs).max(1);

  let start = Instant::now();
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let summary = rt.block_on(run_targets(engine, plan.targets, only_stale, jobs))?;

  println!();
  print_success(&format!("Run complete in {}", format_duration(start.elapsed())));
  print_stat("Built", &summary.built.to_string());
  print_stat("Flags changed", &summary.flags_changed.to_string());
  print_stat("Skipped", &summary.skipped.to_string());
  print_stat("Failed", &summary.failed.to_string());

  if summary.failed > 0 {
    bail!("{} target(s) failed", summary.failed);
  }

  Ok(())
}

fn default_jobs() -> usize {
  std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Outputs are checked where builders write them: as given, relative to the
/// process working directory.
fn outputs_exist(target: &Target) -> bool {
  target.outputs().iter().all(|output| output.exists())
}

async fn run_targets(
  engine: Arc<PlanEngine>,
  targets: Vec<PlannedTarget>,
  only_stale: bool,
  jobs: usize,
) -> Result<RunSummary> {
  let semaphore = Arc::new(Semaphore::new(jobs));
  let mut join_set = JoinSet::new();
  let mut summary = RunSummary::default();

  info!(targets = targets.len(), jobs, "starting run");

  for planned in targets {
    if only_stale {
      match engine.is_stale(&planned.target) {
        Ok(false) if outputs_exist(&planned.target) => {
          print_skip(&format!("{} is up to date", planned.target));
          summary.skipped += 1;
          continue;
        }
        Ok(_) => {}
        Err(failure) => {
          print_error(&failure.to_string());
          summary.failed += 1;
          continue;
        }
      }
    }

    let engine = engine.clone();
    let semaphore = semaphore.clone();

    join_set.spawn(async move {
      // Acquire the job slot inside the task
      let _permit = semaphore.acquire_owned().await.context("Job limiter closed")?;
      let result = engine
        .run_with_resources(&planned.target, &planned.resources)
        .await;
      Ok::<_, anyhow::Error>(result)
    });
  }

  while let Some(join_result) = join_set.join_next().await {
    match join_result.context("Build task panicked")?? {
      Ok(report) => {
        summary.built += 1;
        if report.stale {
          summary.flags_changed += 1;
        }
      }
      Err(failure) => {
        print_error(&failure.to_string());
        summary.failed += 1;
      }
    }
  }

  info!(
    built = summary.built,
    skipped = summary.skipped,
    failed = summary.failed,
    "run complete"
  );

  Ok(summary)
}
