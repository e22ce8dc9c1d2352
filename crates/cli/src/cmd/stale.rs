//! Implementation of the `stagecraft stale` command.

use std::path::Path;

use anyhow::Result;

use crate::EngineArgs;
use crate::output::{print_error, print_info, print_skip, print_stat};
use crate::plan::BuildPlan;

/// Print each target in the plan and whether its flags changed since its
/// last successful build.
pub fn cmd_stale(plan_path: &Path, opts: &EngineArgs) -> Result<()> {
  let plan = BuildPlan::load(plan_path)?;
  let engine = plan.engine(opts)?;

  let mut stale = 0;
  for planned in &plan.targets {
    match engine.is_stale(&planned.target) {
      Ok(true) => {
        stale += 1;
        print_info(&format!("{}: stale", planned.target));
      }
      Ok(false) => print_skip(&format!("{}: up to date", planned.target)),
      Err(failure) => print_error(&failure.to_string()),
    }
  }

  println!();
  print_stat("Targets", &plan.targets.len().to_string());
  print_stat("Stale", &stale.to_string());

  Ok(())
}
