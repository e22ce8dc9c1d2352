mod run;
mod stale;

pub use run::cmd_run;
pub use stale::cmd_stale;
