//! Flag-change detection across engine instances sharing a hash directory.

use stagecraft_lib::cache::{FileHashStore, HashStore};
use stagecraft_lib::execute::StaticArgs;
use stagecraft_lib::target::{BuilderKind, Context, Target, Way};
use tempfile::TempDir;

use super::common::{sh, shell_engine};

fn c_target(root: &std::path::Path) -> Target {
  Target::new(
    BuilderKind::CCompiler,
    Context::new(1, "rts", Way::threaded()),
    [root.join("Adjustor.c")],
    [root.join("Adjustor.o")],
  )
}

#[tokio::test]
async fn digest_survives_a_new_engine() {
  let temp = TempDir::new().unwrap();
  let target = c_target(temp.path());
  let args = StaticArgs::new().with(&target, sh("true"));

  let first = shell_engine(temp.path(), args.clone());
  assert!(first.is_stale(&target).unwrap());
  first.run(&target).await.unwrap();

  let second = shell_engine(temp.path(), args);
  assert!(!second.is_stale(&target).unwrap());
  assert!(!second.run(&target).await.unwrap().stale);
}

#[tokio::test]
async fn changed_flags_make_target_stale() {
  let temp = TempDir::new().unwrap();
  let target = c_target(temp.path());

  let engine = shell_engine(temp.path(), StaticArgs::new().with(&target, sh("true")));
  engine.run(&target).await.unwrap();

  let changed = shell_engine(temp.path(), StaticArgs::new().with(&target, sh("true; true")));
  assert!(changed.is_stale(&target).unwrap());
}

#[tokio::test]
async fn targets_in_other_stages_are_tracked_separately() {
  let temp = TempDir::new().unwrap();
  let stage1 = c_target(temp.path());
  let stage2 = Target::new(
    BuilderKind::CCompiler,
    Context::new(2, "rts", Way::threaded()),
    [temp.path().join("Adjustor.c")],
    [temp.path().join("Adjustor.o")],
  );
  let args = StaticArgs::new().with(&stage1, sh("true")).with(&stage2, sh("true"));
  let engine = shell_engine(temp.path(), args);

  engine.run(&stage1).await.unwrap();

  assert!(!engine.is_stale(&stage1).unwrap());
  assert!(engine.is_stale(&stage2).unwrap());
}

#[tokio::test]
async fn corrupt_record_is_rebuilt_and_repaired() {
  let temp = TempDir::new().unwrap();
  let target = c_target(temp.path());
  let engine = shell_engine(temp.path(), StaticArgs::new().with(&target, sh("true")));
  engine.run(&target).await.unwrap();

  let store = FileHashStore::new(temp.path().join("hashes"));
  let key = target.key().identity_bytes().unwrap();
  std::fs::write(store.record_path(&key), "{ not json").unwrap();

  assert!(engine.is_stale(&target).unwrap());
  assert!(engine.run(&target).await.unwrap().stale);
  assert!(store.get(&key).unwrap().is_some());
  assert!(!engine.is_stale(&target).unwrap());
}
