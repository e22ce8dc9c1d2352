//! Stream-capturing and archive protocols, driven through real processes.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use stagecraft_lib::execute::{MapResolver, ResolvedArgs, StaticArgs};
use stagecraft_lib::target::{BuilderKind, Context, Target, Way};
use tempfile::TempDir;

use super::common::{engine_with, registry, sh, shell_builders, shell_engine};

fn mtime(path: &Path) -> std::time::SystemTime {
  std::fs::metadata(path).unwrap().modified().unwrap()
}

#[tokio::test]
async fn preprocessor_stdout_becomes_output() {
  let temp = TempDir::new().unwrap();
  let output = temp.path().join("Config.hs");
  let target = Target::new(
    BuilderKind::Preprocessor,
    Context::new(1, "ghc", Way::vanilla()),
    [temp.path().join("Config.hs.in")],
    [output.clone()],
  );
  let engine = shell_engine(
    temp.path(),
    StaticArgs::new().with(&target, sh("echo 'module Config where'")),
  );

  let report = engine.run(&target).await.unwrap();
  assert!(report.wrote_output);
  assert_eq!(std::fs::read_to_string(&output).unwrap(), "module Config where\n");

  let before = mtime(&output);
  std::thread::sleep(std::time::Duration::from_millis(20));
  let report = engine.run(&target).await.unwrap();
  assert!(!report.wrote_output);
  assert_eq!(mtime(&output), before);
}

#[tokio::test]
async fn primop_generator_reads_input_on_stdin() {
  let temp = TempDir::new().unwrap();
  let input = temp.path().join("primops.txt");
  let output = temp.path().join("primop-tag.hs-incl");
  std::fs::write(&input, "primop IntAddOp\n").unwrap();

  let target = Target::new(
    BuilderKind::PrimopGenerator,
    Context::new(1, "compiler", Way::vanilla()),
    [input],
    [output.clone()],
  );
  let engine = shell_engine(temp.path(), StaticArgs::new().with(&target, sh("tr a-z A-Z")));

  let report = engine.run(&target).await.unwrap();
  assert!(report.wrote_output);
  assert_eq!(std::fs::read_to_string(&output).unwrap(), "PRIMOP INTADDOP\n");
}

#[tokio::test]
async fn primop_generator_requires_one_input() {
  let temp = TempDir::new().unwrap();
  let target = Target::new(
    BuilderKind::PrimopGenerator,
    Context::new(1, "compiler", Way::vanilla()),
    [temp.path().join("a.txt"), temp.path().join("b.txt")],
    [temp.path().join("out")],
  );
  let engine = shell_engine(temp.path(), StaticArgs::new().with(&target, sh("cat")));

  let failure = engine.run(&target).await.unwrap_err();
  assert!(matches!(
    failure.error,
    stagecraft_lib::execute::ExecuteError::InvalidTarget(_)
  ));
}

#[tokio::test]
async fn archiver_creates_archive_outputs() {
  let temp = TempDir::new().unwrap();
  let archive = temp.path().join("libHSbase.a");
  let target = Target::new(
    BuilderKind::Archiver,
    Context::new(1, "base", Way::vanilla()),
    [temp.path().join("Base.o")],
    [archive.clone()],
  );
  let script = format!("echo archive > '{}'", archive.display());
  let engine = shell_engine(temp.path(), StaticArgs::new().with(&target, sh(&script)));

  engine.run(&target).await.unwrap();
  assert!(archive.exists());
}

#[tokio::test]
async fn archiver_extracts_into_output_directory() {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("libffi.tar"), "payload").unwrap();

  // Stands in for `ar x <archive>`: copies the archive into the cwd.
  let tool = temp.path().join("fake-ar");
  std::fs::write(&tool, "#!/bin/sh\n[ \"$1\" = x ] || exit 9\ncp \"$2\" extracted\n").unwrap();
  std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

  let out_dir = temp.path().join("libffi-build");
  let target = Target::new(
    BuilderKind::Archiver,
    Context::new(0, "libffi", Way::vanilla()),
    ["libffi.tar"],
    [out_dir.clone()],
  );
  let builders = MapResolver::new().with(BuilderKind::Archiver, &tool);
  let engine = engine_with(
    temp.path(),
    builders,
    StaticArgs::new().with(&target, ResolvedArgs::default()),
    registry(&[]),
  );

  engine.run(&target).await.unwrap();
  assert_eq!(std::fs::read_to_string(out_dir.join("extracted")).unwrap(), "payload");
}

#[tokio::test]
async fn archiver_extracts_with_relative_top_dir_and_tool() {
  // Relative to the test's working directory.
  let temp = TempDir::new_in(".").unwrap();
  assert!(temp.path().is_relative());
  std::fs::write(temp.path().join("libffi.tar"), "payload").unwrap();

  let tool = temp.path().join("fake-ar");
  std::fs::write(&tool, "#!/bin/sh\ncp \"$2\" extracted\n").unwrap();
  std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

  let out_dir = temp.path().join("libffi-build");
  let target = Target::new(
    BuilderKind::Archiver,
    Context::new(0, "libffi", Way::vanilla()),
    ["libffi.tar"],
    [out_dir.clone()],
  );
  let engine = engine_with(
    temp.path(),
    MapResolver::new().with(BuilderKind::Archiver, &tool),
    StaticArgs::new().with(&target, ResolvedArgs::default()),
    registry(&[]),
  );

  engine.run(&target).await.unwrap();
  assert_eq!(std::fs::read_to_string(out_dir.join("extracted")).unwrap(), "payload");
}

#[tokio::test]
async fn every_builder_kind_dispatches() {
  let temp = TempDir::new().unwrap();
  let mut args = StaticArgs::new();
  let targets: Vec<_> = BuilderKind::ALL
    .into_iter()
    .map(|kind| {
      let input = temp.path().join(format!("{}.in", kind));
      std::fs::write(&input, "").unwrap();
      let target = Target::new(
        kind,
        Context::new(1, "base", Way::vanilla()),
        [input],
        [temp.path().join(format!("{}.a", kind))],
      );
      args.insert(&target, sh("true"));
      target
    })
    .collect();
  let engine = engine_with(temp.path(), shell_builders(), args, registry(&[]));

  for target in &targets {
    engine.run(target).await.unwrap();
  }
}
