//! Shared helpers for library integration tests.

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use stagecraft_lib::cache::{FileHashStore, HashCache};
use stagecraft_lib::execute::{CollectingSink, Engine, EngineConfig, MapResolver, ResolvedArgs, StaticArgs, Verbosity};
use stagecraft_lib::execute::process::SystemRunner;
use stagecraft_lib::resource::{Resource, ResourceRegistry};
use stagecraft_lib::target::BuilderKind;

pub type TestEngine = Engine<MapResolver, StaticArgs, FileHashStore, SystemRunner, CollectingSink>;

pub const SHELL: &str = "/bin/sh";

/// Arguments that make `/bin/sh` run `script`.
pub fn sh(script: &str) -> ResolvedArgs {
  ResolvedArgs::new(["-c", script])
}

/// Every builder resolves to `/bin/sh`, so argument lists are shell scripts.
pub fn shell_builders() -> MapResolver {
  BuilderKind::ALL.into_iter().map(|kind| (kind, PathBuf::from(SHELL))).collect()
}

pub fn registry(resources: &[(&str, u32)]) -> Arc<ResourceRegistry> {
  let resources = resources
    .iter()
    .map(|(name, capacity)| Resource::new(*name, NonZeroU32::new(*capacity).unwrap()));
  Arc::new(ResourceRegistry::new(resources).unwrap())
}

pub fn engine_with(
  root: &Path,
  builders: MapResolver,
  args: StaticArgs,
  resources: Arc<ResourceRegistry>,
) -> TestEngine {
  let config = EngineConfig {
    verbosity: Verbosity::Brief,
    top_dir: root.to_path_buf(),
  };
  Engine::new(
    config,
    builders,
    args,
    HashCache::new(FileHashStore::new(root.join("hashes"))),
    resources,
  )
  .with_progress(CollectingSink::new())
}

/// An engine whose builders are all `/bin/sh`, with no resources.
pub fn shell_engine(root: &Path, args: StaticArgs) -> TestEngine {
  engine_with(root, shell_builders(), args, registry(&[]))
}
