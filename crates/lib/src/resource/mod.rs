//! Capacity-bounded shared resources.
//!
//! A [`ResourceRegistry`] owns one counting pool per named [`Resource`].
//! Targets ask for units from several pools at once with a
//! [`ResourceRequest`]; [`ResourceRegistry::acquire`] waits until every pool
//! can satisfy its share and returns a [`ResourceGuard`] that gives all units
//! back when dropped.
//!
//! Pools are always taken in lexicographic order of resource name, so two
//! targets asking for overlapping sets can never each hold what the other is
//! waiting for.

use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU32;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, trace};

/// A named shared facility with a fixed number of units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
  pub name: String,
  pub capacity: NonZeroU32,
}

impl Resource {
  pub fn new(name: impl Into<String>, capacity: NonZeroU32) -> Self {
    Self {
      name: name.into(),
      capacity,
    }
  }
}

/// Units requested from each resource by one target.
///
/// Backed by a `BTreeMap`, so iteration order is the global acquisition order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceRequest(BTreeMap<String, u32>);

impl ResourceRequest {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builder-style insert.
  pub fn with(mut self, name: impl Into<String>, units: u32) -> Self {
    self.insert(name, units);
    self
  }

  /// Add units for a resource. Repeated names accumulate, saturating at
  /// `u32::MAX`; such a request is rejected by [`ResourceRegistry::acquire`].
  pub fn insert(&mut self, name: impl Into<String>, units: u32) {
    let held = self.0.entry(name.into()).or_default();
    *held = held.saturating_add(units);
  }

  pub fn is_empty(&self) -> bool {
    self.0.values().all(|&units| units == 0)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
    self.0.iter().map(|(name, &units)| (name.as_str(), units))
  }
}

impl<S: Into<String>> FromIterator<(S, u32)> for ResourceRequest {
  fn from_iter<T: IntoIterator<Item = (S, u32)>>(iter: T) -> Self {
    let mut request = Self::new();
    for (name, units) in iter {
      request.insert(name, units);
    }
    request
  }
}

/// Errors from resource registration and acquisition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResourceError {
  #[error("unknown resource: {0}")]
  Unknown(String),

  #[error("resource {name} has capacity {capacity} but {requested} units were requested")]
  ExceedsCapacity {
    name: String,
    capacity: u32,
    requested: u32,
  },

  #[error("resource registered twice: {0}")]
  Duplicate(String),

  #[error("resource pool closed: {0}")]
  Closed(String),
}

#[derive(Debug)]
struct Pool {
  capacity: u32,
  semaphore: Arc<Semaphore>,
}

/// Registry of capacity pools shared by every concurrently running target.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
  pools: HashMap<String, Pool>,
}

impl ResourceRegistry {
  /// Create a registry with a fixed set of resources.
  pub fn new(resources: impl IntoIterator<Item = Resource>) -> Result<Self, ResourceError> {
    let mut pools = HashMap::new();
    for resource in resources {
      if pools.contains_key(&resource.name) {
        return Err(ResourceError::Duplicate(resource.name));
      }
      let capacity = resource.capacity.get();
      pools.insert(
        resource.name,
        Pool {
          capacity,
          semaphore: Arc::new(Semaphore::new(capacity as usize)),
        },
      );
    }
    Ok(Self { pools })
  }

  /// A registry with no resources; only empty requests can be satisfied.
  pub fn empty() -> Self {
    Self::default()
  }

  pub fn capacity(&self, name: &str) -> Option<u32> {
    self.pools.get(name).map(|pool| pool.capacity)
  }

  /// Units currently free in a pool.
  pub fn available(&self, name: &str) -> Option<usize> {
    self.pools.get(name).map(|pool| pool.semaphore.available_permits())
  }

  /// Wait until every requested unit is free, then take them all.
  ///
  /// Unknown resources and requests larger than a pool's capacity are
  /// rejected before anything is taken. Dropping the returned future while it
  /// waits gives back whatever it already holds.
  pub async fn acquire(&self, request: &ResourceRequest) -> Result<ResourceGuard, ResourceError> {
    let mut wanted = Vec::new();
    for (name, units) in request.iter() {
      if units == 0 {
        continue;
      }
      let pool = self.pools.get(name).ok_or_else(|| ResourceError::Unknown(name.to_string()))?;
      if units > pool.capacity {
        return Err(ResourceError::ExceedsCapacity {
          name: name.to_string(),
          capacity: pool.capacity,
          requested: units,
        });
      }
      wanted.push((name, units, pool.semaphore.clone()));
    }

    let mut held = Vec::with_capacity(wanted.len());
    for (name, units, semaphore) in wanted {
      trace!(resource = %name, units, "waiting for resource");
      let permit = semaphore
        .acquire_many_owned(units)
        .await
        .map_err(|_| ResourceError::Closed(name.to_string()))?;
      held.push(HeldUnits {
        name: name.to_string(),
        units,
        _permit: permit,
      });
    }

    if !held.is_empty() {
      debug!(resources = ?request, "resources acquired");
    }

    Ok(ResourceGuard { held })
  }
}

#[derive(Debug)]
struct HeldUnits {
  name: String,
  units: u32,
  _permit: OwnedSemaphorePermit,
}

/// Units held by one target; released exactly once, on drop.
#[derive(Debug)]
#[must_use = "resources are released as soon as the guard is dropped"]
pub struct ResourceGuard {
  held: Vec<HeldUnits>,
}

impl ResourceGuard {
  pub fn is_empty(&self) -> bool {
    self.held.is_empty()
  }

  /// Held units per resource, in acquisition order.
  pub fn held(&self) -> impl Iterator<Item = (&str, u32)> {
    self.held.iter().map(|h| (h.name.as_str(), h.units))
  }
}

impl Drop for ResourceGuard {
  fn drop(&mut self) {
    for held in &self.held {
      trace!(resource = %held.name, units = held.units, "releasing resource");
    }
  }
}
