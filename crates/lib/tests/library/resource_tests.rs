//! Resource pools under concurrent load.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use stagecraft_lib::resource::ResourceRequest;

use super::common::registry;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_holders_never_exceed_capacity() {
  let registry = registry(&[("jobs", 3), ("linker-slots", 1)]);
  let in_jobs = Arc::new(AtomicU32::new(0));
  let peak = Arc::new(AtomicU32::new(0));

  let mut tasks = tokio::task::JoinSet::new();
  for i in 0..12u32 {
    let registry = registry.clone();
    let in_jobs = in_jobs.clone();
    let peak = peak.clone();
    tasks.spawn(async move {
      let request = if i % 3 == 0 {
        ResourceRequest::new().with("jobs", 1).with("linker-slots", 1)
      } else {
        ResourceRequest::new().with("jobs", 1)
      };
      let _guard = registry.acquire(&request).await.unwrap();
      let now = in_jobs.fetch_add(1, Ordering::SeqCst) + 1;
      peak.fetch_max(now, Ordering::SeqCst);
      tokio::time::sleep(Duration::from_millis(10)).await;
      in_jobs.fetch_sub(1, Ordering::SeqCst);
    });
  }
  while let Some(result) = tasks.join_next().await {
    result.unwrap();
  }

  assert!(peak.load(Ordering::SeqCst) <= 3);
  assert_eq!(registry.available("jobs"), Some(3));
  assert_eq!(registry.available("linker-slots"), Some(1));
}
