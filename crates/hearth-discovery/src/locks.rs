//! Per-user turn serialization.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per key, created on demand. Idle entries are dropped the
/// next time any key is locked.
#[derive(Default)]
pub(crate) struct KeyedLocks {
  inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
  /// Wait until no other holder of `key` remains, then hold it until the
  /// guard drops.
  pub(crate) async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
    let slot = {
      let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
      map.retain(|k, m| k == key || Arc::strong_count(m) > 1);
      map.entry(key.to_owned()).or_default().clone()
    };
    slot.lock_owned().await
  }

  #[cfg(test)]
  pub(crate) fn len(&self) -> usize {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;

  #[tokio::test]
  async fn same_key_waits() {
    let locks = Arc::new(KeyedLocks::default());
    let guard = locks.lock("u1").await;

    let other = locks.clone();
    let waiter = tokio::spawn(async move {
      let _g = other.lock("u1").await;
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    drop(guard);
    waiter.await.unwrap();
  }

  #[tokio::test]
  async fn different_keys_do_not_block() {
    let locks = KeyedLocks::default();
    let _a = locks.lock("a").await;
    let _b = tokio::time::timeout(Duration::from_millis(50), locks.lock("b"))
      .await
      .expect("independent key");
  }

  #[tokio::test]
  async fn idle_entries_are_pruned() {
    let locks = KeyedLocks::default();
    drop(locks.lock("a").await);
    drop(locks.lock("b").await);
    let _c = locks.lock("c").await;
    assert_eq!(locks.len(), 1);
  }
}
