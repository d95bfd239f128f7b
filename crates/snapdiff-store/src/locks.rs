//! Per-project merge locks.
//!
//! Only one merge may mutate a project's `main/` and `flow.json` at a time.
//! Reads (compare, list, report) stay lock-free: sections are immutable and
//! `flow.json` is written via rename-from-temp, so readers always see a
//! consistent snapshot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, TryLockError};

/// Registry of one async mutex per project name.
///
/// Handles are created lazily and live for the process lifetime; the
/// registry itself is cheap to clone and share.
#[derive(Debug, Clone, Default)]
pub struct ProjectLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, project: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock().expect("lock registry poisoned");
        map.entry(project.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Acquire the merge lock, waiting if another merge holds it.
    pub async fn acquire(&self, project: &str) -> OwnedMutexGuard<()> {
        self.handle(project).lock_owned().await
    }

    /// Acquire the merge lock without waiting. `Err` means another merge is
    /// in flight on this project.
    pub fn try_acquire(&self, project: &str) -> Result<OwnedMutexGuard<()>, TryLockError> {
        self.handle(project).try_lock_owned()
    }
}
