//! Per-pass snapshot memoization

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::{Snapshot, SnapshotBuilder};
use crate::error::Result;

/// Memoizes snapshots by `(user_id, period_days)`
///
/// Scoped to one generation or advisor call: construct a fresh cache per
/// pass and drop it afterwards. There is no eviction or invalidation.
pub struct SnapshotCache<'a> {
    builder: SnapshotBuilder<'a>,
    entries: Mutex<HashMap<(String, u32), Arc<Snapshot>>>,
}

impl<'a> SnapshotCache<'a> {
    pub fn new(builder: SnapshotBuilder<'a>) -> Self {
        Self {
            builder,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached snapshot, building it on first request
    ///
    /// Build errors are not cached; the next call retries.
    pub fn get(&self, user_id: &str, period_days: u32) -> Result<Arc<Snapshot>> {
        let key = (user_id.to_string(), period_days);
        if let Some(hit) = self.lock().get(&key) {
            debug!(user_id, period_days, "Snapshot cache hit");
            return Ok(Arc::clone(hit));
        }

        let snapshot = Arc::new(self.builder.build(user_id, period_days)?);
        self.lock().insert(key, Arc::clone(&snapshot));
        Ok(snapshot)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, u32), Arc<Snapshot>>> {
        // A poisoned map still holds complete entries
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
