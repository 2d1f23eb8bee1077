// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session serialization and snapshot loading.

use std::sync::Arc;

use dashmap::DashMap;
use sift_core::memory::SessionSnapshot;
use sift_core::traits::SessionStore;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

/// One async mutex per session id.
///
/// Turns of the same session run one at a time; turns of different
/// sessions never touch the same lock.
#[derive(Default)]
pub struct SessionLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `session_id`.
    pub async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(session_id.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Drop lock entries nobody holds or waits on. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - self.locks.len()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// The live snapshot for `session_id`.
///
/// When it has expired or was never written, a fresh one is started whose
/// turn numbering continues after the last turn in the durable log.
pub async fn load_snapshot(store: &dyn SessionStore, session_id: &str) -> SessionSnapshot {
    match store.get_snapshot(session_id).await {
        Ok(Some(snapshot)) => return snapshot,
        Ok(None) => {}
        Err(e) => warn!(session_id, error = %e, "snapshot read failed, starting fresh"),
    }

    let next_turn_index = match store.load_turns(session_id).await {
        Ok(turns) => turns.last().map_or(0, |t| t.turn_index + 1),
        Err(e) => {
            warn!(session_id, error = %e, "turn log read failed");
            0
        }
    };
    debug!(session_id, next_turn_index, "new session snapshot");
    SessionSnapshot {
        next_turn_index,
        ..SessionSnapshot::default()
    }
}
