use std::time::Duration;

use moka::future::Cache;

use crate::payroll::edit_buffer::EditBuffer;
use crate::payroll::progression::MonthNavigator;

/// Per-user page state: selected month and pending edits.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    pub navigator: MonthNavigator,
    pub edits: EditBuffer,
}

/// Workspaces keyed by user id. Idle entries expire; the next request starts
/// from a fresh workspace snapped to the active month.
#[derive(Clone)]
pub struct WorkspaceCache {
    cache: Cache<u64, Workspace>,
}

impl WorkspaceCache {
    pub fn new(max_capacity: u64, idle: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_idle(idle)
                .build(),
        }
    }

    pub async fn load(&self, user_id: u64) -> Workspace {
        self.cache.get(&user_id).await.unwrap_or_default()
    }

    /// Last write wins when one user has concurrent requests in flight.
    pub async fn store(&self, user_id: u64, workspace: Workspace) {
        self.cache.insert(user_id, workspace).await;
    }

    pub async fn discard(&self, user_id: u64) {
        self.cache.invalidate(&user_id).await;
    }
}
