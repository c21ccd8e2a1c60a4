use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::approval::service::{AttendancePage, CommitEvent, CommitListener, PendingApproval};
use crate::model::attendance::EmployeeId;

const PENDING_KEY: &str = "pending";

/// (employee filter, page, per_page)
type ListKey = (Option<EmployeeId>, u64, u64);

/// Read-side cache for the attendance list and the pending-approvals queue.
///
/// Entries are dropped on every commit that touches them; the TTL only bounds
/// staleness if a notification is ever missed.
///
/// Every commit bumps a generation counter. A view computed under an older
/// generation is never kept, so a rebuild that overlaps a commit cannot
/// repopulate the cache with pre-commit data.
#[derive(Clone)]
pub struct ViewCache {
    pending: Cache<&'static str, Arc<Vec<PendingApproval>>>,
    lists: Cache<ListKey, Arc<AttendancePage>>,
    generation: Arc<AtomicU64>,
}

impl ViewCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
            lists: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .support_invalidation_closures()
                .build(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Read before querying the store; hand it back to `store_*`.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    pub async fn pending(&self) -> Option<Arc<Vec<PendingApproval>>> {
        self.pending.get(PENDING_KEY).await
    }

    /// Caches the queue unless a commit landed since `generation` was read.
    pub async fn store_pending(&self, queue: Arc<Vec<PendingApproval>>, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.pending.insert(PENDING_KEY, queue).await;
        // a commit between the check and the insert may have invalidated first
        if !self.is_current(generation) {
            self.pending.invalidate(PENDING_KEY).await;
            return false;
        }
        true
    }

    pub async fn list(&self, key: &ListKey) -> Option<Arc<AttendancePage>> {
        self.lists.get(key).await
    }

    pub async fn store_list(&self, key: ListKey, page: Arc<AttendancePage>, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.lists.insert(key, page).await;
        if !self.is_current(generation) {
            self.lists.invalidate(&key).await;
            return false;
        }
        true
    }

    fn invalidate_lists_for(&self, employee_id: EmployeeId) {
        let result = self
            .lists
            .invalidate_entries_if(move |(filter, _, _), _| {
                filter.is_none_or(|e| e == employee_id)
            });
        if let Err(e) = result {
            tracing::warn!(error = %e, employee_id, "Falling back to full list invalidation");
            self.lists.invalidate_all();
        }
    }
}

#[async_trait]
impl CommitListener for ViewCache {
    async fn on_commit(&self, event: &CommitEvent) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.invalidate_lists_for(event.employee_id);
        if event.pending_queue_changed {
            self.pending.invalidate(PENDING_KEY).await;
        }
        tracing::debug!(record_id = event.record_id, kind = ?event.kind, "Attendance views invalidated");
    }
}
