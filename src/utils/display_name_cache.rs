use moka::future::Cache;
use std::time::Duration;

use crate::model::actor::ActorId;
use crate::store::AttendanceStore;

pub const UNKNOWN_ACTOR: &str = "Unknown";

/// actor id => display name, filled lazily from the store
#[derive(Clone)]
pub struct DisplayNameCache {
    names: Cache<ActorId, String>,
}

impl DisplayNameCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            names: Cache::builder()
                .max_capacity(50_000) // tune based on memory
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Resolve a display name, falling back to `UNKNOWN_ACTOR`.
    ///
    /// Lookup failures are logged and not cached so the next read retries.
    pub async fn resolve(&self, store: &dyn AttendanceStore, actor_id: ActorId) -> String {
        if let Some(name) = self.names.get(&actor_id).await {
            return name;
        }

        match store.lookup_display_name(actor_id).await {
            Ok(Some(name)) => {
                self.names.insert(actor_id, name.clone()).await;
                name
            }
            Ok(None) => {
                tracing::warn!(actor_id, "No display name for actor");
                UNKNOWN_ACTOR.to_string()
            }
            Err(e) => {
                tracing::warn!(error = %e, actor_id, "Display name lookup failed");
                UNKNOWN_ACTOR.to_string()
            }
        }
    }
}
