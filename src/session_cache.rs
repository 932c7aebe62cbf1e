//! Bounded in-memory cache of non-default sessions
//!
//! The default session is fixed at construction and is never evicted or replaced. Other
//! models are built on demand through the [`SessionFactory`] and kept in a small
//! least-recently-used list. A capacity of zero builds a fresh session for every lookup.
//!
//! The list lock only guards slot bookkeeping. Each model owns a [`OnceCell`] slot, so a
//! slow load blocks lookups for that model only and every model is built once.

use crate::error::Result;
use crate::models::ModelId;
use crate::session::{Session, SessionFactory};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCacheStats {
    /// Number of loaded non-default sessions
    pub total_sessions: usize,
    /// Lookups served by the default session or a cached one
    pub cache_hits: u64,
    /// Lookups that had to build a session
    pub cache_misses: u64,
}

type Slot = Arc<OnceCell<Arc<Session>>>;

pub struct SessionCache {
    default_session: Arc<Session>,
    factory: Arc<dyn SessionFactory>,
    capacity: usize,
    entries: Mutex<VecDeque<(ModelId, Slot)>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SessionCache {
    #[must_use]
    pub fn new(
        default_session: Arc<Session>,
        factory: Arc<dyn SessionFactory>,
        capacity: usize,
    ) -> Self {
        Self {
            default_session,
            factory,
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn default_session(&self) -> &Arc<Session> {
        &self.default_session
    }

    #[must_use]
    pub fn default_model(&self) -> ModelId {
        self.default_session.model()
    }

    /// Session for `model`, building and caching one if needed
    ///
    /// # Errors
    /// - `ModelLoad` from the factory
    pub async fn get(&self, model: ModelId) -> Result<Arc<Session>> {
        if model == self.default_session.model() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(&self.default_session));
        }

        if self.capacity == 0 {
            self.misses.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(model = %model, "building uncached session");
            return Ok(Arc::new(self.factory.create_session(model).await?));
        }

        let slot = self.slot(model).await;
        if let Some(session) = slot.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(session));
        }

        let built = AtomicBool::new(false);
        let result = slot
            .get_or_try_init(|| async {
                built.store(true, Ordering::Relaxed);
                tracing::info!(model = %model, "loading session");
                self.factory.create_session(model).await.map(Arc::new)
            })
            .await
            .map(Arc::clone);

        if built.load(Ordering::Relaxed) {
            self.misses.fetch_add(1, Ordering::Relaxed);
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }

        if result.is_err() {
            self.entries
                .lock()
                .await
                .retain(|(_, cached)| !Arc::ptr_eq(cached, &slot));
        }
        result
    }

    /// Slot for `model`, marked most recently used; a new slot may evict the oldest
    async fn slot(&self, model: ModelId) -> Slot {
        let mut entries = self.entries.lock().await;

        if let Some(position) = entries.iter().position(|(id, _)| *id == model) {
            if let Some(entry) = entries.remove(position) {
                let slot = Arc::clone(&entry.1);
                entries.push_back(entry);
                return slot;
            }
        }

        if entries.len() >= self.capacity {
            if let Some((evicted, _)) = entries.pop_front() {
                tracing::debug!(model = %evicted, "evicting cached session");
            }
        }
        let slot = Slot::default();
        entries.push_back((model, Arc::clone(&slot)));
        slot
    }

    /// Models with a loaded session, least recently used first
    pub async fn cached_models(&self) -> Vec<ModelId> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(id, _)| *id)
            .collect()
    }

    pub async fn stats(&self) -> SessionCacheStats {
        SessionCacheStats {
            total_sessions: self.cached_models().await.len(),
            cache_hits: self.hits.load(Ordering::Relaxed),
            cache_misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("default_model", &self.default_session.model())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
