//! Request-keyed query cache with deduplication and revalidation.
//!
//! # Design
//! Each key maps to an entry holding a `watch` channel with the latest
//! [`QueryState`], the generation of the newest fetch, whether a fetch is in
//! flight, and how many [`QueryHandle`]s are mounted on it.
//!
//! - A key with a fetch in flight is never fetched twice; new handles just
//!   subscribe to the entry's channel.
//! - Every fetch takes a fresh generation from a cache-wide counter. A
//!   completed fetch is applied only when its entry still exists and still
//!   carries that generation, so the most recently *requested* fetch wins.
//! - Dropping the last handle for a key evicts the entry; a fetch that
//!   resolves afterwards is discarded.
//!
//! The entry map sits behind a `parking_lot::Mutex` that is never held
//! across an `.await`. Fetches run as spawned tokio tasks, so handles must be
//! created inside a tokio runtime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::ApiError;

/// Loads the value behind a key. Injected once per cache.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Value, ApiError>;
}

/// Snapshot of a key as observed by its handles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryState {
    /// Last successfully fetched value. Kept across failed revalidations.
    pub data: Option<Arc<Value>>,
    /// Error of the most recent completed fetch, cleared on success.
    pub error: Option<ApiError>,
    /// A fetch is running and there is no data to show yet.
    pub is_loading: bool,
    /// A fetch is running, with or without stale data.
    pub is_validating: bool,
}

struct Entry {
    state: watch::Sender<QueryState>,
    generation: u64,
    in_flight: bool,
    subscribers: usize,
}

impl Entry {
    fn new() -> Self {
        let (state, _) = watch::channel(QueryState::default());
        Self {
            state,
            generation: 0,
            in_flight: false,
            subscribers: 0,
        }
    }
}

struct Shared {
    fetcher: Arc<dyn Fetcher>,
    config: CacheConfig,
    entries: Mutex<HashMap<String, Entry>>,
    generations: AtomicU64,
}

/// Cheap to clone; clones share entries.
#[derive(Clone)]
pub struct QueryCache {
    shared: Arc<Shared>,
}

impl QueryCache {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_config(fetcher, CacheConfig::default())
    }

    pub fn with_config(fetcher: Arc<dyn Fetcher>, config: CacheConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                fetcher,
                config,
                entries: Mutex::new(HashMap::new()),
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// Mount a handle on `key`. `None` yields a disabled handle that never
    /// fetches and reports an idle, empty state.
    pub fn query(&self, key: Option<&str>) -> QueryHandle {
        let Some(key) = key else {
            let (_, receiver) = watch::channel(QueryState::default());
            return QueryHandle {
                key: None,
                receiver,
                cache: self.clone(),
            };
        };

        let mut entries = self.shared.entries.lock();
        let entry = entries.entry(key.to_string()).or_insert_with(Entry::new);
        entry.subscribers += 1;
        let receiver = entry.state.subscribe();

        let has_data = entry.state.borrow().data.is_some();
        if entry.in_flight {
            debug!(key, "joining in-flight fetch");
        } else if !has_data || self.shared.config.revalidate_on_mount {
            self.start_fetch(key, entry);
        }

        QueryHandle {
            key: Some(key.to_string()),
            receiver,
            cache: self.clone(),
        }
    }

    /// Re-fetch `key` now, even if a fetch is already in flight. Returns
    /// false when no handle is mounted on the key.
    pub fn revalidate(&self, key: &str) -> bool {
        let mut entries = self.shared.entries.lock();
        match entries.get_mut(key) {
            Some(entry) => {
                self.start_fetch(key, entry);
                true
            }
            None => false,
        }
    }

    /// The application regained focus: re-fetch every mounted key that is idle.
    pub fn focus(&self) {
        if !self.shared.config.revalidate_on_focus {
            return;
        }
        let mut entries = self.shared.entries.lock();
        for (key, entry) in entries.iter_mut() {
            if !entry.in_flight {
                self.start_fetch(key, entry);
            }
        }
    }

    /// Current state of a mounted key.
    pub fn peek(&self, key: &str) -> Option<QueryState> {
        let entries = self.shared.entries.lock();
        entries.get(key).map(|entry| entry.state.borrow().clone())
    }

    /// Number of mounted keys.
    pub fn len(&self) -> usize {
        self.shared.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn start_fetch(&self, key: &str, entry: &mut Entry) {
        let generation = self.shared.generations.fetch_add(1, Ordering::Relaxed) + 1;
        entry.generation = generation;
        entry.in_flight = true;
        entry.state.send_modify(|state| {
            state.is_validating = true;
            state.is_loading = state.data.is_none();
        });
        debug!(key, generation, "fetch started");

        let cache = self.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            let result = cache.shared.fetcher.fetch(&key).await;
            cache.complete(&key, generation, result);
        });
    }

    fn complete(&self, key: &str, generation: u64, result: Result<Value, ApiError>) {
        let mut entries = self.shared.entries.lock();
        let Some(entry) = entries.get_mut(key) else {
            debug!(key, generation, "discarding result for unmounted key");
            return;
        };
        if entry.generation != generation {
            debug!(key, generation, latest = entry.generation, "discarding superseded result");
            return;
        }

        entry.in_flight = false;
        entry.state.send_modify(|state| {
            match result {
                Ok(value) => {
                    state.data = Some(Arc::new(value));
                    state.error = None;
                }
                Err(err) => {
                    warn!(key, error = %err, "fetch failed");
                    state.error = Some(err);
                }
            }
            state.is_loading = false;
            state.is_validating = false;
        });
    }

    fn release(&self, key: &str) {
        let mut entries = self.shared.entries.lock();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        entry.subscribers = entry.subscribers.saturating_sub(1);
        if entry.subscribers == 0 {
            entries.remove(key);
            debug!(key, "evicted");
        }
    }
}

/// A mounted interest in one key. Dropping it unmounts the key.
pub struct QueryHandle {
    key: Option<String>,
    receiver: watch::Receiver<QueryState>,
    cache: QueryCache,
}

impl QueryHandle {
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    pub fn state(&self) -> QueryState {
        self.receiver.borrow().clone()
    }

    pub fn data(&self) -> Option<Arc<Value>> {
        self.receiver.borrow().data.clone()
    }

    pub fn error(&self) -> Option<ApiError> {
        self.receiver.borrow().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.receiver.borrow().is_loading
    }

    pub fn is_validating(&self) -> bool {
        self.receiver.borrow().is_validating
    }

    /// Re-fetch this key immediately. No-op for a disabled handle.
    pub fn mutate(&self) {
        if let Some(key) = &self.key {
            self.cache.revalidate(key);
        }
    }

    /// Wait for the next state change. `None` once the key can no longer
    /// change (disabled handle).
    pub async fn changed(&mut self) -> Option<QueryState> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Wait until no fetch is running for this key and return that state.
    pub async fn settled(&mut self) -> QueryState {
        if let Ok(state) = self.receiver.wait_for(|state| !state.is_validating).await {
            return (*state).clone();
        }
        self.state()
    }

    /// Hand the handle to a task that invokes `callback` with the current
    /// state and then on every change. Aborting the task unmounts the key.
    pub fn on_change<F>(mut self, mut callback: F) -> JoinHandle<()>
    where
        F: FnMut(&QueryState) + Send + 'static,
    {
        tokio::spawn(async move {
            callback(&self.state());
            while let Some(state) = self.changed().await {
                callback(&state);
            }
        })
    }
}

impl Drop for QueryHandle {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.cache.release(&key);
        }
    }
}
