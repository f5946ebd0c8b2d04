//! The set of live refreshers for one rendered message.

use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::backend::Backend;
use crate::clock::{Clock, system_clock};
use crate::config::RefreshConfig;
use crate::store::ChatStore;
use crate::transcript::{EmbedKey, MetabaseEmbedData};

use super::error::RefreshError;
use super::refresher::{EmbedRefreshHandle, EmbedRefresher, EmbedSnapshot, RefreshOutcome};

/// One refresher per embed identity, kept in display order.
pub struct EmbedDeck {
    backend: Arc<dyn Backend>,
    store: Arc<ChatStore>,
    config: RefreshConfig,
    clock: Clock,
    handles: DashMap<EmbedKey, EmbedRefreshHandle>,
    order: Mutex<Vec<EmbedKey>>,
}

impl EmbedDeck {
    /// Create an empty deck.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, store: Arc<ChatStore>, config: RefreshConfig) -> Self {
        Self {
            backend,
            store,
            config,
            clock: system_clock(),
            handles: DashMap::new(),
            order: Mutex::new(Vec::new()),
        }
    }

    /// Replace the clock handed to new refreshers.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Match the deck to a message's current embed set.
    ///
    /// Existing refreshers adopt the fresh data, new embeds get a running
    /// refresher and embeds no longer present are torn down. Must be called
    /// within a Tokio runtime.
    pub fn sync(&self, embeds: &[MetabaseEmbedData]) {
        let mut keys: Vec<EmbedKey> = Vec::with_capacity(embeds.len());

        for embed in embeds {
            let key = embed.key();
            match self.handles.entry(key) {
                Entry::Occupied(entry) => {
                    if entry.get().refresher().reconcile(embed) {
                        tracing::debug!(question_id = embed.question_id, "Embed source updated");
                    }
                }
                Entry::Vacant(entry) => {
                    let refresher = EmbedRefresher::new(
                        embed.clone(),
                        Arc::clone(&self.backend),
                        Arc::clone(&self.store),
                        self.config,
                    )
                    .with_clock(Arc::clone(&self.clock));
                    entry.insert(Arc::new(refresher).spawn());
                }
            }
            if !keys.contains(&key) {
                keys.push(key);
            }
        }

        self.handles.retain(|key, _| keys.contains(key));
        *self.order.lock().unwrap_or_else(PoisonError::into_inner) = keys;
    }

    /// Refresher for `key`, if the embed is displayed.
    #[must_use]
    pub fn get(&self, key: &EmbedKey) -> Option<Arc<EmbedRefresher>> {
        self.handles
            .get(key)
            .map(|handle| Arc::clone(handle.refresher()))
    }

    /// Manually refresh one embed.
    ///
    /// Returns `None` when the embed is not displayed.
    pub async fn refresh(&self, key: &EmbedKey) -> Option<Result<RefreshOutcome, RefreshError>> {
        let refresher = self.get(key)?;
        Some(refresher.refresh().await)
    }

    /// Render state of every displayed embed, in display order.
    #[must_use]
    pub fn snapshots(&self) -> Vec<EmbedSnapshot> {
        let order = self.order.lock().unwrap_or_else(PoisonError::into_inner).clone();
        order
            .iter()
            .filter_map(|key| self.get(key))
            .map(|refresher| refresher.snapshot())
            .collect()
    }

    /// Number of displayed embeds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no embed is displayed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Tear down every refresher.
    pub fn clear(&self) {
        self.handles.clear();
        self.order.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
