use std::sync::Arc;

use crate::content_store::ContentStore;
use crate::hub::NotificationHub;
use crate::sessions::SessionRegistry;
use crate::store::MetadataStore;

/// shared application state, injected into every handler
pub struct AppState {
    /// metadata rows (files, chunks, thumbnails)
    pub store: Arc<dyn MetadataStore>,
    /// content-addressed blob storage
    pub content: ContentStore,
    /// file_id -> websocket client awaiting the completion event
    pub sessions: SessionRegistry,
    /// live event fan-out
    pub hub: NotificationHub,
    /// maximum accepted chunk payload in bytes
    pub max_chunk_size: usize,
}

impl AppState {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        content: ContentStore,
        hub: NotificationHub,
        max_chunk_size: usize,
    ) -> Self {
        Self {
            store,
            content,
            sessions: SessionRegistry::new(),
            hub,
            max_chunk_size,
        }
    }
}
