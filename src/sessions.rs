use dashmap::DashMap;
use uuid::Uuid;

/// maps an in-flight upload to the websocket client that should receive its
/// completion event. written by the chunk ingestor, consumed exactly once by
/// the completion path; consuming the entry is also the eviction policy, so
/// the map never grows past the set of genuinely in-flight uploads.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    entries: DashMap<Uuid, Uuid>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// upsert: the most recent session token for a file wins
    pub fn insert(&self, file_id: Uuid, client_id: Uuid) {
        self.entries.insert(file_id, client_id);
    }

    /// remove and return the registered client for a file
    pub fn take(&self, file_id: Uuid) -> Option<Uuid> {
        self.entries.remove(&file_id).map(|(_, client)| client)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
