//! Locally materialized audio clips.
//!
//! Downloaded announcement audio is wrapped as a [`ClipHandle`] -- the
//! in-process equivalent of a blob object URL. Handles are owned by the
//! store, keyed by announcement, and must be released when superseded or
//! when the session ends. Thread safety is handled at the resolver level
//! via `Arc<RwLock<ClipStore>>`.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::announce::AnnouncementKey;

/// A locally playable audio clip. Cheap to clone; the payload is shared.
#[derive(Debug, Clone)]
pub struct ClipHandle {
    id: Uuid,
    bytes: Arc<Vec<u8>>,
}

impl ClipHandle {
    fn new(bytes: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            bytes: Arc::new(bytes),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Owns every live clip handle for one session.
#[derive(Debug, Default)]
pub struct ClipStore {
    entries: HashMap<AnnouncementKey, ClipHandle>,
}

impl ClipStore {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Store a clip for `key`, releasing any prior clip for the same key
    /// first. Returns the new handle.
    pub fn insert(&mut self, key: AnnouncementKey, bytes: Vec<u8>) -> ClipHandle {
        let handle = ClipHandle::new(bytes);
        if let Some(old) = self.entries.insert(key, handle.clone()) {
            tracing::debug!(old_id = %old.id(), new_id = %handle.id(), "superseded clip released");
        }
        handle
    }

    pub fn get(&self, key: &AnnouncementKey) -> Option<ClipHandle> {
        self.entries.get(key).cloned()
    }

    /// Whether a handle is still live (not released or superseded).
    pub fn is_live(&self, id: Uuid) -> bool {
        self.entries.values().any(|h| h.id() == id)
    }

    /// Release the clip for `key`. Returns true if one existed.
    pub fn release(&mut self, key: &AnnouncementKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Release every clip. Called on session exit.
    pub fn release_all(&mut self) {
        let n = self.entries.len();
        self.entries.clear();
        if n > 0 {
            tracing::debug!(released = n, "all clips released");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
