//! Snapshot persistence over key/value stores
//!
//! Images are kept as a JSON array of data URLs under a single key, in
//! either the local or the session tier.

use crate::error::MediaResult;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Key under which snapshots are stored
pub const IMAGE_STORAGE_KEY: &str = "camerakit-images";

/// Which persistence tier snapshots go to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageMethod {
    /// Survives restarts
    #[default]
    Local,
    /// Cleared with the session
    Session,
    /// Nothing is stored
    Disabled,
}

impl StorageMethod {
    /// Whether snapshots are persisted at all
    pub fn is_enabled(&self) -> bool {
        !matches!(self, StorageMethod::Disabled)
    }
}

/// String key/value persistence
pub trait KeyValueStore: Send + Sync + fmt::Debug {
    /// Value stored under `key`
    fn get_item(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value
    fn set_item(&self, key: &str, value: &str) -> MediaResult<()>;
}

/// In-memory [`KeyValueStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.read().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> MediaResult<()> {
        self.items.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Snapshot storage across the local and session tiers
#[derive(Debug, Clone)]
pub struct ImageStorage {
    local: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
}

impl ImageStorage {
    /// Create storage over the two tiers
    pub fn new(local: Arc<dyn KeyValueStore>, session: Arc<dyn KeyValueStore>) -> Self {
        Self { local, session }
    }

    /// Storage backed by two fresh [`MemoryStore`]s
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    fn tier(&self, method: StorageMethod) -> Option<&Arc<dyn KeyValueStore>> {
        match method {
            StorageMethod::Local => Some(&self.local),
            StorageMethod::Session => Some(&self.session),
            StorageMethod::Disabled => None,
        }
    }

    /// All stored images, or `None` when storage is disabled
    ///
    /// A stored value that is not a JSON array is treated as empty.
    pub fn get_images(&self, method: StorageMethod) -> MediaResult<Option<Vec<String>>> {
        let Some(store) = self.tier(method) else {
            return Ok(None);
        };

        let Some(raw) = store.get_item(IMAGE_STORAGE_KEY) else {
            return Ok(Some(Vec::new()));
        };

        match serde_json::from_str::<serde_json::Value>(&raw)? {
            serde_json::Value::Array(items) => Ok(Some(
                items
                    .into_iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            )),
            _ => {
                warn!("Invalid value found in storage under {}", IMAGE_STORAGE_KEY);
                Ok(Some(Vec::new()))
            }
        }
    }

    /// Append an image to the selected tier; no-op when disabled
    pub fn save_image(&self, image: &str, method: StorageMethod) -> MediaResult<()> {
        let Some(store) = self.tier(method) else {
            return Ok(());
        };

        let mut images = self.get_images(method)?.unwrap_or_default();
        images.push(image.to_string());
        store.set_item(IMAGE_STORAGE_KEY, &serde_json::to_string(&images)?)?;

        debug!("Stored image #{} in {:?} storage", images.len(), method);
        Ok(())
    }
}
