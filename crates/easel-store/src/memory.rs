use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use easel_types::{Canvas, CanvasMetadata, Document, DocumentId};

use crate::error::{Resource, StoreError, StoreResult};
use crate::keys;
use crate::observer::{NoopObserver, StoreEvent, StoreObserver};
use crate::traits::{CanvasStore, DocumentStore};

const BACKEND: &str = "memory";

#[derive(Clone)]
struct StoredCanvas {
    name: String,
    data: Vec<u8>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// In-memory, HashMap-based store.
///
/// Intended for tests and embedding. Data lives behind `RwLock`s and is
/// cloned on read and write, so callers never share buffers with the store.
/// Keys follow the same validation rules as the persistent backends.
pub struct InMemoryStore {
    documents: RwLock<HashMap<String, Vec<u8>>>,
    /// owner id -> canvas id -> canvas
    canvases: RwLock<HashMap<String, HashMap<String, StoredCanvas>>>,
    observer: Arc<dyn StoreObserver>,
}

impl InMemoryStore {
    /// Create a new empty store that discards events.
    pub fn new() -> Self {
        Self::with_observer(Arc::new(NoopObserver))
    }

    pub fn with_observer(observer: Arc<dyn StoreObserver>) -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            canvases: RwLock::new(HashMap::new()),
            observer,
        }
    }

    /// Number of documents currently stored.
    pub fn document_count(&self) -> usize {
        self.documents.read().expect("lock poisoned").len()
    }

    /// Number of canvases currently stored, across all owners.
    pub fn canvas_count(&self) -> usize {
        self.canvases
            .read()
            .expect("lock poisoned")
            .values()
            .map(HashMap::len)
            .sum()
    }

    fn emit(&self, event: StoreEvent) {
        self.observer.record(BACKEND, &event);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("document_count", &self.document_count())
            .field("canvas_count", &self.canvas_count())
            .finish()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn create(&self, data: &[u8]) -> StoreResult<DocumentId> {
        let id = DocumentId::generate();
        let key = keys::document_key(&id)?;
        self.documents
            .write()
            .expect("lock poisoned")
            .insert(key, data.to_vec());
        self.emit(StoreEvent::DocumentCreated {
            document_id: id.to_string(),
            bytes: data.len(),
        });
        Ok(id)
    }

    async fn find_by_id(&self, id: &DocumentId) -> StoreResult<Document> {
        let key = keys::document_key(id)?;
        let data = self.documents.read().expect("lock poisoned").get(&key).cloned();
        match data {
            Some(data) => {
                self.emit(StoreEvent::DocumentRead {
                    document_id: key,
                    bytes: data.len(),
                });
                Ok(Document::new(data))
            }
            None => {
                self.emit(StoreEvent::DocumentMissing {
                    document_id: key.clone(),
                });
                Err(StoreError::not_found(Resource::Document, key))
            }
        }
    }
}

#[async_trait]
impl CanvasStore for InMemoryStore {
    async fn list(&self, owner_id: &str) -> StoreResult<Vec<CanvasMetadata>> {
        keys::owner_prefix(owner_id)?;
        let map = self.canvases.read().expect("lock poisoned");
        let listed: Vec<CanvasMetadata> = map
            .get(owner_id)
            .map(|owned| {
                owned
                    .iter()
                    .map(|(id, stored)| CanvasMetadata {
                        id: id.clone(),
                        owner_id: owner_id.to_string(),
                        name: stored.name.clone(),
                        created_at: stored.created_at,
                        updated_at: stored.updated_at,
                    })
                    .collect()
            })
            .unwrap_or_default();
        drop(map);
        self.emit(StoreEvent::CanvasListed {
            owner_id: owner_id.to_string(),
            count: listed.len(),
        });
        Ok(listed)
    }

    async fn get(&self, owner_id: &str, canvas_id: &str) -> StoreResult<Canvas> {
        let key = keys::canvas_key(owner_id, canvas_id)?;
        let stored = self
            .canvases
            .read()
            .expect("lock poisoned")
            .get(owner_id)
            .and_then(|owned| owned.get(canvas_id))
            .cloned();
        let Some(stored) = stored else {
            self.emit(StoreEvent::CanvasMissing {
                owner_id: owner_id.to_string(),
                canvas_id: canvas_id.to_string(),
            });
            return Err(StoreError::not_found(Resource::Canvas, key));
        };
        self.emit(StoreEvent::CanvasRead {
            owner_id: owner_id.to_string(),
            canvas_id: canvas_id.to_string(),
            bytes: stored.data.len(),
        });
        Ok(Canvas {
            id: canvas_id.to_string(),
            owner_id: owner_id.to_string(),
            name: stored.name,
            data: stored.data,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }

    async fn save(&self, canvas: &Canvas) -> StoreResult<CanvasMetadata> {
        keys::canvas_key(&canvas.owner_id, &canvas.id)?;
        let mut map = self.canvases.write().expect("lock poisoned");
        let owned = map.entry(canvas.owner_id.clone()).or_default();
        let previous = owned.get(&canvas.id);
        let updated_at = crate::time::next_updated_at(previous.map(|p| p.updated_at));
        let created_at = previous.map(|p| p.created_at).unwrap_or(updated_at);
        owned.insert(
            canvas.id.clone(),
            StoredCanvas {
                name: canvas.name.clone(),
                data: canvas.data.clone(),
                created_at,
                updated_at,
            },
        );
        drop(map);
        self.emit(StoreEvent::CanvasSaved {
            owner_id: canvas.owner_id.clone(),
            canvas_id: canvas.id.clone(),
            bytes: canvas.data.len(),
        });
        Ok(CanvasMetadata {
            id: canvas.id.clone(),
            owner_id: canvas.owner_id.clone(),
            name: canvas.name.clone(),
            created_at,
            updated_at,
        })
    }

    async fn delete(&self, owner_id: &str, canvas_id: &str) -> StoreResult<()> {
        keys::canvas_key(owner_id, canvas_id)?;
        let removed = self
            .canvases
            .write()
            .expect("lock poisoned")
            .get_mut(owner_id)
            .and_then(|owned| owned.remove(canvas_id))
            .is_some();
        let (owner_id, canvas_id) = (owner_id.to_string(), canvas_id.to_string());
        if removed {
            self.emit(StoreEvent::CanvasDeleted {
                owner_id,
                canvas_id,
            });
        } else {
            self.emit(StoreEvent::CanvasDeleteAbsent {
                owner_id,
                canvas_id,
            });
        }
        Ok(())
    }
}
