use async_trait::async_trait;
use easel_types::{Canvas, CanvasMetadata, Document, DocumentId};

use crate::error::StoreResult;

/// Storage for anonymously shared, immutable documents.
///
/// All implementations must satisfy these invariants:
/// - `create` generates a fresh [`DocumentId`] and performs exactly one
///   durable write. Documents are never updated or deleted.
/// - `find_by_id` returns exactly the bytes written by `create`.
/// - A missing document is `NotFound`, never an I/O error.
///
/// Dropping a returned future aborts the underlying file or network call.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist `data` under a freshly generated id and return the id.
    async fn create(&self, data: &[u8]) -> StoreResult<DocumentId>;

    /// Read the document stored under `id`.
    async fn find_by_id(&self, id: &DocumentId) -> StoreResult<Document>;
}

/// Storage for owner-scoped, mutable canvases.
///
/// All implementations must satisfy these invariants:
/// - `(owner_id, canvas_id)` is the unique key; owners never see each other's
///   canvases.
/// - Owner and canvas ids containing a separator are rejected with
///   `InvalidKey` before any I/O.
/// - `save` replaces the stored payload atomically: a failed save leaves the
///   previous version readable.
/// - `delete` of an absent canvas succeeds.
/// - An owner with no canvases lists as empty, never as an error.
///
/// Concurrent saves to the same key race at the backend; the last writer wins.
#[async_trait]
pub trait CanvasStore: Send + Sync {
    /// List every canvas of `owner_id`, without payloads. Order is
    /// backend-dependent.
    async fn list(&self, owner_id: &str) -> StoreResult<Vec<CanvasMetadata>>;

    /// Read a canvas including its payload.
    async fn get(&self, owner_id: &str, canvas_id: &str) -> StoreResult<Canvas>;

    /// Create or fully replace a canvas, keyed by `(canvas.owner_id, canvas.id)`.
    ///
    /// The timestamps on `canvas` are ignored. The returned metadata carries
    /// the stored creation time and the time of this write, which is strictly
    /// later than the previous save's.
    async fn save(&self, canvas: &Canvas) -> StoreResult<CanvasMetadata>;

    /// Remove a canvas. Succeeds if it does not exist.
    async fn delete(&self, owner_id: &str, canvas_id: &str) -> StoreResult<()>;

    /// Change a canvas's display name, keeping its payload.
    async fn rename(
        &self,
        owner_id: &str,
        canvas_id: &str,
        name: &str,
    ) -> StoreResult<CanvasMetadata> {
        let canvas = self.get(owner_id, canvas_id).await?;
        self.save(&canvas.with_name(name)).await
    }
}

/// A backend serving both capabilities.
pub trait Store: DocumentStore + CanvasStore {}

impl<T: DocumentStore + CanvasStore> Store for T {}
