//! Structured event sink for store operations.
//!
//! Backends never log directly. They report what happened to an injected
//! [`StoreObserver`], and the process decides where events go.
//! [`TracingObserver`] forwards them to `tracing`.

use tracing::{debug, error, info, warn};

/// One observable outcome of a store operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    DocumentCreated { document_id: String, bytes: usize },
    DocumentRead { document_id: String, bytes: usize },
    DocumentMissing { document_id: String },
    CanvasListed { owner_id: String, count: usize },
    CanvasRead { owner_id: String, canvas_id: String, bytes: usize },
    CanvasMissing { owner_id: String, canvas_id: String },
    CanvasSaved { owner_id: String, canvas_id: String, bytes: usize },
    CanvasDeleted { owner_id: String, canvas_id: String },
    /// Delete of a canvas that did not exist; still a success.
    CanvasDeleteAbsent { owner_id: String, canvas_id: String },
    OperationFailed {
        op: &'static str,
        key: String,
        error: String,
    },
}

/// Receives events from a store backend.
pub trait StoreObserver: Send + Sync {
    fn record(&self, backend: &'static str, event: &StoreEvent);
}

/// Forwards store events to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl StoreObserver for TracingObserver {
    fn record(&self, backend: &'static str, event: &StoreEvent) {
        match event {
            StoreEvent::DocumentCreated { document_id, bytes } => {
                info!(backend, document_id = %document_id, bytes, "document created");
            }
            StoreEvent::DocumentRead { document_id, bytes } => {
                debug!(backend, document_id = %document_id, bytes, "document read");
            }
            StoreEvent::DocumentMissing { document_id } => {
                warn!(backend, document_id = %document_id, "document not found");
            }
            StoreEvent::CanvasListed { owner_id, count } => {
                debug!(backend, owner_id = %owner_id, count, "canvases listed");
            }
            StoreEvent::CanvasRead {
                owner_id,
                canvas_id,
                bytes,
            } => {
                debug!(backend, owner_id = %owner_id, canvas_id = %canvas_id, bytes, "canvas read");
            }
            StoreEvent::CanvasMissing {
                owner_id,
                canvas_id,
            } => {
                warn!(backend, owner_id = %owner_id, canvas_id = %canvas_id, "canvas not found");
            }
            StoreEvent::CanvasSaved {
                owner_id,
                canvas_id,
                bytes,
            } => {
                info!(backend, owner_id = %owner_id, canvas_id = %canvas_id, bytes, "canvas saved");
            }
            StoreEvent::CanvasDeleted {
                owner_id,
                canvas_id,
            } => {
                info!(backend, owner_id = %owner_id, canvas_id = %canvas_id, "canvas deleted");
            }
            StoreEvent::CanvasDeleteAbsent {
                owner_id,
                canvas_id,
            } => {
                debug!(
                    backend,
                    owner_id = %owner_id,
                    canvas_id = %canvas_id,
                    "canvas already absent; delete is a no-op"
                );
            }
            StoreEvent::OperationFailed { op, key, error } => {
                error!(backend, op, key = %key, error = %error, "store operation failed");
            }
        }
    }
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl StoreObserver for NoopObserver {
    fn record(&self, _backend: &'static str, _event: &StoreEvent) {}
}

/// Keeps every event in memory, for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: std::sync::Mutex<Vec<(&'static str, StoreEvent)>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far, oldest first.
    pub fn events(&self) -> Vec<StoreEvent> {
        self.events
            .lock()
            .expect("observer lock poisoned")
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }
}

impl StoreObserver for RecordingObserver {
    fn record(&self, backend: &'static str, event: &StoreEvent) {
        self.events
            .lock()
            .expect("observer lock poisoned")
            .push((backend, event.clone()));
    }
}
