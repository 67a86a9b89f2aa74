//! Document and canvas storage for easel.
//!
//! Two kinds of records are stored:
//!
//! - **Documents** -- anonymous, immutable byte payloads addressed by a
//!   generated [`DocumentId`](easel_types::DocumentId). Used for share links.
//! - **Canvases** -- mutable drawing boards scoped to an owner, addressed by
//!   `(owner_id, canvas_id)` and listed per owner.
//!
//! # Storage Backends
//!
//! All backends implement [`DocumentStore`] and [`CanvasStore`]:
//!
//! - [`FsStore`] -- one file per record under a root directory
//! - [`S3Store`] -- one object per record in an S3 (or compatible) bucket
//! - [`InMemoryStore`] -- `HashMap`-based store for tests and embedding
//!
//! [`open_store`] picks one from a [`StoreConfig`].
//!
//! # Design Rules
//!
//! 1. Every key segment is validated before any I/O; a rejected key never
//!    reaches the filesystem or the bucket.
//! 2. Payloads are opaque bytes, stored and returned unchanged.
//! 3. A canvas keeps its creation time across saves, and each save moves
//!    its update time strictly forward.
//! 4. Concurrent saves to one canvas resolve last-writer-wins.
//! 5. Absence is always [`StoreError::NotFound`], never an I/O error.
//! 6. Every outcome is reported to a [`StoreObserver`].

pub mod backend;
pub mod config;
pub mod error;
pub mod fs;
pub mod keys;
pub mod memory;
pub mod observer;
pub mod s3;
pub mod traits;

mod time;

pub use backend::open_store;
pub use config::{BackendConfig, S3Config, StoreConfig};
pub use error::{ErrorKind, Resource, StoreError, StoreResult};
pub use fs::FsStore;
pub use memory::InMemoryStore;
pub use observer::{NoopObserver, RecordingObserver, StoreEvent, StoreObserver, TracingObserver};
pub use s3::S3Store;
pub use traits::{CanvasStore, DocumentStore, Store};
