//! Filesystem backend.
//!
//! On-disk layout under the root directory:
//!
//! ```text
//! <root>/<document_id>                      document payload
//! <root>/<owner_id>/<canvas_id>             canvas payload
//! <root>/<owner_id>/.meta/<canvas_id>.json  canvas name and timestamps
//! ```
//!
//! Payload files hold the raw bytes and nothing else, so trees written by
//! earlier deployments stay readable. A canvas without a sidecar is reported
//! with its id as name and its file mtime as both timestamps.
//!
//! Every write goes to a dot-prefixed temp file in the target directory and is
//! then renamed over the destination. Readers see either the old or the new
//! version, never a truncated one. Dot-prefixed names are not valid key
//! segments, so temp files and the `.meta` directory never show up in
//! listings.
//!
//! Writes run on their own task. A deadline stops the caller waiting but never
//! interrupts a commit halfway, so temp files are always cleaned up. A canvas
//! save stages both files before renaming either one. If the sidecar rename
//! fails, the previous payload comes back from a hard-linked `.bak-` copy.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use easel_types::{validate_segment, Canvas, CanvasMetadata, Document, DocumentId};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{Resource, StoreError, StoreResult};
use crate::keys;
use crate::observer::{StoreEvent, StoreObserver, TracingObserver};
use crate::time::{next_updated_at, with_deadline};
use crate::traits::{CanvasStore, DocumentStore};

const BACKEND: &str = "fs";

/// Per-owner directory holding canvas sidecars.
const META_DIR: &str = ".meta";

/// Canvas attributes that do not fit in the payload file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CanvasSidecar {
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Document and canvas store over a local directory tree.
pub struct FsStore {
    root: PathBuf,
    op_timeout: Option<Duration>,
    observer: Arc<dyn StoreObserver>,
}

impl FsStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    ///
    /// Fails with a configuration error if the root cannot be created or is
    /// not a writable directory.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            StoreError::Configuration(format!(
                "cannot create storage root {}: {e}",
                root.display()
            ))
        })?;
        let meta = tokio::fs::metadata(&root).await.map_err(|e| {
            StoreError::Configuration(format!("cannot stat storage root {}: {e}", root.display()))
        })?;
        if !meta.is_dir() {
            return Err(StoreError::Configuration(format!(
                "storage root {} is not a directory",
                root.display()
            )));
        }
        if meta.permissions().readonly() {
            return Err(StoreError::Configuration(format!(
                "storage root {} is read-only",
                root.display()
            )));
        }
        Ok(Self {
            root,
            op_timeout: None,
            observer: Arc::new(TracingObserver),
        })
    }

    /// Replace the event sink.
    pub fn with_observer(mut self, observer: Arc<dyn StoreObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Abort any single operation that runs longer than `limit`.
    pub fn with_timeout(mut self, limit: Option<Duration>) -> Self {
        self.op_timeout = limit;
        self
    }

    /// The root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn owner_dir(&self, owner_id: &str) -> PathBuf {
        self.root.join(owner_id)
    }

    fn sidecar_path(&self, owner_id: &str, canvas_id: &str) -> PathBuf {
        self.owner_dir(owner_id)
            .join(META_DIR)
            .join(format!("{canvas_id}.json"))
    }

    fn emit(&self, event: StoreEvent) {
        self.observer.record(BACKEND, &event);
    }

    /// Report a failed operation. Missing records are reported by the caller
    /// with a more specific event.
    fn observed<T>(&self, op: &'static str, key: &str, result: StoreResult<T>) -> StoreResult<T> {
        if let Err(err) = &result {
            if !err.is_not_found() {
                self.emit(StoreEvent::OperationFailed {
                    op,
                    key: key.to_string(),
                    error: err.to_string(),
                });
            }
        }
        result
    }

    async fn read_sidecar(&self, owner_id: &str, canvas_id: &str) -> StoreResult<Option<CanvasSidecar>> {
        let path = self.sidecar_path(owner_id, canvas_id);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key: format!("{owner_id}/{canvas_id}"),
                reason: e.to_string(),
            })
    }

    /// Name and timestamps for a canvas whose payload file has metadata `stat`.
    async fn describe(
        &self,
        owner_id: &str,
        canvas_id: &str,
        stat: &std::fs::Metadata,
    ) -> StoreResult<CanvasSidecar> {
        if let Some(sidecar) = self.read_sidecar(owner_id, canvas_id).await? {
            return Ok(sidecar);
        }
        let modified = mtime(stat)?;
        Ok(CanvasSidecar {
            name: canvas_id.to_string(),
            created_at: modified,
            updated_at: modified,
        })
    }
}

impl std::fmt::Debug for FsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsStore")
            .field("root", &self.root)
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}

fn mtime(stat: &std::fs::Metadata) -> StoreResult<DateTime<Utc>> {
    Ok(DateTime::<Utc>::from(stat.modified()?).trunc_subsecs(6))
}

/// Run a filesystem commit to completion on its own task.
///
/// Dropping the returned future detaches the task instead of aborting it.
async fn detached<T, F>(commit: F) -> io::Result<T>
where
    T: Send + 'static,
    F: Future<Output = io::Result<T>> + Send + 'static,
{
    tokio::spawn(commit).await.map_err(io::Error::other)?
}

fn parent(path: &Path) -> io::Result<&Path> {
    path.parent()
        .ok_or_else(|| io::Error::other(format!("{} has no parent directory", path.display())))
}

/// Best-effort removal of a temp or backup file.
async fn discard(path: &Path) {
    let _ = tokio::fs::remove_file(path).await;
}

/// Write `data` to a fresh temp file next to `target` and return its path.
async fn stage(target: &Path, data: &[u8]) -> io::Result<PathBuf> {
    let tmp = parent(target)?.join(format!(".tmp-{}", Uuid::now_v7().simple()));
    let result = async {
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(data).await?;
        file.sync_all().await
    }
    .await;
    match result {
        Ok(()) => Ok(tmp),
        Err(e) => {
            discard(&tmp).await;
            Err(e)
        }
    }
}

/// Write `data` to `path` through a temp file and a rename.
async fn write_atomic(path: PathBuf, data: Vec<u8>) -> io::Result<()> {
    let tmp = stage(&path, &data).await?;
    if let Err(e) = tokio::fs::rename(&tmp, &path).await {
        discard(&tmp).await;
        return Err(e);
    }
    Ok(())
}

/// Keep the current file at `path` reachable under a dot-prefixed name.
/// Returns `None` when there is nothing at `path`.
async fn backup(path: &Path) -> io::Result<Option<PathBuf>> {
    let backup = parent(path)?.join(format!(".bak-{}", Uuid::now_v7().simple()));
    match tokio::fs::hard_link(path, &backup).await {
        Ok(()) => Ok(Some(backup)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        // Filesystems without hard links.
        Err(_) => match tokio::fs::copy(path, &backup).await {
            Ok(_) => Ok(Some(backup)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                discard(&backup).await;
                Err(e)
            }
        },
    }
}

/// A canvas payload and its sidecar, replaced as a pair.
struct CanvasCommit {
    payload: PathBuf,
    data: Vec<u8>,
    sidecar: PathBuf,
    encoded: Vec<u8>,
}

impl CanvasCommit {
    async fn apply(self) -> io::Result<()> {
        let payload_tmp = stage(&self.payload, &self.data).await?;
        let sidecar_tmp = match stage(&self.sidecar, &self.encoded).await {
            Ok(tmp) => tmp,
            Err(e) => {
                discard(&payload_tmp).await;
                return Err(e);
            }
        };
        let previous = match backup(&self.payload).await {
            Ok(previous) => previous,
            Err(e) => {
                discard(&payload_tmp).await;
                discard(&sidecar_tmp).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&payload_tmp, &self.payload).await {
            discard(&payload_tmp).await;
            discard(&sidecar_tmp).await;
            if let Some(previous) = &previous {
                discard(previous).await;
            }
            return Err(e);
        }

        if let Err(e) = tokio::fs::rename(&sidecar_tmp, &self.sidecar).await {
            discard(&sidecar_tmp).await;
            let restored = match &previous {
                Some(previous) => tokio::fs::rename(previous, &self.payload).await,
                None => tokio::fs::remove_file(&self.payload).await,
            };
            if let Err(restore) = restored {
                tracing::error!(
                    path = %self.payload.display(),
                    error = %restore,
                    "could not roll back canvas payload"
                );
            }
            return Err(e);
        }

        if let Some(previous) = &previous {
            discard(previous).await;
        }
        Ok(())
    }
}

/// Remove `path`, returning `false` if it did not exist.
async fn remove_if_present(path: &Path) -> io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl DocumentStore for FsStore {
    async fn create(&self, data: &[u8]) -> StoreResult<DocumentId> {
        let id = DocumentId::generate();
        let key = keys::document_key(&id)?;
        let path = self.root.join(&key);

        let result = with_deadline(self.op_timeout, async {
            detached(write_atomic(path, data.to_vec())).await?;
            Ok::<_, StoreError>(())
        })
        .await;
        self.observed("create", &key, result)?;

        self.emit(StoreEvent::DocumentCreated {
            document_id: key,
            bytes: data.len(),
        });
        Ok(id)
    }

    async fn find_by_id(&self, id: &DocumentId) -> StoreResult<Document> {
        let key = keys::document_key(id)?;
        let path = self.root.join(&key);

        let result = with_deadline(self.op_timeout, async {
            match tokio::fs::read(&path).await {
                Ok(data) => Ok(Document::new(data)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    Err(StoreError::not_found(Resource::Document, key.as_str()))
                }
                // An owner directory shares the document namespace on disk.
                Err(e) => match tokio::fs::metadata(&path).await {
                    Ok(stat) if stat.is_dir() => {
                        Err(StoreError::not_found(Resource::Document, key.as_str()))
                    }
                    _ => Err(e.into()),
                },
            }
        })
        .await;

        match self.observed("find_by_id", &key, result) {
            Ok(doc) => {
                self.emit(StoreEvent::DocumentRead {
                    document_id: key,
                    bytes: doc.len(),
                });
                Ok(doc)
            }
            Err(err) => {
                if err.is_not_found() {
                    self.emit(StoreEvent::DocumentMissing { document_id: key });
                }
                Err(err)
            }
        }
    }
}

#[async_trait]
impl CanvasStore for FsStore {
    async fn list(&self, owner_id: &str) -> StoreResult<Vec<CanvasMetadata>> {
        let prefix = keys::owner_prefix(owner_id)?;
        let dir = self.owner_dir(owner_id);

        let result = with_deadline(self.op_timeout, async {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(StoreError::from(e)),
            };

            let mut listed = Vec::new();
            while let Some(entry) = entries.next_entry().await? {
                let Ok(canvas_id) = entry.file_name().into_string() else {
                    continue;
                };
                if validate_segment(&canvas_id).is_err() {
                    continue;
                }
                let stat = match entry.metadata().await {
                    Ok(stat) => stat,
                    // Deleted between read_dir and stat.
                    Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                    Err(e) => return Err(e.into()),
                };
                if !stat.is_file() {
                    continue;
                }
                let sidecar = self.describe(owner_id, &canvas_id, &stat).await?;
                listed.push(CanvasMetadata {
                    id: canvas_id,
                    owner_id: owner_id.to_string(),
                    name: sidecar.name,
                    created_at: sidecar.created_at,
                    updated_at: sidecar.updated_at,
                });
            }
            Ok(listed)
        })
        .await;

        let listed = self.observed("list", &prefix, result)?;
        self.emit(StoreEvent::CanvasListed {
            owner_id: owner_id.to_string(),
            count: listed.len(),
        });
        Ok(listed)
    }

    async fn get(&self, owner_id: &str, canvas_id: &str) -> StoreResult<Canvas> {
        let key = keys::canvas_key(owner_id, canvas_id)?;
        let path = self.owner_dir(owner_id).join(canvas_id);

        let result = with_deadline(self.op_timeout, async {
            let data = match tokio::fs::read(&path).await {
                Ok(data) => data,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(StoreError::not_found(Resource::Canvas, key.as_str()));
                }
                Err(e) => return Err(e.into()),
            };
            let stat = tokio::fs::metadata(&path).await?;
            let sidecar = self.describe(owner_id, canvas_id, &stat).await?;
            Ok(Canvas {
                id: canvas_id.to_string(),
                owner_id: owner_id.to_string(),
                name: sidecar.name,
                data,
                created_at: sidecar.created_at,
                updated_at: sidecar.updated_at,
            })
        })
        .await;

        match self.observed("get", &key, result) {
            Ok(canvas) => {
                self.emit(StoreEvent::CanvasRead {
                    owner_id: owner_id.to_string(),
                    canvas_id: canvas_id.to_string(),
                    bytes: canvas.data.len(),
                });
                Ok(canvas)
            }
            Err(err) => {
                if err.is_not_found() {
                    self.emit(StoreEvent::CanvasMissing {
                        owner_id: owner_id.to_string(),
                        canvas_id: canvas_id.to_string(),
                    });
                }
                Err(err)
            }
        }
    }

    async fn save(&self, canvas: &Canvas) -> StoreResult<CanvasMetadata> {
        let key = keys::canvas_key(&canvas.owner_id, &canvas.id)?;
        let dir = self.owner_dir(&canvas.owner_id);
        let path = dir.join(&canvas.id);
        let sidecar_path = self.sidecar_path(&canvas.owner_id, &canvas.id);

        let result = with_deadline(self.op_timeout, async {
            tokio::fs::create_dir_all(dir.join(META_DIR)).await?;

            let previous = match self.read_sidecar(&canvas.owner_id, &canvas.id).await {
                Ok(Some(sidecar)) => Some((sidecar.created_at, sidecar.updated_at)),
                // Unreadable sidecar: the save below replaces it.
                Ok(None) | Err(StoreError::Corrupt { .. }) => {
                    match tokio::fs::metadata(&path).await {
                        Ok(stat) => {
                            let modified = mtime(&stat)?;
                            Some((modified, modified))
                        }
                        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(err) => return Err(err),
            };

            let updated_at = next_updated_at(previous.map(|(_, updated)| updated));
            let sidecar = CanvasSidecar {
                name: canvas.name.clone(),
                created_at: previous.map(|(created, _)| created).unwrap_or(updated_at),
                updated_at,
            };
            let encoded = serde_json::to_vec(&sidecar).map_err(|e| StoreError::Corrupt {
                key: key.clone(),
                reason: e.to_string(),
            })?;

            let commit = CanvasCommit {
                payload: path.clone(),
                data: canvas.data.clone(),
                sidecar: sidecar_path.clone(),
                encoded,
            };
            detached(commit.apply()).await?;
            Ok(sidecar)
        })
        .await;

        let sidecar = self.observed("save", &key, result)?;
        self.emit(StoreEvent::CanvasSaved {
            owner_id: canvas.owner_id.clone(),
            canvas_id: canvas.id.clone(),
            bytes: canvas.data.len(),
        });
        Ok(CanvasMetadata {
            id: canvas.id.clone(),
            owner_id: canvas.owner_id.clone(),
            name: sidecar.name,
            created_at: sidecar.created_at,
            updated_at: sidecar.updated_at,
        })
    }

    async fn delete(&self, owner_id: &str, canvas_id: &str) -> StoreResult<()> {
        let key = keys::canvas_key(owner_id, canvas_id)?;
        let path = self.owner_dir(owner_id).join(canvas_id);
        let sidecar_path = self.sidecar_path(owner_id, canvas_id);

        let result = with_deadline(self.op_timeout, async {
            let existed = detached(async move {
                let existed = remove_if_present(&path).await?;
                remove_if_present(&sidecar_path).await?;
                Ok::<_, io::Error>(existed)
            })
            .await?;
            Ok::<_, StoreError>(existed)
        })
        .await;

        let existed = self.observed("delete", &key, result)?;
        let (owner_id, canvas_id) = (owner_id.to_string(), canvas_id.to_string());
        if existed {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::observer::{NoopObserver, RecordingObserver};

    async fn temp_store() -> (tempfile::TempDir, FsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path())
            .await
            .unwrap()
            .with_observer(Arc::new(NoopObserver));
        (dir, store)
    }

    /// Temp and backup files left in an owner directory or its `.meta`.
    fn leftovers(owner_dir: &Path) -> Vec<String> {
        [owner_dir.to_path_buf(), owner_dir.join(META_DIR)]
            .iter()
            .filter_map(|dir| std::fs::read_dir(dir).ok())
            .flatten()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(".tmp-") || name.starts_with(".bak-"))
            .collect()
    }

    /// A sidecar destination that cannot be renamed over.
    fn blocked_sidecar(dir: &Path) -> PathBuf {
        let blocker = dir.join("alice").join(META_DIR).join("blocked.json");
        std::fs::create_dir_all(blocker.join("inner")).unwrap();
        blocker
    }

    #[tokio::test]
    async fn open_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("store");
        let store = FsStore::open(&root).await.unwrap();
        assert!(root.is_dir());
        assert_eq!(store.root(), root.as_path());
    }

    #[tokio::test]
    async fn open_rejects_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        let err = FsStore::open(&file).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn document_is_flat_file() {
        let (dir, store) = temp_store().await;
        let id = store.create(b"hello").await.unwrap();
        let on_disk = std::fs::read(dir.path().join(id.as_str())).unwrap();
        assert_eq!(on_disk, b"hello");
    }

    #[tokio::test]
    async fn canvas_layout_on_disk() {
        let (dir, store) = temp_store().await;
        store
            .save(&Canvas::new("alice", "board1", b"v1".to_vec()).with_name("Plan"))
            .await
            .unwrap();
        let payload = std::fs::read(dir.path().join("alice").join("board1")).unwrap();
        assert_eq!(payload, b"v1");
        let sidecar: CanvasSidecar = serde_json::from_slice(
            &std::fs::read(dir.path().join("alice").join(".meta").join("board1.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(sidecar.name, "Plan");
    }

    #[tokio::test]
    async fn legacy_canvas_without_sidecar() {
        let (dir, store) = temp_store().await;
        std::fs::create_dir_all(dir.path().join("bob")).unwrap();
        std::fs::write(dir.path().join("bob").join("old"), b"legacy").unwrap();

        let canvas = store.get("bob", "old").await.unwrap();
        assert_eq!(canvas.data, b"legacy");
        assert_eq!(canvas.name, "old");

        let listed = store.list("bob").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "old");
    }

    #[tokio::test]
    async fn listing_skips_internal_files() {
        let (dir, store) = temp_store().await;
        store
            .save(&Canvas::new("alice", "board1", b"v1".to_vec()))
            .await
            .unwrap();
        std::fs::write(dir.path().join("alice").join(".tmp-leftover"), b"partial").unwrap();
        std::fs::create_dir(dir.path().join("alice").join("subdir")).unwrap();

        let listed = store.list("alice").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "board1");
    }

    #[tokio::test]
    async fn save_leaves_no_temp_files() {
        let (dir, store) = temp_store().await;
        for round in 0..3 {
            store
                .save(&Canvas::new("alice", "board1", vec![round]))
                .await
                .unwrap();
        }
        assert!(leftovers(&dir.path().join("alice")).is_empty());
    }

    #[tokio::test]
    async fn failed_sidecar_rename_restores_previous_version() {
        let (dir, store) = temp_store().await;
        let v1 = store
            .save(&Canvas::new("alice", "board1", b"v1".to_vec()).with_name("Old"))
            .await
            .unwrap();

        let commit = CanvasCommit {
            payload: dir.path().join("alice").join("board1"),
            data: b"v2".to_vec(),
            sidecar: blocked_sidecar(dir.path()),
            encoded: b"{}".to_vec(),
        };
        assert!(commit.apply().await.is_err());

        let canvas = store.get("alice", "board1").await.unwrap();
        assert_eq!(canvas.data, b"v1");
        assert_eq!(canvas.name, "Old");
        assert_eq!(canvas.created_at, v1.created_at);
        assert_eq!(canvas.updated_at, v1.updated_at);
        assert!(leftovers(&dir.path().join("alice")).is_empty());
    }

    #[tokio::test]
    async fn failed_first_save_leaves_no_payload() {
        let (dir, store) = temp_store().await;
        let commit = CanvasCommit {
            payload: dir.path().join("alice").join("fresh"),
            data: b"v1".to_vec(),
            sidecar: blocked_sidecar(dir.path()),
            encoded: b"{}".to_vec(),
        };
        assert!(commit.apply().await.is_err());

        let err = store.get("alice", "fresh").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(store.list("alice").await.unwrap().is_empty());
        assert!(leftovers(&dir.path().join("alice")).is_empty());
    }

    #[tokio::test]
    async fn abandoned_commit_still_completes() {
        let (dir, store) = temp_store().await;
        store
            .save(&Canvas::new("alice", "board1", b"v1".to_vec()).with_name("Old"))
            .await
            .unwrap();

        let stamp = Utc::now().trunc_subsecs(6);
        let sidecar = CanvasSidecar {
            name: "New".into(),
            created_at: stamp,
            updated_at: stamp,
        };
        let commit = CanvasCommit {
            payload: dir.path().join("alice").join("board1"),
            data: b"v2".to_vec(),
            sidecar: store.sidecar_path("alice", "board1"),
            encoded: serde_json::to_vec(&sidecar).unwrap(),
        };
        // Give up on the commit right away; the task keeps running.
        let _ = tokio::time::timeout(Duration::from_nanos(1), detached(commit.apply())).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        let canvas = store.get("alice", "board1").await.unwrap();
        assert_eq!(canvas.data, b"v2");
        assert_eq!(canvas.name, "New");
        assert!(leftovers(&dir.path().join("alice")).is_empty());
    }

    #[tokio::test]
    async fn expired_deadline_keeps_canvas_consistent() {
        let (dir, store) = temp_store().await;
        store
            .save(&Canvas::new("alice", "board1", b"v1".to_vec()).with_name("Old"))
            .await
            .unwrap();

        let hurried = FsStore::open(dir.path())
            .await
            .unwrap()
            .with_observer(Arc::new(NoopObserver))
            .with_timeout(Some(Duration::from_nanos(1)));
        for _ in 0..10 {
            let _ = hurried
                .save(&Canvas::new("alice", "board1", b"v2".to_vec()).with_name("New"))
                .await;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        let canvas = store.get("alice", "board1").await.unwrap();
        let pair = (canvas.data.as_slice(), canvas.name.as_str());
        assert!(pair == (b"v1".as_slice(), "Old") || pair == (b"v2".as_slice(), "New"));
        assert!(leftovers(&dir.path().join("alice")).is_empty());
    }

    #[tokio::test]
    async fn longest_canvas_id_round_trips() {
        let (_dir, store) = temp_store().await;
        let id = "c".repeat(easel_types::MAX_SEGMENT_LEN);
        store
            .save(&Canvas::new("alice", id.clone(), b"v1".to_vec()).with_name("Long"))
            .await
            .unwrap();
        let canvas = store.get("alice", &id).await.unwrap();
        assert_eq!(canvas.name, "Long");
        assert_eq!(store.list("alice").await.unwrap()[0].id, id);
    }

    #[tokio::test]
    async fn corrupt_sidecar_is_reported() {
        let (dir, store) = temp_store().await;
        store
            .save(&Canvas::new("alice", "board1", b"v1".to_vec()))
            .await
            .unwrap();
        std::fs::write(
            dir.path().join("alice").join(".meta").join("board1.json"),
            b"{not json",
        )
        .unwrap();

        let err = store.get("alice", "board1").await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));

        // A new save repairs it.
        store
            .save(&Canvas::new("alice", "board1", b"v2".to_vec()))
            .await
            .unwrap();
        assert_eq!(store.get("alice", "board1").await.unwrap().data, b"v2");
    }

    #[tokio::test]
    async fn document_id_naming_an_owner_directory_is_missing() {
        let (_dir, store) = temp_store().await;
        store
            .save(&Canvas::new("alice", "board1", b"v1".to_vec()))
            .await
            .unwrap();
        let err = store
            .find_by_id(&DocumentId::parse("alice").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn delete_removes_sidecar() {
        let (dir, store) = temp_store().await;
        store
            .save(&Canvas::new("alice", "board1", b"v1".to_vec()))
            .await
            .unwrap();
        store.delete("alice", "board1").await.unwrap();
        assert!(!dir.path().join("alice").join("board1").exists());
        assert!(!dir
            .path()
            .join("alice")
            .join(".meta")
            .join("board1.json")
            .exists());
    }

    #[tokio::test]
    async fn events_are_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let observer = Arc::new(RecordingObserver::new());
        let store = FsStore::open(dir.path())
            .await
            .unwrap()
            .with_observer(observer.clone());

        store.get("bob", "missing").await.unwrap_err();
        store.delete("bob", "missing").await.unwrap();

        assert_eq!(
            observer.events(),
            vec![
                StoreEvent::CanvasMissing {
                    owner_id: "bob".into(),
                    canvas_id: "missing".into(),
                },
                StoreEvent::CanvasDeleteAbsent {
                    owner_id: "bob".into(),
                    canvas_id: "missing".into(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn traversal_never_touches_disk() {
        let (dir, store) = temp_store().await;
        let err = store
            .save(&Canvas::new("alice", "../escape", b"x".to_vec()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidKey);
        assert!(!dir.path().join("escape").exists());
        assert!(!dir.path().join("alice").exists());
    }
}
