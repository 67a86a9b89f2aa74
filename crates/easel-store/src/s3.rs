//! Object-storage backend over S3 or an S3-compatible service.
//!
//! Documents are objects keyed by id. Canvases are objects keyed
//! `owner_id/canvas_id`, so a prefix listing of `owner_id/` enumerates one
//! owner's canvases. Canvas name and timestamps ride along as user metadata:
//!
//! | metadata key | value |
//! |---|---|
//! | `name` | display name, base64url without padding (metadata is ASCII-only) |
//! | `created-at` | RFC 3339, microsecond precision |
//! | `updated-at` | RFC 3339, microsecond precision |
//!
//! Objects written without metadata report their id as name and the object's
//! `LastModified` as both timestamps.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::{ByteStream, DateTime as ObjectTime};
use aws_sdk_s3::Client;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use easel_types::{Canvas, CanvasMetadata, Document, DocumentId};
use futures::{StreamExt, TryStreamExt};

use crate::config::S3Config;
use crate::error::{Resource, StoreError, StoreResult};
use crate::keys;
use crate::observer::{StoreEvent, StoreObserver, TracingObserver};
use crate::time::{next_updated_at, with_deadline};
use crate::traits::{CanvasStore, DocumentStore};

const BACKEND: &str = "s3";

const META_NAME: &str = "name";
const META_CREATED_AT: &str = "created-at";
const META_UPDATED_AT: &str = "updated-at";

/// Concurrent `HeadObject` requests while listing.
const LIST_CONCURRENCY: usize = 8;

/// Name and timestamps of a stored canvas object.
#[derive(Clone, Debug, PartialEq, Eq)]
struct CanvasAttributes {
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CanvasAttributes {
    /// Decode user metadata, falling back to the id and `last_modified` for
    /// objects written without it.
    fn from_metadata(
        canvas_id: &str,
        metadata: Option<&HashMap<String, String>>,
        last_modified: Option<DateTime<Utc>>,
    ) -> Self {
        let field = |name: &str| metadata.and_then(|m| m.get(name));
        let name = field(META_NAME)
            .and_then(|encoded| decode_name(encoded))
            .unwrap_or_else(|| canvas_id.to_string());
        let updated_at = field(META_UPDATED_AT)
            .and_then(|v| parse_timestamp(v))
            .or(last_modified)
            .unwrap_or_else(Utc::now);
        let created_at = field(META_CREATED_AT)
            .and_then(|v| parse_timestamp(v))
            .unwrap_or(updated_at);
        Self {
            name,
            created_at,
            updated_at,
        }
    }

    fn to_metadata(&self) -> HashMap<String, String> {
        HashMap::from([
            (META_NAME.to_string(), URL_SAFE_NO_PAD.encode(self.name.as_bytes())),
            (META_CREATED_AT.to_string(), format_timestamp(self.created_at)),
            (META_UPDATED_AT.to_string(), format_timestamp(self.updated_at)),
        ])
    }
}

fn decode_name(encoded: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

fn from_object_time(ts: &ObjectTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())
}

fn backend_error<E>(err: E) -> StoreError
where
    E: std::error::Error,
{
    StoreError::Backend(DisplayErrorContext(&err).to_string())
}

/// Document and canvas store over a single bucket.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    op_timeout: Option<Duration>,
    observer: Arc<dyn StoreObserver>,
}

impl S3Store {
    /// Build a client from the ambient AWS configuration plus the overrides in
    /// `config`.
    ///
    /// Fails with a configuration error if no region or credentials provider
    /// can be resolved, or if `verify_bucket` is set and the bucket cannot be
    /// reached.
    pub async fn connect(config: &S3Config) -> StoreResult<Self> {
        if config.bucket.is_empty() {
            return Err(StoreError::Configuration("S3 bucket name is empty".into()));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        if sdk_config.region().is_none() {
            return Err(StoreError::Configuration(
                "no AWS region configured; set `region` or AWS_REGION".into(),
            ));
        }
        if sdk_config.credentials_provider().is_none() {
            return Err(StoreError::Configuration(
                "no AWS credentials provider could be resolved".into(),
            ));
        }

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        let store = Self::from_client(Client::from_conf(builder.build()), config.bucket.clone());

        if config.verify_bucket {
            store
                .client
                .head_bucket()
                .bucket(&store.bucket)
                .send()
                .await
                .map_err(|e| {
                    StoreError::Configuration(format!(
                        "bucket {} is not accessible: {}",
                        store.bucket,
                        DisplayErrorContext(&e)
                    ))
                })?;
        }

        tracing::info!(bucket = %store.bucket, "connected to object storage");
        Ok(store)
    }

    /// Wrap an already configured client.
    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            op_timeout: None,
            observer: Arc::new(TracingObserver),
        }
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

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn emit(&self, event: StoreEvent) {
        self.observer.record(BACKEND, &event);
    }

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

    async fn put(
        &self,
        key: &str,
        data: &[u8],
        metadata: Option<HashMap<String, String>>,
    ) -> StoreResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/octet-stream")
            .set_metadata(metadata)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    /// Fetch an object's bytes, metadata, and modification time.
    async fn fetch(
        &self,
        resource: Resource,
        key: &str,
    ) -> StoreResult<(Vec<u8>, Option<HashMap<String, String>>, Option<DateTime<Utc>>)> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    return Err(StoreError::not_found(resource, key));
                }
                return Err(backend_error(err));
            }
        };
        let metadata = output.metadata().cloned();
        let last_modified = output.last_modified().and_then(from_object_time);
        let data = output
            .body
            .collect()
            .await
            .map_err(backend_error)?
            .into_bytes()
            .to_vec();
        Ok((data, metadata, last_modified))
    }

    /// Attributes of a canvas object, or `None` if it does not exist.
    async fn head_canvas(&self, key: &str, canvas_id: &str) -> StoreResult<Option<CanvasAttributes>> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => Ok(Some(CanvasAttributes::from_metadata(
                canvas_id,
                output.metadata(),
                output.last_modified().and_then(from_object_time),
            ))),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(None),
            Err(err) => Err(backend_error(err)),
        }
    }
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store")
            .field("bucket", &self.bucket)
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}

#[async_trait]
impl DocumentStore for S3Store {
    async fn create(&self, data: &[u8]) -> StoreResult<DocumentId> {
        let id = DocumentId::generate();
        let key = keys::document_key(&id)?;

        let result = with_deadline(self.op_timeout, self.put(&key, data, None)).await;
        self.observed("create", &key, result)?;

        self.emit(StoreEvent::DocumentCreated {
            document_id: key,
            bytes: data.len(),
        });
        Ok(id)
    }

    async fn find_by_id(&self, id: &DocumentId) -> StoreResult<Document> {
        let key = keys::document_key(id)?;
        let result = with_deadline(self.op_timeout, self.fetch(Resource::Document, &key)).await;

        match self.observed("find_by_id", &key, result) {
            Ok((data, _, _)) => {
                self.emit(StoreEvent::DocumentRead {
                    document_id: key,
                    bytes: data.len(),
                });
                Ok(Document::new(data))
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
impl CanvasStore for S3Store {
    async fn list(&self, owner_id: &str) -> StoreResult<Vec<CanvasMetadata>> {
        let prefix = keys::owner_prefix(owner_id)?;

        let result = with_deadline(self.op_timeout, async {
            let mut pages = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix)
                .delimiter(keys::SEPARATOR.to_string())
                .into_paginator()
                .send();

            let mut found = Vec::new();
            while let Some(page) = pages.next().await {
                let page = page.map_err(backend_error)?;
                for object in page.contents() {
                    let Some(key) = object.key() else { continue };
                    let Some(canvas_id) = keys::canvas_id_from_key(&prefix, key) else {
                        continue;
                    };
                    found.push((key.to_string(), canvas_id.to_string()));
                }
            }

            let described: Vec<Option<CanvasMetadata>> = futures::stream::iter(found)
                .map(|(key, canvas_id)| async move {
                    // Deleted between the listing and the head: skip it.
                    let attrs = self.head_canvas(&key, &canvas_id).await?;
                    Ok::<_, StoreError>(attrs.map(|attrs| CanvasMetadata {
                        id: canvas_id,
                        owner_id: owner_id.to_string(),
                        name: attrs.name,
                        created_at: attrs.created_at,
                        updated_at: attrs.updated_at,
                    }))
                })
                .buffer_unordered(LIST_CONCURRENCY)
                .try_collect()
                .await?;

            Ok(described.into_iter().flatten().collect::<Vec<_>>())
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
        let result = with_deadline(self.op_timeout, self.fetch(Resource::Canvas, &key)).await;

        match self.observed("get", &key, result) {
            Ok((data, metadata, last_modified)) => {
                let attrs =
                    CanvasAttributes::from_metadata(canvas_id, metadata.as_ref(), last_modified);
                self.emit(StoreEvent::CanvasRead {
                    owner_id: owner_id.to_string(),
                    canvas_id: canvas_id.to_string(),
                    bytes: data.len(),
                });
                Ok(Canvas {
                    id: canvas_id.to_string(),
                    owner_id: owner_id.to_string(),
                    name: attrs.name,
                    data,
                    created_at: attrs.created_at,
                    updated_at: attrs.updated_at,
                })
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

        let result = with_deadline(self.op_timeout, async {
            let previous = self.head_canvas(&key, &canvas.id).await?;
            let updated_at = next_updated_at(previous.as_ref().map(|p| p.updated_at));
            let attrs = CanvasAttributes {
                name: canvas.name.clone(),
                created_at: previous.map(|p| p.created_at).unwrap_or(updated_at),
                updated_at,
            };
            self.put(&key, &canvas.data, Some(attrs.to_metadata())).await?;
            Ok(attrs)
        })
        .await;

        let attrs = self.observed("save", &key, result)?;
        self.emit(StoreEvent::CanvasSaved {
            owner_id: canvas.owner_id.clone(),
            canvas_id: canvas.id.clone(),
            bytes: canvas.data.len(),
        });
        Ok(CanvasMetadata {
            id: canvas.id.clone(),
            owner_id: canvas.owner_id.clone(),
            name: attrs.name,
            created_at: attrs.created_at,
            updated_at: attrs.updated_at,
        })
    }

    async fn delete(&self, owner_id: &str, canvas_id: &str) -> StoreResult<()> {
        let key = keys::canvas_key(owner_id, canvas_id)?;

        // DeleteObject succeeds whether or not the key exists.
        let result = with_deadline(self.op_timeout, async {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
                .map_err(backend_error)?;
            Ok(())
        })
        .await;

        self.observed("delete", &key, result)?;
        self.emit(StoreEvent::CanvasDeleted {
            owner_id: owner_id.to_string(),
            canvas_id: canvas_id.to_string(),
        });
        Ok(())
    }
}
