//! In-process S3 endpoint for running `S3Store` without a network bucket.
//!
//! Serves path-style object GET/HEAD/PUT/DELETE and `ListObjectsV2` with
//! prefix, delimiter and continuation tokens. Listings return at most
//! [`PAGE_SIZE`] entries per page so callers must follow pagination.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::Client;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header::{CONTENT_TYPE, ETAG, LAST_MODIFIED};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use chrono::{DateTime, SubsecRound, Utc};

pub const PAGE_SIZE: usize = 2;

const META_PREFIX: &str = "x-amz-meta-";

#[derive(Clone, Debug)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub metadata: BTreeMap<String, String>,
    pub last_modified: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct FakeS3 {
    objects: Arc<Mutex<BTreeMap<String, StoredObject>>>,
    failing: Arc<AtomicBool>,
}

enum Entry {
    Object(String, StoredObject),
    Prefix(String),
}

impl FakeS3 {
    /// Start serving on a loopback port and return a client pointed at it.
    pub async fn start() -> (Self, Client) {
        let fake = Self::default();
        let app = Router::new().fallback(handle).with_state(fake.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (fake, client_for(addr))
    }

    /// Store an object directly, without user metadata.
    pub fn insert(&self, key: &str, data: &[u8]) {
        self.objects.lock().expect("lock poisoned").insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                metadata: BTreeMap::new(),
                last_modified: Utc::now().trunc_subsecs(0),
            },
        );
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().expect("lock poisoned").get(key).cloned()
    }

    /// Answer every request with a 500 while `on` is set.
    pub fn fail_requests(&self, on: bool) {
        self.failing.store(on, Ordering::SeqCst);
    }

    fn read(&self, key: &str, with_body: bool) -> Response {
        let Some(object) = self.object(key) else {
            return error(StatusCode::NOT_FOUND, "NoSuchKey", with_body);
        };
        let mut headers = HeaderMap::new();
        for (name, value) in &object.metadata {
            let name = HeaderName::try_from(format!("{META_PREFIX}{name}"));
            if let (Ok(name), Ok(value)) = (name, HeaderValue::from_str(value)) {
                headers.insert(name, value);
            }
        }
        let modified = object
            .last_modified
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();
        headers.insert(LAST_MODIFIED, HeaderValue::from_str(&modified).unwrap());
        headers.insert(ETAG, HeaderValue::from_static("\"fake\""));
        if with_body {
            (StatusCode::OK, headers, object.data).into_response()
        } else {
            (StatusCode::OK, headers).into_response()
        }
    }

    fn write(&self, key: String, headers: &HeaderMap, body: Bytes) -> Response {
        let metadata = headers
            .iter()
            .filter_map(|(name, value)| {
                let name = name.as_str().strip_prefix(META_PREFIX)?;
                Some((name.to_string(), value.to_str().ok()?.to_string()))
            })
            .collect();
        self.objects.lock().expect("lock poisoned").insert(
            key,
            StoredObject {
                data: body.to_vec(),
                metadata,
                last_modified: Utc::now().trunc_subsecs(0),
            },
        );
        (StatusCode::OK, [(ETAG, "\"fake\"")]).into_response()
    }

    fn list(&self, bucket: &str, params: &HashMap<String, String>) -> Response {
        let prefix = params.get("prefix").cloned().unwrap_or_default();
        let delimiter = params.get("delimiter").filter(|d| !d.is_empty());
        let start: usize = params
            .get("continuation-token")
            .and_then(|token| token.parse().ok())
            .unwrap_or(0);

        let mut entries = Vec::new();
        for (key, object) in self.objects.lock().expect("lock poisoned").iter() {
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            match delimiter.and_then(|d| rest.find(d.as_str()).map(|at| at + d.len())) {
                Some(end) => {
                    let common = format!("{prefix}{}", &rest[..end]);
                    let repeated = matches!(entries.last(), Some(Entry::Prefix(p)) if *p == common);
                    if !repeated {
                        entries.push(Entry::Prefix(common));
                    }
                }
                None => entries.push(Entry::Object(key.clone(), object.clone())),
            }
        }

        let end = (start + PAGE_SIZE).min(entries.len());
        let page = entries.get(start..end).unwrap_or_default();
        let truncated = end < entries.len();

        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <ListBucketResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">",
        );
        xml.push_str(&format!("<Name>{}</Name>", escape(bucket)));
        xml.push_str(&format!("<Prefix>{}</Prefix>", escape(&prefix)));
        if let Some(delimiter) = delimiter {
            xml.push_str(&format!("<Delimiter>{}</Delimiter>", escape(delimiter)));
        }
        xml.push_str(&format!("<KeyCount>{}</KeyCount>", page.len()));
        xml.push_str(&format!("<MaxKeys>{PAGE_SIZE}</MaxKeys>"));
        xml.push_str(&format!("<IsTruncated>{truncated}</IsTruncated>"));
        if truncated {
            xml.push_str(&format!("<NextContinuationToken>{end}</NextContinuationToken>"));
        }
        for entry in page {
            match entry {
                Entry::Object(key, object) => xml.push_str(&format!(
                    "<Contents><Key>{}</Key><LastModified>{}</LastModified>\
                     <ETag>&quot;fake&quot;</ETag><Size>{}</Size>\
                     <StorageClass>STANDARD</StorageClass></Contents>",
                    escape(key),
                    object.last_modified.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                    object.data.len()
                )),
                Entry::Prefix(common) => xml.push_str(&format!(
                    "<CommonPrefixes><Prefix>{}</Prefix></CommonPrefixes>",
                    escape(common)
                )),
            }
        }
        xml.push_str("</ListBucketResult>");
        (StatusCode::OK, [(CONTENT_TYPE, "application/xml")], xml).into_response()
    }
}

async fn handle(
    State(fake): State<FakeS3>,
    method: Method,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let with_body = method != Method::HEAD;
    if fake.failing.load(Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "InternalError", with_body);
    }

    let path = percent_decode(uri.path().trim_start_matches('/'));
    let (bucket, key) = path.split_once('/').unwrap_or((path.as_str(), ""));

    match (method, key.is_empty()) {
        (Method::GET, true) => fake.list(bucket, &params),
        (Method::GET, false) => fake.read(key, true),
        (Method::HEAD, false) => fake.read(key, false),
        (Method::PUT, false) => fake.write(key.to_string(), &headers, body),
        (Method::DELETE, false) => {
            fake.objects.lock().expect("lock poisoned").remove(key);
            StatusCode::NO_CONTENT.into_response()
        }
        _ => error(StatusCode::NOT_IMPLEMENTED, "NotImplemented", with_body),
    }
}

/// S3 error response. HEAD errors carry no body, as on the real service.
fn error(status: StatusCode, code: &str, with_body: bool) -> Response {
    if !with_body {
        return status.into_response();
    }
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <Error><Code>{code}</Code><Message>{code}</Message><RequestId>fake</RequestId></Error>"
    );
    (status, [(CONTENT_TYPE, "application/xml")], xml).into_response()
}

fn client_for(addr: SocketAddr) -> Client {
    let config = aws_sdk_s3::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(Credentials::new("fake", "fake", None, None, "fake-s3"))
        .endpoint_url(format!("http://{addr}"))
        .force_path_style(true)
        .retry_config(RetryConfig::disabled())
        .build();
    Client::from_conf(config)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let hex = bytes
            .get(i + 1..i + 3)
            .and_then(|h| std::str::from_utf8(h).ok())
            .and_then(|h| u8::from_str_radix(h, 16).ok());
        match (bytes[i], hex) {
            (b'%', Some(byte)) => {
                out.push(byte);
                i += 3;
            }
            (byte, _) => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
