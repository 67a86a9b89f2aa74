//! Storage key derivation shared by every backend.
//!
//! Documents are keyed by their id alone. Canvases are keyed
//! `owner_id/canvas_id`. Both stay stable across backends and releases:
//! share links and saved canvases must remain addressable.
//!
//! Every segment is validated before a key is built, so a malicious owner or
//! canvas id is rejected before any I/O happens.

use easel_types::{validate_segment, DocumentId};

use crate::error::StoreResult;

/// Separator between the owner and canvas segments of a canvas key.
pub const SEPARATOR: char = '/';

/// Key under which a document is stored.
pub fn document_key(id: &DocumentId) -> StoreResult<String> {
    validate_segment(id.as_str())?;
    Ok(id.as_str().to_string())
}

/// Key under which the canvas `canvas_id` of `owner_id` is stored.
pub fn canvas_key(owner_id: &str, canvas_id: &str) -> StoreResult<String> {
    validate_segment(owner_id)?;
    validate_segment(canvas_id)?;
    Ok(format!("{owner_id}{SEPARATOR}{canvas_id}"))
}

/// Prefix shared by every canvas key of `owner_id`, separator included.
pub fn owner_prefix(owner_id: &str) -> StoreResult<String> {
    validate_segment(owner_id)?;
    Ok(format!("{owner_id}{SEPARATOR}"))
}

/// Recover the canvas id from a key returned by a prefix listing.
///
/// Returns `None` for keys outside `prefix` or nested below it, which cannot
/// have been written through [`canvas_key`].
pub fn canvas_id_from_key<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    let tail = key.strip_prefix(prefix)?;
    if validate_segment(tail).is_err() {
        return None;
    }
    Some(tail)
}
