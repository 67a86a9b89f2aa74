//! Key segment validation.
//!
//! A key segment is one component of a storage key: an owner id, a canvas id,
//! or a document id. Backends join segments with `/` (object storage) or a
//! path separator (filesystem), so a segment must never contain either.
//!
//! Valid segments:
//! - Must be non-empty and at most [`MAX_SEGMENT_LEN`] bytes
//! - Must not contain `/`, `\`, or any control character (including NUL)
//! - Must not start with `.` (rules out `.` and `..`, and reserves dot-names
//!   for backend-internal files such as temp files and metadata sidecars)

use crate::error::TypeError;

/// Longest segment accepted, in bytes. The filesystem backend names a
/// canvas sidecar `<id>.json`, which must still fit the common 255-byte
/// filename limit.
pub const MAX_SEGMENT_LEN: usize = 250;

/// Separator characters forbidden anywhere in a segment.
const SEPARATORS: &[char] = &['/', '\\'];

/// Validate a key segment, returning `Ok(())` if it is safe to embed in a
/// storage key.
///
/// # Examples
///
/// ```
/// use easel_types::validate_segment;
///
/// assert!(validate_segment("board1").is_ok());
/// assert!(validate_segment("01HZX3K5Q9V7B2M4N6P8R0T1W3").is_ok());
/// assert!(validate_segment("").is_err());
/// assert!(validate_segment("../escape").is_err());
/// assert!(validate_segment("a/b").is_err());
/// ```
pub fn validate_segment(segment: &str) -> Result<(), TypeError> {
    if segment.is_empty() {
        return Err(invalid(segment, "must not be empty"));
    }

    if segment.len() > MAX_SEGMENT_LEN {
        return Err(invalid(
            segment,
            format!("longer than {MAX_SEGMENT_LEN} bytes"),
        ));
    }

    if let Some(sep) = segment.chars().find(|c| SEPARATORS.contains(c)) {
        return Err(invalid(segment, format!("contains separator {sep:?}")));
    }

    if segment.chars().any(char::is_control) {
        return Err(invalid(segment, "contains a control character"));
    }

    if segment.starts_with('.') {
        return Err(invalid(segment, "must not start with '.'"));
    }

    Ok(())
}

fn invalid(segment: &str, reason: impl Into<String>) -> TypeError {
    TypeError::InvalidSegment {
        segment: segment.to_string(),
        reason: reason.into(),
    }
}
