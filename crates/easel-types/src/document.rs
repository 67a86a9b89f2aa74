use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;
use crate::segment::validate_segment;

/// Identifier for a shared document.
///
/// Freshly generated ids are UUID v7 values rendered as 32 lowercase hex
/// characters. The leading 48 bits of a v7 UUID are the Unix timestamp in
/// milliseconds, so comparing two generated ids as strings orders them by
/// creation time. The alphabet is `[0-9a-f]`, usable as a path segment or
/// object key without escaping.
///
/// Parsed ids only need to be valid key segments: ids issued by earlier
/// deployments in other formats remain addressable.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    /// Generate a new, unique, time-ordered identifier.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }

    /// Parse an identifier received from a caller (e.g. a share link).
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        validate_segment(s)?;
        Ok(Self(s.to_string()))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DocumentId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_segment(&value)?;
        Ok(Self(value))
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An immutable, anonymously shared byte payload.
///
/// Documents have no owner. They are created once under a generated
/// [`DocumentId`] and never updated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    pub data: Vec<u8>,
}

impl Document {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    /// Size of the payload in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
