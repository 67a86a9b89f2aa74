use std::time::Duration;

/// What kind of record an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    Document,
    Canvas,
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Document => write!(f, "document"),
            Self::Canvas => write!(f, "canvas"),
        }
    }
}

/// Coarse classification of a [`StoreError`].
///
/// Callers branch on the kind rather than on individual variants: `NotFound`
/// is an expected negative result, `Io` is retryable, `Configuration` only
/// happens while a backend is being constructed, and `InvalidKey` is raised
/// before any I/O is attempted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Io,
    Configuration,
    InvalidKey,
}

/// Errors from document and canvas store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested document or canvas does not exist.
    #[error("{resource} not found: {key}")]
    NotFound { resource: Resource, key: String },

    /// An owner, canvas, or document id would cross a namespace boundary.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// Local I/O error from the filesystem backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport or service error from a remote backend.
    #[error("backend error: {0}")]
    Backend(String),

    /// The operation did not finish within the configured deadline.
    #[error("operation timed out after {0:?}")]
    DeadlineExceeded(Duration),

    /// Stored metadata could not be decoded.
    #[error("corrupt metadata for {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// The backend could not be initialized.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl StoreError {
    pub fn not_found(resource: Resource, key: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            key: key.into(),
        }
    }

    /// Map this error onto the store's error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidKey { .. } => ErrorKind::InvalidKey,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Io(_) | Self::Backend(_) | Self::DeadlineExceeded(_) | Self::Corrupt { .. } => {
                ErrorKind::Io
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Whether the caller may reasonably retry the operation.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Io
    }
}

impl From<easel_types::TypeError> for StoreError {
    fn from(err: easel_types::TypeError) -> Self {
        match err {
            easel_types::TypeError::InvalidSegment { segment, reason } => Self::InvalidKey {
                key: segment,
                reason,
            },
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
