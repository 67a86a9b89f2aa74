use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An owner-scoped, mutable drawing board.
///
/// `(owner_id, id)` is the unique key. Two owners may use the same canvas id
/// without colliding. The payload is opaque to the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Canvas {
    /// Canvas identifier, unique within the owner's namespace.
    pub id: String,
    /// Opaque identifier of the owning user.
    pub owner_id: String,
    /// Display name. Defaults to the canvas id.
    pub name: String,
    /// Raw payload bytes.
    pub data: Vec<u8>,
    /// When the canvas was first saved.
    pub created_at: DateTime<Utc>,
    /// When the canvas was last saved.
    pub updated_at: DateTime<Utc>,
}

impl Canvas {
    /// Create a canvas named after its id, stamped with the current time.
    ///
    /// Stores assign their own timestamps on save; the values set here only
    /// matter until the canvas is persisted.
    pub fn new(owner_id: impl Into<String>, id: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let id = id.into();
        let now = Utc::now();
        Self {
            name: id.clone(),
            id,
            owner_id: owner_id.into(),
            data: data.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The payload-free listing record for this canvas.
    pub fn metadata(&self) -> CanvasMetadata {
        CanvasMetadata {
            id: self.id.clone(),
            owner_id: self.owner_id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Lightweight listing record: everything about a canvas except its payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasMetadata {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
