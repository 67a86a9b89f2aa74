//! Foundation types for easel.
//!
//! This crate provides the identifier and record types shared by the store
//! backends, the HTTP server, and the CLI. Every other easel crate depends on
//! `easel-types`.
//!
//! # Key Types
//!
//! - [`DocumentId`] -- Time-ordered, URL-safe identifier for shared documents
//! - [`Document`] -- Immutable, anonymously shared byte payload
//! - [`Canvas`] -- Owner-scoped, mutable drawing board
//! - [`CanvasMetadata`] -- Payload-free listing record for a canvas
//!
//! Key segments (owner ids, canvas ids, document ids) all obey the rules in
//! [`segment`], which keep one owner's keys from escaping into another
//! owner's namespace.

pub mod canvas;
pub mod document;
pub mod error;
pub mod segment;

pub use canvas::{Canvas, CanvasMetadata};
pub use document::{Document, DocumentId};
pub use error::TypeError;
pub use segment::{validate_segment, MAX_SEGMENT_LEN};
