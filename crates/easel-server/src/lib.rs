//! HTTP server for easel.
//!
//! Serves anonymous share-link documents and per-owner canvas storage over
//! any [`easel_store::Store`] backend. Canvas routes require a bearer token
//! whose subject becomes the owner id.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use auth::{AuthProvider, Credentials, Identity, JwtAuth};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::EaselServer;
pub use state::AppState;
