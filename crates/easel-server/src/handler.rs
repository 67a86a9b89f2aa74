use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use easel_store::StoreError;
use easel_types::{Canvas, CanvasMetadata, DocumentId};
use serde::{Deserialize, Serialize};

use crate::auth::Identity;
use crate::error::ServerResult;
use crate::state::AppState;

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedDocument {
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SaveQuery {
    pub name: Option<String>,
}

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// Store an anonymous share-link payload.
pub async fn create_document(
    State(state): State<AppState>,
    body: Bytes,
) -> ServerResult<Json<CreatedDocument>> {
    let id = state.store.create(&body).await?;
    Ok(Json(CreatedDocument { id: id.into() }))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Response> {
    let id = DocumentId::parse(&id).map_err(StoreError::from)?;
    let document = state.store.find_by_id(&id).await?;
    Ok(([(CONTENT_TYPE, OCTET_STREAM)], document.data).into_response())
}

pub async fn list_canvases(
    State(state): State<AppState>,
    identity: Identity,
) -> ServerResult<Json<Vec<CanvasMetadata>>> {
    let mut listed = state.store.list(&identity.owner_id).await?;
    listed.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    Ok(Json(listed))
}

pub async fn get_canvas(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> ServerResult<Response> {
    let canvas = state.store.get(&identity.owner_id, &id).await?;
    Ok(([(CONTENT_TYPE, OCTET_STREAM)], canvas.data).into_response())
}

/// Save a canvas. The display name comes from `?name=`, else from the
/// payload's `appState.name`, else defaults to the canvas id.
pub async fn put_canvas(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    Query(query): Query<SaveQuery>,
    body: Bytes,
) -> ServerResult<Json<CanvasMetadata>> {
    let name = query
        .name
        .filter(|n| !n.is_empty())
        .or_else(|| payload_name(&body));
    let mut canvas = Canvas::new(identity.owner_id, id, body.to_vec());
    if let Some(name) = name {
        canvas = canvas.with_name(name);
    }
    let saved = state.store.save(&canvas).await?;
    Ok(Json(saved))
}

pub async fn delete_canvas(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> ServerResult<StatusCode> {
    state.store.delete(&identity.owner_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn payload_name(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let name = value.get("appState")?.get("name")?.as_str()?;
    (!name.is_empty()).then(|| name.to_string())
}
