//! Query service handlers: direct lookup and indexed search.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tracing::instrument;

use docstore_model::{DocumentKind, SearchQuery, SearchResponse, DEFAULT_SEARCH_LIMIT};

use crate::errors::ApiError;
use crate::state::AppState;

/// Query parameters for a direct lookup.
#[derive(Debug, Deserialize)]
pub struct LookupParams {
    /// Document identifier.
    pub id: Option<String>,
}

/// Query parameters for an indexed search.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    /// Query string.
    pub q: Option<String>,
    /// Maximum hits per page.
    pub limit: Option<usize>,
    /// Matches to skip, for pagination.
    pub offset: Option<usize>,
}

fn parse_resource(resource: &str) -> Result<DocumentKind, ApiError> {
    resource
        .parse()
        .map_err(|_| ApiError::UnknownResource(resource.to_string()))
}

/// `GET /api/v1/{resource}?id=` — direct content-store read.
///
/// Strongly consistent and independent of indexing: a successful ingest is
/// immediately visible here, and the exact stored bytes are returned.
#[instrument(skip(state), fields(resource = %resource))]
pub async fn lookup_document(
    State(state): State<Arc<AppState>>,
    Path(resource): Path<String>,
    Query(params): Query<LookupParams>,
) -> Result<Response, ApiError> {
    let kind = parse_resource(&resource)?;
    let id = params
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or(ApiError::MissingParameter("id"))?;

    let payload = state.documents.get(kind, &id).await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], payload).into_response())
}

/// `GET /api/v1/{resource}/search?q=` — search the loaded index handle.
///
/// Served against whatever generation the refresh task last swapped in;
/// the response reports that generation so callers can reason about
/// staleness.
#[instrument(skip(state), fields(resource = %resource))]
pub async fn search_documents(
    State(state): State<Arc<AppState>>,
    Path(resource): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let kind = parse_resource(&resource)?;
    let q = params
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or(ApiError::MissingParameter("q"))?;

    let limit = params
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .min(state.config.max_search_limit);
    let query = SearchQuery::new(q)
        .with_limit(limit)
        .with_offset(params.offset.unwrap_or(0));

    let handle = state.search.load(kind);
    let mut response = handle.index.search(&query);
    response.generation = handle.generation;
    Ok(Json(response))
}
