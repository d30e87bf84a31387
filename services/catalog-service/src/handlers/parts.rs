//! Catalog part handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Serialize;

use bomwright_models::{CategoryOptions, Part, PartFilter};

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PartSearchResponse {
    pub total: usize,
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartUpsertResponse {
    pub part_no: String,
}

/// Search the catalog
///
/// POST /api/v1/parts/search
pub async fn search_parts(
    State(state): State<AppState>,
    Json(filter): Json<PartFilter>,
) -> ApiResult<Json<PartSearchResponse>> {
    let parts = state.store.find_parts(&filter).await?;
    Ok(Json(PartSearchResponse {
        total: parts.len(),
        parts,
    }))
}

/// GET /api/v1/parts/categories
pub async fn category_options(State(state): State<AppState>) -> ApiResult<Json<CategoryOptions>> {
    Ok(Json(state.store.category_options().await?))
}

/// Insert or replace a part. The path wins over the body's `partNo`.
///
/// PUT /api/v1/parts/:part_no
pub async fn upsert_part(
    State(state): State<AppState>,
    Path(part_no): Path<String>,
    Json(mut part): Json<Part>,
) -> ApiResult<Json<PartUpsertResponse>> {
    part.part_no = part_no;
    let part_no = state.store.upsert_part(&part).await?;
    Ok(Json(PartUpsertResponse { part_no }))
}

/// DELETE /api/v1/parts/:part_no
pub async fn delete_part(State(state): State<AppState>, Path(part_no): Path<String>) -> ApiResult<StatusCode> {
    state.store.delete_part(&part_no).await?;
    Ok(StatusCode::NO_CONTENT)
}
