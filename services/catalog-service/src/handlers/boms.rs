//! BOM Handlers

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use bomwright_models::{Bom, BomId, BomItem, BomSelection};
use bomwright_utils::{parse_decimal, validate_model, BomwrightError};

use crate::error::ApiResult;
use crate::service::LineOutcomeView;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBomRequest {
    #[validate(length(min = 1, max = 200, message = "BOM name must be between 1 and 200 characters"))]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct BulkAddRequest {
    pub selections: Vec<BomSelection>,
}

#[derive(Debug, Serialize)]
pub struct BulkAddResponse {
    pub added: usize,
    pub failed: usize,
    pub total: Decimal,
    pub outcomes: Vec<LineOutcomeView>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BomTotalResponse {
    pub bom_id: BomId,
    pub total: Decimal,
    pub currency: String,
}

/// GET /api/v1/boms
pub async fn list_boms(State(state): State<AppState>) -> ApiResult<Json<Vec<Bom>>> {
    Ok(Json(state.store.list_boms().await?))
}

/// POST /api/v1/boms
pub async fn create_bom(
    State(state): State<AppState>,
    Json(request): Json<CreateBomRequest>,
) -> ApiResult<(StatusCode, Json<Bom>)> {
    validate_model(&request)?;
    let id = state.store.create_bom(&request.name).await?;
    let bom = state
        .store
        .get_bom(id)
        .await?
        .ok_or_else(|| BomwrightError::internal(format!("bom {} vanished after creation", id)))?;
    Ok((StatusCode::CREATED, Json(bom)))
}

/// GET /api/v1/boms/:id/items
pub async fn list_bom_items(State(state): State<AppState>, Path(id): Path<BomId>) -> ApiResult<Json<Vec<BomItem>>> {
    Ok(Json(state.store.list_bom_items(id).await?))
}

/// Price and append the selected rows
///
/// POST /api/v1/boms/:id/items
pub async fn bulk_add_items(
    State(state): State<AppState>,
    Path(id): Path<BomId>,
    Json(request): Json<BulkAddRequest>,
) -> ApiResult<Json<BulkAddResponse>> {
    let outcomes = state.assembly.bulk_add(id, &request.selections).await?;

    let added = outcomes.iter().filter(|o| o.result.is_ok()).count();
    for outcome in &outcomes {
        state.metrics.record_priced_line(outcome.result.is_ok());
    }
    let total = state.assembly.recalculate_total(id).await?;

    Ok(Json(BulkAddResponse {
        added,
        failed: outcomes.len() - added,
        total,
        outcomes: outcomes.into_iter().map(Into::into).collect(),
    }))
}

/// Change the quantity of one line and price it again
///
/// PATCH /api/v1/boms/:id/items/:sequence
pub async fn update_bom_item_quantity(
    State(state): State<AppState>,
    Path((id, sequence)): Path<(BomId, u32)>,
    Json(request): Json<UpdateQuantityRequest>,
) -> ApiResult<Json<BomItem>> {
    let quantity = parse_decimal(request.quantity.trim()).map_err(|reason| BomwrightError::pricing("quantity", reason))?;
    let item = state.assembly.update_line_quantity(id, sequence, quantity).await?;
    state.metrics.record_priced_line(true);
    Ok(Json(item))
}

/// DELETE /api/v1/boms/:id/items/:sequence
pub async fn remove_bom_item(
    State(state): State<AppState>,
    Path((id, sequence)): Path<(BomId, u32)>,
) -> ApiResult<StatusCode> {
    state.store.remove_bom_item(id, sequence).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/boms/:id/total
pub async fn bom_total(State(state): State<AppState>, Path(id): Path<BomId>) -> ApiResult<Json<BomTotalResponse>> {
    let total = state.assembly.recalculate_total(id).await?;
    Ok(Json(BomTotalResponse {
        bom_id: id,
        total,
        currency: state.config.pricing.currency.clone(),
    }))
}

/// GET /api/v1/boms/:id/export.csv
pub async fn export_bom_csv(State(state): State<AppState>, Path(id): Path<BomId>) -> ApiResult<impl IntoResponse> {
    let body = state.assembly.export_csv(id).await?;
    let disposition = format!("attachment; filename=\"bom_{}.csv\"", id);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}
