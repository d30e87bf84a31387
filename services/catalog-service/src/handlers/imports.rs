//! Import Handlers
//!
//! Upload, review and commit of staged import sessions.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use bomwright_models::ImportCandidate;
use bomwright_utils::{
    BomwrightError, CommitOutcome, ErrorResponse, ImportSession, ImportState, ImportSummary, PartField, SourceFormat,
};

use crate::error::ApiResult;
use crate::AppState;

/// Import session as returned to the client
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSessionView {
    pub id: Uuid,
    pub source_name: String,
    pub format: Option<SourceFormat>,
    pub source_digest: Option<String>,
    pub created_at: DateTime<Utc>,
    pub state: ImportState,
    pub summary: ImportSummary,
    pub candidates: Vec<ImportCandidate>,
}

impl From<ImportSession> for ImportSessionView {
    fn from(session: ImportSession) -> Self {
        Self {
            id: session.id(),
            source_name: session.source_name().to_string(),
            format: session.format(),
            source_digest: session.source_digest().map(str::to_string),
            created_at: session.created_at(),
            state: session.state(),
            summary: session.summary(),
            candidates: session.candidates().to_vec(),
        }
    }
}

/// Operator edits to one candidate
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CandidateReview {
    /// New cell values keyed by field name, e.g. `unitPricePerKWh`
    pub fields: BTreeMap<String, String>,
    #[serde(rename = "override")]
    pub override_warning: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CommitRequest {
    /// Candidate indexes to commit
    pub selection: Vec<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitOutcomeView {
    pub index: usize,
    pub source_row: Option<usize>,
    pub part_no: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

impl From<CommitOutcome> for CommitOutcomeView {
    fn from(outcome: CommitOutcome) -> Self {
        Self {
            index: outcome.index,
            source_row: outcome.source_row,
            part_no: outcome.part_no,
            success: outcome.result.is_ok(),
            error: outcome.result.err().map(Into::into),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommitResponse {
    pub committed: usize,
    pub failed: usize,
    pub outcomes: Vec<CommitOutcomeView>,
}

#[derive(Debug, Serialize)]
pub struct DiscardResponse {
    pub dropped: usize,
}

/// Upload a source and stage it for review
///
/// POST /api/v1/imports
pub async fn upload_import(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ImportSessionView>)> {
    let mut file: Option<(String, Option<String>, Vec<u8>)> = None;
    let mut format_hint: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);

        match (name.as_deref(), file_name) {
            (Some("format"), _) => format_hint = Some(field.text().await?),
            (_, Some(file_name)) => {
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;
                file = Some((file_name, content_type, data.to_vec()));
            }
            _ => {}
        }
    }

    let (file_name, content_type, data) =
        file.ok_or_else(|| BomwrightError::validation("file", "No file provided"))?;

    let format = state
        .imports
        .resolve_format(&file_name, format_hint.as_deref(), content_type.as_deref())?;
    let session = state.imports.stage(&file_name, &data, format).await?;
    state.metrics.staged_imports.inc();

    Ok((StatusCode::CREATED, Json(session.into())))
}

/// GET /api/v1/imports/:id
pub async fn get_import(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<ImportSessionView>> {
    Ok(Json(state.imports.get(id).await?.into()))
}

/// Amend or override one candidate
///
/// PATCH /api/v1/imports/:id/candidates/:index
pub async fn review_candidate(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
    Json(review): Json<CandidateReview>,
) -> ApiResult<Json<ImportSessionView>> {
    let edits = review
        .fields
        .into_iter()
        .map(|(name, value)| {
            PartField::from_name(&name)
                .map(|field| (field, value))
                .ok_or_else(|| BomwrightError::validation("fields", format!("unknown part field '{}'", name)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let session = state
        .imports
        .review(id, index, &edits, review.override_warning)
        .await?;
    Ok(Json(session.into()))
}

/// Commit the selected candidates to the catalog
///
/// POST /api/v1/imports/:id/commit
pub async fn commit_import(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CommitRequest>,
) -> ApiResult<Json<CommitResponse>> {
    let outcomes = state.imports.commit(id, &state.store, &request.selection).await?;

    let committed = outcomes.iter().filter(|o| o.is_success()).count();
    for outcome in &outcomes {
        state.metrics.record_import_row(outcome.is_success());
    }

    Ok(Json(CommitResponse {
        committed,
        failed: outcomes.len() - committed,
        outcomes: outcomes.into_iter().map(Into::into).collect(),
    }))
}

/// DELETE /api/v1/imports/:id
pub async fn discard_import(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<DiscardResponse>> {
    let dropped = state.imports.discard(id).await?;
    Ok(Json(DiscardResponse { dropped }))
}
