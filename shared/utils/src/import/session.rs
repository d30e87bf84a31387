//! Import Session
//!
//! Review buffer for one staged import. A session moves through
//! `Idle -> Parsed -> Reviewed -> {Committed | Discarded}` and is owned by
//! the caller, so any number of sessions can be open at once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::future::Future;
use uuid::Uuid;

use bomwright_models::{ImportCandidate, Part, PartId};

use super::mapper::{map_raw, PartField};
use super::parser::{CandidateParser, SourceFormat};
use super::validator::{CandidateValidator, ImportSummary};
use crate::error::{BomwrightError, BomwrightResult};

/// Import session states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportState {
    /// Nothing staged yet
    Idle,
    /// Candidates staged from a source
    Parsed,
    /// The operator amended or overrode at least one candidate
    Reviewed,
    /// Selected candidates were written to the catalog
    Committed,
    /// Buffer released without catalog effect
    Discarded,
}

impl ImportState {
    /// Check if transition is valid
    pub fn can_transition_to(&self, target: ImportState) -> bool {
        use ImportState::*;

        matches!(
            (self, target),
            (Idle, Parsed)
                | (Idle, Discarded)
                | (Parsed, Reviewed)
                | (Parsed, Committed)
                | (Parsed, Discarded)
                | (Reviewed, Reviewed)
                | (Reviewed, Committed)
                | (Reviewed, Discarded)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportState::Committed | ImportState::Discarded)
    }
}

impl std::fmt::Display for ImportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Parsed => write!(f, "parsed"),
            Self::Reviewed => write!(f, "reviewed"),
            Self::Committed => write!(f, "committed"),
            Self::Discarded => write!(f, "discarded"),
        }
    }
}

/// One part handed to a [`PartSink`]. `overridden` is set for warning rows
/// the operator accepted, which skip the pricing-model check.
#[derive(Debug, Clone, PartialEq)]
pub struct PartWrite {
    pub part: Part,
    pub overridden: bool,
}

/// Destination of committed candidates.
pub trait PartSink: Sync {
    /// Writes a batch of parts, returning one result per entry in order.
    ///
    /// A rejected part fails only its own entry. `Err` from the call itself
    /// means the store is unavailable; entries before the failure may
    /// already be written.
    fn upsert_batch(
        &self,
        writes: &[PartWrite],
    ) -> impl Future<Output = BomwrightResult<Vec<BomwrightResult<PartId>>>> + Send;
}

/// Result of committing one selected candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitOutcome {
    pub index: usize,
    pub source_row: Option<usize>,
    pub part_no: Option<String>,
    pub result: BomwrightResult<PartId>,
}

impl CommitOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// One staged import under review.
#[derive(Debug, Clone)]
pub struct ImportSession {
    id: Uuid,
    source_name: String,
    format: Option<SourceFormat>,
    source_digest: Option<String>,
    created_at: DateTime<Utc>,
    state: ImportState,
    candidates: Vec<ImportCandidate>,
}

impl ImportSession {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_name: source_name.into(),
            format: None,
            source_digest: None,
            created_at: Utc::now(),
            state: ImportState::Idle,
            candidates: Vec::new(),
        }
    }

    /// Creates a session and stages `data` into it.
    pub fn parse(
        parser: &CandidateParser,
        source_name: impl Into<String>,
        data: &[u8],
        format: SourceFormat,
    ) -> BomwrightResult<Self> {
        let mut session = Self::new(source_name);
        session.stage(parser, data, format)?;
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn format(&self) -> Option<SourceFormat> {
        self.format
    }

    /// SHA-256 of the staged source bytes, hex encoded.
    pub fn source_digest(&self) -> Option<&str> {
        self.source_digest.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> ImportState {
        self.state
    }

    pub fn candidates(&self) -> &[ImportCandidate] {
        &self.candidates
    }

    pub fn summary(&self) -> ImportSummary {
        ImportSummary::of(&self.candidates)
    }

    /// Parses a source into the staging buffer.
    ///
    /// On a parse error the session stays idle with an empty buffer.
    pub fn stage(
        &mut self,
        parser: &CandidateParser,
        data: &[u8],
        format: SourceFormat,
    ) -> BomwrightResult<&[ImportCandidate]> {
        self.ensure_transition(ImportState::Parsed)?;

        let candidates = parser.parse(data, format)?;
        self.source_digest = Some(hex::encode(Sha256::digest(data)));
        self.format = Some(format);
        self.candidates = candidates;
        self.state = ImportState::Parsed;

        let summary = self.summary();
        tracing::info!(
            session_id = %self.id,
            source = %self.source_name,
            total = summary.total_rows,
            ok = summary.ok,
            warnings = summary.warnings,
            errors = summary.errors,
            "Import staged"
        );

        Ok(&self.candidates)
    }

    /// Replaces one field of a candidate with operator input and validates
    /// the candidate again.
    pub fn amend(&mut self, index: usize, field: PartField, value: &str) -> BomwrightResult<&ImportCandidate> {
        self.ensure_transition(ImportState::Reviewed)?;
        let candidate = self
            .candidates
            .get_mut(index)
            .ok_or_else(|| BomwrightError::not_found(format!("import candidate {}", index)))?;

        let value = value.trim();
        if value.is_empty() {
            candidate.raw.remove(field.name());
        } else {
            candidate.raw.insert(field.name().to_string(), value.to_string());
        }

        let mapped = map_raw(&candidate.raw);
        candidate.validation_status = CandidateValidator::new().status(&mapped);
        candidate.fields = mapped.fields;
        self.state = ImportState::Reviewed;

        tracing::debug!(
            session_id = %self.id,
            index,
            field = %field,
            status = ?self.candidates[index].validation_status,
            "Import candidate amended"
        );

        Ok(&self.candidates[index])
    }

    /// Sets or clears the per-commit override of a warning candidate.
    pub fn set_override(&mut self, index: usize, override_warning: bool) -> BomwrightResult<&ImportCandidate> {
        self.ensure_transition(ImportState::Reviewed)?;
        let candidate = self
            .candidates
            .get_mut(index)
            .ok_or_else(|| BomwrightError::not_found(format!("import candidate {}", index)))?;

        if override_warning && !candidate.validation_status.is_warning() {
            return Err(BomwrightError::validation(
                "override",
                format!("candidate {} has no warning to override", index),
            ));
        }

        candidate.override_warning = override_warning;
        self.state = ImportState::Reviewed;
        Ok(&self.candidates[index])
    }

    /// Commits the selected candidates through `sink`.
    ///
    /// Each candidate is written on its own; a rejected row never stops the
    /// others, and every selected index gets an outcome. Afterwards the
    /// session is committed and its buffer is released.
    ///
    /// When the store itself fails the error is returned and the session
    /// keeps its state and candidates, so the commit can be retried.
    pub async fn commit<S: PartSink>(
        &mut self,
        sink: &S,
        selection: &[usize],
    ) -> BomwrightResult<Vec<CommitOutcome>> {
        self.ensure_transition(ImportState::Committed)?;

        let selected: BTreeSet<usize> = selection.iter().copied().collect();
        let mut outcomes = Vec::with_capacity(selected.len());
        let mut writes = Vec::new();
        let mut pending = Vec::new();

        for index in selected {
            let Some(candidate) = self.candidates.get(index) else {
                outcomes.push(CommitOutcome {
                    index,
                    source_row: None,
                    part_no: None,
                    result: Err(BomwrightError::not_found(format!("import candidate {}", index))),
                });
                continue;
            };

            let rejection = match (candidate.is_committable(), candidate.fields.to_part()) {
                (true, Some(part)) => {
                    writes.push(PartWrite {
                        part,
                        overridden: candidate.validation_status.is_warning(),
                    });
                    pending.push(outcomes.len());
                    None
                }
                (true, None) => Some(BomwrightError::validation("partNo", "candidate has no usable part")),
                (false, _) => Some(BomwrightError::validation(
                    "validationStatus",
                    match candidate.validation_status.reason() {
                        Some(reason) if candidate.validation_status.is_warning() => {
                            format!("warning not overridden: {}", reason)
                        }
                        Some(reason) => reason.to_string(),
                        None => "candidate is not committable".to_string(),
                    },
                )),
            };

            outcomes.push(CommitOutcome {
                index,
                source_row: Some(candidate.source_row),
                part_no: candidate.fields.part_no.clone(),
                // pending writes are filled in from the sink below
                result: rejection.map_or(Ok(String::new()), Err),
            });
        }

        if !writes.is_empty() {
            let results = match sink.upsert_batch(&writes).await {
                Ok(results) => results,
                Err(e) => {
                    tracing::error!(session_id = %self.id, error = %e, "Import commit aborted, session kept");
                    return Err(e);
                }
            };
            if results.len() != pending.len() {
                return Err(BomwrightError::internal(format!(
                    "part sink returned {} results for {} writes",
                    results.len(),
                    pending.len()
                )));
            }
            for (position, result) in pending.into_iter().zip(results) {
                outcomes[position].result = result;
            }
        }

        for outcome in outcomes.iter().filter(|o| !o.is_success()) {
            if let Err(e) = &outcome.result {
                tracing::warn!(session_id = %self.id, index = outcome.index, source_row = ?outcome.source_row, error = %e, "Import row not committed");
            }
        }

        let committed = outcomes.iter().filter(|o| o.is_success()).count();
        tracing::info!(
            session_id = %self.id,
            selected = outcomes.len(),
            committed,
            failed = outcomes.len() - committed,
            "Import committed"
        );

        self.candidates.clear();
        self.state = ImportState::Committed;
        Ok(outcomes)
    }

    /// Releases the staged buffer. Returns how many candidates were dropped.
    pub fn discard(&mut self) -> BomwrightResult<usize> {
        self.ensure_transition(ImportState::Discarded)?;
        let dropped = self.candidates.len();
        self.candidates.clear();
        self.state = ImportState::Discarded;
        tracing::info!(session_id = %self.id, dropped, "Import discarded");
        Ok(dropped)
    }

    fn ensure_transition(&self, target: ImportState) -> BomwrightResult<()> {
        if self.state.can_transition_to(target) {
            Ok(())
        } else {
            Err(BomwrightError::validation(
                "state",
                format!("import session is {} and cannot become {}", self.state, target),
            ))
        }
    }
}
