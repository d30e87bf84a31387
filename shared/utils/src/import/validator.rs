//! Candidate Validator
//!
//! Assigns each mapped row its review status and summarizes a staged batch.

use serde::Serialize;

use bomwright_models::{ImportCandidate, ValidationStatus};

use super::mapper::MappedRow;

/// Reason given for rows without a part number.
pub const MISSING_PART_NO: &str = "missing partNo";

/// Counts of a staged batch by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub total_rows: usize,
    pub ok: usize,
    pub warnings: usize,
    pub errors: usize,
    pub overridden: usize,
    pub committable: usize,
}

impl ImportSummary {
    pub fn of(candidates: &[ImportCandidate]) -> Self {
        let mut summary = Self {
            total_rows: candidates.len(),
            ..Default::default()
        };

        for candidate in candidates {
            match candidate.validation_status {
                ValidationStatus::Ok => summary.ok += 1,
                ValidationStatus::Warning(_) => {
                    summary.warnings += 1;
                    if candidate.override_warning {
                        summary.overridden += 1;
                    }
                }
                ValidationStatus::Error(_) => summary.errors += 1,
            }
            if candidate.is_committable() {
                summary.committable += 1;
            }
        }

        summary
    }
}

/// Candidate validator
#[derive(Debug, Clone, Default)]
pub struct CandidateValidator;

impl CandidateValidator {
    pub fn new() -> Self {
        Self
    }

    /// Status of a mapped row.
    ///
    /// Missing identity and unusable cells are errors. A part whose pricing
    /// model lacks its price field is only a warning, since the operator can
    /// still supply the value or override.
    pub fn status(&self, row: &MappedRow) -> ValidationStatus {
        if row.fields.part_no.is_none() {
            return ValidationStatus::Error(MISSING_PART_NO.to_string());
        }

        if !row.problems.is_empty() {
            return ValidationStatus::Error(row.problems.join("; "));
        }

        let part = match row.fields.to_part() {
            Some(part) => part,
            None => return ValidationStatus::Error("pricingModel is not usable".to_string()),
        };

        if let Err(violation) = part.check_record() {
            return ValidationStatus::Error(violation.to_string());
        }

        match part.pricing_rule() {
            Ok(_) => ValidationStatus::Ok,
            Err(violation) => ValidationStatus::Warning(violation.message),
        }
    }
}
