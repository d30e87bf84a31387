//! Staged import records.
//!
//! Candidates only exist inside an import session. They are promoted to
//! [`Part`]s on commit and never stored on their own.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::part::Part;
use crate::pricing::PricingModel;

/// Outcome of validating one staged row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ValidationStatus {
    Ok,
    Warning(String),
    Error(String),
}

impl ValidationStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Self::Warning(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Ok => None,
            Self::Warning(reason) | Self::Error(reason) => Some(reason),
        }
    }
}

/// Part-shaped values mapped from one source row.
///
/// `part_no` and `pricing_model` stay `None` when the row has no usable
/// value, so the candidate can still be shown and amended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateFields {
    pub part_no: Option<String>,
    pub description: String,
    pub manufacturer: String,
    pub category1: String,
    pub category2: String,
    pub unit: String,
    pub unit_price: Option<Decimal>,
    pub notes: String,
    pub pricing_model: Option<PricingModel>,
    #[serde(rename = "unitPricePerKWh")]
    pub unit_price_per_kwh: Option<Decimal>,
    pub unit_price_per_year: Option<Decimal>,
    #[serde(rename = "refCapacityKWh")]
    pub ref_capacity_kwh: Option<Decimal>,
}

impl CandidateFields {
    /// Builds the part this candidate would become, if it has an identity
    /// and a known pricing model.
    pub fn to_part(&self) -> Option<Part> {
        let part_no = self.part_no.clone()?;
        let pricing_model = self.pricing_model?;

        Some(Part {
            part_no,
            description: self.description.clone(),
            manufacturer: self.manufacturer.clone(),
            category1: self.category1.clone(),
            category2: self.category2.clone(),
            unit: self.unit.clone(),
            unit_price: self.unit_price,
            notes: self.notes.clone(),
            pricing_model,
            unit_price_per_kwh: self.unit_price_per_kwh,
            unit_price_per_year: self.unit_price_per_year,
            ref_capacity_kwh: self.ref_capacity_kwh,
        })
    }
}

/// One staged row awaiting review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportCandidate {
    /// Position of the candidate inside its session.
    pub index: usize,
    /// 1-based row in the source; the header is row 1.
    pub source_row: usize,
    pub fields: CandidateFields,
    /// Source cells keyed by the part field they were mapped to.
    pub raw: BTreeMap<String, String>,
    pub validation_status: ValidationStatus,
    /// Operator accepted this warning row for commit.
    #[serde(rename = "override")]
    pub override_warning: bool,
}

impl ImportCandidate {
    /// Whether the row may be promoted to the catalog.
    pub fn is_committable(&self) -> bool {
        match self.validation_status {
            ValidationStatus::Ok => true,
            ValidationStatus::Warning(_) => self.override_warning,
            ValidationStatus::Error(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(status: ValidationStatus, override_warning: bool) -> ImportCandidate {
        ImportCandidate {
            index: 0,
            source_row: 2,
            fields: CandidateFields::default(),
            raw: BTreeMap::new(),
            validation_status: status,
            override_warning,
        }
    }

    #[test]
    fn test_committable_statuses() {
        assert!(candidate(ValidationStatus::Ok, false).is_committable());
        assert!(!candidate(ValidationStatus::Warning("w".into()), false).is_committable());
        assert!(candidate(ValidationStatus::Warning("w".into()), true).is_committable());
        assert!(!candidate(ValidationStatus::Error("e".into()), true).is_committable());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(ValidationStatus::Error("missing partNo".into())).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["reason"], "missing partNo");

        let json = serde_json::to_value(ValidationStatus::Ok).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[test]
    fn test_to_part_requires_identity() {
        let mut fields = CandidateFields {
            pricing_model: Some(PricingModel::Fixed),
            ..Default::default()
        };
        assert!(fields.to_part().is_none());

        fields.part_no = Some("P-1".into());
        let part = fields.to_part().unwrap();
        assert_eq!(part.part_no, "P-1");
        assert_eq!(part.pricing_model, PricingModel::Fixed);
    }
}
