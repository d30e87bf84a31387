//! BOM headers and priced line items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub type BomId = Uuid;

/// A bill of materials header.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bom {
    pub id: BomId,
    #[validate(length(min = 1, max = 200, message = "BOM name must be between 1 and 200 characters"))]
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Bom {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// A priced line of a BOM.
///
/// `part_no` is a plain identifier, resolved against the catalog on demand.
/// `line_amount` is the amount computed when the line was added and is never
/// re-priced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BomItem {
    pub bom_id: BomId,
    /// 1-based insertion position within the BOM.
    pub sequence: u32,
    pub part_no: String,
    pub quantity: Decimal,
    #[serde(rename = "capacityKWh")]
    pub capacity_kwh: Option<Decimal>,
    pub years: Option<Decimal>,
    pub line_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Values a new line is persisted with.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBomItem {
    pub part_no: String,
    pub quantity: Decimal,
    pub capacity_kwh: Option<Decimal>,
    pub years: Option<Decimal>,
    pub line_amount: Decimal,
}

/// Instance parameters entered for a BOM line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineParams {
    pub quantity: Option<Decimal>,
    #[serde(rename = "capacityKWh", alias = "capacityKwh")]
    pub capacity_kwh: Option<Decimal>,
    pub years: Option<Decimal>,
}

impl LineParams {
    pub fn quantity(quantity: Decimal) -> Self {
        Self {
            quantity: Some(quantity),
            ..Default::default()
        }
    }

    pub fn with_capacity_kwh(mut self, capacity_kwh: Decimal) -> Self {
        self.capacity_kwh = Some(capacity_kwh);
        self
    }

    pub fn with_years(mut self, years: Decimal) -> Self {
        self.years = Some(years);
        self
    }
}

/// One row the operator selected for bulk addition, with parameters as
/// typed into the form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BomSelection {
    pub part_no: String,
    pub quantity: Option<String>,
    #[serde(rename = "capacityKWh", alias = "capacityKwh")]
    pub capacity_kwh: Option<String>,
    pub years: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_bom_name_validation() {
        assert!(Bom::new("Site A").validate().is_ok());
        assert!(Bom::new("").validate().is_err());
    }

    #[test]
    fn test_line_params_json() {
        let params: LineParams =
            serde_json::from_str(r#"{"quantity": "2", "capacityKWh": 5}"#).unwrap();
        assert_eq!(params, LineParams::quantity(dec!(2)).with_capacity_kwh(dec!(5)));
    }
}
