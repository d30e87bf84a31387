//! Part domain models for the Bomwright catalog.
//!
//! A part is identified by its part number and carries free-text
//! classification plus the price fields its pricing model needs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::pricing::{PricingModel, PricingRule};

/// Identifier returned by catalog writes. Parts are keyed by `partNo`.
pub type PartId = String;

/// Unit written for parts whose source leaves the unit column empty.
pub const DEFAULT_UNIT: &str = "set";

/// A catalog part.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default)]
    #[validate(custom = "validate_part_no")]
    pub part_no: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub category1: String,
    #[serde(default)]
    pub category2: String,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub pricing_model: PricingModel,
    #[serde(default, rename = "unitPricePerKWh", alias = "unitPricePerKwh")]
    pub unit_price_per_kwh: Option<Decimal>,
    #[serde(default)]
    pub unit_price_per_year: Option<Decimal>,
    #[serde(default, rename = "refCapacityKWh", alias = "refCapacityKwh")]
    pub ref_capacity_kwh: Option<Decimal>,
}

/// A broken part invariant, reported against the offending field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct InvariantViolation {
    pub field: &'static str,
    pub message: String,
}

impl InvariantViolation {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

fn default_unit() -> String {
    DEFAULT_UNIT.to_string()
}

fn validate_part_no(part_no: &str) -> Result<(), ValidationError> {
    if part_no.trim().is_empty() {
        return Err(ValidationError::new("blank_part_no"));
    }
    Ok(())
}

impl Part {
    /// Creates a part with the given number and pricing model and no prices.
    pub fn new(part_no: impl Into<String>, pricing_model: PricingModel) -> Self {
        Self {
            part_no: part_no.into(),
            description: String::new(),
            manufacturer: String::new(),
            category1: String::new(),
            category2: String::new(),
            unit: DEFAULT_UNIT.to_string(),
            unit_price: None,
            notes: String::new(),
            pricing_model,
            unit_price_per_kwh: None,
            unit_price_per_year: None,
            ref_capacity_kwh: None,
        }
    }

    /// Creates a fixed-price part.
    pub fn fixed(part_no: impl Into<String>, unit_price: Decimal) -> Self {
        let mut part = Self::new(part_no, PricingModel::Fixed);
        part.unit_price = Some(unit_price);
        part
    }

    /// Creates a part priced per kWh of installed capacity.
    pub fn per_kwh(part_no: impl Into<String>, rate: Decimal) -> Self {
        let mut part = Self::new(part_no, PricingModel::PerKwh);
        part.unit_price_per_kwh = Some(rate);
        part
    }

    /// Creates a part priced per contract year.
    pub fn per_year(part_no: impl Into<String>, rate: Decimal) -> Self {
        let mut part = Self::new(part_no, PricingModel::PerYear);
        part.unit_price_per_year = Some(rate);
        part
    }

    pub fn with_categories(mut self, category1: impl Into<String>, category2: impl Into<String>) -> Self {
        self.category1 = category1.into();
        self.category2 = category2.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Resolves the declared pricing model into its rule.
    ///
    /// Fails when the price field the model requires is absent.
    pub fn pricing_rule(&self) -> Result<PricingRule, InvariantViolation> {
        match self.pricing_model {
            PricingModel::Fixed => self
                .unit_price
                .map(|unit_price| PricingRule::Fixed { unit_price })
                .ok_or_else(|| missing_price(self.pricing_model, "unitPrice")),
            PricingModel::PerKwh => self
                .unit_price_per_kwh
                .map(|rate| PricingRule::PerKwh {
                    rate,
                    ref_capacity_kwh: self.ref_capacity_kwh,
                })
                .ok_or_else(|| missing_price(self.pricing_model, "unitPricePerKWh")),
            PricingModel::PerYear => self
                .unit_price_per_year
                .map(|rate| PricingRule::PerYear { rate })
                .ok_or_else(|| missing_price(self.pricing_model, "unitPricePerYear")),
        }
    }

    /// Checks the identity and price-sign rules every stored part obeys.
    pub fn check_record(&self) -> Result<(), InvariantViolation> {
        if self.validate().is_err() {
            return Err(InvariantViolation::new("partNo", "part number must not be blank"));
        }

        for (field, value) in self.price_fields() {
            if let Some(value) = value {
                if value.is_sign_negative() && !value.is_zero() {
                    return Err(InvariantViolation::new(field, format!("must not be negative, got {}", value)));
                }
            }
        }

        Ok(())
    }

    /// Checks the record rules plus the pricing-model invariant.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        self.check_record()?;
        self.pricing_rule().map(|_| ())
    }

    pub fn price_fields(&self) -> [(&'static str, Option<Decimal>); 4] {
        [
            ("unitPrice", self.unit_price),
            ("unitPricePerKWh", self.unit_price_per_kwh),
            ("unitPricePerYear", self.unit_price_per_year),
            ("refCapacityKWh", self.ref_capacity_kwh),
        ]
    }
}

fn missing_price(model: PricingModel, field: &'static str) -> InvariantViolation {
    InvariantViolation::new(field, format!("pricingModel {} requires {}", model, field))
}
