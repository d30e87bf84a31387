//! Pricing model tags and the rules they resolve to.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How a part's line amount is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingModel {
    #[default]
    Fixed,
    PerKwh,
    PerYear,
}

impl PricingModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::PerKwh => "per_kwh",
            Self::PerYear => "per_year",
        }
    }
}

impl std::fmt::Display for PricingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for a pricing model tag outside the known set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown pricingModel '{0}'")]
pub struct UnknownPricingModel(pub String);

impl FromStr for PricingModel {
    type Err = UnknownPricingModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "per_kwh" => Ok(Self::PerKwh),
            "per_year" => Ok(Self::PerYear),
            _ => Err(UnknownPricingModel(s.trim().to_string())),
        }
    }
}

/// A pricing model together with the price data it needs.
///
/// Only a part that satisfies its model's invariant can produce a rule, so a
/// rule never lacks its rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum PricingRule {
    Fixed {
        unit_price: Decimal,
    },
    PerKwh {
        rate: Decimal,
        /// Capacity the rate was quoted at. Display only.
        ref_capacity_kwh: Option<Decimal>,
    },
    PerYear {
        rate: Decimal,
    },
}

impl PricingRule {
    pub fn model(&self) -> PricingModel {
        match self {
            Self::Fixed { .. } => PricingModel::Fixed,
            Self::PerKwh { .. } => PricingModel::PerKwh,
            Self::PerYear { .. } => PricingModel::PerYear,
        }
    }
}
