//! Pricing Engine
//!
//! Turns a part's pricing rule and the parameters entered for a BOM line into
//! the line amount. All arithmetic is exact decimal; the amount is rounded
//! once, to the currency minor unit, half away from zero.

use rust_decimal::{Decimal, RoundingStrategy};

use bomwright_models::{BomSelection, LineParams, Part, PricingRule};

use crate::config::PricingConfig;
use crate::error::{BomwrightError, BomwrightResult};
use crate::validation::parse_decimal;

/// A priced line with only the parameters its model used.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub rule: PricingRule,
    pub quantity: Decimal,
    pub capacity_kwh: Option<Decimal>,
    pub years: Option<Decimal>,
    pub line_amount: Decimal,
}

#[derive(Debug, Clone, Copy)]
pub struct PricingEngine {
    minor_unit_digits: u32,
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self { minor_unit_digits: 2 }
    }
}

impl From<&PricingConfig> for PricingEngine {
    fn from(config: &PricingConfig) -> Self {
        Self::new(config.minor_unit_digits)
    }
}

impl PricingEngine {
    pub fn new(minor_unit_digits: u32) -> Self {
        Self { minor_unit_digits }
    }

    pub fn minor_unit_digits(&self) -> u32 {
        self.minor_unit_digits
    }

    /// Computes the amount of one line of `part`, at the scale of the
    /// currency minor unit.
    pub fn compute_line_amount(&self, part: &Part, params: &LineParams) -> BomwrightResult<Decimal> {
        self.price_line(part, params).map(|line| line.line_amount)
    }

    /// Prices a line and reports the parameters that entered the formula.
    ///
    /// `refCapacityKWh` is never part of the formula. Parameters the model
    /// does not use are dropped.
    pub fn price_line(&self, part: &Part, params: &LineParams) -> BomwrightResult<PricedLine> {
        let rule = part
            .pricing_rule()
            .map_err(|violation| BomwrightError::pricing(violation.field, violation.message))?;
        let quantity = required(params.quantity, "quantity", &part.part_no)?;

        let (capacity_kwh, years, amount) = match rule {
            PricingRule::Fixed { unit_price } => (None, None, product(&[unit_price, quantity])?),
            PricingRule::PerKwh { rate, .. } => {
                let capacity = required(params.capacity_kwh, "capacityKWh", &part.part_no)?;
                (Some(capacity), None, product(&[rate, capacity, quantity])?)
            }
            PricingRule::PerYear { rate } => {
                let years = required(params.years, "years", &part.part_no)?;
                (None, Some(years), product(&[rate, years, quantity])?)
            }
        };

        let mut line_amount = amount.round_dp_with_strategy(self.minor_unit_digits, RoundingStrategy::MidpointAwayFromZero);
        line_amount.rescale(self.minor_unit_digits);

        tracing::debug!(
            part_no = %part.part_no,
            model = %rule.model(),
            %quantity,
            %line_amount,
            "Line priced"
        );

        Ok(PricedLine {
            rule,
            quantity,
            capacity_kwh,
            years,
            line_amount,
        })
    }
}

fn required(value: Option<Decimal>, field: &str, part_no: &str) -> BomwrightResult<Decimal> {
    match value {
        None => Err(BomwrightError::pricing(field, format!("{} is required to price {}", field, part_no))),
        Some(value) if value.is_sign_negative() && !value.is_zero() => Err(BomwrightError::pricing(
            field,
            format!("{} must not be negative, got {}", field, value),
        )),
        Some(value) => Ok(value),
    }
}

fn product(factors: &[Decimal]) -> BomwrightResult<Decimal> {
    factors
        .iter()
        .try_fold(Decimal::ONE, |acc, factor| acc.checked_mul(*factor))
        .ok_or_else(|| BomwrightError::pricing("lineAmount", "line amount is out of range"))
}

/// Sum of line amounts. Overflow is a pricing error, never a panic.
pub fn sum_amounts<I>(amounts: I) -> BomwrightResult<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(amount))
        .ok_or_else(|| BomwrightError::pricing("total", "BOM total is out of range"))
}

/// Parses the text parameters of a bulk selection row.
///
/// Empty cells count as absent. Text that is not a decimal is a pricing
/// error for that row.
pub fn parse_line_params(selection: &BomSelection) -> BomwrightResult<LineParams> {
    let field = |value: &Option<String>, name: &str| -> BomwrightResult<Option<Decimal>> {
        match value.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => parse_decimal(text)
                .map(Some)
                .map_err(|reason| BomwrightError::pricing(name, reason)),
        }
    };

    Ok(LineParams {
        quantity: field(&selection.quantity, "quantity")?,
        capacity_kwh: field(&selection.capacity_kwh, "capacityKWh")?,
        years: field(&selection.years, "years")?,
    })
}
