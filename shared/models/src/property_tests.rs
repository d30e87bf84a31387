//! Property-based tests for the catalog domain models.

use proptest::option;
use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::{Part, PricingModel, PricingRule};

prop_compose! {
    fn arb_price()(mantissa in 0i64..10_000_000i64, scale in 0u32..5u32) -> Decimal {
        Decimal::new(mantissa, scale)
    }
}

fn arb_pricing_model() -> impl Strategy<Value = PricingModel> {
    prop_oneof![
        Just(PricingModel::Fixed),
        Just(PricingModel::PerKwh),
        Just(PricingModel::PerYear),
    ]
}

prop_compose! {
    fn arb_part()(
        part_no in "[A-Z]{1,4}-[0-9]{1,5}",
        description in "[A-Za-z0-9 ]{0,30}",
        category1 in "[A-C]?",
        category2 in "[X-Z]?",
        pricing_model in arb_pricing_model(),
        unit_price in option::of(arb_price()),
        unit_price_per_kwh in option::of(arb_price()),
        unit_price_per_year in option::of(arb_price()),
        ref_capacity_kwh in option::of(arb_price()),
    ) -> Part {
        let mut part = Part::new(part_no, pricing_model)
            .with_description(description)
            .with_categories(category1, category2);
        part.unit_price = unit_price;
        part.unit_price_per_kwh = unit_price_per_kwh;
        part.unit_price_per_year = unit_price_per_year;
        part.ref_capacity_kwh = ref_capacity_kwh;
        part
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// A part resolves to a rule exactly when its model's price is present.
    #[test]
    fn prop_rule_requires_model_price(part in arb_part()) {
        let required = match part.pricing_model {
            PricingModel::Fixed => part.unit_price,
            PricingModel::PerKwh => part.unit_price_per_kwh,
            PricingModel::PerYear => part.unit_price_per_year,
        };

        match part.pricing_rule() {
            Ok(rule) => {
                prop_assert_eq!(rule.model(), part.pricing_model);
                let rate = match rule {
                    PricingRule::Fixed { unit_price } => unit_price,
                    PricingRule::PerKwh { rate, .. } => rate,
                    PricingRule::PerYear { rate } => rate,
                };
                prop_assert_eq!(Some(rate), required);
            }
            Err(_) => prop_assert!(required.is_none()),
        }
    }

    /// Serialized parts keep exact decimal values, scale included.
    #[test]
    fn prop_part_json_keeps_exact_decimals(part in arb_part()) {
        let json = serde_json::to_string(&part).unwrap();
        let back: Part = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back.unit_price.map(|d| d.to_string()), part.unit_price.map(|d| d.to_string()));
        prop_assert_eq!(back, part);
    }
}
