//! Column Mapper
//!
//! Resolves source headers to part fields and turns the mapped cells of a row
//! into typed candidate values.

use std::collections::BTreeMap;

use bomwright_models::{CandidateFields, PricingModel, DEFAULT_UNIT};

use crate::validation::parse_decimal;

/// Part fields a source column can be mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PartField {
    PartNo,
    Description,
    Manufacturer,
    Category1,
    Category2,
    Unit,
    UnitPrice,
    Notes,
    PricingModel,
    UnitPricePerKwh,
    UnitPricePerYear,
    RefCapacityKwh,
}

impl PartField {
    pub const ALL: [PartField; 12] = [
        Self::PartNo,
        Self::Description,
        Self::Manufacturer,
        Self::Category1,
        Self::Category2,
        Self::Unit,
        Self::UnitPrice,
        Self::Notes,
        Self::PricingModel,
        Self::UnitPricePerKwh,
        Self::UnitPricePerYear,
        Self::RefCapacityKwh,
    ];

    /// Canonical field name, as used in headers and JSON.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PartNo => "partNo",
            Self::Description => "description",
            Self::Manufacturer => "manufacturer",
            Self::Category1 => "category1",
            Self::Category2 => "category2",
            Self::Unit => "unit",
            Self::UnitPrice => "unitPrice",
            Self::Notes => "notes",
            Self::PricingModel => "pricingModel",
            Self::UnitPricePerKwh => "unitPricePerKWh",
            Self::UnitPricePerYear => "unitPricePerYear",
            Self::RefCapacityKwh => "refCapacityKWh",
        }
    }

    /// Looks a field up by header-style name, ignoring case and separators.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = normalize_header(name);
        Self::ALL
            .into_iter()
            .find(|field| normalize_header(field.name()) == normalized)
    }

    /// Alternative header spellings found in vendor price lists, normalized.
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::PartNo => &["partnumber", "pn", "sku", "品番", "部品番号"],
            Self::Description => &["desc", "itemdescription", "仕様", "名称", "品名", "内容"],
            Self::Manufacturer => &["maker", "vendor", "製造", "メーカー"],
            Self::Category1 => &["category", "cat", "分類", "カテゴリ", "カテゴリ1"],
            Self::Category2 => &["カテゴリ2"],
            Self::Unit => &["単位"],
            Self::UnitPrice => &["price", "cost", "単価"],
            Self::Notes => &["note", "comment", "comments", "備考"],
            Self::PricingModel => &["pricemodel", "pricing", "価格モデル"],
            Self::UnitPricePerKwh => &["perkwh", "priceperkwh"],
            Self::UnitPricePerYear => &["peryear", "priceperyear"],
            Self::RefCapacityKwh => &["refcapacity", "referencecapacitykwh"],
        }
    }

    fn is_decimal(&self) -> bool {
        matches!(
            self,
            Self::UnitPrice | Self::UnitPricePerKwh | Self::UnitPricePerYear | Self::RefCapacityKwh
        )
    }
}

impl std::fmt::Display for PartField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Normalizes a header for matching: trimmed, lower-cased, with spaces,
/// `_`, `-` and a leading byte-order mark removed.
pub fn normalize_header(header: &str) -> String {
    header
        .trim()
        .trim_start_matches('\u{feff}')
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Header to field resolution rules.
#[derive(Debug, Clone, Default)]
pub struct ColumnMapping {
    /// Operator-chosen header per field, checked before names and aliases.
    pinned: BTreeMap<PartField, String>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `field` to the column titled `header`.
    pub fn pin(&mut self, field: PartField, header: impl Into<String>) {
        self.pinned.insert(field, normalize_header(&header.into()));
    }

    /// Resolves each field to a column index of `headers`.
    ///
    /// A pinned header wins, then the canonical name, then the aliases in
    /// order. When several columns carry the same title the leftmost is used,
    /// and a column is never assigned to two fields.
    pub fn resolve(&self, headers: &[String]) -> BTreeMap<PartField, usize> {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
        let mut resolved = BTreeMap::new();
        let mut claimed = vec![false; normalized.len()];

        let mut claim = |field: PartField, wanted: &str, resolved: &mut BTreeMap<PartField, usize>| {
            if resolved.contains_key(&field) || wanted.is_empty() {
                return;
            }
            if let Some(idx) = normalized.iter().position(|h| h == wanted) {
                if !claimed[idx] {
                    claimed[idx] = true;
                    resolved.insert(field, idx);
                }
            }
        };

        for (field, header) in &self.pinned {
            claim(*field, header, &mut resolved);
        }
        for field in PartField::ALL {
            claim(field, &normalize_header(field.name()), &mut resolved);
        }
        for field in PartField::ALL {
            for alias in field.aliases() {
                claim(field, &normalize_header(alias), &mut resolved);
            }
        }

        resolved
    }
}

/// Typed values of one row plus the cell-level problems found mapping them.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedRow {
    pub fields: CandidateFields,
    pub problems: Vec<String>,
}

/// Collects the trimmed, non-empty cells of a row keyed by field name.
pub fn collect_raw(cells: &[String], columns: &BTreeMap<PartField, usize>) -> BTreeMap<String, String> {
    columns
        .iter()
        .filter_map(|(field, idx)| {
            let value = cells.get(*idx)?.trim();
            (!value.is_empty()).then(|| (field.name().to_string(), value.to_string()))
        })
        .collect()
}

/// Maps raw cells to candidate values.
///
/// An empty unit becomes `set` and an empty pricing model `fixed`. Decimal
/// cells that do not parse and unknown pricing models are reported as
/// problems and leave the field unset.
pub fn map_raw(raw: &BTreeMap<String, String>) -> MappedRow {
    let mut fields = CandidateFields::default();
    let mut problems = Vec::new();

    let text = |field: PartField| -> String {
        raw.get(field.name()).map(|v| v.trim().to_string()).unwrap_or_default()
    };

    let part_no = text(PartField::PartNo);
    fields.part_no = (!part_no.is_empty()).then_some(part_no);
    fields.description = text(PartField::Description);
    fields.manufacturer = text(PartField::Manufacturer);
    fields.category1 = text(PartField::Category1);
    fields.category2 = text(PartField::Category2);
    fields.notes = text(PartField::Notes);

    let unit = text(PartField::Unit);
    fields.unit = if unit.is_empty() { DEFAULT_UNIT.to_string() } else { unit };

    let model = text(PartField::PricingModel);
    fields.pricing_model = if model.is_empty() {
        Some(PricingModel::Fixed)
    } else {
        match model.parse::<PricingModel>() {
            Ok(model) => Some(model),
            Err(e) => {
                problems.push(e.to_string());
                None
            }
        }
    };

    for field in PartField::ALL.into_iter().filter(PartField::is_decimal) {
        let value = text(field);
        if value.is_empty() {
            continue;
        }
        let parsed = match parse_decimal(&value) {
            Ok(parsed) => parsed,
            Err(reason) => {
                problems.push(format!("invalid {}: {}", field, reason));
                continue;
            }
        };
        match field {
            PartField::UnitPrice => fields.unit_price = Some(parsed),
            PartField::UnitPricePerKwh => fields.unit_price_per_kwh = Some(parsed),
            PartField::UnitPricePerYear => fields.unit_price_per_year = Some(parsed),
            PartField::RefCapacityKwh => fields.ref_capacity_kwh = Some(parsed),
            _ => {}
        }
    }

    MappedRow { fields, problems }
}
