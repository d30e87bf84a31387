//! Catalog search criteria.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Column the search results are ordered by. Ties always fall back to
/// `partNo` ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PartSortKey {
    #[default]
    PartNo,
    Description,
    Manufacturer,
    Category1,
    Category2,
}

impl PartSortKey {
    pub fn column(&self) -> &'static str {
        match self {
            Self::PartNo => "part_no",
            Self::Description => "description",
            Self::Manufacturer => "manufacturer",
            Self::Category1 => "category1",
            Self::Category2 => "category2",
        }
    }
}

/// Filter for `find_parts`.
///
/// Category sets use multi-select semantics: a part matches when its value is
/// in the set, and an empty set does not filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartFilter {
    pub text: Option<String>,
    pub category1: BTreeSet<String>,
    pub category2: BTreeSet<String>,
    pub sort: PartSortKey,
}

impl PartFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn category1<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.category1 = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn category2<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.category2 = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn sort_by(mut self, sort: PartSortKey) -> Self {
        self.sort = sort;
        self
    }

    /// Free-text term with surrounding whitespace removed, if any remains.
    pub fn search_term(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

/// Distinct category values offered to multi-select widgets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryOptions {
    pub category1: Vec<String>,
    pub category2: Vec<String>,
}
