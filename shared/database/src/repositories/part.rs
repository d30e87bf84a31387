//! Part Repository
//!
//! Row-level access to the `parts` table.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use std::str::FromStr;

use bomwright_models::{CategoryOptions, Part, PartFilter, PricingModel};
use bomwright_utils::{BomwrightError, BomwrightResult};

const PART_COLUMNS: &str = "part_no, description, manufacturer, category1, category2, unit, unit_price, notes, \
     pricing_model, unit_price_per_kwh, unit_price_per_year, ref_capacity_kwh";

#[derive(Clone)]
pub struct PartRepository {
    pool: SqlitePool,
}

impl PartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find part by part number
    pub async fn find_by_part_no(&self, part_no: &str) -> BomwrightResult<Option<Part>> {
        let row: Option<PartRow> = sqlx::query_as(&format!("SELECT {} FROM parts WHERE part_no = ?", PART_COLUMNS))
            .bind(part_no)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Part::try_from).transpose()
    }

    /// Find parts matching a filter.
    ///
    /// Category sets are applied in SQL. The free-text term is matched in
    /// Rust so case folding covers non-ASCII text too.
    pub async fn find(&self, filter: &PartFilter) -> BomwrightResult<Vec<Part>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT {} FROM parts WHERE 1 = 1", PART_COLUMNS));

        for (column, values) in [("category1", &filter.category1), ("category2", &filter.category2)] {
            if values.is_empty() {
                continue;
            }
            query.push(format!(" AND {} IN (", column));
            let mut separated = query.separated(", ");
            for value in values {
                separated.push_bind(value.clone());
            }
            separated.push_unseparated(")");
        }

        query.push(format!(" ORDER BY {} ASC", filter.sort.column()));
        if filter.sort.column() != "part_no" {
            query.push(", part_no ASC");
        }

        let rows: Vec<PartRow> = query.build_query_as().fetch_all(&self.pool).await?;

        let needle = filter.search_term().map(str::to_lowercase);
        let mut parts = Vec::with_capacity(rows.len());
        for row in rows {
            let part = Part::try_from(row)?;
            let matches = match &needle {
                Some(needle) => {
                    part.part_no.to_lowercase().contains(needle.as_str())
                        || part.description.to_lowercase().contains(needle.as_str())
                }
                None => true,
            };
            if matches {
                parts.push(part);
            }
        }

        Ok(parts)
    }

    /// Insert or replace a part by part number
    pub async fn upsert(&self, part: &Part) -> BomwrightResult<()> {
        sqlx::query(
            r#"
            INSERT INTO parts
                (part_no, description, manufacturer, category1, category2, unit, unit_price, notes,
                 pricing_model, unit_price_per_kwh, unit_price_per_year, ref_capacity_kwh, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(part_no) DO UPDATE SET
                description = excluded.description,
                manufacturer = excluded.manufacturer,
                category1 = excluded.category1,
                category2 = excluded.category2,
                unit = excluded.unit,
                unit_price = excluded.unit_price,
                notes = excluded.notes,
                pricing_model = excluded.pricing_model,
                unit_price_per_kwh = excluded.unit_price_per_kwh,
                unit_price_per_year = excluded.unit_price_per_year,
                ref_capacity_kwh = excluded.ref_capacity_kwh,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&part.part_no)
        .bind(&part.description)
        .bind(&part.manufacturer)
        .bind(&part.category1)
        .bind(&part.category2)
        .bind(&part.unit)
        .bind(part.unit_price.map(|d| d.to_string()))
        .bind(&part.notes)
        .bind(part.pricing_model.as_str())
        .bind(part.unit_price_per_kwh.map(|d| d.to_string()))
        .bind(part.unit_price_per_year.map(|d| d.to_string()))
        .bind(part.ref_capacity_kwh.map(|d| d.to_string()))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete part
    pub async fn delete(&self, part_no: &str) -> BomwrightResult<bool> {
        let result = sqlx::query("DELETE FROM parts WHERE part_no = ?")
            .bind(part_no)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> BomwrightResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM parts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Distinct non-empty category values, sorted
    pub async fn category_options(&self) -> BomwrightResult<CategoryOptions> {
        let category1: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT category1 FROM parts WHERE category1 <> '' ORDER BY category1")
                .fetch_all(&self.pool)
                .await?;
        let category2: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT category2 FROM parts WHERE category2 <> '' ORDER BY category2")
                .fetch_all(&self.pool)
                .await?;

        Ok(CategoryOptions {
            category1: category1.into_iter().map(|(v,)| v).collect(),
            category2: category2.into_iter().map(|(v,)| v).collect(),
        })
    }
}

#[derive(Debug, FromRow)]
struct PartRow {
    part_no: String,
    description: String,
    manufacturer: String,
    category1: String,
    category2: String,
    unit: String,
    unit_price: Option<String>,
    notes: String,
    pricing_model: String,
    unit_price_per_kwh: Option<String>,
    unit_price_per_year: Option<String>,
    ref_capacity_kwh: Option<String>,
}

impl TryFrom<PartRow> for Part {
    type Error = BomwrightError;

    fn try_from(row: PartRow) -> Result<Self, Self::Error> {
        let pricing_model = PricingModel::from_str(&row.pricing_model)
            .map_err(|e| BomwrightError::storage(format!("part {}: {}", row.part_no, e)))?;

        Ok(Self {
            unit_price: stored_decimal(&row.part_no, row.unit_price)?,
            unit_price_per_kwh: stored_decimal(&row.part_no, row.unit_price_per_kwh)?,
            unit_price_per_year: stored_decimal(&row.part_no, row.unit_price_per_year)?,
            ref_capacity_kwh: stored_decimal(&row.part_no, row.ref_capacity_kwh)?,
            part_no: row.part_no,
            description: row.description,
            manufacturer: row.manufacturer,
            category1: row.category1,
            category2: row.category2,
            unit: row.unit,
            notes: row.notes,
            pricing_model,
        })
    }
}

pub(crate) fn stored_decimal(owner: &str, value: Option<String>) -> BomwrightResult<Option<Decimal>> {
    value
        .map(|text| {
            Decimal::from_str(&text)
                .map_err(|e| BomwrightError::storage(format!("{}: stored decimal '{}' is unreadable: {}", owner, text, e)))
        })
        .transpose()
}
