//! BOM Repository
//!
//! BOM headers and their ordered line items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use bomwright_models::{Bom, BomId, BomItem, NewBomItem};
use bomwright_utils::{BomwrightError, BomwrightResult};

use super::part::stored_decimal;

#[derive(Clone)]
pub struct BomRepository {
    pool: SqlitePool,
}

impl BomRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create new BOM
    pub async fn create(&self, bom: &Bom) -> BomwrightResult<()> {
        sqlx::query("INSERT INTO boms (id, name, created_at) VALUES (?, ?, ?)")
            .bind(bom.id)
            .bind(&bom.name)
            .bind(bom.created_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Find BOM by ID
    pub async fn find_by_id(&self, id: BomId) -> BomwrightResult<Option<Bom>> {
        let row: Option<BomRow> = sqlx::query_as("SELECT id, name, created_at FROM boms WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// All BOMs, newest first
    pub async fn find_all(&self) -> BomwrightResult<Vec<Bom>> {
        let rows: Vec<BomRow> = sqlx::query_as("SELECT id, name, created_at FROM boms ORDER BY created_at DESC, name ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Append a line at the next sequence number of the BOM.
    pub async fn append_item(&self, bom_id: BomId, item: &NewBomItem) -> BomwrightResult<BomItem> {
        let mut tx = self.pool.begin().await?;

        let (sequence,): (i64,) =
            sqlx::query_as("SELECT COALESCE(MAX(sequence), 0) + 1 FROM bom_items WHERE bom_id = ?")
                .bind(bom_id)
                .fetch_one(&mut *tx)
                .await?;

        let row: BomItemRow = sqlx::query_as(
            r#"
            INSERT INTO bom_items
                (bom_id, sequence, part_no, quantity, capacity_kwh, years, line_amount, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING bom_id, sequence, part_no, quantity, capacity_kwh, years, line_amount, created_at
            "#,
        )
        .bind(bom_id)
        .bind(sequence)
        .bind(&item.part_no)
        .bind(item.quantity.to_string())
        .bind(item.capacity_kwh.map(|d| d.to_string()))
        .bind(item.years.map(|d| d.to_string()))
        .bind(item.line_amount.to_string())
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        BomItem::try_from(row)
    }

    /// Lines of a BOM in insertion order
    pub async fn find_items(&self, bom_id: BomId) -> BomwrightResult<Vec<BomItem>> {
        let rows: Vec<BomItemRow> = sqlx::query_as(
            r#"
            SELECT bom_id, sequence, part_no, quantity, capacity_kwh, years, line_amount, created_at
            FROM bom_items
            WHERE bom_id = ?
            ORDER BY sequence ASC
            "#,
        )
        .bind(bom_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(BomItem::try_from).collect()
    }

    pub async fn find_item(&self, bom_id: BomId, sequence: u32) -> BomwrightResult<Option<BomItem>> {
        let row: Option<BomItemRow> = sqlx::query_as(
            r#"
            SELECT bom_id, sequence, part_no, quantity, capacity_kwh, years, line_amount, created_at
            FROM bom_items
            WHERE bom_id = ? AND sequence = ?
            "#,
        )
        .bind(bom_id)
        .bind(i64::from(sequence))
        .fetch_optional(&self.pool)
        .await?;

        row.map(BomItem::try_from).transpose()
    }

    /// Replace the quantity and amount of a line, keeping its sequence.
    pub async fn update_item_amount(
        &self,
        bom_id: BomId,
        sequence: u32,
        quantity: Decimal,
        line_amount: Decimal,
    ) -> BomwrightResult<Option<BomItem>> {
        let row: Option<BomItemRow> = sqlx::query_as(
            r#"
            UPDATE bom_items
            SET quantity = ?, line_amount = ?
            WHERE bom_id = ? AND sequence = ?
            RETURNING bom_id, sequence, part_no, quantity, capacity_kwh, years, line_amount, created_at
            "#,
        )
        .bind(quantity.to_string())
        .bind(line_amount.to_string())
        .bind(bom_id)
        .bind(i64::from(sequence))
        .fetch_optional(&self.pool)
        .await?;

        row.map(BomItem::try_from).transpose()
    }

    pub async fn delete_item(&self, bom_id: BomId, sequence: u32) -> BomwrightResult<bool> {
        let result = sqlx::query("DELETE FROM bom_items WHERE bom_id = ? AND sequence = ?")
            .bind(bom_id)
            .bind(i64::from(sequence))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, FromRow)]
struct BomRow {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
}

impl From<BomRow> for Bom {
    fn from(row: BomRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct BomItemRow {
    bom_id: Uuid,
    sequence: i64,
    part_no: String,
    quantity: String,
    capacity_kwh: Option<String>,
    years: Option<String>,
    line_amount: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<BomItemRow> for BomItem {
    type Error = BomwrightError;

    fn try_from(row: BomItemRow) -> Result<Self, Self::Error> {
        let owner = format!("bom {} line {}", row.bom_id, row.sequence);
        let required = |value: String| -> BomwrightResult<Decimal> {
            stored_decimal(&owner, Some(value))?
                .ok_or_else(|| BomwrightError::storage(format!("{}: missing amount", owner)))
        };

        Ok(Self {
            bom_id: row.bom_id,
            sequence: u32::try_from(row.sequence)
                .map_err(|_| BomwrightError::storage(format!("{}: sequence out of range", owner)))?,
            part_no: row.part_no,
            quantity: required(row.quantity)?,
            capacity_kwh: stored_decimal(&owner, row.capacity_kwh)?,
            years: stored_decimal(&owner, row.years)?,
            line_amount: required(row.line_amount)?,
            created_at: row.created_at,
        })
    }
}
