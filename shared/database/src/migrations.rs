use anyhow::Result;
use sqlx::SqlitePool;

pub async fn run_sqlite_migrations(pool: &SqlitePool) -> Result<()> {
    tracing::info!("Running SQLite migrations");

    // Decimal columns hold canonical decimal text so values round-trip exactly
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS parts (
            part_no TEXT PRIMARY KEY,
            description TEXT NOT NULL DEFAULT '',
            manufacturer TEXT NOT NULL DEFAULT '',
            category1 TEXT NOT NULL DEFAULT '',
            category2 TEXT NOT NULL DEFAULT '',
            unit TEXT NOT NULL DEFAULT 'set',
            unit_price TEXT,
            notes TEXT NOT NULL DEFAULT '',
            pricing_model TEXT NOT NULL DEFAULT 'fixed',
            unit_price_per_kwh TEXT,
            unit_price_per_year TEXT,
            ref_capacity_kwh TEXT,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS boms (
            id BLOB PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // part_no is kept by value without a foreign key; deleting a part leaves
    // historical lines intact
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bom_items (
            bom_id BLOB NOT NULL REFERENCES boms(id) ON DELETE CASCADE,
            sequence INTEGER NOT NULL,
            part_no TEXT NOT NULL,
            quantity TEXT NOT NULL,
            capacity_kwh TEXT,
            years TEXT,
            line_amount TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (bom_id, sequence)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_parts_category1 ON parts(category1)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_parts_category2 ON parts(category2)")
        .execute(pool)
        .await?;

    tracing::info!("SQLite migrations completed successfully");
    Ok(())
}
