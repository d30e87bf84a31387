//! BOM Assembly Service
//!
//! Prices catalog parts into BOM lines and keeps the snapshotted amounts.

use rust_decimal::Decimal;
use serde::Serialize;

use bomwright_database::CatalogStore;
use bomwright_models::{BomId, BomItem, BomSelection, LineParams};
use bomwright_utils::{parse_line_params, sum_amounts, BomwrightError, BomwrightResult, PricingEngine};

/// Result of one row of a bulk addition.
#[derive(Debug, Clone)]
pub struct LineOutcome {
    pub index: usize,
    pub part_no: String,
    pub result: BomwrightResult<BomItem>,
}

/// Serialized form of a [`LineOutcome`].
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineOutcomeView {
    pub index: usize,
    pub part_no: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<BomItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<bomwright_utils::ErrorResponse>,
}

impl From<LineOutcome> for LineOutcomeView {
    fn from(outcome: LineOutcome) -> Self {
        let (item, error) = match outcome.result {
            Ok(item) => (Some(item), None),
            Err(e) => (None, Some(e.into())),
        };
        Self {
            index: outcome.index,
            part_no: outcome.part_no,
            success: item.is_some(),
            item,
            error,
        }
    }
}

#[derive(Clone)]
pub struct BomAssemblyService {
    store: CatalogStore,
    engine: PricingEngine,
}

impl BomAssemblyService {
    pub fn new(store: CatalogStore, engine: PricingEngine) -> Self {
        Self { store, engine }
    }

    /// Prices `part_no` with `params` and appends the line to the BOM.
    ///
    /// The amount is fixed at this point; later catalog price changes never
    /// reach the stored line.
    pub async fn add_line(&self, bom_id: BomId, part_no: &str, params: &LineParams) -> BomwrightResult<BomItem> {
        self.ensure_bom(bom_id).await?;
        self.price_and_append(bom_id, part_no, params).await
    }

    /// Adds each selected row on its own. A failing row is reported in its
    /// outcome and the remaining rows are still added.
    pub async fn bulk_add(&self, bom_id: BomId, selections: &[BomSelection]) -> BomwrightResult<Vec<LineOutcome>> {
        self.ensure_bom(bom_id).await?;

        let mut outcomes = Vec::with_capacity(selections.len());
        for (index, selection) in selections.iter().enumerate() {
            let result = match parse_line_params(selection) {
                Ok(params) => self.price_and_append(bom_id, &selection.part_no, &params).await,
                Err(e) => Err(e),
            };

            // Storage failures are not row problems
            if let Err(e @ BomwrightError::Storage { .. }) = &result {
                return Err(e.clone());
            }
            if let Err(e) = &result {
                tracing::warn!(bom_id = %bom_id, index, part_no = %selection.part_no, error = %e, "BOM line rejected");
            }

            outcomes.push(LineOutcome {
                index,
                part_no: selection.part_no.trim().to_string(),
                result,
            });
        }

        let added = outcomes.iter().filter(|o| o.result.is_ok()).count();
        tracing::info!(bom_id = %bom_id, selected = outcomes.len(), added, "Bulk add finished");
        Ok(outcomes)
    }

    /// Changes the quantity of a line and prices it again against the
    /// current catalog part. The line keeps its sequence, capacity and
    /// years; the new amount becomes its snapshot.
    pub async fn update_line_quantity(&self, bom_id: BomId, sequence: u32, quantity: Decimal) -> BomwrightResult<BomItem> {
        self.ensure_bom(bom_id).await?;
        let item = self
            .store
            .get_bom_item(bom_id, sequence)
            .await?
            .ok_or_else(|| BomwrightError::not_found(format!("line {} of bom {}", sequence, bom_id)))?;
        let part = self
            .store
            .get_part(&item.part_no)
            .await?
            .ok_or_else(|| BomwrightError::not_found(format!("part {}", item.part_no)))?;

        let params = LineParams {
            quantity: Some(quantity),
            capacity_kwh: item.capacity_kwh,
            years: item.years,
        };
        let line = self.engine.price_line(&part, &params)?;

        self.store
            .update_bom_item(bom_id, sequence, line.quantity, line.line_amount)
            .await
    }

    /// Sum of the snapshotted line amounts.
    pub async fn recalculate_total(&self, bom_id: BomId) -> BomwrightResult<Decimal> {
        let items = self.store.list_bom_items(bom_id).await?;
        sum_amounts(items.iter().map(|item| item.line_amount))
    }

    /// CSV download of a BOM with a trailing total row.
    ///
    /// Lines whose part is gone from the catalog are exported with empty
    /// descriptive columns.
    pub async fn export_csv(&self, bom_id: BomId) -> BomwrightResult<Vec<u8>> {
        let items = self.store.list_bom_items(bom_id).await?;

        // UTF-8 byte-order mark so spreadsheet tools detect the encoding
        let mut writer = csv::Writer::from_writer(b"\xEF\xBB\xBF".to_vec());
        writer.write_record([
            "partNo",
            "description",
            "category1",
            "category2",
            "unit",
            "quantity",
            "capacityKWh",
            "years",
            "amount",
            "notes",
        ])?;

        for item in &items {
            let (description, category1, category2, unit, notes) = match self.store.get_part(&item.part_no).await? {
                Some(part) => (part.description, part.category1, part.category2, part.unit, part.notes),
                None => Default::default(),
            };

            writer.write_record([
                item.part_no.clone(),
                description,
                category1,
                category2,
                unit,
                item.quantity.to_string(),
                item.capacity_kwh.map(|d| d.to_string()).unwrap_or_default(),
                item.years.map(|d| d.to_string()).unwrap_or_default(),
                item.line_amount.to_string(),
                notes,
            ])?;
        }

        let total = sum_amounts(items.iter().map(|item| item.line_amount))?;
        writer.write_record(["", "", "", "", "", "", "", "Total", total.to_string().as_str(), ""])?;

        writer
            .into_inner()
            .map_err(|e| BomwrightError::internal(format!("Failed to finish CSV export: {}", e)))
    }

    async fn price_and_append(&self, bom_id: BomId, part_no: &str, params: &LineParams) -> BomwrightResult<BomItem> {
        let part_no = part_no.trim();
        let part = self
            .store
            .get_part(part_no)
            .await?
            .ok_or_else(|| BomwrightError::not_found(format!("part {}", part_no)))?;

        let line = self.engine.price_line(&part, params)?;

        self.store
            .add_bom_item(
                bom_id,
                bomwright_models::NewBomItem {
                    part_no: part.part_no,
                    quantity: line.quantity,
                    capacity_kwh: line.capacity_kwh,
                    years: line.years,
                    line_amount: line.line_amount,
                },
            )
            .await
    }

    async fn ensure_bom(&self, bom_id: BomId) -> BomwrightResult<()> {
        match self.store.get_bom(bom_id).await? {
            Some(_) => Ok(()),
            None => Err(BomwrightError::not_found(format!("bom {}", bom_id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bomwright_database::{create_memory_pool, migrations::run_sqlite_migrations};
    use bomwright_models::Part;
    use rust_decimal_macros::dec;

    async fn setup() -> (CatalogStore, BomAssemblyService) {
        let pool = create_memory_pool().await.unwrap();
        run_sqlite_migrations(&pool).await.unwrap();
        let store = CatalogStore::without_snapshots(pool);
        let service = BomAssemblyService::new(store.clone(), PricingEngine::default());
        (store, service)
    }

    fn selection(part_no: &str, quantity: &str, capacity: Option<&str>, years: Option<&str>) -> BomSelection {
        BomSelection {
            part_no: part_no.to_string(),
            quantity: Some(quantity.to_string()),
            capacity_kwh: capacity.map(str::to_string),
            years: years.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_line_amount_is_a_snapshot() {
        let (store, service) = setup().await;
        store.upsert_part(&Part::per_kwh("R1", dec!(10))).await.unwrap();
        let bom_id = store.create_bom("Site A").await.unwrap();

        let params = LineParams::quantity(dec!(2)).with_capacity_kwh(dec!(5));
        let item = service.add_line(bom_id, "R1", &params).await.unwrap();
        assert_eq!(item.line_amount, dec!(100));
        assert_eq!(item.sequence, 1);

        store.upsert_part(&Part::per_kwh("R1", dec!(20))).await.unwrap();
        assert_eq!(service.recalculate_total(bom_id).await.unwrap(), dec!(100));
    }

    #[tokio::test]
    async fn test_bulk_add_isolates_failures() {
        let (store, service) = setup().await;
        store.upsert_part(&Part::fixed("F1", dec!(1500))).await.unwrap();
        store.upsert_part(&Part::per_kwh("R1", dec!(10))).await.unwrap();
        store.upsert_part(&Part::per_year("M1", dec!(120))).await.unwrap();
        let bom_id = store.create_bom("Site B").await.unwrap();

        let outcomes = service
            .bulk_add(
                bom_id,
                &[
                    selection("F1", "2", None, None),
                    selection("R1", "1", None, None),
                    selection("GONE", "1", None, None),
                    selection("M1", "1", None, Some("10")),
                    selection("F1", "abc", None, None),
                ],
            )
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 5);
        assert_eq!(outcomes[0].result.as_ref().unwrap().line_amount, dec!(3000));
        assert!(matches!(outcomes[1].result, Err(BomwrightError::Pricing { .. })));
        assert!(matches!(outcomes[2].result, Err(BomwrightError::NotFound { .. })));
        assert_eq!(outcomes[3].result.as_ref().unwrap().line_amount, dec!(1200));
        assert!(matches!(outcomes[4].result, Err(BomwrightError::Pricing { .. })));

        let items = store.list_bom_items(bom_id).await.unwrap();
        let sequences: Vec<_> = items.iter().map(|i| (i.sequence, i.part_no.as_str())).collect();
        assert_eq!(sequences, vec![(1, "F1"), (2, "M1")]);
        assert_eq!(service.recalculate_total(bom_id).await.unwrap(), dec!(4200));
    }

    #[tokio::test]
    async fn test_quantity_update_reprices_against_current_part() {
        let (store, service) = setup().await;
        store.upsert_part(&Part::per_kwh("R1", dec!(10))).await.unwrap();
        let bom_id = store.create_bom("Site E").await.unwrap();
        let params = LineParams::quantity(dec!(2)).with_capacity_kwh(dec!(5));
        service.add_line(bom_id, "R1", &params).await.unwrap();

        store.upsert_part(&Part::per_kwh("R1", dec!(12))).await.unwrap();
        let item = service.update_line_quantity(bom_id, 1, dec!(3)).await.unwrap();
        assert_eq!(item.sequence, 1);
        assert_eq!(item.capacity_kwh, Some(dec!(5)));
        assert_eq!(item.line_amount.to_string(), "180.00");
        assert_eq!(service.recalculate_total(bom_id).await.unwrap(), dec!(180));

        assert!(matches!(
            service.update_line_quantity(bom_id, 1, dec!(-1)).await,
            Err(BomwrightError::Pricing { .. })
        ));
        assert!(matches!(
            service.update_line_quantity(bom_id, 2, dec!(1)).await,
            Err(BomwrightError::NotFound { .. })
        ));

        store.delete_part("R1").await.unwrap();
        assert!(matches!(
            service.update_line_quantity(bom_id, 1, dec!(1)).await,
            Err(BomwrightError::NotFound { .. })
        ));
        assert_eq!(service.recalculate_total(bom_id).await.unwrap(), dec!(180));
    }

    #[tokio::test]
    async fn test_unknown_bom() {
        let (_, service) = setup().await;
        let missing = uuid::Uuid::new_v4();
        assert!(matches!(
            service.bulk_add(missing, &[selection("F1", "1", None, None)]).await,
            Err(BomwrightError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_export_csv_survives_deleted_parts() {
        let (store, service) = setup().await;
        store
            .upsert_part(&Part::fixed("F1", dec!(2.50)).with_description("Cable tray").with_categories("Cabling", "Tray"))
            .await
            .unwrap();
        store.upsert_part(&Part::fixed("F2", dec!(4))).await.unwrap();
        let bom_id = store.create_bom("Site C").await.unwrap();
        service.add_line(bom_id, "F1", &LineParams::quantity(dec!(4))).await.unwrap();
        service.add_line(bom_id, "F2", &LineParams::quantity(dec!(1))).await.unwrap();
        store.delete_part("F2").await.unwrap();

        let bytes = service.export_csv(bom_id).await.unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<_> = text.trim_start_matches('\u{feff}').lines().collect();

        assert_eq!(lines[0], "partNo,description,category1,category2,unit,quantity,capacityKWh,years,amount,notes");
        assert_eq!(lines[1], "F1,Cable tray,Cabling,Tray,set,4,,,10.00,");
        assert_eq!(lines[2], "F2,,,,,1,,,4.00,");
        assert_eq!(lines[3], ",,,,,,,Total,14.00,");
    }
}
