//! Catalog Store
//!
//! Durable parts, BOM headers and BOM lines. Every write is serialised by a
//! single writer lock and preceded by a snapshot notification.

use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use bomwright_models::{Bom, BomId, BomItem, CategoryOptions, NewBomItem, Part, PartFilter, PartId};
use bomwright_utils::{validate_model, BomwrightError, BomwrightResult, PartSink, PartWrite};

use crate::backup::{NoopSnapshotHook, SnapshotContext, SnapshotHook};
use crate::repositories::{BomRepository, PartRepository};
use crate::sqlite::SqlitePool;

#[derive(Clone)]
pub struct CatalogStore {
    parts: PartRepository,
    boms: BomRepository,
    write_lock: Arc<Mutex<()>>,
    snapshot_hook: Arc<dyn SnapshotHook>,
}

impl CatalogStore {
    pub fn new(pool: SqlitePool, snapshot_hook: Arc<dyn SnapshotHook>) -> Self {
        Self {
            parts: PartRepository::new(pool.clone()),
            boms: BomRepository::new(pool),
            write_lock: Arc::new(Mutex::new(())),
            snapshot_hook,
        }
    }

    /// Store without snapshots, for in-memory catalogs.
    pub fn without_snapshots(pool: SqlitePool) -> Self {
        Self::new(pool, Arc::new(NoopSnapshotHook))
    }

    fn notify_snapshot(&self, operation: &'static str, target: impl Into<String>) {
        let context = SnapshotContext::new(operation, target);
        if let Err(e) = self.snapshot_hook.snapshot(&context) {
            tracing::warn!(operation, target = %context.target, error = %e, "Snapshot before write failed");
        }
    }

    /// Inserts or replaces a part by part number.
    pub async fn upsert_part(&self, part: &Part) -> BomwrightResult<PartId> {
        let part = normalized(part);
        part.check_invariants()?;
        self.write_part(&part, false).await
    }

    /// Like [`upsert_part`](Self::upsert_part), but a part whose pricing
    /// model lacks its price field is accepted. Only overridden import rows
    /// are written this way.
    pub async fn upsert_part_overridden(&self, part: &Part) -> BomwrightResult<PartId> {
        let part = normalized(part);
        part.check_record()?;
        self.write_part(&part, true).await
    }

    async fn write_part(&self, part: &Part, overridden: bool) -> BomwrightResult<PartId> {
        let _guard = self.write_lock.lock().await;
        self.notify_snapshot("upsert_part", &part.part_no);
        self.store_part(part, overridden).await
    }

    /// Upserts a batch of parts under one writer lock and one snapshot.
    ///
    /// Parts failing validation get their own error entry. A storage error
    /// stops the batch and is returned as is.
    pub async fn upsert_parts(&self, writes: &[PartWrite]) -> BomwrightResult<Vec<BomwrightResult<PartId>>> {
        let checked: Vec<BomwrightResult<Part>> = writes
            .iter()
            .map(|write| {
                let part = normalized(&write.part);
                let verdict = if write.overridden {
                    part.check_record()
                } else {
                    part.check_invariants()
                };
                verdict.map(|_| part).map_err(BomwrightError::from)
            })
            .collect();

        let _guard = self.write_lock.lock().await;
        let accepted = checked.iter().filter(|c| c.is_ok()).count();
        if accepted > 0 {
            self.notify_snapshot("upsert_parts", format!("{} parts", accepted));
        }

        let mut results = Vec::with_capacity(writes.len());
        for (write, checked) in writes.iter().zip(checked) {
            results.push(match checked {
                Ok(part) => Ok(self.store_part(&part, write.overridden).await?),
                Err(e) => Err(e),
            });
        }
        Ok(results)
    }

    /// Writes a validated part. Callers hold the writer lock.
    async fn store_part(&self, part: &Part, overridden: bool) -> BomwrightResult<PartId> {
        self.parts.upsert(part).await?;

        tracing::info!(
            part_no = %part.part_no,
            pricing_model = %part.pricing_model,
            overridden,
            "Part upserted"
        );
        Ok(part.part_no.clone())
    }

    pub async fn find_parts(&self, filter: &PartFilter) -> BomwrightResult<Vec<Part>> {
        self.parts.find(filter).await
    }

    /// Resolves a part number to the current catalog record.
    pub async fn get_part(&self, part_no: &str) -> BomwrightResult<Option<Part>> {
        self.parts.find_by_part_no(part_no.trim()).await
    }

    /// Deletes a part. BOM lines that reference it are kept.
    pub async fn delete_part(&self, part_no: &str) -> BomwrightResult<()> {
        let part_no = part_no.trim();
        let _guard = self.write_lock.lock().await;
        self.notify_snapshot("delete_part", part_no);

        if !self.parts.delete(part_no).await? {
            return Err(BomwrightError::not_found(format!("part {}", part_no)));
        }

        tracing::info!(part_no, "Part deleted");
        Ok(())
    }

    pub async fn count_parts(&self) -> BomwrightResult<i64> {
        self.parts.count().await
    }

    pub async fn category_options(&self) -> BomwrightResult<CategoryOptions> {
        self.parts.category_options().await
    }

    pub async fn create_bom(&self, name: &str) -> BomwrightResult<BomId> {
        let bom = Bom::new(name.trim());
        validate_model(&bom)?;

        let _guard = self.write_lock.lock().await;
        self.notify_snapshot("create_bom", &bom.name);

        self.boms.create(&bom).await?;

        tracing::info!(bom_id = %bom.id, name = %bom.name, "BOM created");
        Ok(bom.id)
    }

    pub async fn get_bom(&self, bom_id: BomId) -> BomwrightResult<Option<Bom>> {
        self.boms.find_by_id(bom_id).await
    }

    /// All BOMs, newest first.
    pub async fn list_boms(&self) -> BomwrightResult<Vec<Bom>> {
        self.boms.find_all().await
    }

    /// Appends a priced line to a BOM.
    pub async fn add_bom_item(&self, bom_id: BomId, item: NewBomItem) -> BomwrightResult<BomItem> {
        let _guard = self.write_lock.lock().await;
        self.ensure_bom(bom_id).await?;
        self.notify_snapshot("add_bom_item", bom_id.to_string());

        let item = self.boms.append_item(bom_id, &item).await?;

        tracing::info!(
            bom_id = %bom_id,
            sequence = item.sequence,
            part_no = %item.part_no,
            line_amount = %item.line_amount,
            "BOM line added"
        );
        Ok(item)
    }

    /// Lines of a BOM in insertion order.
    pub async fn list_bom_items(&self, bom_id: BomId) -> BomwrightResult<Vec<BomItem>> {
        self.ensure_bom(bom_id).await?;
        self.boms.find_items(bom_id).await
    }

    pub async fn get_bom_item(&self, bom_id: BomId, sequence: u32) -> BomwrightResult<Option<BomItem>> {
        self.boms.find_item(bom_id, sequence).await
    }

    /// Stores a re-priced quantity for an existing line. The line keeps its
    /// sequence and its capacity and years parameters.
    pub async fn update_bom_item(
        &self,
        bom_id: BomId,
        sequence: u32,
        quantity: Decimal,
        line_amount: Decimal,
    ) -> BomwrightResult<BomItem> {
        let _guard = self.write_lock.lock().await;
        self.ensure_bom(bom_id).await?;
        self.notify_snapshot("update_bom_item", format!("{}#{}", bom_id, sequence));

        let item = self
            .boms
            .update_item_amount(bom_id, sequence, quantity, line_amount)
            .await?
            .ok_or_else(|| BomwrightError::not_found(format!("line {} of bom {}", sequence, bom_id)))?;

        tracing::info!(
            bom_id = %bom_id,
            sequence,
            %quantity,
            %line_amount,
            "BOM line updated"
        );
        Ok(item)
    }

    pub async fn remove_bom_item(&self, bom_id: BomId, sequence: u32) -> BomwrightResult<()> {
        let _guard = self.write_lock.lock().await;
        self.ensure_bom(bom_id).await?;
        self.notify_snapshot("remove_bom_item", format!("{}#{}", bom_id, sequence));

        if !self.boms.delete_item(bom_id, sequence).await? {
            return Err(BomwrightError::not_found(format!("line {} of bom {}", sequence, bom_id)));
        }

        tracing::info!(bom_id = %bom_id, sequence, "BOM line removed");
        Ok(())
    }

    async fn ensure_bom(&self, bom_id: Uuid) -> BomwrightResult<()> {
        match self.boms.find_by_id(bom_id).await? {
            Some(_) => Ok(()),
            None => Err(BomwrightError::not_found(format!("bom {}", bom_id))),
        }
    }
}

impl PartSink for CatalogStore {
    async fn upsert_batch(&self, writes: &[PartWrite]) -> BomwrightResult<Vec<BomwrightResult<PartId>>> {
        self.upsert_parts(writes).await
    }
}

/// Part with its number trimmed, as it is keyed in the catalog.
fn normalized(part: &Part) -> Part {
    let mut part = part.clone();
    part.part_no = part.part_no.trim().to_string();
    part
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_sqlite_migrations;
    use crate::sqlite::create_memory_pool;
    use crate::backup::BackupHandle;
    use bomwright_models::{PartSortKey, PricingModel};
    use rust_decimal_macros::dec;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn store() -> CatalogStore {
        let pool = create_memory_pool().await.unwrap();
        run_sqlite_migrations(&pool).await.unwrap();
        CatalogStore::without_snapshots(pool)
    }

    fn item(part_no: &str, amount: Decimal) -> NewBomItem {
        NewBomItem {
            part_no: part_no.to_string(),
            quantity: dec!(1),
            capacity_kwh: None,
            years: None,
            line_amount: amount,
        }
    }

    #[tokio::test]
    async fn test_upsert_round_trip_keeps_exact_decimals() {
        let store = store().await;
        let mut part = Part::per_kwh("R1", dec!(12345.6789)).with_description("EMS controller");
        part.ref_capacity_kwh = Some(dec!(100.50));

        assert_eq!(store.upsert_part(&part).await.unwrap(), "R1");
        let stored = store.get_part("R1").await.unwrap().unwrap();
        assert_eq!(stored, part);
        assert_eq!(stored.ref_capacity_kwh.unwrap().to_string(), "100.50");

        // replace by part number
        part.description = "EMS controller v2".to_string();
        store.upsert_part(&part).await.unwrap();
        assert_eq!(store.count_parts().await.unwrap(), 1);
        assert_eq!(store.get_part("R1").await.unwrap().unwrap().description, "EMS controller v2");
    }

    #[tokio::test]
    async fn test_upsert_rejects_missing_model_price() {
        let store = store().await;
        let part = Part::new("Y1", PricingModel::PerYear);

        let err = store.upsert_part(&part).await.unwrap_err();
        assert!(matches!(err, BomwrightError::Validation { ref field, .. } if field == "unitPricePerYear"));
        assert!(store.get_part("Y1").await.unwrap().is_none());

        assert_eq!(store.upsert_part_overridden(&part).await.unwrap(), "Y1");
        assert!(store.upsert_part_overridden(&Part::fixed(" ", dec!(1))).await.is_err());
    }

    #[tokio::test]
    async fn test_find_parts_filters() {
        let store = store().await;
        for part in [
            Part::fixed("A-1", dec!(1)).with_categories("Battery", "Cell").with_description("LFP cell"),
            Part::fixed("B-1", dec!(2)).with_categories("PCS", "Inverter").with_description("Grid inverter"),
            Part::fixed("C-1", dec!(3)).with_categories("Cabling", "DC").with_description("Cable set"),
            Part::fixed("a-2", dec!(4)).with_categories("Battery", "Rack").with_description("Rack frame"),
        ] {
            store.upsert_part(&part).await.unwrap();
        }

        let all = store.find_parts(&PartFilter::new()).await.unwrap();
        let numbers: Vec<_> = all.iter().map(|p| p.part_no.as_str()).collect();
        assert_eq!(numbers, vec!["A-1", "B-1", "C-1", "a-2"]);

        let filter = PartFilter::new().category1(["Battery", "PCS"]);
        let numbers: Vec<_> = store
            .find_parts(&filter)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.part_no)
            .collect();
        assert_eq!(numbers, vec!["A-1", "B-1", "a-2"]);

        let filter = PartFilter::new().category1(["Battery"]).category2(["Rack"]);
        assert_eq!(store.find_parts(&filter).await.unwrap().len(), 1);

        let filter = PartFilter::new().text("  CELL ");
        let found = store.find_parts(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].part_no, "A-1");

        let filter = PartFilter::new().text("a-").sort_by(PartSortKey::Description);
        let numbers: Vec<_> = store
            .find_parts(&filter)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.part_no)
            .collect();
        assert_eq!(numbers, vec!["A-1", "a-2"]);
    }

    #[tokio::test]
    async fn test_category_options() {
        let store = store().await;
        store
            .upsert_part(&Part::fixed("A-1", dec!(1)).with_categories("PCS", ""))
            .await
            .unwrap();
        store
            .upsert_part(&Part::fixed("A-2", dec!(1)).with_categories("Battery", "Cell"))
            .await
            .unwrap();
        store
            .upsert_part(&Part::fixed("A-3", dec!(1)).with_categories("Battery", "Rack"))
            .await
            .unwrap();

        let options = store.category_options().await.unwrap();
        assert_eq!(options.category1, vec!["Battery", "PCS"]);
        assert_eq!(options.category2, vec!["Cell", "Rack"]);
    }

    #[tokio::test]
    async fn test_delete_part_keeps_bom_lines() {
        let store = store().await;
        store.upsert_part(&Part::fixed("F1", dec!(5))).await.unwrap();
        let bom_id = store.create_bom("Site A").await.unwrap();
        store.add_bom_item(bom_id, item("F1", dec!(5))).await.unwrap();

        store.delete_part("F1").await.unwrap();
        assert!(matches!(store.delete_part("F1").await, Err(BomwrightError::NotFound { .. })));

        let items = store.list_bom_items(bom_id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].part_no, "F1");
        assert!(store.get_part("F1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bom_items_keep_insertion_order() {
        let store = store().await;
        let bom_id = store.create_bom("Site B").await.unwrap();

        for (part_no, amount) in [("Z", dec!(1.10)), ("A", dec!(2.20)), ("M", dec!(3.30))] {
            store.add_bom_item(bom_id, item(part_no, amount)).await.unwrap();
        }
        store.remove_bom_item(bom_id, 2).await.unwrap();
        let added = store.add_bom_item(bom_id, item("B", dec!(4))).await.unwrap();
        assert_eq!(added.sequence, 4);

        let items = store.list_bom_items(bom_id).await.unwrap();
        let order: Vec<_> = items.iter().map(|i| (i.sequence, i.part_no.as_str())).collect();
        assert_eq!(order, vec![(1, "Z"), (3, "M"), (4, "B")]);
        assert_eq!(items[0].line_amount.to_string(), "1.10");

        assert!(matches!(
            store.remove_bom_item(bom_id, 2).await,
            Err(BomwrightError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_bom_is_not_found() {
        let store = store().await;
        let missing = Uuid::new_v4();
        assert!(store.get_bom(missing).await.unwrap().is_none());
        assert!(matches!(
            store.add_bom_item(missing, item("F1", dec!(1))).await,
            Err(BomwrightError::NotFound { .. })
        ));
        assert!(store.create_bom("   ").await.is_err());
    }

    #[tokio::test]
    async fn test_list_boms() {
        let store = store().await;
        let first = store.create_bom("First").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store.create_bom("Second").await.unwrap();

        let boms = store.list_boms().await.unwrap();
        assert_eq!(boms.len(), 2);
        assert_eq!(boms[0].id, second);
        assert_eq!(boms[1].id, first);
    }

    struct CountingHook {
        calls: AtomicUsize,
        fail: bool,
    }

    impl SnapshotHook for CountingHook {
        fn snapshot(&self, _context: &SnapshotContext) -> anyhow::Result<BackupHandle> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("disk full");
            }
            Ok(BackupHandle {
                path: None,
                taken_at: chrono::Utc::now(),
            })
        }
    }

    #[tokio::test]
    async fn test_snapshot_before_each_write_and_failure_is_ignored() {
        let pool = create_memory_pool().await.unwrap();
        run_sqlite_migrations(&pool).await.unwrap();
        let hook = Arc::new(CountingHook {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let store = CatalogStore::new(pool, hook.clone());

        store.upsert_part(&Part::fixed("F1", dec!(1))).await.unwrap();
        let bom_id = store.create_bom("Site").await.unwrap();
        store.add_bom_item(bom_id, item("F1", dec!(1))).await.unwrap();
        store.find_parts(&PartFilter::new()).await.unwrap();

        assert_eq!(hook.calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.count_parts().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_batch_upsert_takes_one_snapshot() {
        let pool = create_memory_pool().await.unwrap();
        run_sqlite_migrations(&pool).await.unwrap();
        let hook = Arc::new(CountingHook {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let store = CatalogStore::new(pool, hook.clone());

        let writes = vec![
            PartWrite { part: Part::fixed("F1", dec!(1)), overridden: false },
            PartWrite { part: Part::new("Y1", PricingModel::PerYear), overridden: false },
            PartWrite { part: Part::new("Y2", PricingModel::PerYear), overridden: true },
            PartWrite { part: Part::fixed(" F3 ", dec!(3)), overridden: false },
        ];
        let results = store.upsert_parts(&writes).await.unwrap();

        assert_eq!(results[0], Ok("F1".to_string()));
        assert!(matches!(results[1], Err(BomwrightError::Validation { .. })));
        assert_eq!(results[2], Ok("Y2".to_string()));
        assert_eq!(results[3], Ok("F3".to_string()));
        assert_eq!(hook.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.count_parts().await.unwrap(), 3);

        let rejected = vec![PartWrite { part: Part::fixed("", dec!(1)), overridden: true }];
        assert!(store.upsert_parts(&rejected).await.unwrap()[0].is_err());
        assert_eq!(hook.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_update_bom_item_keeps_sequence() {
        let pool = create_memory_pool().await.unwrap();
        run_sqlite_migrations(&pool).await.unwrap();
        let hook = Arc::new(CountingHook {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let store = CatalogStore::new(pool, hook.clone());
        let bom_id = store.create_bom("Site D").await.unwrap();
        store.add_bom_item(bom_id, item("F1", dec!(5))).await.unwrap();
        store.add_bom_item(bom_id, item("F2", dec!(7))).await.unwrap();

        let updated = store.update_bom_item(bom_id, 1, dec!(3), dec!(15.00)).await.unwrap();
        assert_eq!(updated.sequence, 1);
        assert_eq!(updated.quantity, dec!(3));
        assert_eq!(updated.line_amount.to_string(), "15.00");
        assert_eq!(hook.calls.load(Ordering::SeqCst), 4);

        let items = store.list_bom_items(bom_id).await.unwrap();
        assert_eq!(items[0], updated);
        assert_eq!(items[1].line_amount, dec!(7));

        assert!(matches!(
            store.update_bom_item(bom_id, 9, dec!(1), dec!(1)).await,
            Err(BomwrightError::NotFound { .. })
        ));
        assert!(store.get_bom_item(bom_id, 9).await.unwrap().is_none());
    }

    const CATEGORY1: [&str; 3] = ["Battery", "PCS", "Cabling"];
    const CATEGORY2: [&str; 3] = ["Cell", "Rack", ""];

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_category_filter_is_a_set_union(
            parts in proptest::collection::vec((0usize..3, 0usize..3), 0..12),
            wanted1 in proptest::collection::btree_set(0usize..3, 0..3),
            wanted2 in proptest::collection::btree_set(0usize..3, 0..3),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let (found, expected) = runtime.block_on(async {
                let store = store().await;
                for (n, (c1, c2)) in parts.iter().enumerate() {
                    let part = Part::fixed(format!("P-{:02}", n), dec!(1)).with_categories(CATEGORY1[*c1], CATEGORY2[*c2]);
                    store.upsert_part(&part).await.unwrap();
                }

                let filter = PartFilter::new()
                    .category1(wanted1.iter().map(|i| CATEGORY1[*i]))
                    .category2(wanted2.iter().map(|i| CATEGORY2[*i]));
                let found: Vec<String> = store
                    .find_parts(&filter)
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|p| p.part_no)
                    .collect();

                let expected: Vec<String> = parts
                    .iter()
                    .enumerate()
                    .filter(|(_, (c1, c2))| {
                        (wanted1.is_empty() || wanted1.contains(c1)) && (wanted2.is_empty() || wanted2.contains(c2))
                    })
                    .map(|(n, _)| format!("P-{:02}", n))
                    .collect();
                (found, expected)
            });

            prop_assert_eq!(found, expected);
        }
    }
}
