//! Open import sessions and master-file detection.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

use bomwright_database::CatalogStore;
use bomwright_utils::{
    validate_file_size, validate_file_type, BomwrightError, BomwrightResult, CandidateParser, CommitOutcome,
    ImportConfig, ImportSession, ImportState, PartField, SourceFormat,
};

struct OpenSession {
    session: ImportSession,
    last_used: DateTime<Utc>,
}

#[derive(Default)]
struct Sessions {
    open: HashMap<Uuid, OpenSession>,
    /// Committed or discarded sessions, kept only as a state marker.
    closed: HashMap<Uuid, (ImportState, DateTime<Utc>)>,
}

impl Sessions {
    fn open_mut(&mut self, id: Uuid) -> BomwrightResult<&mut OpenSession> {
        if let Some((state, _)) = self.closed.get(&id) {
            return Err(BomwrightError::validation(
                "state",
                format!("import session {} is already {}", id, state),
            ));
        }

        let entry = self
            .open
            .get_mut(&id)
            .ok_or_else(|| BomwrightError::not_found(format!("import session {}", id)))?;
        entry.last_used = Utc::now();
        Ok(entry)
    }

    fn close(&mut self, id: Uuid, state: ImportState) {
        self.open.remove(&id);
        self.closed.insert(id, (state, Utc::now()));
    }
}

/// In-memory registry of open import sessions by ID.
///
/// Sessions leave the registry when they are committed or discarded, and
/// open sessions idle for longer than the configured TTL are dropped.
#[derive(Clone)]
pub struct ImportRegistry {
    sessions: Arc<RwLock<Sessions>>,
    config: Arc<ImportConfig>,
}

impl ImportRegistry {
    pub fn new(config: ImportConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(Sessions::default())),
            config: Arc::new(config),
        }
    }

    fn parser_for(&self, source_name: &str) -> CandidateParser {
        let is_tsv = Path::new(source_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("tsv"));

        let delimiter = if is_tsv { '\t' } else { self.config.csv_delimiter };
        CandidateParser::new().with_delimiter(delimiter)
    }

    /// Resolves the source format from an explicit hint, the file name or
    /// the content type, in that order.
    pub fn resolve_format(
        &self,
        file_name: &str,
        hint: Option<&str>,
        content_type: Option<&str>,
    ) -> BomwrightResult<SourceFormat> {
        if let Some(hint) = hint.filter(|h| !h.trim().is_empty()) {
            return SourceFormat::from_hint(hint)
                .ok_or_else(|| BomwrightError::validation("format", format!("unknown source format '{}'", hint)));
        }

        validate_file_type(file_name, &self.config.allowed_extensions)?;
        SourceFormat::from_extension(Path::new(file_name))
            .or_else(|| content_type.and_then(SourceFormat::from_content_type))
            .ok_or_else(|| {
                BomwrightError::validation("format", format!("cannot tell the format of '{}'", file_name))
            })
    }

    /// Parses a source into a new session and registers it.
    pub async fn stage(&self, source_name: &str, data: &[u8], format: SourceFormat) -> BomwrightResult<ImportSession> {
        validate_file_size(data.len() as u64, self.config.max_file_size)?;

        let session = ImportSession::parse(&self.parser_for(source_name), source_name, data, format)?;

        self.evict_idle().await;
        self.sessions.write().await.open.insert(
            session.id(),
            OpenSession {
                session: session.clone(),
                last_used: Utc::now(),
            },
        );
        Ok(session)
    }

    pub async fn get(&self, id: Uuid) -> BomwrightResult<ImportSession> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.open_mut(id)?.session.clone())
    }

    /// Applies operator edits to one candidate: field values first, then the
    /// override flag. Either all of them apply or none does.
    pub async fn review(
        &self,
        id: Uuid,
        index: usize,
        edits: &[(PartField, String)],
        override_warning: Option<bool>,
    ) -> BomwrightResult<ImportSession> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.open_mut(id)?;

        let mut reviewed = entry.session.clone();
        for (field, value) in edits {
            reviewed.amend(index, *field, value)?;
        }
        if let Some(flag) = override_warning {
            reviewed.set_override(index, flag)?;
        }

        entry.session = reviewed.clone();
        Ok(reviewed)
    }

    /// Commits selected candidates into `store`. A store failure leaves the
    /// session open for another attempt.
    pub async fn commit(&self, id: Uuid, store: &CatalogStore, selection: &[usize]) -> BomwrightResult<Vec<CommitOutcome>> {
        let mut sessions = self.sessions.write().await;
        let outcomes = sessions.open_mut(id)?.session.commit(store, selection).await?;
        sessions.close(id, ImportState::Committed);
        Ok(outcomes)
    }

    pub async fn discard(&self, id: Uuid) -> BomwrightResult<usize> {
        let mut sessions = self.sessions.write().await;
        let dropped = sessions.open_mut(id)?.session.discard()?;
        sessions.close(id, ImportState::Discarded);
        Ok(dropped)
    }

    pub async fn open_sessions(&self) -> usize {
        self.sessions.read().await.open.len()
    }

    pub async fn evict_idle(&self) -> usize {
        self.evict_idle_at(Utc::now()).await
    }

    /// Drops open sessions unused for longer than the TTL as of `now`, and
    /// state markers older than the TTL. Returns the open sessions dropped.
    pub async fn evict_idle_at(&self, now: DateTime<Utc>) -> usize {
        let ttl = i64::try_from(self.config.session_ttl_seconds).unwrap_or(i64::MAX);
        let expired = |since: DateTime<Utc>| now.signed_duration_since(since).num_seconds() > ttl;

        let mut sessions = self.sessions.write().await;
        let before = sessions.open.len();
        sessions.open.retain(|id, entry| {
            let keep = !expired(entry.last_used);
            if !keep {
                tracing::info!(session_id = %id, source = %entry.session.source_name(), "Idle import session dropped");
            }
            keep
        });
        sessions.closed.retain(|_, (_, closed_at)| !expired(*closed_at));

        before - sessions.open.len()
    }
}

/// Runs [`ImportRegistry::evict_idle`] every `period` until the task is
/// aborted.
pub fn spawn_session_sweeper(registry: ImportRegistry, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let dropped = registry.evict_idle().await;
            if dropped > 0 {
                tracing::debug!(dropped, "Import session sweep");
            }
        }
    })
}

/// Stages the first configured master file found in `directory` when the
/// catalog is empty. The session is left for review and never committed
/// here.
pub async fn detect_master_file(
    registry: &ImportRegistry,
    store: &CatalogStore,
    directory: &Path,
) -> BomwrightResult<Option<Uuid>> {
    if store.count_parts().await? > 0 {
        return Ok(None);
    }

    for candidate in &registry.config.master_file_candidates {
        let path = directory.join(candidate);
        if !path.is_file() {
            continue;
        }

        let format = registry.resolve_format(candidate, None, None)?;
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| BomwrightError::parse(format!("Failed to read {}: {}", path.display(), e)))?;

        let session = registry.stage(candidate, &data, format).await?;
        let summary = session.summary();
        tracing::info!(
            session_id = %session.id(),
            file = %path.display(),
            rows = summary.total_rows,
            "Master file staged for review"
        );
        return Ok(Some(session.id()));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bomwright_database::{create_memory_pool, migrations::run_sqlite_migrations};
    use bomwright_models::{Part, PartFilter};
    use bomwright_utils::AppConfig;
    use rust_decimal_macros::dec;

    async fn store() -> CatalogStore {
        let pool = create_memory_pool().await.unwrap();
        run_sqlite_migrations(&pool).await.unwrap();
        CatalogStore::without_snapshots(pool)
    }

    fn registry() -> ImportRegistry {
        ImportRegistry::new(AppConfig::default().import)
    }

    #[test]
    fn test_resolve_format() {
        let registry = registry();
        assert_eq!(registry.resolve_format("parts.csv", None, None).unwrap(), SourceFormat::Delimited);
        assert_eq!(registry.resolve_format("parts.xlsx", None, None).unwrap(), SourceFormat::Spreadsheet);
        assert_eq!(
            registry.resolve_format("upload.bin", Some("csv"), None).unwrap(),
            SourceFormat::Delimited
        );
        assert!(registry.resolve_format("parts.pdf", None, None).is_err());
    }

    #[tokio::test]
    async fn test_stage_review_commit() {
        let registry = registry();
        let store = store().await;
        let data = b"partNo,pricingModel,unitPricePerKWh\nR1,per_kwh,10\nR2,per_kwh,\n";

        let session = registry.stage("batch.csv", data, SourceFormat::Delimited).await.unwrap();
        assert_eq!(session.summary().warnings, 1);

        let reviewed = registry
            .review(session.id(), 1, &[(PartField::UnitPricePerKwh, "12.5".to_string())], None)
            .await
            .unwrap();
        assert_eq!(reviewed.state(), ImportState::Reviewed);
        assert!(reviewed.candidates()[1].validation_status.is_ok());

        let outcomes = registry.commit(session.id(), &store, &[0, 1]).await.unwrap();
        assert!(outcomes.iter().all(CommitOutcome::is_success));
        assert_eq!(store.count_parts().await.unwrap(), 2);

        let again = registry.commit(session.id(), &store, &[0]).await;
        assert!(matches!(again, Err(BomwrightError::Validation { .. })));
        assert!(matches!(registry.get(session.id()).await, Err(BomwrightError::Validation { .. })));
        assert_eq!(registry.open_sessions().await, 0);
    }

    #[tokio::test]
    async fn test_committed_parts_match_their_candidates() {
        let registry = registry();
        let store = store().await;
        let data = "partNo,description,manufacturer,category1,category2,unit,unitPrice,notes,pricingModel,unitPricePerKWh,unitPricePerYear,refCapacityKWh\n\
                    F1,Cable,Acme,Cabling,DC,m,2.50,long run,fixed,,,\n\
                    R1,EMS 制御盤,Acme,Control,,,,,per_kwh,10.125,,500\n\
                    M1,Maintenance,,Service,O&M,,,,per_year,,1200.00,\n";

        let session = registry.stage("master.csv", data.as_bytes(), SourceFormat::Delimited).await.unwrap();
        let expected: Vec<Part> = session.candidates().iter().filter_map(|c| c.fields.to_part()).collect();
        assert_eq!(expected.len(), 3);

        registry.commit(session.id(), &store, &[0, 1, 2]).await.unwrap();

        let mut stored = store.find_parts(&PartFilter::new()).await.unwrap();
        stored.sort_by(|a, b| a.part_no.cmp(&b.part_no));
        let mut expected = expected;
        expected.sort_by(|a, b| a.part_no.cmp(&b.part_no));
        assert_eq!(stored, expected);

        let r1 = store.get_part("R1").await.unwrap().unwrap();
        assert_eq!(r1.unit, "set");
        assert_eq!(r1.unit_price_per_kwh.unwrap().to_string(), "10.125");
        assert_eq!(r1.ref_capacity_kwh, Some(dec!(500)));
        assert_eq!(store.get_part("F1").await.unwrap().unwrap().unit_price.unwrap().to_string(), "2.50");
    }

    #[tokio::test]
    async fn test_same_source_twice_keeps_one_row_per_part() {
        let registry = registry();
        let store = store().await;
        let data = b"partNo,unitPrice\nF1,10\nF2,20\nF1,15\n";

        for _ in 0..2 {
            let session = registry.stage("parts.csv", data, SourceFormat::Delimited).await.unwrap();
            registry.commit(session.id(), &store, &[0, 1, 2]).await.unwrap();
        }

        let parts = store.find_parts(&PartFilter::new()).await.unwrap();
        let numbers: Vec<_> = parts.iter().map(|p| p.part_no.as_str()).collect();
        assert_eq!(numbers, vec!["F1", "F2"]);
        assert_eq!(parts[0].unit_price, Some(dec!(15)));
    }

    #[tokio::test]
    async fn test_rejected_review_leaves_session_untouched() {
        let registry = registry();
        let data = b"partNo,pricingModel,unitPricePerKWh\nR1,per_kwh,10\nR2,per_kwh,\n";
        let session = registry.stage("batch.csv", data, SourceFormat::Delimited).await.unwrap();

        let result = registry
            .review(session.id(), 0, &[(PartField::Notes, "edited".to_string())], Some(true))
            .await;
        assert!(matches!(result, Err(BomwrightError::Validation { .. })));

        let current = registry.get(session.id()).await.unwrap();
        assert_eq!(current.state(), ImportState::Parsed);
        assert_eq!(current.candidates(), session.candidates());
    }

    #[tokio::test]
    async fn test_finished_and_idle_sessions_leave_the_registry() {
        let registry = registry();
        let store = store().await;
        let data = b"partNo,unitPrice\nF1,10\n";

        let committed = registry.stage("a.csv", data, SourceFormat::Delimited).await.unwrap();
        let discarded = registry.stage("b.csv", data, SourceFormat::Delimited).await.unwrap();
        let idle = registry.stage("c.csv", data, SourceFormat::Delimited).await.unwrap();
        assert_eq!(registry.open_sessions().await, 3);

        registry.commit(committed.id(), &store, &[0]).await.unwrap();
        registry.discard(discarded.id()).await.unwrap();
        assert_eq!(registry.open_sessions().await, 1);
        assert!(matches!(registry.discard(discarded.id()).await, Err(BomwrightError::Validation { .. })));

        assert_eq!(registry.evict_idle().await, 0);
        let ttl = chrono::Duration::seconds(AppConfig::default().import.session_ttl_seconds as i64);
        let later = Utc::now() + ttl + chrono::Duration::seconds(5);
        assert_eq!(registry.evict_idle_at(later).await, 1);
        assert_eq!(registry.open_sessions().await, 0);

        assert!(matches!(registry.get(idle.id()).await, Err(BomwrightError::NotFound { .. })));
        assert!(matches!(registry.get(committed.id()).await, Err(BomwrightError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let registry = registry();
        assert!(matches!(registry.get(Uuid::new_v4()).await, Err(BomwrightError::NotFound { .. })));
        assert!(matches!(registry.discard(Uuid::new_v4()).await, Err(BomwrightError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_master_file_is_staged_only_for_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("parts_master.csv"), "partNo,unitPrice\nF1,100\n").unwrap();

        let registry = registry();
        let store = store().await;

        let id = detect_master_file(&registry, &store, dir.path()).await.unwrap().unwrap();
        let session = registry.get(id).await.unwrap();
        assert_eq!(session.state(), ImportState::Parsed);
        assert_eq!(session.candidates().len(), 1);
        assert_eq!(store.count_parts().await.unwrap(), 0);

        store.upsert_part(&Part::fixed("F1", dec!(100))).await.unwrap();
        assert!(detect_master_file(&registry, &store, dir.path()).await.unwrap().is_none());
    }
}
