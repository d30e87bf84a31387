use anyhow::Result;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters exposed at `/metrics`.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub import_rows: IntCounterVec,
    pub priced_lines: IntCounterVec,
    pub staged_imports: IntCounter,
}

impl Metrics {
    pub fn new(namespace: &str) -> Result<Self> {
        let registry = Registry::new();

        let import_rows = IntCounterVec::new(
            Opts::new("import_rows_total", "Import rows processed at commit").namespace(namespace),
            &["outcome"],
        )?;
        let priced_lines = IntCounterVec::new(
            Opts::new("bom_lines_total", "BOM lines submitted for pricing").namespace(namespace),
            &["outcome"],
        )?;
        let staged_imports = IntCounter::with_opts(
            Opts::new("imports_staged_total", "Import sources staged for review").namespace(namespace),
        )?;

        registry.register(Box::new(import_rows.clone()))?;
        registry.register(Box::new(priced_lines.clone()))?;
        registry.register(Box::new(staged_imports.clone()))?;

        Ok(Self {
            registry,
            import_rows,
            priced_lines,
            staged_imports,
        })
    }

    pub fn record_import_row(&self, committed: bool) {
        let outcome = if committed { "committed" } else { "failed" };
        self.import_rows.with_label_values(&[outcome]).inc();
    }

    pub fn record_priced_line(&self, added: bool) {
        let outcome = if added { "added" } else { "failed" };
        self.priced_lines.with_label_values(&[outcome]).inc();
    }

    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "Failed to encode metrics");
            return "Error encoding metrics".to_string();
        }
        String::from_utf8(buffer).unwrap_or_else(|_| "Error encoding metrics".to_string())
    }
}
