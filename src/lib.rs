mod content;
mod error;
mod flatten;
mod loader;
mod resolve;
mod schema;
mod signature;
mod submission;
#[cfg(test)]
mod testutil;
mod trace;
mod types;
mod writer;

pub use error::FormPressError;
pub use loader::{FieldRecord, LoadedTemplate, PageInfo, WidgetRef, open_template};
pub use resolve::{
    WriteStrategy, candidate_names, resolve_field, resolve_semantic_key, resolve_signature_anchor,
};
pub use schema::{
    DocumentKind, DocumentSchema, FallbackRect, FieldSpec, SignatureSlotSpec, TemplateAsset,
    TemplateSource, TemplateStore, WriteHint, schema_for,
};
pub use submission::{FieldValue, SubmissionRecord};
pub use types::{
    FieldKind, FillOutcome, FillResult, FillWarning, PlacementSource, Rect, ResolvedField,
    SignaturePlacement,
};

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use trace::FillTrace;

/// The fill engine: immutable after `build()`, one sequential pipeline per
/// fill, no state shared between fills.
#[derive(Debug)]
pub struct FormPress {
    store: TemplateStore,
    trace: Option<Arc<FillTrace>>,
    fill_date: Option<String>,
}

#[derive(Default)]
pub struct FormPressBuilder {
    assets: Vec<TemplateAsset>,
    trace_path: Option<std::path::PathBuf>,
    fill_date: Option<String>,
}

impl FormPress {
    pub fn builder() -> FormPressBuilder {
        FormPressBuilder::default()
    }

    pub fn fill_to_buffer(
        &self,
        kind: DocumentKind,
        record: &SubmissionRecord,
    ) -> Result<FillResult, FormPressError> {
        let mut bytes = Vec::new();
        let outcome = self.fill_to_writer(kind, record, &mut bytes)?;
        Ok(FillResult { bytes, outcome })
    }

    /// Run one fill: load a fresh template, resolve and write field values,
    /// composite signatures, then flatten and serialize into `out`. Per-field
    /// and per-slot failures accumulate in the outcome; only load and
    /// serialization failures abort.
    pub fn fill_to_writer<W: Write>(
        &self,
        kind: DocumentKind,
        record: &SubmissionRecord,
        out: &mut W,
    ) -> Result<FillOutcome, FormPressError> {
        let start = Instant::now();
        let asset = self
            .store
            .get(kind)
            .ok_or(FormPressError::UnknownTemplate(kind))?;
        let mut template = loader::open_template(asset)?;
        let schema = schema_for(kind);
        let fill_date = self
            .fill_date
            .clone()
            .unwrap_or_else(current_date_string);
        let working = submission::WorkingSet::derive(record, schema, &fill_date);

        let trace = self.trace.as_deref();
        let mut warnings = Vec::new();
        let fields_written =
            writer::apply_writes(&mut template, schema, &working, &mut warnings, trace);
        let signatures_drawn = signature::composite_signatures(
            &mut template,
            schema,
            &working.signatures,
            &mut warnings,
            trace,
        );
        let page_count = template.page_count();

        flatten::flatten_and_serialize(template, out)?;

        if let Some(trace) = trace {
            trace.span_ms("fill.total", start.elapsed().as_secs_f64() * 1000.0);
            trace.emit_summary(kind.as_str());
        }

        Ok(FillOutcome {
            fields_written,
            signatures_drawn,
            page_count,
            warnings,
        })
    }

    pub fn fill_to_file(
        &self,
        kind: DocumentKind,
        record: &SubmissionRecord,
        path: impl AsRef<std::path::Path>,
    ) -> Result<FillOutcome, FormPressError> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        let outcome = self.fill_to_writer(kind, record, &mut writer)?;
        writer.flush().map_err(|err| {
            FormPressError::Serialization(format!("output write failed: {}", err))
        })?;
        Ok(outcome)
    }
}

impl FormPressBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_template(mut self, asset: TemplateAsset) -> Self {
        self.assets.push(asset);
        self
    }

    pub fn register_template_file(
        self,
        kind: DocumentKind,
        path: impl Into<std::path::PathBuf>,
    ) -> Self {
        self.register_template(TemplateAsset::from_file(kind, path))
    }

    pub fn register_template_bytes(self, kind: DocumentKind, bytes: Vec<u8>) -> Self {
        self.register_template(TemplateAsset::from_bytes(kind, bytes))
    }

    /// Pin the derived fill date (`MM/DD/YYYY`) instead of reading the clock;
    /// pinned dates make output byte-reproducible.
    pub fn fill_date(mut self, date: impl Into<String>) -> Self {
        self.fill_date = Some(date.into());
        self
    }

    pub fn trace_log(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.trace_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<FormPress, FormPressError> {
        let mut store = TemplateStore::default();
        for asset in self.assets {
            store.insert(asset)?;
        }
        if store.is_empty() {
            return Err(FormPressError::InvalidConfiguration(
                "at least one template must be registered".to_string(),
            ));
        }
        let trace = match self.trace_path {
            Some(path) => Some(Arc::new(FillTrace::new(&path)?)),
            None => None,
        };
        Ok(FormPress {
            store,
            trace,
            fill_date: self.fill_date,
        })
    }
}

fn current_date_string() -> String {
    chrono::Local::now().format("%m/%d/%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Document as LoDocument, Object as LoObject};

    fn engine_with(kind: DocumentKind, bytes: Vec<u8>) -> FormPress {
        FormPress::builder()
            .register_template_bytes(kind, bytes)
            .fill_date("01/15/2026")
            .build()
            .expect("build engine")
    }

    fn page_contents(bytes: &[u8]) -> Vec<String> {
        let doc = LoDocument::load_mem(bytes).expect("load output");
        doc.get_pages()
            .into_iter()
            .map(|(_, page_id)| {
                String::from_utf8_lossy(&doc.get_page_content(page_id).expect("content"))
                    .into_owned()
            })
            .collect()
    }

    fn dropoff_record() -> SubmissionRecord {
        let mut record = SubmissionRecord::new();
        record.set("vin", FieldValue::text("1HGCM82633A123456"));
        record.set("customer_name", FieldValue::text("Dana Whitfield"));
        record.set(
            "referral_source",
            FieldValue::Group(vec![("web".to_string(), FieldValue::Flag(true))]),
        );
        record.set("damage_ack", FieldValue::Flag(true));
        record.set(
            "signature",
            FieldValue::signature(crate::testutil::signature_png_data_uri()),
        );
        record
    }

    #[test]
    fn end_to_end_dropoff_mirrors_vin_and_draws_signature() {
        let engine = engine_with(DocumentKind::DropOff, crate::testutil::dropoff_template());
        let result = engine
            .fill_to_buffer(DocumentKind::DropOff, &dropoff_record())
            .expect("fill");

        assert!(result.outcome.warnings.is_empty());
        // vin + name + referral web + damage ack + injected date + vin mirror
        assert_eq!(result.outcome.fields_written, 6);
        assert_eq!(result.outcome.signatures_drawn, 1);
        assert_eq!(result.outcome.page_count, 2);

        let pages = page_contents(&result.bytes);
        assert!(pages[0].contains("(1HGCM82633A123456) Tj"));
        assert!(pages[1].contains("(1HGCM82633A123456) Tj"));
        assert!(pages[0].contains("/FP_Sig1 Do"));
    }

    #[test]
    fn every_kind_fills_to_parseable_output() {
        let fixtures = [
            (DocumentKind::DropOff, crate::testutil::dropoff_template(), 2),
            (DocumentKind::PickUp, crate::testutil::pickup_template(), 1),
            (DocumentKind::Estimate, crate::testutil::estimate_template(), 1),
        ];
        for (kind, bytes, expected_pages) in fixtures {
            let engine = engine_with(kind, bytes);
            let mut record = SubmissionRecord::new();
            record.set("customer_name", FieldValue::text("Dana Whitfield"));
            let result = engine.fill_to_buffer(kind, &record).expect("fill");
            assert!(!result.bytes.is_empty());
            let doc = LoDocument::load_mem(&result.bytes).expect("output parses");
            assert_eq!(doc.get_pages().len(), expected_pages);
        }
    }

    #[test]
    fn value_lands_on_alias_when_primary_is_missing() {
        let engine = engine_with(DocumentKind::PickUp, crate::testutil::pickup_template());
        let mut record = SubmissionRecord::new();
        record.set("customer_name", FieldValue::text("Marcus Oyelaran"));
        let result = engine.fill_to_buffer(DocumentKind::PickUp, &record).expect("fill");
        assert!(result.outcome.warnings.is_empty());
        let pages = page_contents(&result.bytes);
        assert!(pages[0].contains("(Marcus Oyelaran) Tj"));
    }

    #[test]
    fn invalid_slot_warns_while_valid_slot_still_draws() {
        let engine = engine_with(DocumentKind::PickUp, crate::testutil::pickup_template());
        let mut record = SubmissionRecord::new();
        record.set("signature", FieldValue::signature(""));
        record.set(
            "advisor_signature",
            FieldValue::signature(crate::testutil::signature_png_data_uri()),
        );
        let result = engine.fill_to_buffer(DocumentKind::PickUp, &record).expect("fill");

        assert_eq!(result.outcome.signatures_drawn, 1);
        assert!(result.outcome.warnings.iter().any(|w| matches!(
            w,
            FillWarning::InvalidSignatureData { slot, .. } if slot == "signature"
        )));
        let pages = page_contents(&result.bytes);
        assert!(pages[0].contains("/FP_Sig2 Do"));
        assert!(!pages[0].contains("/FP_Sig1 Do"));
    }

    #[test]
    fn identical_fills_are_byte_identical() {
        let engine = engine_with(DocumentKind::DropOff, crate::testutil::dropoff_template());
        let record = dropoff_record();
        let first = engine
            .fill_to_buffer(DocumentKind::DropOff, &record)
            .expect("first fill");
        let second = engine
            .fill_to_buffer(DocumentKind::DropOff, &record)
            .expect("second fill");
        assert_eq!(first.bytes, second.bytes);
    }

    #[test]
    fn flattened_output_has_no_interactive_fields_left() {
        let engine = engine_with(DocumentKind::DropOff, crate::testutil::dropoff_template());
        let result = engine
            .fill_to_buffer(DocumentKind::DropOff, &dropoff_record())
            .expect("fill");
        let doc = LoDocument::load_mem(&result.bytes).expect("load output");
        let root = match doc.trailer.get(b"Root").expect("root") {
            LoObject::Reference(id) => *id,
            _ => panic!("root must be a reference"),
        };
        let catalog = doc
            .get_object(root)
            .and_then(LoObject::as_dict)
            .expect("catalog");
        assert!(catalog.get(b"AcroForm").is_err());
    }

    #[test]
    fn unregistered_kind_is_a_hard_failure() {
        let engine = engine_with(DocumentKind::DropOff, crate::testutil::dropoff_template());
        let err = engine
            .fill_to_buffer(DocumentKind::PickUp, &SubmissionRecord::new())
            .expect_err("unknown template");
        assert!(matches!(err, FormPressError::UnknownTemplate(DocumentKind::PickUp)));
    }

    #[test]
    fn builder_requires_at_least_one_template() {
        let err = FormPress::builder().build().expect_err("empty builder");
        assert!(err.to_string().contains("at least one template"));
    }

    #[test]
    fn fill_to_file_persists_output_and_trace_records_events() {
        let temp_dir = std::env::temp_dir().join(format!(
            "formpress_fill_file_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&temp_dir).expect("mkdir");
        let out_path = temp_dir.join("dropoff.pdf");
        let trace_path = temp_dir.join("fill_trace.log");

        let engine = FormPress::builder()
            .register_template_bytes(DocumentKind::DropOff, crate::testutil::dropoff_template())
            .fill_date("01/15/2026")
            .trace_log(&trace_path)
            .build()
            .expect("build engine");
        let outcome = engine
            .fill_to_file(DocumentKind::DropOff, &dropoff_record(), &out_path)
            .expect("fill to file");
        assert_eq!(outcome.signatures_drawn, 1);

        let bytes = std::fs::read(&out_path).expect("read output");
        assert!(LoDocument::load_mem(&bytes).is_ok());

        let trace = std::fs::read_to_string(&trace_path).expect("read trace");
        assert!(trace.contains("\"type\":\"resolve.hit\""));
        assert!(trace.contains("\"type\":\"signature.drawn\""));
        assert!(trace.contains("\"type\":\"fill.summary\""));
    }
}
