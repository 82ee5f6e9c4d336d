use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::types::Rect;

/// Opt-in JSON-line trace of one engine's fills: resolution hits and misses,
/// signature placements, and stage timings. Diagnostic side channel only;
/// resolution behavior never reads it.
#[derive(Clone, Debug)]
pub(crate) struct FillTrace {
    inner: Arc<Mutex<TraceState>>,
}

#[derive(Debug)]
struct TraceState {
    writer: BufWriter<File>,
    counters: HashMap<String, u64>,
}

impl FillTrace {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(TraceState {
                writer: BufWriter::new(file),
                counters: HashMap::new(),
            })),
        })
    }

    pub fn resolve_hit(&self, key: &str, field: &str, coerced: bool) {
        let json = format!(
            "{{\"type\":\"resolve.hit\",\"key\":\"{}\",\"field\":\"{}\",\"coerced\":{}}}",
            json_escape(key),
            json_escape(field),
            coerced
        );
        self.write_line(&json, "resolve.hit");
    }

    pub fn resolve_miss(&self, key: &str) {
        let json = format!(
            "{{\"type\":\"resolve.miss\",\"key\":\"{}\"}}",
            json_escape(key)
        );
        self.write_line(&json, "resolve.miss");
    }

    pub fn signature_drawn(&self, slot: &str, page_index: usize, rect: Rect) {
        let json = format!(
            "{{\"type\":\"signature.drawn\",\"slot\":\"{}\",\"page\":{},\"x\":{:.3},\"y\":{:.3},\"w\":{:.3},\"h\":{:.3}}}",
            json_escape(slot),
            page_index,
            rect.x,
            rect.y,
            rect.width,
            rect.height
        );
        self.write_line(&json, "signature.drawn");
    }

    pub fn signature_failed(&self, slot: &str, reason: &str) {
        let json = format!(
            "{{\"type\":\"signature.failed\",\"slot\":\"{}\",\"reason\":\"{}\"}}",
            json_escape(slot),
            json_escape(reason)
        );
        self.write_line(&json, "signature.failed");
    }

    pub fn span_ms(&self, name: &str, ms: f64) {
        let json = format!(
            "{{\"type\":\"fill.span\",\"name\":\"{}\",\"unit\":\"ms\",\"ms\":{:.3}}}",
            json_escape(name),
            ms
        );
        self.write_line(&json, name);
    }

    fn write_line(&self, json: &str, counter: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let entry = state.counters.entry(counter.to_string()).or_insert(0);
            *entry = entry.saturating_add(1);
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn emit_summary(&self, context: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let mut counters: Vec<(String, u64)> = state.counters.drain().collect();
            counters.sort_by(|a, b| a.0.cmp(&b.0));
            let mut counts = String::from("{");
            for (idx, (key, value)) in counters.iter().enumerate() {
                if idx > 0 {
                    counts.push(',');
                }
                counts.push_str(&format!("\"{}\":{}", json_escape(key), value));
            }
            counts.push('}');
            let json = format!(
                "{{\"type\":\"fill.summary\",\"context\":\"{}\",\"counts\":{}}}",
                json_escape(context),
                counts
            );
            let _ = writeln!(state.writer, "{json}");
            let _ = state.writer.flush();
        }
    }
}

pub(crate) fn json_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}
