use crate::schema::{DocumentSchema, WriteHint};

/// A caller-supplied value for one semantic key.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
    /// Nested map (e.g. referral source leaves). Flattened into dotted
    /// composite keys when the working set is derived.
    Group(Vec<(String, FieldValue)>),
    /// Base64 raster signature payload for the slot named by the key.
    Signature(String),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn signature(payload: impl Into<String>) -> Self {
        FieldValue::Signature(payload.into())
    }
}

/// Structured submission data for one fill. Entries keep caller insertion
/// order; the engine never mutates the record itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionRecord {
    entries: Vec<(String, FieldValue)>,
}

impl SubmissionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value for `key`, keeping the original position
    /// on replace.
    pub fn set(&mut self, key: impl Into<String>, value: FieldValue) {
        let key = key.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A single flattened write the pipeline will attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkValue {
    Text(String),
    Flag(bool),
}

/// Internal derived working copy of a submission: nested groups flattened to
/// dotted composite keys, signature payloads split out per slot, and the fill
/// date injected for date-hinted keys the caller omitted. The caller's record
/// is left untouched.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    pub writes: Vec<(String, WorkValue)>,
    pub signatures: Vec<(String, String)>,
}

impl WorkingSet {
    pub fn derive(record: &SubmissionRecord, schema: &DocumentSchema, fill_date: &str) -> Self {
        let mut set = WorkingSet::default();
        for (key, value) in record.iter() {
            set.absorb(key, value);
        }
        for spec in schema.fields {
            if spec.hint == WriteHint::Date && !set.has_write(spec.key) {
                set.writes
                    .push((spec.key.to_string(), WorkValue::Text(fill_date.to_string())));
            }
        }
        set
    }

    fn absorb(&mut self, key: &str, value: &FieldValue) {
        match value {
            FieldValue::Text(text) => {
                self.writes.push((key.to_string(), WorkValue::Text(text.clone())));
            }
            FieldValue::Flag(flag) => {
                self.writes.push((key.to_string(), WorkValue::Flag(*flag)));
            }
            FieldValue::Group(leaves) => {
                for (leaf, leaf_value) in leaves {
                    let composite = format!("{}.{}", key, leaf);
                    self.absorb(&composite, leaf_value);
                }
            }
            FieldValue::Signature(payload) => {
                self.signatures.push((key.to_string(), payload.clone()));
            }
        }
    }

    fn has_write(&self, key: &str) -> bool {
        self.writes.iter().any(|(k, _)| k == key)
    }

    pub fn write_value(&self, key: &str) -> Option<&WorkValue> {
        self.writes.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}
