use crate::loader::{FieldRecord, LoadedTemplate};
use crate::schema::FieldSpec;
use crate::types::FieldKind;

/// How the caller intends to write a resolved field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStrategy {
    Text,
    Checkbox,
    Radio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compat {
    Exact,
    Coerce,
    No,
}

fn compatibility(kind: FieldKind, strategy: WriteStrategy) -> Compat {
    match strategy {
        WriteStrategy::Text => match kind {
            FieldKind::Text => Compat::Exact,
            // Untyped fields still accept a string assignment; the write is
            // reported as a fallback.
            FieldKind::Unknown => Compat::Coerce,
            _ => Compat::No,
        },
        WriteStrategy::Checkbox => match kind {
            FieldKind::Checkbox => Compat::Exact,
            _ => Compat::No,
        },
        WriteStrategy::Radio => match kind {
            FieldKind::Radio => Compat::Exact,
            _ => Compat::No,
        },
    }
}

/// Ordered candidate names for one semantic key: schema primary, the literal
/// key, its case variants, then schema aliases. Duplicates keep their first
/// position.
pub fn candidate_names(spec: Option<&FieldSpec>, key: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |candidate: String| {
        if !candidate.is_empty() && !out.contains(&candidate) {
            out.push(candidate);
        }
    };
    if let Some(spec) = spec {
        push(spec.primary.to_string());
    }
    push(key.to_string());
    push(capitalize(key));
    push(key.to_uppercase());
    push(key.to_lowercase());
    if let Some(spec) = spec {
        for alias in spec.aliases {
            push((*alias).to_string());
        }
    }
    out
}

fn capitalize(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Deterministic resolution of one semantic key against the field table: the
/// first candidate that exists and is compatible with (or coercible to) the
/// wanted strategy wins. Returns the matched record and whether the match was
/// a coercion. No logging, no side effects.
pub fn resolve_field<'a>(
    template: &'a LoadedTemplate,
    spec: Option<&FieldSpec>,
    key: &str,
    strategy: WriteStrategy,
) -> Option<(&'a FieldRecord, bool)> {
    for candidate in candidate_names(spec, key) {
        let Some(record) = template.field(&candidate) else {
            continue;
        };
        match compatibility(record.kind, strategy) {
            Compat::Exact => return Some((record, false)),
            Compat::Coerce => return Some((record, true)),
            Compat::No => continue,
        }
    }
    None
}

/// Resolution as the rest of the pipeline consumes it: the matched field's
/// name, type tag, page index, and widget rectangle.
pub fn resolve_semantic_key(
    template: &LoadedTemplate,
    spec: Option<&FieldSpec>,
    key: &str,
    strategy: WriteStrategy,
) -> Option<crate::types::ResolvedField> {
    resolve_field(template, spec, key, strategy).map(|(record, _)| record.resolved())
}

/// Resolve a signature slot to an existing field by its canonical aliases.
/// Signature-typed fields match first-class; any other field under a
/// canonical alias name is accepted as placement geometry too, since older
/// template revisions used plain text boxes as signature anchors.
pub fn resolve_signature_anchor<'a>(
    template: &'a LoadedTemplate,
    aliases: &[&str],
) -> Option<&'a FieldRecord> {
    for alias in aliases {
        if let Some(record) = template.field(alias) {
            return Some(record);
        }
    }
    None
}
