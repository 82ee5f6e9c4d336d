use crate::loader::{FieldRecord, LoadedTemplate};
use crate::resolve::{WriteStrategy, resolve_field};
use crate::schema::{DocumentSchema, WriteHint};
use crate::submission::{WorkValue, WorkingSet};
use crate::trace::FillTrace;
use crate::types::{FieldKind, FillWarning};
use lopdf::{Document as LoDocument, Object as LoObject, StringFormat};

const FLAG_SET_SENTINEL: &str = "Yes";
const FLAG_CLEAR_SENTINEL: &str = "No";

/// Apply every working-set write in iteration order. Later writes to the same
/// field win because value state lives in the field dictionary. Returns the
/// number of fields written.
pub(crate) fn apply_writes(
    template: &mut LoadedTemplate,
    schema: &DocumentSchema,
    working: &WorkingSet,
    warnings: &mut Vec<FillWarning>,
    trace: Option<&FillTrace>,
) -> usize {
    let mut written = 0usize;

    for (key, value) in &working.writes {
        let spec = schema.field(key);
        match value {
            WorkValue::Text(text) => {
                let wants_radio = spec.map(|s| s.hint == WriteHint::Radio).unwrap_or(false);
                if wants_radio {
                    if let Some((record, _)) =
                        resolve_field(template, spec, key, WriteStrategy::Radio)
                    {
                        let record = record.clone();
                        if select_radio_option(&mut template.doc, &record, text) {
                            note_hit(trace, key, &record.name, false);
                        } else {
                            // No export value matched; the raw string still
                            // lands on the field under the text strategy.
                            set_field_text(&mut template.doc, &record, text);
                            warnings.push(FillWarning::TypeMismatchFallback {
                                key: key.clone(),
                                field: record.name.clone(),
                            });
                            note_hit(trace, key, &record.name, true);
                        }
                        written += 1;
                        continue;
                    }
                }
                match resolve_field(template, spec, key, WriteStrategy::Text) {
                    Some((record, coerced)) => {
                        let record = record.clone();
                        set_field_text(&mut template.doc, &record, text);
                        if coerced {
                            warnings.push(FillWarning::TypeMismatchFallback {
                                key: key.clone(),
                                field: record.name.clone(),
                            });
                        }
                        note_hit(trace, key, &record.name, coerced);
                        written += 1;
                    }
                    None => {
                        warnings.push(FillWarning::FieldResolutionMiss { key: key.clone() });
                        note_miss(trace, key);
                    }
                }
            }
            WorkValue::Flag(flag) => {
                if let Some((record, _)) =
                    resolve_field(template, spec, key, WriteStrategy::Checkbox)
                {
                    let record = record.clone();
                    set_checkbox(&mut template.doc, &record, *flag);
                    note_hit(trace, key, &record.name, false);
                    written += 1;
                } else if let Some((record, _)) =
                    resolve_field(template, spec, key, WriteStrategy::Text)
                {
                    // Acknowledgement-style keys retry as text with a
                    // sentinel when the template has no checkbox for them.
                    let record = record.clone();
                    let sentinel = if *flag {
                        FLAG_SET_SENTINEL
                    } else {
                        FLAG_CLEAR_SENTINEL
                    };
                    set_field_text(&mut template.doc, &record, sentinel);
                    warnings.push(FillWarning::TypeMismatchFallback {
                        key: key.clone(),
                        field: record.name.clone(),
                    });
                    note_hit(trace, key, &record.name, true);
                    written += 1;
                } else {
                    warnings.push(FillWarning::FieldResolutionMiss { key: key.clone() });
                    note_miss(trace, key);
                }
            }
        }
    }

    written + apply_mirrors(template, schema, working, warnings, trace)
}

/// Schema-declared duplication: copy each mirrored source value onto its
/// declared target field, resolved by literal name after the normal pass.
fn apply_mirrors(
    template: &mut LoadedTemplate,
    schema: &DocumentSchema,
    working: &WorkingSet,
    warnings: &mut Vec<FillWarning>,
    trace: Option<&FillTrace>,
) -> usize {
    let mut written = 0usize;
    for spec in schema.fields {
        let Some(target) = spec.mirror else {
            continue;
        };
        let Some(value) = working.write_value(spec.key) else {
            continue;
        };
        let Some(record) = template.field(target).cloned() else {
            warnings.push(FillWarning::FieldResolutionMiss {
                key: target.to_string(),
            });
            note_miss(trace, target);
            continue;
        };
        match (value, record.kind) {
            (WorkValue::Flag(flag), FieldKind::Checkbox) => {
                set_checkbox(&mut template.doc, &record, *flag);
            }
            (WorkValue::Flag(flag), _) => {
                let sentinel = if *flag {
                    FLAG_SET_SENTINEL
                } else {
                    FLAG_CLEAR_SENTINEL
                };
                set_field_text(&mut template.doc, &record, sentinel);
            }
            (WorkValue::Text(text), _) => {
                set_field_text(&mut template.doc, &record, text);
            }
        }
        note_hit(trace, spec.key, &record.name, false);
        written += 1;
    }
    written
}

fn note_hit(trace: Option<&FillTrace>, key: &str, field: &str, coerced: bool) {
    if let Some(trace) = trace {
        trace.resolve_hit(key, field, coerced);
    }
}

fn note_miss(trace: Option<&FillTrace>, key: &str) {
    if let Some(trace) = trace {
        trace.resolve_miss(key);
    }
}

fn set_field_text(doc: &mut LoDocument, field: &FieldRecord, value: &str) {
    if let Ok(dict) = doc
        .get_object_mut(field.object_id)
        .and_then(LoObject::as_dict_mut)
    {
        dict.set(
            "V",
            LoObject::String(value.as_bytes().to_vec(), StringFormat::Literal),
        );
    }
}

fn set_checkbox(doc: &mut LoDocument, field: &FieldRecord, checked: bool) {
    let state = if checked {
        field.on_state().unwrap_or(FLAG_SET_SENTINEL).to_string()
    } else {
        "Off".to_string()
    };
    set_button_state(doc, field, &state);
}

/// Select the radio option whose export value matches. Returns false when no
/// option matches, leaving the group untouched.
fn select_radio_option(doc: &mut LoDocument, field: &FieldRecord, export: &str) -> bool {
    let matches = field
        .widgets
        .iter()
        .any(|w| w.on_state.as_deref() == Some(export));
    if !matches {
        return false;
    }
    set_button_state(doc, field, export);
    true
}

fn set_button_state(doc: &mut LoDocument, field: &FieldRecord, state: &str) {
    if let Ok(dict) = doc
        .get_object_mut(field.object_id)
        .and_then(LoObject::as_dict_mut)
    {
        dict.set("V", LoObject::Name(state.as_bytes().to_vec()));
    }
    for widget in &field.widgets {
        let widget_state = if widget.on_state.as_deref() == Some(state) || widget.id == field.object_id
        {
            state
        } else {
            "Off"
        };
        if let Ok(dict) = doc
            .get_object_mut(widget.id)
            .and_then(LoObject::as_dict_mut)
        {
            dict.set("AS", LoObject::Name(widget_state.as_bytes().to_vec()));
        }
    }
}
