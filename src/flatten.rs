use crate::content::{escape_literal, fmt_coord, upsert_page_resource};
use crate::error::FormPressError;
use crate::loader::{FieldRecord, LoadedTemplate};
use crate::types::{FieldKind, Rect};
use lopdf::{Object as LoObject, ObjectId as LoObjectId, dictionary};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

const FLAT_FONT_NAME: &str = "FP_Helv";

/// Convert all filled field state into static page content, strip the
/// interactive layer, and serialize. Consumes the template: the document
/// model is terminal once flatten runs.
pub(crate) fn flatten_and_serialize<W: Write>(
    mut template: LoadedTemplate,
    out: &mut W,
) -> Result<(), FormPressError> {
    let mut page_fragments: BTreeMap<usize, String> = BTreeMap::new();
    let mut text_pages: BTreeSet<usize> = BTreeSet::new();

    for field in template.fields() {
        let Some(value) = field_value(&template, field) else {
            continue;
        };
        match (&value, field.kind) {
            (FieldState::Text(text), _) => {
                for widget in &field.widgets {
                    if widget.rect.is_empty() {
                        continue;
                    }
                    page_fragments
                        .entry(widget.page_index)
                        .or_default()
                        .push_str(&text_fragment(widget.rect, text));
                    text_pages.insert(widget.page_index);
                }
            }
            (FieldState::State(state), FieldKind::Checkbox) => {
                for widget in &field.widgets {
                    if widget.rect.is_empty() {
                        continue;
                    }
                    if widget.on_state.as_deref() == Some(state.as_str())
                        || widget.id == field.object_id
                    {
                        page_fragments
                            .entry(widget.page_index)
                            .or_default()
                            .push_str(&cross_fragment(widget.rect));
                    }
                }
            }
            (FieldState::State(state), FieldKind::Radio) => {
                for widget in &field.widgets {
                    if widget.on_state.as_deref() == Some(state.as_str())
                        && !widget.rect.is_empty()
                    {
                        page_fragments
                            .entry(widget.page_index)
                            .or_default()
                            .push_str(&dot_fragment(widget.rect));
                    }
                }
            }
            (FieldState::State(_), _) => {}
        }
    }

    if !text_pages.is_empty() {
        let font_id = template.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        for page_index in &text_pages {
            let page_id = template.pages[*page_index].id;
            upsert_page_resource(&mut template.doc, page_id, "Font", FLAT_FONT_NAME, font_id);
        }
    }

    for (page_index, fragment) in page_fragments {
        let page_id = template.pages[page_index].id;
        template
            .doc
            .add_page_contents(page_id, fragment.into_bytes())
            .map_err(|err| {
                FormPressError::Serialization(format!("content flatten failed: {}", err))
            })?;
    }

    strip_interactive_layer(&mut template);

    let mut doc = template.doc;
    doc.prune_objects();
    doc.renumber_objects();
    doc.compress();
    doc.save_to(out)
        .map_err(|err| FormPressError::Serialization(format!("output write failed: {}", err)))?;
    Ok(())
}

enum FieldState {
    Text(String),
    /// Button appearance state name; "Off" never reaches the caller.
    State(String),
}

fn field_value(template: &LoadedTemplate, field: &FieldRecord) -> Option<FieldState> {
    let dict = template
        .doc
        .get_object(field.object_id)
        .and_then(LoObject::as_dict)
        .ok()?;
    match dict.get(b"V").ok()? {
        LoObject::String(bytes, _) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            if text.is_empty() {
                None
            } else {
                Some(FieldState::Text(text))
            }
        }
        LoObject::Name(name) => {
            let state = String::from_utf8_lossy(name).into_owned();
            if state == "Off" {
                None
            } else {
                Some(FieldState::State(state))
            }
        }
        _ => None,
    }
}

fn text_fragment(rect: Rect, text: &str) -> String {
    let size = (rect.height - 4.0).clamp(6.0, 11.0);
    let x = rect.x + 2.0;
    let baseline = rect.y + (rect.height - size) * 0.5 + 1.0;
    format!(
        "BT /{} {} Tf {} {} Td ({}) Tj ET\n",
        FLAT_FONT_NAME,
        fmt_coord(size),
        fmt_coord(x),
        fmt_coord(baseline),
        escape_literal(text)
    )
}

fn cross_fragment(rect: Rect) -> String {
    let x1 = rect.x + 2.0;
    let y1 = rect.y + 2.0;
    let x2 = rect.x + rect.width - 2.0;
    let y2 = rect.y + rect.height - 2.0;
    format!(
        "q 1.2 w {} {} m {} {} l {} {} m {} {} l S Q\n",
        fmt_coord(x1),
        fmt_coord(y1),
        fmt_coord(x2),
        fmt_coord(y2),
        fmt_coord(x1),
        fmt_coord(y2),
        fmt_coord(x2),
        fmt_coord(y1)
    )
}

fn dot_fragment(rect: Rect) -> String {
    let inset = (rect.width.min(rect.height) * 0.25).max(2.0);
    let x = rect.x + inset;
    let y = rect.y + inset;
    let w = (rect.width - inset * 2.0).max(1.0);
    let h = (rect.height - inset * 2.0).max(1.0);
    format!(
        "q {} {} {} {} re f Q\n",
        fmt_coord(x),
        fmt_coord(y),
        fmt_coord(w),
        fmt_coord(h)
    )
}

/// Drop widget annotations from every page and the AcroForm entry from the
/// catalog; pruning then sweeps the orphaned field objects.
fn strip_interactive_layer(template: &mut LoadedTemplate) {
    let widget_ids: BTreeSet<LoObjectId> = template
        .fields()
        .iter()
        .flat_map(|field| {
            field
                .widgets
                .iter()
                .map(|w| w.id)
                .chain(std::iter::once(field.object_id))
        })
        .collect();

    let page_ids: Vec<LoObjectId> = template.pages.iter().map(|p| p.id).collect();
    for page_id in page_ids {
        let annots = match template.doc.get_object(page_id).and_then(LoObject::as_dict) {
            Ok(dict) => match dict.get(b"Annots") {
                Ok(LoObject::Array(items)) => Some(items.clone()),
                Ok(LoObject::Reference(id)) => template
                    .doc
                    .get_object(*id)
                    .ok()
                    .and_then(|obj| obj.as_array().ok())
                    .cloned(),
                _ => None,
            },
            Err(_) => None,
        };
        let Some(annots) = annots else {
            continue;
        };
        let kept: Vec<LoObject> = annots
            .into_iter()
            .filter(|annot| match annot {
                LoObject::Reference(id) => !widget_ids.contains(id),
                _ => true,
            })
            .collect();
        if let Ok(page_mut) = template
            .doc
            .get_object_mut(page_id)
            .and_then(LoObject::as_dict_mut)
        {
            if kept.is_empty() {
                page_mut.remove(b"Annots");
            } else {
                page_mut.set("Annots", LoObject::Array(kept));
            }
        }
    }

    let root_id = match template.doc.trailer.get(b"Root") {
        Ok(LoObject::Reference(id)) => Some(*id),
        _ => None,
    };
    if let Some(root_id) = root_id {
        if let Ok(catalog) = template
            .doc
            .get_object_mut(root_id)
            .and_then(LoObject::as_dict_mut)
        {
            catalog.remove(b"AcroForm");
        }
    }
}
