use crate::error::FormPressError;
use crate::schema::{TemplateAsset, TemplateSource};
use crate::types::{FieldKind, Rect, ResolvedField};
use lopdf::{Document as LoDocument, Object as LoObject, ObjectId as LoObjectId};
use std::collections::BTreeMap;

// Button field flag bits, per the PDF spec.
const FF_RADIO: i64 = 1 << 15;
const FF_PUSHBUTTON: i64 = 1 << 16;

/// One widget annotation belonging to a terminal field.
#[derive(Debug, Clone)]
pub struct WidgetRef {
    pub id: LoObjectId,
    pub page_index: usize,
    pub rect: Rect,
    /// For button widgets: the non-Off appearance state name (checkbox
    /// on-state or radio export value).
    pub on_state: Option<String>,
}

/// A terminal field from the template's field table.
#[derive(Debug, Clone)]
pub struct FieldRecord {
    pub name: String,
    pub kind: FieldKind,
    pub object_id: LoObjectId,
    pub widgets: Vec<WidgetRef>,
}

impl FieldRecord {
    pub fn primary_widget(&self) -> Option<&WidgetRef> {
        self.widgets.first()
    }

    pub fn page_index(&self) -> usize {
        self.primary_widget().map(|w| w.page_index).unwrap_or(0)
    }

    pub fn rect(&self) -> Rect {
        self.primary_widget().map(|w| w.rect).unwrap_or(Rect::ZERO)
    }

    pub fn on_state(&self) -> Option<&str> {
        self.widgets.iter().find_map(|w| w.on_state.as_deref())
    }

    pub fn resolved(&self) -> ResolvedField {
        ResolvedField {
            name: self.name.clone(),
            kind: self.kind,
            page_index: self.page_index(),
            rect: self.rect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageInfo {
    pub id: LoObjectId,
    pub width: f32,
    pub height: f32,
}

/// A freshly parsed template: live document plus the field table and page
/// geometry. Owned exclusively by one fill operation.
#[derive(Debug)]
pub struct LoadedTemplate {
    pub doc: LoDocument,
    pub pages: Vec<PageInfo>,
    fields: Vec<FieldRecord>,
    by_name: BTreeMap<String, usize>,
}

impl LoadedTemplate {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn fields(&self) -> &[FieldRecord] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldRecord> {
        self.by_name.get(name).map(|idx| &self.fields[*idx])
    }
}

/// Read, verify, and parse the template for one fill. Any failure here aborts
/// the whole operation.
pub fn open_template(asset: &TemplateAsset) -> Result<LoadedTemplate, FormPressError> {
    let bytes = match &asset.source {
        TemplateSource::File(path) => std::fs::read(path).map_err(|err| {
            FormPressError::Load(format!(
                "cannot read template {}: {}",
                path.display(),
                err
            ))
        })?,
        TemplateSource::Bytes(bytes) => bytes.clone(),
    };
    if bytes.is_empty() {
        return Err(FormPressError::Load(format!(
            "template bytes are empty for document kind: {}",
            asset.kind.as_str()
        )));
    }
    if let Some(expected) = asset.sha256.as_deref() {
        let actual = sha256_hex(&bytes);
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(FormPressError::Load(format!(
                "template digest mismatch: expected {} found {}",
                expected, actual
            )));
        }
    }

    let doc = LoDocument::load_mem(&bytes)
        .map_err(|err| FormPressError::Load(format!("template parse failed: {}", err)))?;
    if doc.is_encrypted() {
        return Err(FormPressError::Load(
            "encrypted templates are not supported".to_string(),
        ));
    }

    let pages = collect_pages(&doc);
    if pages.is_empty() {
        return Err(FormPressError::Load("template has no pages".to_string()));
    }
    if let Some(expected) = asset.page_count {
        if expected != pages.len() {
            return Err(FormPressError::InvalidConfiguration(format!(
                "template page count mismatch for {}: expected {} found {}",
                asset.kind.as_str(),
                expected,
                pages.len()
            )));
        }
    }

    let annot_pages = collect_annotation_pages(&doc, &pages);
    let fields = collect_fields(&doc, &annot_pages);
    let mut by_name = BTreeMap::new();
    for (idx, field) in fields.iter().enumerate() {
        // First declaration wins when a template carries duplicate names.
        by_name.entry(field.name.clone()).or_insert(idx);
    }

    Ok(LoadedTemplate {
        doc,
        pages,
        fields,
        by_name,
    })
}

fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

fn resolve<'a>(doc: &'a LoDocument, obj: &'a LoObject) -> &'a LoObject {
    match obj {
        LoObject::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn object_to_f32(obj: &LoObject) -> Option<f32> {
    match obj {
        LoObject::Integer(value) => Some(*value as f32),
        LoObject::Real(value) => Some(*value),
        _ => None,
    }
}

fn name_to_string(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn dict_rect(doc: &LoDocument, dict: &lopdf::Dictionary) -> Option<Rect> {
    let arr = match dict.get(b"Rect") {
        Ok(obj) => resolve(doc, obj).as_array().ok()?.clone(),
        Err(_) => return None,
    };
    if arr.len() != 4 {
        return None;
    }
    let x1 = object_to_f32(resolve(doc, &arr[0]))?;
    let y1 = object_to_f32(resolve(doc, &arr[1]))?;
    let x2 = object_to_f32(resolve(doc, &arr[2]))?;
    let y2 = object_to_f32(resolve(doc, &arr[3]))?;
    Some(Rect::from_corners(x1, y1, x2, y2))
}

fn collect_pages(doc: &LoDocument) -> Vec<PageInfo> {
    let mut pages = Vec::new();
    for (_, page_id) in doc.get_pages() {
        let (width, height) = page_media_size(doc, page_id);
        pages.push(PageInfo {
            id: page_id,
            width,
            height,
        });
    }
    pages
}

fn page_media_size(doc: &LoDocument, page_id: LoObjectId) -> (f32, f32) {
    let Ok(page) = doc.get_object(page_id).and_then(LoObject::as_dict) else {
        return (612.0, 792.0);
    };
    let arr = match page.get(b"MediaBox") {
        Ok(obj) => resolve(doc, obj).as_array().ok().cloned(),
        Err(_) => None,
    };
    let Some(arr) = arr else {
        // US Letter default when the box is inherited or missing.
        return (612.0, 792.0);
    };
    if arr.len() != 4 {
        return (612.0, 792.0);
    }
    let coords: Vec<f32> = arr
        .iter()
        .map(|obj| object_to_f32(resolve(doc, obj)).unwrap_or(0.0))
        .collect();
    ((coords[2] - coords[0]).abs(), (coords[3] - coords[1]).abs())
}

/// Map each widget annotation's object id to the page it sits on.
fn collect_annotation_pages(
    doc: &LoDocument,
    pages: &[PageInfo],
) -> BTreeMap<LoObjectId, usize> {
    let mut out = BTreeMap::new();
    for (idx, page) in pages.iter().enumerate() {
        let Ok(page_dict) = doc.get_object(page.id).and_then(LoObject::as_dict) else {
            continue;
        };
        let Ok(annots_obj) = page_dict.get(b"Annots") else {
            continue;
        };
        let Ok(annots) = resolve(doc, annots_obj).as_array() else {
            continue;
        };
        for annot in annots {
            if let LoObject::Reference(id) = annot {
                out.insert(*id, idx);
            }
        }
    }
    out
}

fn collect_fields(
    doc: &LoDocument,
    annot_pages: &BTreeMap<LoObjectId, usize>,
) -> Vec<FieldRecord> {
    let mut out = Vec::new();
    let Some(root_fields) = acroform_fields(doc) else {
        return out;
    };
    for field in root_fields {
        if let LoObject::Reference(id) = field {
            walk_field(doc, id, None, None, 0, annot_pages, &mut out);
        }
    }
    out
}

fn acroform_fields(doc: &LoDocument) -> Option<Vec<LoObject>> {
    let root = doc.trailer.get(b"Root").ok()?;
    let catalog = resolve(doc, root).as_dict().ok()?;
    let acroform = resolve(doc, catalog.get(b"AcroForm").ok()?).as_dict().ok()?;
    let fields = resolve(doc, acroform.get(b"Fields").ok()?).as_array().ok()?;
    Some(fields.clone())
}

fn walk_field(
    doc: &LoDocument,
    id: LoObjectId,
    parent_name: Option<&str>,
    inherited_ft: Option<&str>,
    inherited_ff: i64,
    annot_pages: &BTreeMap<LoObjectId, usize>,
    out: &mut Vec<FieldRecord>,
) {
    let Ok(dict) = doc.get_object(id).and_then(LoObject::as_dict) else {
        return;
    };

    let own_name = match dict.get(b"T") {
        Ok(LoObject::String(bytes, _)) => Some(name_to_string(bytes)),
        _ => None,
    };
    let full_name = match (parent_name, own_name.as_deref()) {
        (Some(parent), Some(own)) => format!("{}.{}", parent, own),
        (Some(parent), None) => parent.to_string(),
        (None, Some(own)) => own.to_string(),
        (None, None) => return,
    };

    let ft = match dict.get(b"FT") {
        Ok(LoObject::Name(name)) => Some(name_to_string(name)),
        _ => inherited_ft.map(|v| v.to_string()),
    };
    let ff = match dict.get(b"Ff") {
        Ok(LoObject::Integer(value)) => *value,
        _ => inherited_ff,
    };

    let kid_ids: Vec<LoObjectId> = match dict.get(b"Kids") {
        Ok(obj) => resolve(doc, obj)
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|kid| match kid {
                        LoObject::Reference(kid_id) => Some(*kid_id),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default(),
        Err(_) => Vec::new(),
    };

    // Kids that carry their own partial name are child fields; kids without
    // one are widget annotations of this terminal field.
    let has_child_fields = kid_ids.iter().any(|kid_id| {
        doc.get_object(*kid_id)
            .and_then(LoObject::as_dict)
            .map(|kid| matches!(kid.get(b"T"), Ok(LoObject::String(_, _))))
            .unwrap_or(false)
    });
    if has_child_fields {
        for kid_id in kid_ids {
            walk_field(
                doc,
                kid_id,
                Some(&full_name),
                ft.as_deref(),
                ff,
                annot_pages,
                out,
            );
        }
        return;
    }

    let kind = classify_field(ft.as_deref(), ff);
    let widgets = if kid_ids.is_empty() {
        // Merged field: the field dictionary doubles as its widget.
        vec![widget_ref(doc, id, dict, annot_pages)]
    } else {
        kid_ids
            .iter()
            .filter_map(|kid_id| {
                doc.get_object(*kid_id)
                    .and_then(LoObject::as_dict)
                    .ok()
                    .map(|kid| widget_ref(doc, *kid_id, kid, annot_pages))
            })
            .collect()
    };

    out.push(FieldRecord {
        name: full_name,
        kind,
        object_id: id,
        widgets,
    });
}

fn classify_field(ft: Option<&str>, ff: i64) -> FieldKind {
    match ft {
        Some("Tx") => FieldKind::Text,
        Some("Sig") => FieldKind::Signature,
        Some("Btn") => {
            if ff & FF_PUSHBUTTON != 0 {
                FieldKind::Unknown
            } else if ff & FF_RADIO != 0 {
                FieldKind::Radio
            } else {
                FieldKind::Checkbox
            }
        }
        _ => FieldKind::Unknown,
    }
}

fn widget_ref(
    doc: &LoDocument,
    id: LoObjectId,
    dict: &lopdf::Dictionary,
    annot_pages: &BTreeMap<LoObjectId, usize>,
) -> WidgetRef {
    WidgetRef {
        id,
        page_index: annot_pages.get(&id).copied().unwrap_or(0),
        rect: dict_rect(doc, dict).unwrap_or(Rect::ZERO),
        on_state: widget_on_state(doc, dict),
    }
}

/// The non-Off key of the widget's normal appearance dictionary.
fn widget_on_state(doc: &LoDocument, dict: &lopdf::Dictionary) -> Option<String> {
    let ap = resolve(doc, dict.get(b"AP").ok()?).as_dict().ok()?;
    let normal = resolve(doc, ap.get(b"N").ok()?).as_dict().ok()?;
    for (key, _) in normal.iter() {
        if key.as_slice() != b"Off" {
            return Some(name_to_string(key));
        }
    }
    None
}
