//! Page content and resource plumbing shared by the signature compositor and
//! the flatten stage.

use lopdf::{Dictionary, Document as LoDocument, Object as LoObject, ObjectId as LoObjectId};

fn dict_or_default(doc: &LoDocument, obj: Result<&LoObject, lopdf::Error>) -> Dictionary {
    match obj {
        Ok(LoObject::Dictionary(d)) => d.clone(),
        Ok(LoObject::Reference(id)) => doc
            .get_object(*id)
            .ok()
            .and_then(|o| o.as_dict().ok())
            .cloned()
            .unwrap_or_default(),
        _ => Dictionary::new(),
    }
}

/// Register `target` under `/Resources/<category>/<name>` on a page,
/// inlining an indirect resources dictionary if needed.
pub(crate) fn upsert_page_resource(
    doc: &mut LoDocument,
    page_id: LoObjectId,
    category: &str,
    name: &str,
    target: LoObjectId,
) {
    let page_dict = match doc.get_object(page_id).and_then(LoObject::as_dict) {
        Ok(dict) => dict.clone(),
        Err(_) => return,
    };
    let mut resources = dict_or_default(doc, page_dict.get(b"Resources"));
    let mut group = dict_or_default(doc, resources.get(category.as_bytes()));
    group.set(name.as_bytes().to_vec(), LoObject::Reference(target));
    resources.set(category.as_bytes().to_vec(), LoObject::Dictionary(group));
    if let Ok(page_mut) = doc.get_object_mut(page_id).and_then(LoObject::as_dict_mut) {
        page_mut.set("Resources", LoObject::Dictionary(resources));
    }
}

/// Escape a value for a PDF literal string. Non-ASCII input is replaced;
/// the fields this engine writes (VINs, names, dates, amounts) are ASCII.
pub(crate) fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    for ch in text.chars() {
        match ch {
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\\' => out.push_str("\\\\"),
            '\n' | '\r' | '\t' => out.push(' '),
            c if c.is_ascii_graphic() || c == ' ' => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

/// Fixed two-decimal coordinate formatting keeps content streams byte-stable
/// across runs.
pub(crate) fn fmt_coord(value: f32) -> String {
    format!("{:.2}", value)
}
