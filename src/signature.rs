use crate::content::{fmt_coord, upsert_page_resource};
use crate::loader::LoadedTemplate;
use crate::resolve::resolve_signature_anchor;
use crate::schema::{DocumentSchema, SignatureSlotSpec};
use crate::trace::FillTrace;
use crate::types::{FillWarning, PlacementSource, Rect, SignaturePlacement};
use base64::Engine;
use image::GenericImageView;
use lopdf::{Object as LoObject, Stream as LoStream, dictionary};

/// Decoded signature raster, split the way the page image dictionary wants
/// it: packed RGB plus an optional 8-bit alpha channel.
#[derive(Debug)]
struct SignatureImage {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

/// Composite every submitted signature slot. Slots fail independently; a
/// failed slot records its warning and the remaining slots still draw.
pub(crate) fn composite_signatures(
    template: &mut LoadedTemplate,
    schema: &DocumentSchema,
    signatures: &[(String, String)],
    warnings: &mut Vec<FillWarning>,
    trace: Option<&FillTrace>,
) -> usize {
    let mut drawn = 0usize;
    for (seq, (slot, payload)) in signatures.iter().enumerate() {
        let Some(slot_spec) = schema.signature_slot(slot) else {
            warnings.push(FillWarning::FieldResolutionMiss { key: slot.clone() });
            if let Some(trace) = trace {
                trace.signature_failed(slot, "no slot configured");
            }
            continue;
        };
        match composite_slot(template, slot_spec, slot, payload, seq) {
            Ok(placement) => {
                if let Some(trace) = trace {
                    trace.signature_drawn(slot, placement.page_index, placement.rect);
                }
                drawn += 1;
            }
            Err(warning) => {
                if let Some(trace) = trace {
                    let reason = match &warning {
                        FillWarning::InvalidSignatureData { reason, .. } => reason.clone(),
                        FillWarning::PageIndexOutOfRange { page_index, .. } => {
                            format!("page index out of range: {}", page_index)
                        }
                        _ => "unknown".to_string(),
                    };
                    trace.signature_failed(slot, &reason);
                }
                warnings.push(warning);
            }
        }
    }
    drawn
}

/// Decode, place, embed, and draw one signature slot.
pub(crate) fn composite_slot(
    template: &mut LoadedTemplate,
    slot_spec: &SignatureSlotSpec,
    slot: &str,
    payload: &str,
    seq: usize,
) -> Result<SignaturePlacement, FillWarning> {
    let image = decode_signature_payload(payload).map_err(|reason| {
        FillWarning::InvalidSignatureData {
            slot: slot.to_string(),
            reason,
        }
    })?;

    let placement = resolve_placement(template, slot_spec)?;
    if placement.page_index >= template.page_count() {
        return Err(FillWarning::PageIndexOutOfRange {
            slot: slot.to_string(),
            page_index: placement.page_index,
            page_count: template.page_count(),
        });
    }

    let page_id = template.pages[placement.page_index].id;
    let image_id = embed_image(template, image);
    let name = format!("FP_Sig{}", seq + 1);
    upsert_page_resource(&mut template.doc, page_id, "XObject", &name, image_id);

    let rect = placement.rect;
    let draw = format!(
        "q {} 0 0 {} {} {} cm /{} Do Q\n",
        fmt_coord(rect.width),
        fmt_coord(rect.height),
        fmt_coord(rect.x),
        fmt_coord(rect.y),
        name
    )
    .into_bytes();
    template
        .doc
        .add_page_contents(page_id, draw)
        .map_err(|err| FillWarning::InvalidSignatureData {
            slot: slot.to_string(),
            reason: format!("draw failed: {}", err),
        })?;

    Ok(placement)
}

/// Placement precedence: an existing field matched by the slot's canonical
/// aliases wins outright, rect and page exactly as stored. The configured
/// fallback rectangle applies only when no aliased field exists; its x is
/// normalized against the page width.
fn resolve_placement(
    template: &LoadedTemplate,
    slot_spec: &SignatureSlotSpec,
) -> Result<SignaturePlacement, FillWarning> {
    if let Some(record) = resolve_signature_anchor(template, slot_spec.aliases) {
        return Ok(SignaturePlacement {
            page_index: record.page_index(),
            rect: record.rect(),
            source: PlacementSource::FieldWidget,
            field_name: Some(record.name.clone()),
        });
    }

    let fb = slot_spec.fallback;
    if fb.page_index >= template.page_count() {
        return Err(FillWarning::PageIndexOutOfRange {
            slot: slot_spec.slot.to_string(),
            page_index: fb.page_index,
            page_count: template.page_count(),
        });
    }
    let page_width = template.pages[fb.page_index].width;
    Ok(SignaturePlacement {
        page_index: fb.page_index,
        rect: Rect {
            x: resolve_anchor_x(fb.x, fb.width, page_width),
            y: fb.y,
            width: fb.width,
            height: fb.height,
        },
        source: PlacementSource::Fallback,
        field_name: None,
    })
}

/// Normalize a fallback x coordinate: negative values are offsets from the
/// right page edge (`x' = page_width + x`), and the result is clamped so the
/// rectangle stays on the page.
pub(crate) fn resolve_anchor_x(x: f32, width: f32, page_width: f32) -> f32 {
    let resolved = if x < 0.0 { page_width + x } else { x };
    let max_x = (page_width - width).max(0.0);
    resolved.clamp(0.0, max_x)
}

fn decode_signature_payload(payload: &str) -> Result<SignatureImage, String> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Err("empty payload".to_string());
    }
    if !trimmed.starts_with("data:image") {
        return Err("missing image data prefix".to_string());
    }
    let (header, data) = trimmed
        .split_once(',')
        .ok_or_else(|| "payload has no encoded segment".to_string())?;
    if !header.contains("base64") {
        return Err("payload is not base64 encoded".to_string());
    }
    let mime = header
        .trim_start_matches("data:")
        .split(';')
        .next()
        .unwrap_or("");
    if !mime.contains("png") {
        return Err(format!("unsupported image mime: {}", mime));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|err| format!("base64 decode failed: {}", err))?;
    let decoded = image::load_from_memory_with_format(&bytes, image::ImageFormat::Png)
        .map_err(|err| format!("png decode failed: {}", err))?;
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err("png has zero extent".to_string());
    }

    let rgba = decoded.to_rgba8();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    let mut has_alpha = false;
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        if a != 255 {
            has_alpha = true;
        }
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }

    Ok(SignatureImage {
        width,
        height,
        rgb,
        alpha: has_alpha.then_some(alpha),
    })
}

fn embed_image(template: &mut LoadedTemplate, image: SignatureImage) -> lopdf::ObjectId {
    let SignatureImage {
        width,
        height,
        rgb,
        alpha,
    } = image;
    let smask_id = alpha.map(|alpha| {
        template.doc.add_object(LoStream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha,
        ))
    });
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };
    if let Some(id) = smask_id {
        dict.set("SMask", LoObject::Reference(id));
    }
    template.doc.add_object(LoStream::new(dict, rgb))
}
