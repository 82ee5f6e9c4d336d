//! Fixture templates for tests: small AcroForm PDFs with the field layouts
//! the built-in schemas expect, plus a tiny PNG signature payload.

use lopdf::{Document as LoDocument, Object as LoObject, ObjectId as LoObjectId, Stream as LoStream, StringFormat, dictionary};

fn field_name(name: &str) -> LoObject {
    LoObject::String(name.as_bytes().to_vec(), StringFormat::Literal)
}

fn rect_array(rect: [i64; 4]) -> Vec<LoObject> {
    rect.iter().map(|v| (*v).into()).collect()
}

fn empty_appearance(doc: &mut LoDocument) -> LoObjectId {
    doc.add_object(LoStream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![0.into(), 0.into(), 1.into(), 1.into()],
        },
        Vec::new(),
    ))
}

fn text_field(doc: &mut LoDocument, name: &str, rect: [i64; 4]) -> LoObjectId {
    doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Tx",
        "T" => field_name(name),
        "Rect" => rect_array(rect),
    })
}

fn checkbox_field(
    doc: &mut LoDocument,
    name: &str,
    rect: [i64; 4],
    ap: LoObjectId,
) -> LoObjectId {
    doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Btn",
        "T" => field_name(name),
        "Rect" => rect_array(rect),
        "V" => "Off",
        "AS" => "Off",
        "AP" => dictionary! {
            "N" => dictionary! {
                "Yes" => ap,
                "Off" => ap,
            },
        },
    })
}

fn signature_field(doc: &mut LoDocument, name: &str, rect: [i64; 4]) -> LoObjectId {
    doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Sig",
        "T" => field_name(name),
        "Rect" => rect_array(rect),
    })
}

/// Returns (parent field id, option widget ids). Only the widgets join the
/// page's annotation array.
fn radio_group(
    doc: &mut LoDocument,
    name: &str,
    options: &[(&str, [i64; 4])],
    ap: LoObjectId,
) -> (LoObjectId, Vec<LoObjectId>) {
    let parent_id = doc.new_object_id();
    let mut kid_ids = Vec::new();
    for (export, rect) in options {
        let mut normal = lopdf::Dictionary::new();
        normal.set(export.as_bytes().to_vec(), LoObject::Reference(ap));
        normal.set(b"Off".to_vec(), LoObject::Reference(ap));
        let kid = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "Rect" => rect_array(*rect),
            "Parent" => parent_id,
            "AS" => "Off",
            "AP" => dictionary! { "N" => LoObject::Dictionary(normal) },
        });
        kid_ids.push(kid);
    }
    let kids: Vec<LoObject> = kid_ids.iter().map(|id| LoObject::Reference(*id)).collect();
    doc.objects.insert(
        parent_id,
        LoObject::Dictionary(dictionary! {
            "FT" => "Btn",
            "T" => field_name(name),
            "Ff" => 32768,
            "V" => "Off",
            "Kids" => kids,
        }),
    );
    (parent_id, kid_ids)
}

/// Assemble pages + catalog + AcroForm and serialize. `pages` holds the
/// annotation ids per page; `field_ids` the AcroForm root field ids.
fn build_template(
    mut doc: LoDocument,
    pages: Vec<Vec<LoObjectId>>,
    field_ids: Vec<LoObjectId>,
) -> Vec<u8> {
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids: Vec<LoObject> = Vec::new();
    for (idx, annots) in pages.iter().enumerate() {
        let content = format!("BT /F1 12 Tf 72 760 Td (Page {}) Tj ET", idx + 1).into_bytes();
        let content_id = doc.add_object(LoStream::new(dictionary! {}, content));
        let annot_refs: Vec<LoObject> =
            annots.iter().map(|id| LoObject::Reference(*id)).collect();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Annots" => annot_refs,
        });
        kids.push(LoObject::Reference(page_id));
    }

    let page_count = pages.len() as i64;
    doc.objects.insert(
        pages_id,
        LoObject::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );

    let field_refs: Vec<LoObject> =
        field_ids.iter().map(|id| LoObject::Reference(*id)).collect();
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "AcroForm" => dictionary! { "Fields" => field_refs },
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("save template");
    out
}

/// Two-page drop-off template: primary fields on page one, the VIN mirror
/// target on page two, and an existing customer signature field.
pub(crate) fn dropoff_template() -> Vec<u8> {
    let mut doc = LoDocument::with_version("1.5");
    let ap = empty_appearance(&mut doc);

    let vin = text_field(&mut doc, "VIN", [72, 700, 300, 720]);
    let name = text_field(&mut doc, "Customer Name", [72, 670, 300, 690]);
    let date = text_field(&mut doc, "Drop Date", [380, 700, 540, 720]);
    let ack = checkbox_field(&mut doc, "Damage Acknowledged", [72, 640, 86, 654], ap);
    let web = checkbox_field(&mut doc, "Referral Web", [72, 610, 86, 624], ap);
    let sig = signature_field(&mut doc, "Customer Signature", [350, 96, 530, 144]);
    let vin_copy = text_field(&mut doc, "VIN Copy", [72, 700, 300, 720]);

    build_template(
        doc,
        vec![vec![vin, name, date, ack, web, sig], vec![vin_copy]],
        vec![vin, name, date, ack, web, sig, vin_copy],
    )
}

/// Single-page pick-up template. The customer name field uses an alias
/// spelling and there is no signature field, so fallback rectangles apply.
pub(crate) fn pickup_template() -> Vec<u8> {
    let mut doc = LoDocument::with_version("1.5");
    let ap = empty_appearance(&mut doc);

    let name = text_field(&mut doc, "Client Name", [72, 700, 300, 720]);
    let date = text_field(&mut doc, "Pickup Date", [380, 700, 540, 720]);
    let balance = text_field(&mut doc, "Balance Due", [380, 660, 540, 680]);
    let reviewed = checkbox_field(&mut doc, "Work Reviewed", [72, 640, 86, 654], ap);
    let (method, method_kids) = radio_group(
        &mut doc,
        "Payment Method",
        &[("Cash", [72, 600, 86, 614]), ("Card", [150, 600, 164, 614])],
        ap,
    );

    let mut annots = vec![name, date, balance, reviewed];
    annots.extend(method_kids);
    build_template(
        doc,
        vec![annots],
        vec![name, date, balance, reviewed, method],
    )
}

/// Single-page estimate template with an in-page mirror target and an
/// existing signature field.
pub(crate) fn estimate_template() -> Vec<u8> {
    let mut doc = LoDocument::with_version("1.5");
    let ap = empty_appearance(&mut doc);

    let name = text_field(&mut doc, "Customer Name", [72, 700, 300, 720]);
    let date = text_field(&mut doc, "Estimate Date", [380, 700, 540, 720]);
    let amount = text_field(&mut doc, "Approved Amount", [380, 660, 540, 680]);
    let amount_copy = text_field(&mut doc, "Approved Amount Copy", [380, 620, 540, 640]);
    let authorized = checkbox_field(&mut doc, "Work Authorized", [72, 640, 86, 654], ap);
    let (contact, contact_kids) = radio_group(
        &mut doc,
        "Contact Preference",
        &[("Phone", [72, 600, 86, 614]), ("Email", [150, 600, 164, 614])],
        ap,
    );
    let sig = signature_field(&mut doc, "Customer Signature", [72, 90, 272, 140]);

    let mut annots = vec![name, date, amount, amount_copy, authorized, sig];
    annots.extend(contact_kids);
    build_template(
        doc,
        vec![annots],
        vec![name, date, amount, amount_copy, authorized, contact, sig],
    )
}

pub(crate) fn signature_png_bytes() -> Vec<u8> {
    let mut img = image::RgbaImage::new(8, 4);
    for (x, _, pixel) in img.enumerate_pixels_mut() {
        *pixel = if x % 2 == 0 {
            image::Rgba([20, 20, 120, 255])
        } else {
            image::Rgba([0, 0, 0, 0])
        };
    }
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

pub(crate) fn signature_png_data_uri() -> String {
    use base64::Engine;
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(signature_png_bytes())
    )
}
