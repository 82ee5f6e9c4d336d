use crate::error::FormPressError;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Closed set of fillable document templates the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DocumentKind {
    DropOff,
    PickUp,
    Estimate,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::DropOff => "dropoff",
            DocumentKind::PickUp => "pickup",
            DocumentKind::Estimate => "estimate",
        }
    }

    pub fn from_str(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dropoff" => Some(DocumentKind::DropOff),
            "pickup" => Some(DocumentKind::PickUp),
            "estimate" => Some(DocumentKind::Estimate),
            _ => None,
        }
    }
}

/// Expected write strategy for a semantic key. `Date` fields are written with
/// the text strategy and receive the derived fill date when the submission
/// omits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteHint {
    Text,
    Checkbox,
    Radio,
    Date,
}

/// Declarative mapping for one semantic key: where its value should land and
/// which aliases older template revisions used for the same field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub key: &'static str,
    pub primary: &'static str,
    pub aliases: &'static [&'static str],
    pub hint: WriteHint,
    pub mirror: Option<&'static str>,
}

/// Fallback placement used when no aliased signature field exists in the
/// template. Authored directly in bottom-left-origin space; a negative `x`
/// means offset from the right page edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub page_index: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct SignatureSlotSpec {
    pub slot: &'static str,
    pub aliases: &'static [&'static str],
    pub fallback: FallbackRect,
}

#[derive(Debug, Clone, Copy)]
pub struct DocumentSchema {
    pub kind: DocumentKind,
    pub fields: &'static [FieldSpec],
    pub signatures: &'static [SignatureSlotSpec],
}

impl DocumentSchema {
    pub fn field(&self, key: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|spec| spec.key == key)
    }

    pub fn signature_slot(&self, slot: &str) -> Option<&'static SignatureSlotSpec> {
        self.signatures.iter().find(|spec| spec.slot == slot)
    }
}

const DROPOFF_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        key: "customer_name",
        primary: "Customer Name",
        aliases: &["Name", "Client Name"],
        hint: WriteHint::Text,
        mirror: None,
    },
    FieldSpec {
        key: "phone",
        primary: "Phone",
        aliases: &["Phone Number", "Daytime Phone"],
        hint: WriteHint::Text,
        mirror: None,
    },
    FieldSpec {
        key: "email",
        primary: "Email",
        aliases: &["Email Address"],
        hint: WriteHint::Text,
        mirror: None,
    },
    FieldSpec {
        key: "address",
        primary: "Address",
        aliases: &["Address 1", "Street Address", "Mailing Address"],
        hint: WriteHint::Text,
        mirror: None,
    },
    FieldSpec {
        key: "vin",
        primary: "VIN",
        aliases: &["Vehicle VIN", "VIN Number", "Vin No"],
        hint: WriteHint::Text,
        mirror: Some("VIN Copy"),
    },
    FieldSpec {
        key: "license_plate",
        primary: "License Plate",
        aliases: &["Plate", "Tag Number"],
        hint: WriteHint::Text,
        mirror: None,
    },
    FieldSpec {
        key: "mileage",
        primary: "Mileage",
        aliases: &["Odometer", "Miles In"],
        hint: WriteHint::Text,
        mirror: None,
    },
    FieldSpec {
        key: "drop_date",
        primary: "Drop Date",
        aliases: &["Date", "Date In"],
        hint: WriteHint::Date,
        mirror: None,
    },
    FieldSpec {
        key: "referral_source.web",
        primary: "Referral Web",
        aliases: &["Heard Web", "Found Online"],
        hint: WriteHint::Checkbox,
        mirror: None,
    },
    FieldSpec {
        key: "referral_source.friend",
        primary: "Referral Friend",
        aliases: &["Heard Friend", "Word Of Mouth"],
        hint: WriteHint::Checkbox,
        mirror: None,
    },
    FieldSpec {
        key: "referral_source.repeat",
        primary: "Referral Repeat",
        aliases: &["Repeat Customer"],
        hint: WriteHint::Checkbox,
        mirror: None,
    },
    FieldSpec {
        key: "damage_ack",
        primary: "Damage Acknowledged",
        aliases: &["Damage Ack", "Existing Damage"],
        hint: WriteHint::Checkbox,
        mirror: None,
    },
];

const DROPOFF_SIGNATURES: &[SignatureSlotSpec] = &[SignatureSlotSpec {
    slot: "signature",
    aliases: &["Customer Signature", "Signature", "Sign Here"],
    fallback: FallbackRect {
        x: -230.0,
        y: 96.0,
        width: 180.0,
        height: 48.0,
        page_index: 0,
    },
}];

const PICKUP_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        key: "customer_name",
        primary: "Customer Name",
        aliases: &["Name", "Client Name"],
        hint: WriteHint::Text,
        mirror: None,
    },
    FieldSpec {
        key: "vin",
        primary: "VIN",
        aliases: &["Vehicle VIN", "VIN Number"],
        hint: WriteHint::Text,
        mirror: None,
    },
    FieldSpec {
        key: "pickup_date",
        primary: "Pickup Date",
        aliases: &["Date", "Date Out"],
        hint: WriteHint::Date,
        mirror: None,
    },
    FieldSpec {
        key: "payment_method",
        primary: "Payment Method",
        aliases: &["Payment", "Paid By"],
        hint: WriteHint::Radio,
        mirror: None,
    },
    FieldSpec {
        key: "balance_due",
        primary: "Balance Due",
        aliases: &["Amount Due", "Total Due"],
        hint: WriteHint::Text,
        mirror: None,
    },
    FieldSpec {
        key: "satisfaction_ack",
        primary: "Work Reviewed",
        aliases: &["Satisfaction Ack", "Reviewed With Customer"],
        hint: WriteHint::Checkbox,
        mirror: None,
    },
];

const PICKUP_SIGNATURES: &[SignatureSlotSpec] = &[
    SignatureSlotSpec {
        slot: "signature",
        aliases: &["Customer Signature", "Signature"],
        fallback: FallbackRect {
            x: 60.0,
            y: 110.0,
            width: 180.0,
            height: 48.0,
            page_index: 0,
        },
    },
    SignatureSlotSpec {
        slot: "advisor_signature",
        aliases: &["Advisor Signature", "Service Advisor Signature"],
        fallback: FallbackRect {
            x: -230.0,
            y: 110.0,
            width: 180.0,
            height: 48.0,
            page_index: 0,
        },
    },
];

const ESTIMATE_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        key: "customer_name",
        primary: "Customer Name",
        aliases: &["Name"],
        hint: WriteHint::Text,
        mirror: None,
    },
    FieldSpec {
        key: "vin",
        primary: "VIN",
        aliases: &["Vehicle VIN"],
        hint: WriteHint::Text,
        mirror: None,
    },
    FieldSpec {
        key: "estimate_date",
        primary: "Estimate Date",
        aliases: &["Date"],
        hint: WriteHint::Date,
        mirror: None,
    },
    FieldSpec {
        key: "approved_amount",
        primary: "Approved Amount",
        aliases: &["Authorized Amount", "Not To Exceed"],
        hint: WriteHint::Text,
        mirror: Some("Approved Amount Copy"),
    },
    FieldSpec {
        key: "contact_preference",
        primary: "Contact Preference",
        aliases: &["Preferred Contact"],
        hint: WriteHint::Radio,
        mirror: None,
    },
    FieldSpec {
        key: "authorize_ack",
        primary: "Work Authorized",
        aliases: &["Authorization Ack", "Authorize Repairs"],
        hint: WriteHint::Checkbox,
        mirror: None,
    },
];

const ESTIMATE_SIGNATURES: &[SignatureSlotSpec] = &[SignatureSlotSpec {
    slot: "signature",
    aliases: &["Customer Signature", "Signature", "Authorized By"],
    fallback: FallbackRect {
        x: 72.0,
        y: 90.0,
        width: 200.0,
        height: 50.0,
        page_index: 0,
    },
}];

const SCHEMAS: &[DocumentSchema] = &[
    DocumentSchema {
        kind: DocumentKind::DropOff,
        fields: DROPOFF_FIELDS,
        signatures: DROPOFF_SIGNATURES,
    },
    DocumentSchema {
        kind: DocumentKind::PickUp,
        fields: PICKUP_FIELDS,
        signatures: PICKUP_SIGNATURES,
    },
    DocumentSchema {
        kind: DocumentKind::Estimate,
        fields: ESTIMATE_FIELDS,
        signatures: ESTIMATE_SIGNATURES,
    },
];

pub fn schema_for(kind: DocumentKind) -> &'static DocumentSchema {
    match kind {
        DocumentKind::DropOff => &SCHEMAS[0],
        DocumentKind::PickUp => &SCHEMAS[1],
        DocumentKind::Estimate => &SCHEMAS[2],
    }
}

/// Where a template's bytes come from. Templates are read fresh per fill and
/// never cached across requests.
#[derive(Debug, Clone)]
pub enum TemplateSource {
    File(PathBuf),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct TemplateAsset {
    pub kind: DocumentKind,
    pub source: TemplateSource,
    pub sha256: Option<String>,
    pub page_count: Option<usize>,
}

impl TemplateAsset {
    pub fn from_file(kind: DocumentKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            source: TemplateSource::File(path.into()),
            sha256: None,
            page_count: None,
        }
    }

    pub fn from_bytes(kind: DocumentKind, bytes: Vec<u8>) -> Self {
        Self {
            kind,
            source: TemplateSource::Bytes(bytes),
            sha256: None,
            page_count: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    by_kind: BTreeMap<DocumentKind, TemplateAsset>,
}

impl TemplateStore {
    pub fn insert(&mut self, asset: TemplateAsset) -> Result<(), FormPressError> {
        if let TemplateSource::Bytes(bytes) = &asset.source {
            if bytes.is_empty() {
                return Err(FormPressError::InvalidConfiguration(format!(
                    "empty template bytes for document kind: {}",
                    asset.kind.as_str()
                )));
            }
        }
        if self.by_kind.contains_key(&asset.kind) {
            return Err(FormPressError::InvalidConfiguration(format!(
                "duplicate template registration for document kind: {}",
                asset.kind.as_str()
            )));
        }
        self.by_kind.insert(asset.kind, asset);
        Ok(())
    }

    pub fn get(&self, kind: DocumentKind) -> Option<&TemplateAsset> {
        self.by_kind.get(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }
}
