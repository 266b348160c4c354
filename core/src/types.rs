//! Domain records mirroring the service's resource shapes.
//!
//! # Design
//! Records are plain data with no behavior. Every field has a default so a
//! caller can fill in only what a request needs, and so partial responses
//! still decode; JSON `null` is read as the default as well. An empty `id`
//! means the record has never round-tripped through the service.
//!
//! Failure envelopes are detected once by the decoder, so no record carries
//! its own `error` field.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decode::{nullable, string_or_number};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    #[serde(deserialize_with = "nullable")]
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub object: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub company: String,
    #[serde(deserialize_with = "nullable")]
    pub street1: String,
    #[serde(deserialize_with = "nullable")]
    pub street2: String,
    #[serde(deserialize_with = "nullable")]
    pub city: String,
    #[serde(deserialize_with = "nullable")]
    pub state: String,
    #[serde(deserialize_with = "nullable")]
    pub zip: String,
    #[serde(deserialize_with = "nullable")]
    pub country: String,
    #[serde(deserialize_with = "nullable")]
    pub phone: String,
    #[serde(deserialize_with = "nullable")]
    pub email: String,
}

impl Address {
    /// An address known only by its service id.
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// Result of verifying an address: the service's canonical form of the
/// address plus its human-readable verification message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifiedAddress {
    pub address: Address,
    #[serde(deserialize_with = "nullable")]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parcel {
    #[serde(deserialize_with = "nullable")]
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub object: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "nullable")]
    pub length: f64,
    #[serde(deserialize_with = "nullable")]
    pub width: f64,
    #[serde(deserialize_with = "nullable")]
    pub height: f64,
    #[serde(deserialize_with = "nullable")]
    pub weight: f64,
    /// Carrier package code such as `FlatRateEnvelope`; empty for custom boxes.
    #[serde(deserialize_with = "nullable")]
    pub predefined_package: String,
}

impl Parcel {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomsItem {
    #[serde(deserialize_with = "nullable")]
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub object: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "nullable")]
    pub description: String,
    #[serde(deserialize_with = "nullable")]
    pub quantity: f64,
    /// Declared value. The service sends and expects this as a string.
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
    #[serde(deserialize_with = "nullable")]
    pub weight: f64,
    #[serde(deserialize_with = "nullable")]
    pub hs_tariff_number: String,
    #[serde(deserialize_with = "nullable")]
    pub origin_country: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomsInfo {
    #[serde(deserialize_with = "nullable")]
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub object: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "nullable")]
    pub customs_certify: bool,
    #[serde(deserialize_with = "nullable")]
    pub customs_signer: String,
    #[serde(deserialize_with = "nullable")]
    pub contents_type: String,
    #[serde(deserialize_with = "nullable")]
    pub contents_explanation: String,
    #[serde(deserialize_with = "nullable")]
    pub restriction_type: String,
    #[serde(deserialize_with = "nullable")]
    pub restriction_comments: String,
    #[serde(deserialize_with = "nullable")]
    pub non_delivery_option: String,
    /// Export classification code (EEL or PFC).
    #[serde(deserialize_with = "nullable")]
    pub eel_pfc: String,
    #[serde(deserialize_with = "nullable")]
    pub customs_items: Vec<CustomsItem>,
}

impl CustomsInfo {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rate {
    #[serde(deserialize_with = "nullable")]
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub object: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Carrier service code, e.g. `Priority`.
    #[serde(deserialize_with = "nullable")]
    pub service: String,
    #[serde(deserialize_with = "nullable")]
    pub carrier: String,
    /// Quoted price exactly as the service sent it.
    #[serde(deserialize_with = "string_or_number")]
    pub rate: String,
    #[serde(deserialize_with = "nullable")]
    pub currency: String,
    #[serde(deserialize_with = "nullable")]
    pub shipment_id: String,
    /// Display name looked up from `service`; empty when the code is unknown.
    #[serde(skip_deserializing)]
    pub service_name: String,
    /// `rate` parsed as a number, when it parses.
    #[serde(skip_deserializing)]
    pub rate_value: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostageLabel {
    #[serde(deserialize_with = "nullable")]
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub object: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "nullable")]
    pub date_advance: i64,
    #[serde(deserialize_with = "nullable")]
    pub integrated_form: String,
    pub label_date: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "nullable")]
    pub label_resolution: i64,
    #[serde(deserialize_with = "nullable")]
    pub label_size: String,
    #[serde(deserialize_with = "nullable")]
    pub label_type: String,
    #[serde(deserialize_with = "nullable")]
    pub label_file_type: String,
    #[serde(deserialize_with = "nullable")]
    pub label_url: String,
    #[serde(deserialize_with = "nullable")]
    pub label_pdf_url: String,
    #[serde(deserialize_with = "nullable")]
    pub label_epl2_url: String,
    #[serde(deserialize_with = "nullable")]
    pub label_zpl_url: String,
    pub selected_rate: Option<Rate>,
}

/// Free-form shipping options (`saturday_delivery`, `label_format`, ...).
/// Values are sent verbatim as `shipment[options][<name>]`.
pub type ShippingOptions = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Shipment {
    #[serde(deserialize_with = "nullable")]
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub object: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "nullable")]
    pub to_address: Address,
    #[serde(deserialize_with = "nullable")]
    pub from_address: Address,
    #[serde(deserialize_with = "nullable")]
    pub parcel: Parcel,
    pub customs_info: Option<CustomsInfo>,
    pub scan_form: Option<ScanForm>,
    #[serde(deserialize_with = "nullable")]
    pub rates: Vec<Rate>,
    pub selected_rate: Option<Rate>,
    pub postage_label: Option<PostageLabel>,
    #[serde(deserialize_with = "nullable")]
    pub tracking_code: String,
    #[serde(deserialize_with = "nullable")]
    pub reference: String,
    #[serde(deserialize_with = "nullable")]
    pub refund_status: String,
    #[serde(deserialize_with = "string_or_number")]
    pub insurance: String,
    #[serde(deserialize_with = "nullable")]
    pub batch_status: String,
    #[serde(deserialize_with = "nullable")]
    pub batch_message: String,
    #[serde(deserialize_with = "options")]
    pub options: ShippingOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchStatus {
    #[serde(deserialize_with = "nullable")]
    pub created: i64,
    #[serde(deserialize_with = "nullable")]
    pub postage_purchased: i64,
    #[serde(deserialize_with = "nullable")]
    pub postage_purchase_failed: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Batch {
    #[serde(deserialize_with = "nullable")]
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub object: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "nullable")]
    pub state: String,
    #[serde(deserialize_with = "nullable")]
    pub reference: String,
    #[serde(deserialize_with = "nullable")]
    pub shipments: Vec<Shipment>,
    #[serde(deserialize_with = "nullable")]
    pub status: BatchStatus,
    /// Populated once every shipment has postage and a label was requested.
    #[serde(deserialize_with = "nullable")]
    pub label_url: String,
}

/// How `create_batch` treats the submitted shipments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    CreateOnly,
    /// Also buy postage for every shipment using its first quoted rate.
    CreateAndBuy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Refund {
    #[serde(deserialize_with = "nullable")]
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub object: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "nullable")]
    pub tracking_code: String,
    #[serde(deserialize_with = "nullable")]
    pub status: String,
    #[serde(deserialize_with = "nullable")]
    pub carrier: String,
    #[serde(deserialize_with = "nullable")]
    pub shipment_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanForm {
    #[serde(deserialize_with = "nullable")]
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub object: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(alias = "from_address", deserialize_with = "nullable")]
    pub address: Address,
    #[serde(deserialize_with = "nullable")]
    pub tracking_codes: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub form_url: String,
    #[serde(deserialize_with = "nullable")]
    pub form_file_type: String,
}

/// Option values arrive as strings, numbers, booleans or null; keep them all
/// as strings and drop nulls.
fn options<'de, D>(deserializer: D) -> std::result::Result<ShippingOptions, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(name, value)| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some((name, s)),
            other => Some((name, other.to_string())),
        })
        .collect())
}
