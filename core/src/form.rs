//! Flattening of domain records into the service's nested form convention.
//!
//! Keys follow `resource[field]`, `resource[nested][field]` and, for ordered
//! lists, `resource[list][<index>][field]` with a zero-based index. A nested
//! address, parcel or customs info is sent either as a lone `[id]` reference
//! (when its id is set) or as its full field set, never both.
//!
//! Pairs are kept in insertion order so encoded bodies are deterministic.
//! Keys go on the wire as-is, apart from caller-supplied option names,
//! which are escaped; values are form-urlencoded.

use url::form_urlencoded;

use crate::types::{Address, CustomsInfo, CustomsItem, Parcel, Shipment};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormParams {
    pairs: Vec<(String, String)>,
}

impl FormParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Keys that start with `prefix`, in insertion order.
    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .map(|(k, _)| k.as_str())
            .filter(move |k| k.starts_with(prefix))
    }

    /// Set `key`, replacing an earlier value for the same key in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    pub fn set_number(&mut self, key: impl Into<String>, value: f64) {
        self.set(key, format_number(value));
    }

    pub fn set_bool(&mut self, key: impl Into<String>, value: bool) {
        self.set(key, if value { "true" } else { "false" });
    }

    /// Set `key` to the non-empty `values` joined by commas.
    pub fn set_joined<S: AsRef<str>>(&mut self, key: impl Into<String>, values: &[S]) {
        let joined = values
            .iter()
            .map(|v| v.as_ref().trim())
            .filter(|v| !v.is_empty())
            .collect::<Vec<_>>()
            .join(",");
        self.set(key, joined);
    }

    /// `application/x-www-form-urlencoded` body.
    pub fn encode(&self) -> String {
        self.pairs
            .iter()
            .map(|(key, value)| {
                let value: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
                format!("{key}={value}")
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Shortest decimal text that reads back as the same `f64`.
pub fn format_number(value: f64) -> String {
    value.to_string()
}

/// Full field set of an address under `prefix`.
pub fn address_fields(params: &mut FormParams, prefix: &str, address: &Address) {
    params.set(format!("{prefix}[name]"), &address.name);
    params.set(format!("{prefix}[company]"), &address.company);
    params.set(format!("{prefix}[street1]"), &address.street1);
    params.set(format!("{prefix}[street2]"), &address.street2);
    params.set(format!("{prefix}[city]"), &address.city);
    params.set(format!("{prefix}[state]"), &address.state);
    params.set(format!("{prefix}[zip]"), &address.zip);
    params.set(format!("{prefix}[country]"), &address.country);
    params.set(format!("{prefix}[phone]"), &address.phone);
    params.set(format!("{prefix}[email]"), &address.email);
}

pub fn address_ref(params: &mut FormParams, prefix: &str, address: &Address) {
    if address.id.is_empty() {
        address_fields(params, prefix, address);
    } else {
        params.set(format!("{prefix}[id]"), &address.id);
    }
}

pub fn parcel_fields(params: &mut FormParams, prefix: &str, parcel: &Parcel) {
    params.set_number(format!("{prefix}[length]"), parcel.length);
    params.set_number(format!("{prefix}[width]"), parcel.width);
    params.set_number(format!("{prefix}[height]"), parcel.height);
    params.set_number(format!("{prefix}[weight]"), parcel.weight);
    if !parcel.predefined_package.is_empty() {
        params.set(format!("{prefix}[predefined_package]"), &parcel.predefined_package);
    }
}

pub fn parcel_ref(params: &mut FormParams, prefix: &str, parcel: &Parcel) {
    if parcel.id.is_empty() {
        parcel_fields(params, prefix, parcel);
    } else {
        params.set(format!("{prefix}[id]"), &parcel.id);
    }
}

pub fn customs_item_fields(params: &mut FormParams, prefix: &str, item: &CustomsItem) {
    params.set(format!("{prefix}[description]"), &item.description);
    params.set_number(format!("{prefix}[quantity]"), item.quantity);
    params.set(format!("{prefix}[value]"), &item.value);
    params.set_number(format!("{prefix}[weight]"), item.weight);
    params.set(format!("{prefix}[hs_tariff_number]"), &item.hs_tariff_number);
    params.set(format!("{prefix}[origin_country]"), &item.origin_country);
}

pub fn customs_info_fields(params: &mut FormParams, prefix: &str, info: &CustomsInfo) {
    params.set_bool(format!("{prefix}[customs_certify]"), info.customs_certify);
    params.set(format!("{prefix}[customs_signer]"), &info.customs_signer);
    params.set(format!("{prefix}[contents_type]"), &info.contents_type);
    params.set(format!("{prefix}[contents_explanation]"), &info.contents_explanation);
    params.set(format!("{prefix}[restriction_type]"), &info.restriction_type);
    params.set(format!("{prefix}[restriction_comments]"), &info.restriction_comments);
    params.set(format!("{prefix}[non_delivery_option]"), &info.non_delivery_option);
    params.set(format!("{prefix}[eel_pfc]"), &info.eel_pfc);

    for (index, item) in info.customs_items.iter().enumerate() {
        let item_prefix = format!("{prefix}[customs_items][{index}]");
        if item.id.is_empty() {
            customs_item_fields(params, &item_prefix, item);
        } else {
            params.set(format!("{item_prefix}[id]"), &item.id);
        }
    }
}

pub fn customs_info_ref(params: &mut FormParams, prefix: &str, info: &CustomsInfo) {
    if info.id.is_empty() {
        customs_info_fields(params, prefix, info);
    } else {
        params.set(format!("{prefix}[id]"), &info.id);
    }
}

/// Addresses, parcel, customs info, reference and options of a shipment.
pub fn shipment_fields(params: &mut FormParams, prefix: &str, shipment: &Shipment) {
    address_ref(params, &format!("{prefix}[to_address]"), &shipment.to_address);
    address_ref(params, &format!("{prefix}[from_address]"), &shipment.from_address);
    parcel_ref(params, &format!("{prefix}[parcel]"), &shipment.parcel);
    if let Some(info) = &shipment.customs_info {
        customs_info_ref(params, &format!("{prefix}[customs_info]"), info);
    }
    if !shipment.reference.is_empty() {
        params.set(format!("{prefix}[reference]"), &shipment.reference);
    }
    for (name, value) in &shipment.options {
        // Option names are caller-supplied; escape them so they stay one key.
        let name: String = form_urlencoded::byte_serialize(name.as_bytes()).collect();
        params.set(format!("{prefix}[options][{name}]"), value);
    }
}
