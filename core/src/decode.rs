//! Response decoding and the serde helpers the domain records rely on.
//!
//! # Design
//! The service signals some failures as successful responses whose body
//! carries an `error` field. Decoding therefore happens in three steps:
//! parse the bytes as JSON, look for a non-empty `error`, then map the value
//! onto the target shape. A parse failure is logged together with the raw
//! body and returned; nothing is retried.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use crate::error::{ApiError, Result};

/// Decode a response body into `T`, surfacing embedded `error` envelopes.
pub fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        warn!(error = %e, body, "response is not valid JSON");
        ApiError::decode(e, body)
    })?;

    if let Some(message) = embedded_error(&value) {
        return Err(ApiError::Remote(message));
    }

    serde_json::from_value(value).map_err(|e| {
        warn!(
            error = %e,
            body,
            target = std::any::type_name::<T>(),
            "response does not match expected shape"
        );
        ApiError::decode(e, body)
    })
}

/// Decode the sub-document stored under `key` of a response envelope.
///
/// The envelope itself must decode cleanly before the sub-document is
/// attempted; a missing or null sub-document is a decode error.
pub fn decode_field<T: DeserializeOwned>(body: &str, key: &str) -> Result<T> {
    let mut envelope: serde_json::Map<String, Value> = decode(body)?;
    match envelope.remove(key) {
        Some(Value::Null) | None => {
            warn!(key, body, "response envelope is missing a sub-document");
            Err(ApiError::decode(format!("response has no `{key}`"), body))
        }
        Some(inner) => serde_json::from_value(inner).map_err(|e| {
            warn!(error = %e, key, body, "sub-document does not match expected shape");
            ApiError::decode(e, body)
        }),
    }
}

/// The message of a failure envelope, if `value` is one.
///
/// The field is either a plain string or an object with a `message`.
fn embedded_error(value: &Value) -> Option<String> {
    let message = match value.get("error")? {
        Value::String(message) => message.clone(),
        Value::Object(fields) => match fields.get("message") {
            Some(Value::String(message)) => message.clone(),
            _ => Value::Object(fields.clone()).to_string(),
        },
        _ => return None,
    };
    (!message.is_empty()).then_some(message)
}

/// Read JSON `null` as the field type's default.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Read a string, number or null into a string; numbers keep their JSON text.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, found {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, Batch, PostageLabel, Shipment};

    #[test]
    fn decodes_success_body() {
        let address: Address = decode(r#"{"id":"adr_1","name":"Jane Doe"}"#).unwrap();
        assert_eq!(address.id, "adr_1");
        assert_eq!(address.name, "Jane Doe");
    }

    #[test]
    fn error_string_is_remote_error_for_any_shape() {
        let body = r#"{"error": "something failed"}"#;
        let err = decode::<Address>(body).unwrap_err();
        assert!(matches!(err, ApiError::Remote(ref msg) if msg == "something failed"));
        let err = decode::<Shipment>(body).unwrap_err();
        assert!(matches!(err, ApiError::Remote(ref msg) if msg == "something failed"));
        let err = decode::<Batch>(body).unwrap_err();
        assert!(matches!(err, ApiError::Remote(ref msg) if msg == "something failed"));
    }

    #[test]
    fn error_object_uses_its_message() {
        let body = r#"{"error":{"code":"ADDRESS.VERIFY.FAILURE","message":"Unable to verify address."}}"#;
        let err = decode::<Address>(body).unwrap_err();
        assert!(matches!(err, ApiError::Remote(ref msg) if msg == "Unable to verify address."));
    }

    #[test]
    fn empty_or_null_error_field_is_not_an_error() {
        let address: Address = decode(r#"{"id":"adr_1","error":""}"#).unwrap();
        assert_eq!(address.id, "adr_1");
        let address: Address = decode(r#"{"id":"adr_2","error":null}"#).unwrap();
        assert_eq!(address.id, "adr_2");
    }

    #[test]
    fn malformed_body_is_decode_error_with_raw_bytes() {
        let err = decode::<Address>("<html>502 Bad Gateway</html>").unwrap_err();
        match err {
            ApiError::Decode { body, .. } => assert_eq!(body, "<html>502 Bad Gateway</html>"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn wrong_shape_is_decode_error() {
        let err = decode::<Address>(r#"{"id":42}"#).unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }

    #[test]
    fn decode_field_extracts_sub_document() {
        let body = r#"{"id":"shp_1","postage_label":{"id":"pl_1","label_url":"https://x/l.png"}}"#;
        let label: PostageLabel = decode_field(body, "postage_label").unwrap();
        assert_eq!(label.id, "pl_1");
        assert_eq!(label.label_url, "https://x/l.png");
    }

    #[test]
    fn decode_field_missing_key_is_decode_error() {
        let err = decode_field::<PostageLabel>(r#"{"id":"shp_1","postage_label":null}"#, "postage_label")
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode { ref message, .. } if message.contains("postage_label")));
    }

    #[test]
    fn decode_field_stops_at_envelope_failure() {
        let err = decode_field::<PostageLabel>("not json", "postage_label").unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
        let err = decode_field::<PostageLabel>(r#"{"error":"Rate not found"}"#, "postage_label")
            .unwrap_err();
        assert!(matches!(err, ApiError::Remote(ref msg) if msg == "Rate not found"));
    }
}
