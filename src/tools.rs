use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value;

use crate::error::{JsonMapError, Result};
use crate::value::DecodedValue;

pub const MASKED_EMAIL: &str = "XXXX@example.com";
pub const MASKED_SECRET: &str = "********";
pub const MASKED_PERSONAL: &str = "REDACTED";

fn mask_for(key: &str) -> Option<&'static str> {
    let key = key.to_lowercase();
    if key.contains("email") {
        Some(MASKED_EMAIL)
    } else if ["password", "token", "secret"].iter().any(|word| key.contains(word)) {
        Some(MASKED_SECRET)
    } else if ["name", "phone", "address"].iter().any(|word| key.contains(word)) {
        Some(MASKED_PERSONAL)
    } else {
        None
    }
}

/// Copy of `value` with personal data masked. A matching key replaces its
/// whole value, nested containers included; other values are searched
/// recursively.
pub fn anonymize(value: &DecodedValue) -> DecodedValue {
    match value {
        DecodedValue::Mapping(map) => DecodedValue::Mapping(
            map.iter()
                .map(|(key, child)| {
                    let masked = match mask_for(key) {
                        Some(mask) => DecodedValue::String(mask.to_string()),
                        None => anonymize(child),
                    };
                    (key.clone(), masked)
                })
                .collect(),
        ),
        DecodedValue::Sequence(items) => DecodedValue::Sequence(items.iter().map(anonymize).collect()),
        other => other.clone(),
    }
}

fn decode_segment(segment: &str, part: &str) -> Result<Value> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|err| JsonMapError::parse("jwt", format!("{part} is not base64url: {err}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|err| JsonMapError::parse("jwt", format!("{part} is not JSON: {err}")))
}

/// Decodes the header and payload of a JSON Web Token without checking
/// its signature. The header must name a known signing algorithm.
pub fn decode_jwt(token: &str) -> Result<DecodedValue> {
    let token = token.trim();
    let header = jsonwebtoken::decode_header(token)
        .map_err(|err| JsonMapError::parse("jwt", format!("invalid header: {err}")))?;
    let header = serde_json::to_value(&header).map_err(|err| JsonMapError::parse("jwt", err))?;

    let Some(payload) = token.split('.').nth(1) else {
        return Err(JsonMapError::parse(
            "jwt",
            "expected at least two dot-separated segments",
        ));
    };

    let mut decoded = serde_json::Map::new();
    decoded.insert("header".to_string(), header);
    decoded.insert("payload".to_string(), decode_segment(payload, "payload")?);
    Ok(DecodedValue::from(Value::Object(decoded)))
}
