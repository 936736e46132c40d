// Wire models for the Ally cloud API
//
// These mirror the JSON exactly as the cloud sends it. Values inside status
// records stay as raw `serde_json::Value`; normalization happens in
// `ally-core`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Every data endpoint wraps its payload as `{ "result": ... }`.
#[derive(Debug, Deserialize)]
pub(crate) struct ResultEnvelope<T> {
    pub result: Option<T>,
}

/// Reply from `POST /oauth2/token`.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    /// Lifetime in seconds. Arrives as a number or a numeric string.
    #[serde(deserialize_with = "seconds")]
    pub expires_in: f64,
}

fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("expires_in is not representable")),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("expires_in is not numeric: {s:?}"))),
        other => Err(serde::de::Error::custom(format!(
            "expires_in has unexpected type: {other}"
        ))),
    }
}

/// A device as returned by `GET /ally/devices[/{id}]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDevice {
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub online: bool,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub update_time: Option<i64>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub status: Vec<RawStatus>,
}

// Envelope fields drift between firmware generations. A null or oddly typed
// value falls back to the default instead of failing the whole device.

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => s.eq_ignore_ascii_case("true") || s == "1",
        _ => false,
    })
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    let seconds = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(whole_seconds)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole_seconds))
        }
        _ => None,
    };
    Ok(seconds)
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn whole_seconds(value: f64) -> Option<i64> {
    value.is_finite().then_some(value.trunc() as i64)
}

/// One `(code, value)` status record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStatus {
    pub code: String,
    #[serde(default)]
    pub value: Value,
}

impl RawStatus {
    pub fn new(code: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            code: code.into(),
            value: value.into(),
        }
    }
}

/// One entry of a `POST /ally/devices/{id}/commands` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandPayload {
    pub code: String,
    pub value: Value,
}

impl CommandPayload {
    pub fn new(code: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            code: code.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CommandRequest<'a> {
    pub commands: &'a [CommandPayload],
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn token_lifetime_accepts_numeric_string() {
        let parsed: TokenResponse =
            serde_json::from_value(json!({"access_token": "t", "expires_in": "3599"})).unwrap();
        assert!((parsed.expires_in - 3599.0).abs() < f64::EPSILON);
    }

    #[test]
    fn token_lifetime_rejects_garbage() {
        let parsed = serde_json::from_value::<TokenResponse>(
            json!({"access_token": "t", "expires_in": "soon"}),
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn raw_device_tolerates_missing_optional_fields() {
        let device: RawDevice = serde_json::from_value(json!({"id": "d1"})).unwrap();
        assert_eq!(device.name, "");
        assert!(!device.online);
        assert_eq!(device.model, None);
        assert!(device.status.is_empty());
    }

    #[test]
    fn raw_device_tolerates_drifting_envelope_types() {
        let device: RawDevice = serde_json::from_value(json!({
            "id": "d1",
            "name": null,
            "online": "true",
            "update_time": "1700000000.5",
        }))
        .unwrap();
        assert_eq!(device.name, "");
        assert!(device.online);
        assert_eq!(device.update_time, Some(1_700_000_000));

        let device: RawDevice =
            serde_json::from_value(json!({"id": "d2", "update_time": 1_700_000_000.9}))
                .unwrap();
        assert_eq!(device.update_time, Some(1_700_000_000));

        let device: RawDevice =
            serde_json::from_value(json!({"id": "d3", "update_time": "yesterday"})).unwrap();
        assert_eq!(device.update_time, None);
    }

    #[test]
    fn command_request_shape() {
        let commands = [CommandPayload::new("manual_mode_fast", 210)];
        let body = serde_json::to_value(CommandRequest {
            commands: &commands,
        })
        .unwrap();
        assert_eq!(
            body,
            json!({"commands": [{"code": "manual_mode_fast", "value": 210}]})
        );
    }
}
