//! Payload printed into a bin's QR code.
//!
//! The wire form is compact JSON:
//! `{"binId":"…","type":"bin_activation","timestamp":"2024-05-01T08:00:00.000Z"}`.
//! Tokens carry no signature and no expiry; anyone who can read a printed code
//! can reproduce one.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::model::BinId;

/// `type` tag every activation token carries.
pub const TOKEN_KIND: &str = "bin_activation";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Reasons a scanned payload is rejected.
pub enum TokenError {
    /// Payload is not the expected JSON structure.
    #[error("Malformed token: {0}")]
    Malformed(String),
    /// Payload is well-formed but is not a bin activation token.
    #[error("Wrong token kind: {0}")]
    WrongKind(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Decoded bin activation token.
pub struct ActivationToken {
    /// Bin the code is attached to.
    pub bin_id: BinId,
    /// When the code was generated. Codes printed without a `timestamp` still
    /// activate, so this is optional.
    pub issued_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct WireFields {
    #[serde(rename = "binId")]
    bin_id: String,
    #[serde(default)]
    timestamp: Option<String>,
}

impl ActivationToken {
    /// Token kind, always [`TOKEN_KIND`].
    #[must_use]
    pub fn kind(&self) -> &'static str {
        TOKEN_KIND
    }

    /// Serialize to the text embedded in the QR code.
    #[must_use]
    pub fn to_payload(&self) -> String {
        match self.issued_at {
            Some(issued_at) => json!({
                "binId": self.bin_id.as_str(),
                "type": TOKEN_KIND,
                "timestamp": issued_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            }),
            None => json!({
                "binId": self.bin_id.as_str(),
                "type": TOKEN_KIND,
            }),
        }
        .to_string()
    }
}

/// Issue a fresh token for `bin_id`, stamped with the current time.
#[must_use]
pub fn encode(bin_id: &BinId) -> ActivationToken {
    encode_at(bin_id, Utc::now())
}

/// Issue a token for `bin_id` with an explicit issuance time.
#[must_use]
pub fn encode_at(bin_id: &BinId, issued_at: DateTime<Utc>) -> ActivationToken {
    ActivationToken {
        bin_id: bin_id.clone(),
        issued_at: Some(issued_at),
    }
}

/// Parse scanned text back into a token.
///
/// Any JSON object is classified by its `type` first: a missing, non-string or
/// foreign `type` is the wrong kind of code. Only activation tokens are then
/// checked for a usable `binId` and, when present, a valid `timestamp`.
///
/// # Errors
///
/// Returns [`TokenError::WrongKind`] when the payload is a JSON object that is
/// not tagged `bin_activation`, and [`TokenError::Malformed`] when the text is
/// not a JSON object or an activation token lacks a usable `binId` or carries
/// an unparseable `timestamp`.
pub fn decode(text: &str) -> Result<ActivationToken, TokenError> {
    let value: Value = serde_json::from_str(text.trim())
        .map_err(|err| TokenError::Malformed(format!("not JSON: {err}")))?;

    let Value::Object(fields) = &value else {
        return Err(TokenError::Malformed("not a JSON object".to_owned()));
    };

    match fields.get("type") {
        Some(Value::String(kind)) if kind == TOKEN_KIND => {}
        Some(Value::String(kind)) => return Err(TokenError::WrongKind(kind.clone())),
        Some(other) => return Err(TokenError::WrongKind(other.to_string())),
        None => return Err(TokenError::WrongKind("untagged".to_owned())),
    }

    let wire = WireFields::deserialize(&value)
        .map_err(|err| TokenError::Malformed(err.to_string()))?;

    if wire.bin_id.trim().is_empty() {
        return Err(TokenError::Malformed("empty `binId`".to_owned()));
    }

    let issued_at = wire
        .timestamp
        .map(|timestamp| {
            DateTime::parse_from_rfc3339(&timestamp)
                .map(|parsed| parsed.with_timezone(&Utc))
                .map_err(|err| TokenError::Malformed(format!("bad timestamp: {err}")))
        })
        .transpose()?;

    Ok(ActivationToken {
        bin_id: BinId(wire.bin_id),
        issued_at,
    })
}
