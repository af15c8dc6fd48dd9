//! Firestore's typed JSON value encoding and field accessors.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use ecoearn_core::ports::StoreError;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Field map of one document.
pub(crate) type Fields = BTreeMap<String, Value>;

/// A single typed Firestore value, e.g. `{"stringValue": "Plaza"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum Value {
    NullValue(()),
    BooleanValue(bool),
    /// 64-bit integers travel as decimal strings.
    IntegerValue(String),
    DoubleValue(f64),
    /// RFC 3339 timestamp.
    TimestampValue(String),
    StringValue(String),
    /// Base64 encoded bytes.
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(LatLng),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Geographic point value.
pub(crate) struct LatLng {
    #[serde(default)]
    latitude: f64,
    #[serde(default)]
    longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// Array value.
pub(crate) struct ArrayValue {
    #[serde(default)]
    values: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// Nested map value.
pub(crate) struct MapValue {
    #[serde(default)]
    fields: Fields,
}

impl Value {
    pub(crate) fn null() -> Self {
        Value::NullValue(())
    }

    pub(crate) fn string(text: impl Into<String>) -> Self {
        Value::StringValue(text.into())
    }

    pub(crate) fn optional_string(text: Option<&str>) -> Self {
        text.map_or_else(Self::null, Self::string)
    }

    pub(crate) fn integer(number: i64) -> Self {
        Value::IntegerValue(number.to_string())
    }

    pub(crate) fn double(number: f64) -> Self {
        Value::DoubleValue(number)
    }

    /// Amounts are stored as doubles, the form the mobile app reads.
    pub(crate) fn decimal(amount: Decimal) -> Self {
        amount
            .to_f64()
            .map_or_else(|| Self::string(amount.to_string()), Self::double)
    }

    pub(crate) fn timestamp(at: DateTime<Utc>) -> Self {
        Value::TimestampValue(at.to_rfc3339_opts(SecondsFormat::Micros, true))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A stored document as returned by the REST API.
pub(crate) struct Document {
    /// Full resource name, ending in the document id.
    #[serde(default)]
    pub(crate) name: String,
    /// Field values.
    #[serde(default)]
    pub(crate) fields: Fields,
    /// Last write time, used as a write precondition.
    #[serde(default)]
    pub(crate) update_time: Option<String>,
}

impl Document {
    /// Last path segment of the resource name.
    #[must_use]
    pub(crate) fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }

    /// Typed access to the fields of this document.
    pub(crate) fn reader(&self) -> FieldReader<'_> {
        FieldReader { document: self }
    }
}

/// Typed getters that report [`StoreError::Decode`] naming the document.
pub(crate) struct FieldReader<'doc> {
    document: &'doc Document,
}

impl FieldReader<'_> {
    fn get(&self, key: &str) -> Option<&Value> {
        self.document
            .fields
            .get(key)
            .filter(|value| !matches!(value, Value::NullValue(())))
    }

    fn malformed(&self, key: &str, expected: &str) -> StoreError {
        StoreError::Decode {
            document: self.document.name.clone(),
            reason: format!("field `{key}` is not {expected}"),
        }
    }

    pub(crate) fn string(&self, key: &str) -> Result<String, StoreError> {
        self.opt_string(key)?
            .ok_or_else(|| self.malformed(key, "a string"))
    }

    pub(crate) fn opt_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::StringValue(text)) => Ok(Some(text.clone())),
            Some(_) => Err(self.malformed(key, "a string")),
        }
    }

    pub(crate) fn opt_number(&self, key: &str) -> Result<Option<f64>, StoreError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::DoubleValue(number)) => Ok(Some(*number)),
            Some(Value::IntegerValue(text) | Value::StringValue(text)) => text
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_parse| self.malformed(key, "a number")),
            Some(_) => Err(self.malformed(key, "a number")),
        }
    }

    pub(crate) fn opt_integer(&self, key: &str) -> Result<Option<i64>, StoreError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::IntegerValue(text)) => text
                .parse::<i64>()
                .map(Some)
                .map_err(|_parse| self.malformed(key, "an integer")),
            Some(Value::DoubleValue(number)) if number.fract() == 0.0 => {
                #[expect(clippy::cast_possible_truncation, reason = "value is integral")]
                let whole = *number as i64;
                Ok(Some(whole))
            }
            Some(_) => Err(self.malformed(key, "an integer")),
        }
    }

    pub(crate) fn decimal(&self, key: &str) -> Result<Decimal, StoreError> {
        match self.get(key) {
            Some(Value::DoubleValue(number)) => Decimal::try_from(*number)
                .map(|amount| amount.round_dp(2))
                .map_err(|_range| self.malformed(key, "a finite amount")),
            Some(Value::IntegerValue(text) | Value::StringValue(text)) => text
                .trim()
                .parse::<Decimal>()
                .map_err(|_parse| self.malformed(key, "an amount")),
            _ => Err(self.malformed(key, "an amount")),
        }
    }

    /// Accepts native timestamps as well as RFC 3339 strings.
    pub(crate) fn timestamp(&self, key: &str) -> Result<DateTime<Utc>, StoreError> {
        match self.get(key) {
            Some(Value::TimestampValue(text) | Value::StringValue(text)) => {
                DateTime::parse_from_rfc3339(text)
                    .map(|at| at.with_timezone(&Utc))
                    .map_err(|_parse| self.malformed(key, "a timestamp"))
            }
            _ => Err(self.malformed(key, "a timestamp")),
        }
    }
}
