use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::JwtError;

/// The JSON object a token asserts.
///
/// Built from a buffered response body on issuance, or decoded from a
/// verified token.  Any JSON value is allowed under any key; nothing about
/// registered claims (`exp`, `iat`, ...) is interpreted.
///
/// ```rust
/// use axum_jwt_filter::ClaimSet;
///
/// let claims = ClaimSet::from_json(br#"{"sub":"alice","admin":true}"#).unwrap();
/// assert_eq!(claims.subject(), Some("alice"));
/// assert_eq!(claims.to_string(), r#"{"admin":true,"sub":"alice"}"#);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(Map<String, Value>);

impl ClaimSet {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Parse `bytes` as a single UTF-8 JSON object.
    pub fn from_json(bytes: &[u8]) -> Result<Self, JwtError> {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(other) => Err(JwtError::InvalidIssuancePayload(format!(
                "expected an object, found {}",
                json_kind(&other)
            ))),
            Err(e) => Err(JwtError::InvalidIssuancePayload(e.to_string())),
        }
    }

    /// Base64 of the canonical JSON, as written into the trust header.
    pub fn to_header_value(&self) -> String {
        STANDARD.encode(self.to_string())
    }

    /// Inverse of [`to_header_value`](Self::to_header_value).
    pub fn from_header_value(value: &str) -> Result<Self, JwtError> {
        let json = STANDARD
            .decode(value.trim())
            .map_err(|_| JwtError::MissingClaims)?;
        match serde_json::from_slice::<Value>(&json) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            _ => Err(JwtError::MissingClaims),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    /// The `sub` claim, when it is a string.
    pub fn subject(&self) -> Option<&str> {
        self.get("sub").and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ClaimSet {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Canonical JSON: compact, keys in serde_json's sorted map order.
impl fmt::Display for ClaimSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
