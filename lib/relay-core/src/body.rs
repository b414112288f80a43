//! Request payloads and JSON encoding.

use std::fmt;
use std::io::Read;

use bytes::Bytes;
use serde_json::Value;

use crate::{BoxError, ErrorKind, Result, Values};

/// Content types set by the default request transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// `application/json;charset=utf-8`.
    Json,
    /// `application/x-www-form-urlencoded;charset=utf-8`.
    FormUrlEncoded,
}

impl ContentType {
    /// Get the header value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "application/json;charset=utf-8",
            Self::FormUrlEncoded => "application/x-www-form-urlencoded;charset=utf-8",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request payload.
///
/// Request transforms turn any variant into [`Body::Bytes`] (or leave a
/// [`Body::Reader`] to be drained) before the request goes on the wire.
pub enum Body {
    /// Raw bytes, sent as is.
    Bytes(Bytes),
    /// UTF-8 text, sent as is.
    Text(String),
    /// Form fields, URL-encoded by the default transform.
    Form(Values),
    /// Structured data, JSON-encoded by the default transform.
    Structured(Value),
    /// Arbitrary reader, drained into bytes.
    ///
    /// Draining is a blocking read on the task sending the request: use
    /// in-memory readers, and load files up front with `tokio::fs`.
    Reader(Box<dyn Read + Send + Sync>),
}

impl Body {
    /// Structured body from any serializable value.
    ///
    /// Field order is kept as declared.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented as JSON.
    ///
    /// # Example
    ///
    /// ```
    /// use relay_core::Body;
    /// use serde::Serialize;
    ///
    /// #[derive(Serialize)]
    /// struct User { name: String, count: u32 }
    ///
    /// let body = Body::json(&User { name: "n".to_string(), count: 10 }).expect("json");
    /// assert!(matches!(body, Body::Structured(_)));
    /// ```
    pub fn json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Self> {
        let value = serde_json::to_value(value).map_err(ErrorKind::from)?;
        Ok(Self::Structured(value))
    }

    /// Body from any reader, see [`Body::Reader`].
    #[must_use]
    pub fn reader(reader: impl Read + Send + Sync + 'static) -> Self {
        Self::Reader(Box::new(reader))
    }

    /// Variant name, used in logs and cURL rendering.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Bytes(_) => "bytes",
            Self::Text(_) => "text",
            Self::Form(_) => "form",
            Self::Structured(_) => "structured",
            Self::Reader(_) => "reader",
        }
    }

    /// Copy of the body; `None` for a reader, which can only be read once.
    #[must_use]
    pub fn try_clone(&self) -> Option<Self> {
        match self {
            Self::Bytes(bytes) => Some(Self::Bytes(bytes.clone())),
            Self::Text(text) => Some(Self::Text(text.clone())),
            Self::Form(values) => Some(Self::Form(values.clone())),
            Self::Structured(value) => Some(Self::Structured(value.clone())),
            Self::Reader(_) => None,
        }
    }

    /// Borrow the encoded bytes, if already encoded.
    #[must_use]
    pub const fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(bytes).finish(),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Form(values) => f.debug_tuple("Form").field(values).finish(),
            Self::Structured(value) => f.debug_tuple("Structured").field(value).finish(),
            Self::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Body {
    fn from(bytes: &'static [u8]) -> Self {
        Self::Bytes(Bytes::from_static(bytes))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Values> for Body {
    fn from(values: Values) -> Self {
        Self::Form(values)
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Self::Structured(value)
    }
}

// ============================================================================
// JSON codec
// ============================================================================

/// Pluggable JSON marshal/unmarshal pair used by an instance.
pub trait JsonCodec: Send + Sync {
    /// Encode a structured value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded.
    fn marshal(&self, value: &Value) -> std::result::Result<Bytes, BoxError>;

    /// Decode bytes into a structured value.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not valid JSON.
    fn unmarshal(&self, bytes: &[u8]) -> std::result::Result<Value, BoxError>;
}

/// Default codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeJson;

impl JsonCodec for SerdeJson {
    fn marshal(&self, value: &Value) -> std::result::Result<Bytes, BoxError> {
        Ok(serde_json::to_vec(value).map(Bytes::from)?)
    }

    fn unmarshal(&self, bytes: &[u8]) -> std::result::Result<Value, BoxError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Deserialize JSON bytes to a value with path-aware error messages.
///
/// Uses `serde_path_to_error` so the error names the exact field that
/// failed (e.g., "user.address.city").
///
/// # Errors
///
/// Returns an error if JSON deserialization fails.
pub fn from_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(&mut deserializer)
        .map_err(|e| ErrorKind::json_deserialization(e.path().to_string(), e.inner().to_string()).into())
}

/// Deserialize a structured value with path-aware error messages.
///
/// # Errors
///
/// Returns an error if the value does not match `T`.
pub fn from_value<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
    serde_path_to_error::deserialize(value)
        .map_err(|e| ErrorKind::json_deserialization(e.path().to_string(), e.inner().to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_clone_skips_readers() {
        let body = Body::from("text");
        assert!(matches!(body.try_clone(), Some(Body::Text(text)) if text == "text"));
        assert!(Body::reader(&b"once"[..]).try_clone().is_none());
    }

    #[test]
    fn content_type_as_str() {
        assert_eq!(ContentType::Json.as_str(), "application/json;charset=utf-8");
        assert_eq!(
            ContentType::FormUrlEncoded.to_string(),
            "application/x-www-form-urlencoded;charset=utf-8"
        );
    }

    #[test]
    fn json_body_keeps_field_order() {
        #[derive(serde::Serialize)]
        struct User {
            name: String,
            count: u32,
        }

        let body = Body::json(&User {
            name: "n".to_string(),
            count: 10,
        })
        .expect("json");
        let Body::Structured(value) = body else {
            panic!("expected structured body");
        };
        let bytes = SerdeJson.marshal(&value).expect("marshal");
        assert_eq!(bytes.as_ref(), br#"{"name":"n","count":10}"#);
    }

    #[test]
    fn body_conversions() {
        assert_eq!(Body::from("hi").kind(), "text");
        assert_eq!(Body::from(vec![1_u8, 2]).kind(), "bytes");
        assert_eq!(Body::from(Values::new()).kind(), "form");
        assert_eq!(Body::from(serde_json::json!({"a": 1})).kind(), "structured");
        assert_eq!(Body::reader(std::io::empty()).kind(), "reader");
        assert_eq!(
            Body::from(Bytes::from_static(b"x")).as_bytes(),
            Some(&Bytes::from_static(b"x"))
        );
    }

    #[test]
    fn serde_json_codec_rejects_invalid() {
        assert!(SerdeJson.unmarshal(b"not json").is_err());
        let value = SerdeJson.unmarshal(br#"{"id":1}"#).expect("unmarshal");
        assert_eq!(value["id"], 1);
    }

    #[test]
    fn from_json_deserialize() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct User {
            name: String,
            age: u32,
        }

        let user: User = from_json(br#"{"name":"Alice","age":30}"#).expect("deserialize");
        assert_eq!(
            user,
            User {
                name: "Alice".to_string(),
                age: 30,
            }
        );
    }

    #[test]
    fn from_value_missing_field_error_with_path() {
        #[derive(Debug, serde::Deserialize)]
        struct Address {
            #[allow(dead_code)]
            city: String,
        }

        #[derive(Debug, serde::Deserialize)]
        struct User {
            #[allow(dead_code)]
            address: Address,
        }

        let err = from_value::<User>(serde_json::json!({"address": {}})).expect_err("should fail");
        let msg = err.to_string();
        assert!(msg.contains("address"), "Expected path 'address' in error: {msg}");
        assert!(msg.contains("city"), "Expected field 'city' mentioned in error: {msg}");
    }
}
