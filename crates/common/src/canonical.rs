//! Canonical serialization
//!
//! Deterministic byte encoding of tree-structured values. Signatures and
//! content hashes are always computed over these bytes, so two parties that
//! hold structurally equal values must produce identical encodings no matter
//! how the maps were built.
//!
//! # Encoding
//!
//! - JSON text with no incidental whitespace
//! - Map entries sorted by the byte order of their keys
//! - Integers in plain decimal; floats in the shortest form that round-trips,
//!   never with an exponent; integral floats are written as integers
//! - Strings escape only `"`, `\` and control characters; everything else
//!   is emitted as raw UTF-8
//!
//! Every call to [`serialize`] decodes its own output and re-encodes it. A
//! mismatch fails the call instead of handing out bytes that a peer could
//! not reproduce.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

mod value_ser;

/// Errors produced while building canonical bytes
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    /// The value cannot be represented in the canonical data model
    #[error("value is not representable canonically: {0}")]
    Unrepresentable(String),
    /// Canonical bytes failed to parse back into a value
    #[error("canonical bytes failed to decode: {0}")]
    Decode(#[from] serde_json::Error),
    /// Re-encoding the decoded bytes produced a different encoding
    #[error("canonical encoding failed its self-check")]
    SelfCheck,
}

/// A JSON number in the canonical data model
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    UInt(u64),
    /// Always finite; see [`Number::from_f64`]
    Float(f64),
}

impl Number {
    /// Build a float number, rejecting NaN and infinities
    pub fn from_f64(value: f64) -> Option<Self> {
        value.is_finite().then_some(Number::Float(value))
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(n) => n as f64,
            Number::UInt(n) => n as f64,
            Number::Float(f) => f,
        }
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        Number::Int(n)
    }
}

impl From<u64> for Number {
    fn from(n: u64) -> Self {
        Number::UInt(n)
    }
}

/// A closed tree of JSON-like values
///
/// Maps are `BTreeMap`s, so the in-memory order already matches the
/// canonical order and two maps with the same entries compare equal
/// regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Look up a key when this value is a map
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Number::Int(n))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = SerializationError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        Ok(match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Number(Number::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Value::Number(Number::UInt(u))
                } else {
                    let f = n.as_f64().ok_or_else(|| {
                        SerializationError::Unrepresentable(format!("number {}", n))
                    })?;
                    Value::Number(Number::from_f64(f).ok_or_else(|| {
                        SerializationError::Unrepresentable(format!("non-finite number {}", f))
                    })?)
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| Ok((k, Value::try_from(v)?)))
                    .collect::<Result<_, SerializationError>>()?,
            ),
        })
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::{SerializeMap, SerializeSeq};

        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(Number::Int(n)) => serializer.serialize_i64(*n),
            Value::Number(Number::UInt(n)) => serializer.serialize_u64(*n),
            Value::Number(Number::Float(f)) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Value::try_from(raw).map_err(serde::de::Error::custom)
    }
}

/// Canonical encoding of a value
///
/// Only produced by [`serialize`], so holding one means the self-check
/// already passed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for CanonicalBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // always valid UTF-8, we only ever write JSON text
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// Convert any serde-serializable type into a [`Value`]
///
/// Non-finite floats and map keys that are not strings or integers are
/// [`SerializationError::Unrepresentable`].
pub fn to_value<T: Serialize + ?Sized>(data: &T) -> Result<Value, SerializationError> {
    data.serialize(value_ser::ValueSerializer)
}

/// Convert a [`Value`] into a typed structure
pub fn from_value<T: DeserializeOwned>(value: &Value) -> Result<T, serde_json::Error> {
    let raw = serde_json::to_value(value)?;
    serde_json::from_value(raw)
}

/// Serialize a value canonically, including the round-trip self-check
pub fn serialize(value: &Value) -> Result<CanonicalBytes, SerializationError> {
    let encoded = encode(value)?;

    let decoded = decode(&encoded)?;
    let reencoded = encode(&decoded)?;
    if reencoded != encoded {
        return Err(SerializationError::SelfCheck);
    }

    Ok(CanonicalBytes(encoded.into_bytes()))
}

/// Serialize any serde-serializable type canonically
pub fn serialize_data<T: Serialize + ?Sized>(data: &T) -> Result<CanonicalBytes, SerializationError> {
    serialize(&to_value(data)?)
}

/// Parse JSON bytes back into a [`Value`]
pub fn decode(bytes: impl AsRef<[u8]>) -> Result<Value, SerializationError> {
    let raw: serde_json::Value = serde_json::from_slice(bytes.as_ref())?;
    Value::try_from(raw)
}

fn encode(value: &Value) -> Result<String, SerializationError> {
    let mut out = String::new();
    write_value(&mut out, value)?;
    Ok(out)
}

fn write_value(out: &mut String, value: &Value) -> Result<(), SerializationError> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => write_number(out, n)?,
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item)?;
            }
            out.push(']');
        }
        Value::Map(entries) => {
            out.push('{');
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, k);
                out.push(':');
                write_value(out, v)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_number(out: &mut String, number: &Number) -> Result<(), SerializationError> {
    match *number {
        Number::Int(n) => {
            let _ = write!(out, "{}", n);
        }
        Number::UInt(n) => {
            let _ = write!(out, "{}", n);
        }
        Number::Float(f) => {
            if !f.is_finite() {
                return Err(SerializationError::Unrepresentable(format!(
                    "non-finite number {}",
                    f
                )));
            }
            // -0.0 and 0.0 collapse to one spelling
            if f == 0.0 {
                out.push('0');
            } else {
                let _ = write!(out, "{}", f);
            }
        }
    }
    Ok(())
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod test {
    use super::*;

    fn map(entries: &[(&str, Value)]) -> Value {
        Value::Map(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let a: serde_json::Value =
            serde_json::from_str(r#"{"zeta": 1, "alpha": {"b": true, "a": null}}"#).unwrap();
        let b: serde_json::Value =
            serde_json::from_str(r#"{"alpha": {"a": null, "b": true}, "zeta": 1}"#).unwrap();

        let a = serialize(&Value::try_from(a).unwrap()).unwrap();
        let b = serialize(&Value::try_from(b).unwrap()).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.to_string(), r#"{"alpha":{"a":null,"b":true},"zeta":1}"#);
    }

    #[test]
    fn test_no_whitespace_and_sorted_keys() {
        let value = map(&[
            ("b", Value::from(vec![Value::from(1i64), Value::from("x")])),
            ("a", Value::from("hello world")),
        ]);
        let bytes = serialize(&value).unwrap();
        assert_eq!(bytes.to_string(), r#"{"a":"hello world","b":[1,"x"]}"#);
    }

    #[test]
    fn test_keys_sort_by_bytes() {
        let value = map(&[("é", Value::Null), ("z", Value::Null), ("Z", Value::Null)]);
        let bytes = serialize(&value).unwrap();
        assert_eq!(bytes.to_string(), r#"{"Z":null,"z":null,"é":null}"#);
    }

    #[test]
    fn test_string_escaping() {
        let value = Value::from("quote\" backslash\\ newline\n bell\u{07} ünïcode");
        let bytes = serialize(&value).unwrap();
        assert_eq!(
            bytes.to_string(),
            "\"quote\\\" backslash\\\\ newline\\n bell\\u0007 ünïcode\""
        );
    }

    #[test]
    fn test_numbers() {
        let cases = [
            (Value::Number(Number::Int(-42)), "-42"),
            (Value::Number(Number::UInt(u64::MAX)), "18446744073709551615"),
            (Value::Number(Number::Float(2.0)), "2"),
            (Value::Number(Number::Float(-0.0)), "0"),
            (Value::Number(Number::Float(0.1)), "0.1"),
            (Value::Number(Number::Float(1e21)), "1000000000000000000000"),
        ];
        for (value, expected) in cases {
            assert_eq!(serialize(&value).unwrap().to_string(), expected);
        }
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(Number::from_f64(f64::NAN).is_none());
        assert!(Number::from_f64(f64::INFINITY).is_none());

        let smuggled = Value::Number(Number::Float(f64::NAN));
        assert!(matches!(
            serialize(&smuggled),
            Err(SerializationError::Unrepresentable(_))
        ));
    }

    #[test]
    fn test_reserialize_is_idempotent() {
        let value = map(&[
            ("float", Value::Number(Number::Float(1234.5678))),
            ("tiny", Value::Number(Number::Float(1.5e-7))),
            ("nested", Value::from(vec![map(&[("k", Value::from(true))])])),
        ]);
        let first = serialize(&value).unwrap();
        let second = serialize(&decode(&first).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_serialize_data_struct() {
        #[derive(Serialize)]
        struct Example {
            zebra: u32,
            apple: Option<String>,
        }
        let bytes = serialize_data(&Example {
            zebra: 7,
            apple: None,
        })
        .unwrap();
        assert_eq!(bytes.to_string(), r#"{"apple":null,"zebra":7}"#);
    }

    #[test]
    fn test_non_finite_fields_fail() {
        #[derive(Serialize)]
        struct Reading {
            sensor: &'static str,
            celsius: f64,
        }
        for celsius in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let result = serialize_data(&Reading {
                sensor: "attic",
                celsius,
            });
            assert!(matches!(
                result,
                Err(SerializationError::Unrepresentable(_))
            ));
        }
        assert!(matches!(
            to_value(&vec![1.0f32, f32::NAN]),
            Err(SerializationError::Unrepresentable(_))
        ));
        assert!(matches!(
            to_value(&BTreeMap::from([("k", Some(f64::INFINITY))])),
            Err(SerializationError::Unrepresentable(_))
        ));
    }

    #[test]
    fn test_to_value_shapes() {
        #[derive(Serialize)]
        enum Event {
            Started,
            Moved(i32),
            Resized { w: u16, h: u16 },
        }
        let value = to_value(&(
            Event::Started,
            Event::Moved(-3),
            Event::Resized { w: 2, h: 1 },
        ))
        .unwrap();
        assert_eq!(
            serialize(&value).unwrap().to_string(),
            r#"["Started",{"Moved":-3},{"Resized":{"h":1,"w":2}}]"#
        );

        // integer map keys are spelled as decimal strings
        let value = to_value(&BTreeMap::from([(10u8, 'x'), (2u8, 'y')])).unwrap();
        assert_eq!(serialize(&value).unwrap().to_string(), r#"{"10":"x","2":"y"}"#);

        assert_eq!(
            to_value(&u64::MAX).unwrap(),
            Value::Number(Number::UInt(u64::MAX))
        );
        assert_eq!(to_value(&5u64).unwrap(), Value::Number(Number::Int(5)));
        assert!(to_value(&BTreeMap::from([(vec![1u8], 1)])).is_err());
    }

    #[test]
    fn test_from_value_roundtrip() {
        let value = map(&[("name", Value::from("svc")), ("port", Value::from(8080i64))]);

        #[derive(Deserialize, Debug, PartialEq)]
        struct Target {
            name: String,
            port: u16,
        }
        let target: Target = from_value(&value).unwrap();
        assert_eq!(
            target,
            Target {
                name: "svc".to_string(),
                port: 8080
            }
        );
    }
}
