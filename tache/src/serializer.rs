use crate::domain::Format;
use serde::de::value::SeqDeserializer;
use serde::de::{self, DeserializeOwned, Visitor};
use serde::ser;
use serde::{Serialize, forward_to_deserialize_any};
use serde_json::Value;
use shared::{Error, Result};

/// Encodes application values into payloads and back, in one fixed [`Format`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Serializer {
    format: Format,
}

impl Serializer {
    pub fn new(format: Format) -> Self {
        Self { format }
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        self.encode_marked(value).map(|(payload, _)| payload)
    }

    /// Encode `value`, also reporting whether it is "nothing" (serializes to null).
    ///
    /// Values JSON would silently turn into null are rejected: non-finite
    /// floats, and a `Some` around a null such as `Some(None)`. Neither would
    /// decode back to what was stored, so `Option<Option<T>>` is not cacheable
    /// once the inner option is `None`.
    pub(crate) fn encode_marked<T: Serialize + ?Sized>(&self, value: &T) -> Result<(Vec<u8>, bool)> {
        let nothing = value.serialize(NullCheck).map_err(serialization)?;
        let value = serde_json::to_value(value).map_err(serialization)?;
        let payload = match self.format {
            Format::Structured => serde_json::to_vec(&value).map_err(serialization)?,
            Format::Bytes => raw_bytes(value)?,
        };
        Ok((payload, nothing))
    }

    pub fn decode<T: DeserializeOwned>(&self, payload: &[u8]) -> Result<T> {
        match self.format {
            Format::Structured => serde_json::from_slice(payload).map_err(serialization),
            Format::Bytes => T::deserialize(RawBytes(payload)).map_err(serialization),
        }
    }
}

fn serialization(err: impl std::fmt::Display) -> Error {
    Error::Serialization(err.to_string())
}

fn raw_bytes(value: Value) -> Result<Vec<u8>> {
    match value {
        Value::String(text) => Ok(text.into_bytes()),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|n| u8::try_from(n).ok())
                    .ok_or_else(|| {
                        Error::Serialization(format!("BYTES format expects bytes, found element {item}"))
                    })
            })
            .collect(),
        other => Err(Error::Serialization(format!(
            "BYTES format expects a byte sequence, found {}",
            kind(&other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Walks a value and reports whether it serializes to null, failing on the
/// shapes JSON cannot round-trip.
struct NullCheck;

type CheckResult = std::result::Result<bool, de::value::Error>;

fn not_null<T: Serialize + ?Sized>(value: &T) -> std::result::Result<(), de::value::Error> {
    value.serialize(NullCheck).map(|_| ())
}

fn finite(value: f64) -> CheckResult {
    if value.is_finite() {
        Ok(false)
    } else {
        Err(ser::Error::custom(format!("{value} has no JSON representation")))
    }
}

impl ser::Serializer for NullCheck {
    type Ok = bool;
    type Error = de::value::Error;
    type SerializeSeq = NullCheck;
    type SerializeTuple = NullCheck;
    type SerializeTupleStruct = NullCheck;
    type SerializeTupleVariant = NullCheck;
    type SerializeMap = NullCheck;
    type SerializeStruct = NullCheck;
    type SerializeStructVariant = NullCheck;

    fn serialize_bool(self, _v: bool) -> CheckResult {
        Ok(false)
    }
    fn serialize_i8(self, _v: i8) -> CheckResult {
        Ok(false)
    }
    fn serialize_i16(self, _v: i16) -> CheckResult {
        Ok(false)
    }
    fn serialize_i32(self, _v: i32) -> CheckResult {
        Ok(false)
    }
    fn serialize_i64(self, _v: i64) -> CheckResult {
        Ok(false)
    }
    fn serialize_i128(self, _v: i128) -> CheckResult {
        Ok(false)
    }
    fn serialize_u8(self, _v: u8) -> CheckResult {
        Ok(false)
    }
    fn serialize_u16(self, _v: u16) -> CheckResult {
        Ok(false)
    }
    fn serialize_u32(self, _v: u32) -> CheckResult {
        Ok(false)
    }
    fn serialize_u64(self, _v: u64) -> CheckResult {
        Ok(false)
    }
    fn serialize_u128(self, _v: u128) -> CheckResult {
        Ok(false)
    }
    fn serialize_f32(self, v: f32) -> CheckResult {
        finite(f64::from(v))
    }
    fn serialize_f64(self, v: f64) -> CheckResult {
        finite(v)
    }
    fn serialize_char(self, _v: char) -> CheckResult {
        Ok(false)
    }
    fn serialize_str(self, _v: &str) -> CheckResult {
        Ok(false)
    }
    fn serialize_bytes(self, _v: &[u8]) -> CheckResult {
        Ok(false)
    }
    fn serialize_none(self) -> CheckResult {
        Ok(true)
    }
    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> CheckResult {
        if value.serialize(NullCheck)? {
            return Err(ser::Error::custom(
                "Some around a null value is indistinguishable from None",
            ));
        }
        Ok(false)
    }
    fn serialize_unit(self) -> CheckResult {
        Ok(true)
    }
    fn serialize_unit_struct(self, _name: &'static str) -> CheckResult {
        Ok(true)
    }
    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
    ) -> CheckResult {
        Ok(false)
    }
    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> CheckResult {
        value.serialize(NullCheck)
    }
    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        value: &T,
    ) -> CheckResult {
        not_null(value)?;
        Ok(false)
    }
    fn serialize_seq(self, _len: Option<usize>) -> std::result::Result<NullCheck, Self::Error> {
        Ok(NullCheck)
    }
    fn serialize_tuple(self, _len: usize) -> std::result::Result<NullCheck, Self::Error> {
        Ok(NullCheck)
    }
    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> std::result::Result<NullCheck, Self::Error> {
        Ok(NullCheck)
    }
    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> std::result::Result<NullCheck, Self::Error> {
        Ok(NullCheck)
    }
    fn serialize_map(self, _len: Option<usize>) -> std::result::Result<NullCheck, Self::Error> {
        Ok(NullCheck)
    }
    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> std::result::Result<NullCheck, Self::Error> {
        Ok(NullCheck)
    }
    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> std::result::Result<NullCheck, Self::Error> {
        Ok(NullCheck)
    }
}

impl ser::SerializeSeq for NullCheck {
    type Ok = bool;
    type Error = de::value::Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> std::result::Result<(), Self::Error> {
        not_null(value)
    }
    fn end(self) -> CheckResult {
        Ok(false)
    }
}

impl ser::SerializeTuple for NullCheck {
    type Ok = bool;
    type Error = de::value::Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> std::result::Result<(), Self::Error> {
        not_null(value)
    }
    fn end(self) -> CheckResult {
        Ok(false)
    }
}

impl ser::SerializeTupleStruct for NullCheck {
    type Ok = bool;
    type Error = de::value::Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> std::result::Result<(), Self::Error> {
        not_null(value)
    }
    fn end(self) -> CheckResult {
        Ok(false)
    }
}

impl ser::SerializeTupleVariant for NullCheck {
    type Ok = bool;
    type Error = de::value::Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> std::result::Result<(), Self::Error> {
        not_null(value)
    }
    fn end(self) -> CheckResult {
        Ok(false)
    }
}

impl ser::SerializeMap for NullCheck {
    type Ok = bool;
    type Error = de::value::Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> std::result::Result<(), Self::Error> {
        not_null(key)
    }
    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> std::result::Result<(), Self::Error> {
        not_null(value)
    }
    fn end(self) -> CheckResult {
        Ok(false)
    }
}

impl ser::SerializeStruct for NullCheck {
    type Ok = bool;
    type Error = de::value::Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> std::result::Result<(), Self::Error> {
        not_null(value)
    }
    fn end(self) -> CheckResult {
        Ok(false)
    }
}

impl ser::SerializeStructVariant for NullCheck {
    type Ok = bool;
    type Error = de::value::Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> std::result::Result<(), Self::Error> {
        not_null(value)
    }
    fn end(self) -> CheckResult {
        Ok(false)
    }
}

/// Hands a raw payload to whatever byte-like type is asking for it
struct RawBytes<'a>(&'a [u8]);

impl<'de> de::Deserializer<'de> for RawBytes<'_> {
    type Error = de::value::Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, Self::Error> {
        visitor.visit_seq(SeqDeserializer::new(self.0.iter().copied()))
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, Self::Error> {
        visitor.visit_bytes(self.0)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, Self::Error> {
        visitor.visit_byte_buf(self.0.to_vec())
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, Self::Error> {
        match std::str::from_utf8(self.0) {
            Ok(text) => visitor.visit_str(text),
            Err(err) => Err(de::Error::custom(format!("payload is not UTF-8: {err}"))),
        }
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char
        option unit unit_struct newtype_struct seq tuple tuple_struct
        map struct enum identifier ignored_any
    }
}
