//! `Value` to native values, through serde.
//!
//! # Design
//! The caller's target type drives interpretation. Struct targets match
//! member names case-sensitively, skip members they do not declare and get
//! the zero value for declared fields the response left out. The zero
//! values come from `ZeroDeserializer`, which answers every serde request
//! with the type's empty form, so nested structs are zero-filled too.
//!
//! A bare value decodes into a struct that declares exactly one field by
//! placing it in that field, which keeps one-field result wrappers working
//! alongside plain scalar destinations.

use serde::de::value::StringDeserializer;
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, EnumAccess, IntoDeserializer, MapAccess, SeqAccess,
    Unexpected, VariantAccess, Visitor,
};
use serde::forward_to_deserialize_any;

use crate::error::{Result, XmlRpcError};
use crate::value::{DateTime, Struct, Value, DATETIME_TOKEN};

/// Decode a value into any deserializable type.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    T::deserialize(ValueDeserializer(value))
}

fn unexpected(value: &Value) -> Unexpected<'_> {
    match value {
        Value::Int(i) => Unexpected::Signed(i64::from(*i)),
        Value::Boolean(b) => Unexpected::Bool(*b),
        Value::String(s) => Unexpected::Str(s),
        Value::Double(d) => Unexpected::Float(*d),
        Value::DateTime(_) => Unexpected::Other("dateTime.iso8601"),
        Value::Base64(bytes) => Unexpected::Bytes(bytes),
        Value::Array(_) => Unexpected::Seq,
        Value::Struct(_) => Unexpected::Map,
        Value::Nil => Unexpected::Unit,
    }
}

fn key(name: String) -> StringDeserializer<XmlRpcError> {
    name.into_deserializer()
}

struct ValueDeserializer(Value);

impl<'de> de::Deserializer<'de> for ValueDeserializer {
    type Error = XmlRpcError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.0 {
            Value::Int(i) => visitor.visit_i32(i),
            Value::Boolean(b) => visitor.visit_bool(b),
            Value::String(s) => visitor.visit_string(s),
            Value::Double(d) => visitor.visit_f64(d),
            Value::DateTime(dt) => visitor.visit_string(dt.to_iso8601()),
            Value::Base64(bytes) => visitor.visit_byte_buf(bytes),
            Value::Array(items) => visitor.visit_seq(ArrayAccess::new(items)),
            Value::Struct(members) => visitor.visit_map(MemberAccess::new(members)),
            Value::Nil => visitor.visit_unit(),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.0 {
            Value::Nil => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    /// "No result expected": any value is accepted and dropped.
    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        if name != DATETIME_TOKEN {
            return visitor.visit_newtype_struct(self);
        }
        match self.0 {
            Value::DateTime(dt) => visitor.visit_string(dt.to_iso8601()),
            Value::String(s) => visitor.visit_string(s),
            other => Err(de::Error::invalid_type(unexpected(&other), &visitor)),
        }
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.0 {
            Value::Base64(bytes) => {
                let items = bytes.into_iter().map(|b| Value::Int(i32::from(b))).collect();
                visitor.visit_seq(ArrayAccess::new(items))
            }
            _ => self.deserialize_any(visitor),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value> {
        match self.0 {
            Value::Array(items) if items.len() != len => {
                Err(de::Error::invalid_length(items.len(), &visitor))
            }
            Value::Base64(bytes) if bytes.len() != len => {
                Err(de::Error::invalid_length(bytes.len(), &visitor))
            }
            _ => self.deserialize_seq(visitor),
        }
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_tuple(len, visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.0 {
            Value::Struct(members) => visitor.visit_map(MemberAccess::new(members)),
            other => Err(de::Error::invalid_type(unexpected(&other), &visitor)),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        match self.0 {
            Value::Struct(members) => visitor.visit_map(StructAccess::new(members, fields)),
            Value::Nil => visitor.visit_map(StructAccess::new(Struct::new(), fields)),
            other if fields.len() == 1 => {
                let mut wrapped = Struct::new();
                wrapped.insert(fields[0], other);
                visitor.visit_map(StructAccess::new(wrapped, fields))
            }
            other => Err(de::Error::invalid_type(unexpected(&other), &visitor)),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        match self.0 {
            Value::String(variant) => visitor.visit_enum(key(variant)),
            Value::Struct(members) if members.len() == 1 => {
                let mut members = members.into_iter();
                match members.next() {
                    Some((variant, value)) => visitor.visit_enum(VariantDeserializer { variant, value }),
                    None => Err(XmlRpcError::Decoding(format!("empty variant for enum {name}"))),
                }
            }
            other => Err(de::Error::invalid_type(unexpected(&other), &visitor)),
        }
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_byte_buf(visitor)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.0 {
            Value::Base64(bytes) => visitor.visit_byte_buf(bytes),
            _ => self.deserialize_any(visitor),
        }
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string identifier
    }
}

struct ArrayAccess {
    items: std::vec::IntoIter<Value>,
}

impl ArrayAccess {
    fn new(items: Vec<Value>) -> Self {
        Self {
            items: items.into_iter(),
        }
    }
}

impl<'de> SeqAccess<'de> for ArrayAccess {
    type Error = XmlRpcError;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>> {
        match self.items.next() {
            Some(value) => seed.deserialize(ValueDeserializer(value)).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}

/// Every member, for map targets.
struct MemberAccess {
    members: std::vec::IntoIter<(String, Value)>,
    pending: Option<Value>,
}

impl MemberAccess {
    fn new(members: Struct) -> Self {
        Self {
            members: members.into_iter(),
            pending: None,
        }
    }
}

impl<'de> MapAccess<'de> for MemberAccess {
    type Error = XmlRpcError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        match self.members.next() {
            Some((name, value)) => {
                self.pending = Some(value);
                seed.deserialize(key(name)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<T::Value> {
        match self.pending.take() {
            Some(value) => seed.deserialize(ValueDeserializer(value)),
            None => Err(XmlRpcError::Decoding("member value requested before its name".into())),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.members.len())
    }
}

enum Slot {
    Present(Value),
    Zero,
}

/// Declared fields only: present members first, then zero values for the
/// fields the response omitted.
struct StructAccess {
    entries: std::vec::IntoIter<(String, Slot)>,
    pending: Option<Slot>,
}

impl StructAccess {
    fn new(members: Struct, fields: &'static [&'static str]) -> Self {
        let mut entries: Vec<(String, Slot)> = members
            .into_iter()
            .filter(|(name, _)| fields.contains(&name.as_str()))
            .map(|(name, value)| (name, Slot::Present(value)))
            .collect();
        for field in fields {
            if !entries.iter().any(|(name, _)| name == field) {
                entries.push((field.to_string(), Slot::Zero));
            }
        }
        Self {
            entries: entries.into_iter(),
            pending: None,
        }
    }
}

impl<'de> MapAccess<'de> for StructAccess {
    type Error = XmlRpcError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        match self.entries.next() {
            Some((name, slot)) => {
                self.pending = Some(slot);
                seed.deserialize(key(name)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<T::Value> {
        match self.pending.take() {
            Some(Slot::Present(value)) => seed.deserialize(ValueDeserializer(value)),
            Some(Slot::Zero) => seed.deserialize(ZeroDeserializer),
            None => Err(XmlRpcError::Decoding("member value requested before its name".into())),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}

struct VariantDeserializer {
    variant: String,
    value: Value,
}

impl<'de> EnumAccess<'de> for VariantDeserializer {
    type Error = XmlRpcError;
    type Variant = VariantValue;

    fn variant_seed<V: DeserializeSeed<'de>>(self, seed: V) -> Result<(V::Value, VariantValue)> {
        let tag = seed.deserialize(key(self.variant))?;
        Ok((tag, VariantValue(self.value)))
    }
}

struct VariantValue(Value);

impl<'de> VariantAccess<'de> for VariantValue {
    type Error = XmlRpcError;

    fn unit_variant(self) -> Result<()> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value> {
        seed.deserialize(ValueDeserializer(self.0))
    }

    fn tuple_variant<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value> {
        de::Deserializer::deserialize_tuple(ValueDeserializer(self.0), len, visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        de::Deserializer::deserialize_struct(ValueDeserializer(self.0), "", fields, visitor)
    }
}

/// Produces the zero value of whatever type asks.
struct ZeroDeserializer;

struct ZeroTuple {
    remaining: usize,
}

impl<'de> SeqAccess<'de> for ZeroTuple {
    type Error = XmlRpcError;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        seed.deserialize(ZeroDeserializer).map(Some)
    }
}

macro_rules! zero_int {
    ($($method:ident)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
                visitor.visit_i32(0)
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for ZeroDeserializer {
    type Error = XmlRpcError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }

    zero_int! {
        deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64 deserialize_i128
        deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64 deserialize_u128
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_bool(false)
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_f64(0.0)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_f64(0.0)
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_char('\0')
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_str("")
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_str("")
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_bytes(&[])
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_bytes(&[])
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_none()
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        if name == DATETIME_TOKEN {
            visitor.visit_string(DateTime::default().to_iso8601())
        } else {
            visitor.visit_newtype_struct(self)
        }
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_seq(ArrayAccess::new(Vec::new()))
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value> {
        visitor.visit_seq(ZeroTuple { remaining: len })
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_tuple(len, visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_map(MemberAccess::new(Struct::new()))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_map(StructAccess::new(Struct::new(), fields))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value> {
        Err(XmlRpcError::Decoding(format!(
            "missing member of enum type {name} has no zero value"
        )))
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_str("")
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }
}
