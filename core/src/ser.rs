//! Native values to `Value`, through serde.
//!
//! Integers of every width are range-checked into the 32-bit `int` the
//! protocol defines; nothing is truncated silently. Struct fields that
//! encode to `Nil` (a `None` field, a unit) are left out, so an absent
//! optional field stays absent on the wire. Map entries always keep their
//! value, `<nil/>` included, since a map has no field list to restore them
//! from.

use serde::ser::{self, Serialize};

use crate::error::{Result, XmlRpcError};
use crate::value::{DateTime, Struct, Value, DATETIME_TOKEN};

/// Encode any serializable value.
pub fn to_value<T: ?Sized + Serialize>(value: &T) -> Result<Value> {
    value.serialize(ValueSerializer)
}

/// Encode a call's arguments as a param list.
///
/// Unit and `None` mean "no arguments" and yield the empty list; anything
/// else becomes exactly one param.
pub fn to_params<T: ?Sized + Serialize>(args: &T) -> Result<Vec<Value>> {
    match to_value(args)? {
        Value::Nil => Ok(Vec::new()),
        value => Ok(vec![value]),
    }
}

fn int<N>(v: N) -> Result<Value>
where
    N: Copy + std::fmt::Display + TryInto<i32>,
{
    v.try_into().map(Value::Int).map_err(|_| {
        XmlRpcError::Encoding(format!(
            "integer {v} is out of range for XML-RPC int (32-bit signed)"
        ))
    })
}

struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = XmlRpcError;

    type SerializeSeq = SerializeArray;
    type SerializeTuple = SerializeArray;
    type SerializeTupleStruct = SerializeArray;
    type SerializeTupleVariant = SerializeArrayVariant;
    type SerializeMap = SerializeMembers;
    type SerializeStruct = SerializeMembers;
    type SerializeStructVariant = SerializeMembersVariant;

    fn serialize_bool(self, v: bool) -> Result<Value> {
        Ok(Value::Boolean(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value> {
        Ok(Value::Int(i32::from(v)))
    }

    fn serialize_i16(self, v: i16) -> Result<Value> {
        Ok(Value::Int(i32::from(v)))
    }

    fn serialize_i32(self, v: i32) -> Result<Value> {
        Ok(Value::Int(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Value> {
        int(v)
    }

    fn serialize_i128(self, v: i128) -> Result<Value> {
        int(v)
    }

    fn serialize_u8(self, v: u8) -> Result<Value> {
        Ok(Value::Int(i32::from(v)))
    }

    fn serialize_u16(self, v: u16) -> Result<Value> {
        Ok(Value::Int(i32::from(v)))
    }

    fn serialize_u32(self, v: u32) -> Result<Value> {
        int(v)
    }

    fn serialize_u64(self, v: u64) -> Result<Value> {
        int(v)
    }

    fn serialize_u128(self, v: u128) -> Result<Value> {
        int(v)
    }

    fn serialize_f32(self, v: f32) -> Result<Value> {
        self.serialize_f64(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Value> {
        if !v.is_finite() {
            return Err(XmlRpcError::Encoding(format!(
                "{v} cannot be represented as an XML-RPC double"
            )));
        }
        Ok(Value::Double(v))
    }

    fn serialize_char(self, v: char) -> Result<Value> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value> {
        Ok(Value::Base64(v.to_vec()))
    }

    fn serialize_none(self) -> Result<Value> {
        Ok(Value::Nil)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value> {
        Ok(Value::Nil)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value> {
        Ok(Value::Nil)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Value> {
        Ok(Value::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<Value> {
        if name != DATETIME_TOKEN {
            return value.serialize(self);
        }
        match value.serialize(self)? {
            Value::String(text) => DateTime::parse(&text).map(Value::DateTime).ok_or_else(|| {
                XmlRpcError::Encoding(format!("invalid timestamp {text:?}"))
            }),
            other => Err(XmlRpcError::Encoding(format!(
                "timestamp must serialize as a string, found {}",
                other.type_name()
            ))),
        }
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value> {
        let mut members = Struct::new();
        members.insert(variant, to_value(value)?);
        Ok(Value::Struct(members))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SerializeArray> {
        Ok(SerializeArray {
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SerializeArray> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SerializeArray> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeArrayVariant> {
        Ok(SerializeArrayVariant {
            variant,
            items: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<SerializeMembers> {
        Ok(SerializeMembers {
            members: Struct::new(),
            next_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<SerializeMembers> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<SerializeMembersVariant> {
        Ok(SerializeMembersVariant {
            variant,
            members: Struct::new(),
        })
    }
}

struct SerializeArray {
    items: Vec<Value>,
}

impl ser::SerializeSeq for SerializeArray {
    type Ok = Value;
    type Error = XmlRpcError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.items.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Array(self.items))
    }
}

impl ser::SerializeTuple for SerializeArray {
    type Ok = Value;
    type Error = XmlRpcError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SerializeArray {
    type Ok = Value;
    type Error = XmlRpcError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        ser::SerializeSeq::end(self)
    }
}

struct SerializeArrayVariant {
    variant: &'static str,
    items: Vec<Value>,
}

impl ser::SerializeTupleVariant for SerializeArrayVariant {
    type Ok = Value;
    type Error = XmlRpcError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.items.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        let mut members = Struct::new();
        members.insert(self.variant, Value::Array(self.items));
        Ok(Value::Struct(members))
    }
}

struct SerializeMembers {
    members: Struct,
    next_key: Option<String>,
}

fn member_name<T: ?Sized + Serialize>(key: &T) -> Result<String> {
    key.serialize(MemberNameSerializer)
}

fn bad_member_name(kind: &str) -> XmlRpcError {
    XmlRpcError::Encoding(format!("struct member names must be strings, found {kind}"))
}

/// Map keys become member names. Strings pass through and integers of any
/// width are stringified; the i32 limit applies to values, not names.
struct MemberNameSerializer;

macro_rules! name_from_display {
    ($($method:ident: $ty:ty)*) => {
        $(
            fn $method(self, v: $ty) -> Result<String> {
                Ok(v.to_string())
            }
        )*
    };
}

impl ser::Serializer for MemberNameSerializer {
    type Ok = String;
    type Error = XmlRpcError;

    type SerializeSeq = ser::Impossible<String, XmlRpcError>;
    type SerializeTuple = ser::Impossible<String, XmlRpcError>;
    type SerializeTupleStruct = ser::Impossible<String, XmlRpcError>;
    type SerializeTupleVariant = ser::Impossible<String, XmlRpcError>;
    type SerializeMap = ser::Impossible<String, XmlRpcError>;
    type SerializeStruct = ser::Impossible<String, XmlRpcError>;
    type SerializeStructVariant = ser::Impossible<String, XmlRpcError>;

    name_from_display! {
        serialize_i8: i8 serialize_i16: i16 serialize_i32: i32 serialize_i64: i64
        serialize_i128: i128 serialize_u8: u8 serialize_u16: u16 serialize_u32: u32
        serialize_u64: u64 serialize_u128: u128 serialize_char: char serialize_str: &str
    }

    fn serialize_bool(self, _v: bool) -> Result<String> {
        Err(bad_member_name("boolean"))
    }

    fn serialize_f32(self, _v: f32) -> Result<String> {
        Err(bad_member_name("double"))
    }

    fn serialize_f64(self, _v: f64) -> Result<String> {
        Err(bad_member_name("double"))
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<String> {
        Err(bad_member_name("base64"))
    }

    fn serialize_none(self) -> Result<String> {
        Err(bad_member_name("nil"))
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<String> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<String> {
        Err(bad_member_name("nil"))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<String> {
        Err(bad_member_name("nil"))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<String> {
        Ok(variant.to_string())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<String> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String> {
        Err(bad_member_name("struct"))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(bad_member_name("array"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(bad_member_name("array"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(bad_member_name("array"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(bad_member_name("struct"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(bad_member_name("struct"))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Err(bad_member_name("struct"))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(bad_member_name("struct"))
    }
}

impl ser::SerializeMap for SerializeMembers {
    type Ok = Value;
    type Error = XmlRpcError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<()> {
        self.next_key = Some(member_name(key)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        let name = self
            .next_key
            .take()
            .ok_or_else(|| XmlRpcError::Encoding("map value without a key".to_string()))?;
        // keyed maps have no declared fields to zero-fill, so Nil stays
        self.members.insert(name, to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Struct(self.members))
    }
}

impl ser::SerializeStruct for SerializeMembers {
    type Ok = Value;
    type Error = XmlRpcError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        let value = to_value(value)?;
        if !value.is_nil() {
            self.members.insert(key, value);
        }
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Struct(self.members))
    }
}

struct SerializeMembersVariant {
    variant: &'static str,
    members: Struct,
}

impl ser::SerializeStructVariant for SerializeMembersVariant {
    type Ok = Value;
    type Error = XmlRpcError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        let value = to_value(value)?;
        if !value.is_nil() {
            self.members.insert(key, value);
        }
        Ok(())
    }

    fn end(self) -> Result<Value> {
        let mut outer = Struct::new();
        outer.insert(self.variant, Value::Struct(self.members));
        Ok(Value::Struct(outer))
    }
}
