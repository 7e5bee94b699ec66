//! The decoded MMDB data-section value type.
//!
//! Every leaf in the search tree resolves to a `Record`: the self-describing,
//! possibly nested value the MMDB data section encodes. `Pointer` is an
//! internal-only variant — decoding always resolves pointers before handing a
//! `Record` back to a caller, so it never reaches JSON serialization.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// A decoded MMDB data-section value.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Offset to another data item. Internal use only; never user-visible.
    #[doc(hidden)]
    Pointer(u32),
    /// UTF-8 string.
    String(String),
    /// IEEE 754 double precision float.
    Double(f64),
    /// Raw byte array.
    Bytes(Vec<u8>),
    /// Unsigned 16-bit integer.
    Uint16(u16),
    /// Unsigned 32-bit integer.
    Uint32(u32),
    /// Key-value map (string keys only, per MMDB spec).
    Map(HashMap<String, Record>),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Unsigned 64-bit integer.
    Uint64(u64),
    /// Unsigned 128-bit integer.
    Uint128(u128),
    /// Ordered sequence of values.
    Array(Vec<Record>),
    /// Boolean value.
    Bool(bool),
    /// IEEE 754 single precision float.
    Float(f32),
}

impl Record {
    /// Borrow as a string, if this is a `Record::String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Record::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as a map, if this is a `Record::Map`.
    pub fn as_map(&self) -> Option<&HashMap<String, Record>> {
        match self {
            Record::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow as an array, if this is a `Record::Array`.
    pub fn as_array(&self) -> Option<&[Record]> {
        match self {
            Record::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Widen any unsigned integer variant to `u64`, if this is one.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Record::Uint16(n) => Some(*n as u64),
            Record::Uint32(n) => Some(*n as u64),
            Record::Uint64(n) => Some(*n),
            _ => None,
        }
    }
}

// Custom serialization that excludes Pointer (internal format detail, never
// reaches a caller in practice since decoding always resolves pointers first).
impl serde::Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Record::Pointer(_) => Err(serde::ser::Error::custom(
                "Pointer is an internal type and cannot be serialized",
            )),
            Record::String(s) => serializer.serialize_str(s),
            Record::Double(d) => serializer.serialize_f64(*d),
            Record::Bytes(b) => serializer.serialize_bytes(b),
            Record::Uint16(n) => serializer.serialize_u16(*n),
            Record::Uint32(n) => serializer.serialize_u32(*n),
            Record::Map(m) => m.serialize(serializer),
            Record::Int32(n) => serializer.serialize_i32(*n),
            Record::Uint64(n) => serializer.serialize_u64(*n),
            Record::Uint128(n) => serializer.serialize_u128(*n),
            Record::Array(a) => a.serialize(serializer),
            Record::Bool(b) => serializer.serialize_bool(*b),
            Record::Float(f) => serializer.serialize_f32(*f),
        }
    }
}

impl<'de> serde::Deserialize<'de> for Record {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct RecordVisitor;

        impl<'de> serde::de::Visitor<'de> for RecordVisitor {
            type Value = Record;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a valid MMDB data value")
            }

            fn visit_bool<E>(self, v: bool) -> Result<Record, E> {
                Ok(Record::Bool(v))
            }

            fn visit_i32<E>(self, v: i32) -> Result<Record, E> {
                Ok(Record::Int32(v))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Record, E> {
                if v >= 0 {
                    if v <= u16::MAX as i64 {
                        Ok(Record::Uint16(v as u16))
                    } else if v <= u32::MAX as i64 {
                        Ok(Record::Uint32(v as u32))
                    } else {
                        Ok(Record::Uint64(v as u64))
                    }
                } else if v >= i32::MIN as i64 {
                    Ok(Record::Int32(v as i32))
                } else {
                    Ok(Record::Double(v as f64))
                }
            }

            fn visit_u64<E>(self, v: u64) -> Result<Record, E> {
                if v <= u16::MAX as u64 {
                    Ok(Record::Uint16(v as u16))
                } else if v <= u32::MAX as u64 {
                    Ok(Record::Uint32(v as u32))
                } else {
                    Ok(Record::Uint64(v))
                }
            }

            fn visit_f32<E>(self, v: f32) -> Result<Record, E> {
                Ok(Record::Float(v))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Record, E> {
                Ok(Record::Double(v))
            }

            fn visit_str<E>(self, v: &str) -> Result<Record, E> {
                Ok(Record::String(v.to_string()))
            }

            fn visit_string<E>(self, v: String) -> Result<Record, E> {
                Ok(Record::String(v))
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Record, E> {
                Ok(Record::Bytes(v.to_vec()))
            }

            fn visit_byte_buf<E>(self, v: Vec<u8>) -> Result<Record, E> {
                Ok(Record::Bytes(v))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Record, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let mut array = Vec::new();
                while let Some(value) = seq.next_element()? {
                    array.push(value);
                }
                Ok(Record::Array(array))
            }

            fn visit_map<A>(self, mut map: A) -> Result<Record, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut hash_map = HashMap::new();
                while let Some((key, value)) = map.next_entry()? {
                    hash_map.insert(key, value);
                }
                Ok(Record::Map(hash_map))
            }
        }

        deserializer.deserialize_any(RecordVisitor)
    }
}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);

        match self {
            Record::Pointer(v) => v.hash(state),
            Record::String(v) => v.hash(state),
            Record::Double(v) => v.to_bits().hash(state),
            Record::Bytes(v) => v.hash(state),
            Record::Uint16(v) => v.hash(state),
            Record::Uint32(v) => v.hash(state),
            Record::Map(m) => {
                let mut keys: Vec<&String> = m.keys().collect();
                keys.sort_unstable();
                keys.len().hash(state);
                for key in keys {
                    key.hash(state);
                    m[key].hash(state);
                }
            }
            Record::Int32(v) => v.hash(state),
            Record::Uint64(v) => v.hash(state),
            Record::Uint128(v) => v.hash(state),
            Record::Array(v) => {
                v.len().hash(state);
                for item in v {
                    item.hash(state);
                }
            }
            Record::Bool(v) => v.hash(state),
            Record::Float(v) => v.to_bits().hash(state),
        }
    }
}
