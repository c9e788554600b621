//! Dynamically typed field values.

use crate::descriptor::{FieldDescriptor, FieldType};
use crate::dynamic::DynamicMessage;
use bytes::Bytes;
use std::collections::HashMap;

/// The value of one field of a message instance
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `bool`
    Bool(bool),
    /// `int32`, `sint32`, `sfixed32`
    I32(i32),
    /// `int64`, `sint64`, `sfixed64`
    I64(i64),
    /// `uint32`, `fixed32`
    U32(u32),
    /// `uint64`, `fixed64`
    U64(u64),
    /// `float`
    F32(f32),
    /// `double`
    F64(f64),
    /// `string`
    String(String),
    /// `bytes`
    Bytes(Bytes),
    /// Enum value, by number
    EnumNumber(i32),
    /// Embedded message or group
    Message(DynamicMessage),
    /// Repeated field
    List(Vec<Value>),
    /// Map field
    Map(HashMap<MapKey, Value>),
}

/// Key of a map field entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    /// `bool` key
    Bool(bool),
    /// 32-bit signed key
    I32(i32),
    /// 64-bit signed key
    I64(i64),
    /// 32-bit unsigned key
    U32(u32),
    /// 64-bit unsigned key
    U64(u64),
    /// `string` key
    String(String),
}

impl Value {
    /// Zero value of a scalar kind; message and enum kinds have none.
    pub(crate) fn zero(kind: FieldType) -> Option<Value> {
        let value = match kind {
            FieldType::Double => Value::F64(0.0),
            FieldType::Float => Value::F32(0.0),
            FieldType::Int32 | FieldType::Sint32 | FieldType::Sfixed32 => Value::I32(0),
            FieldType::Int64 | FieldType::Sint64 | FieldType::Sfixed64 => Value::I64(0),
            FieldType::Uint32 | FieldType::Fixed32 => Value::U32(0),
            FieldType::Uint64 | FieldType::Fixed64 => Value::U64(0),
            FieldType::Bool => Value::Bool(false),
            FieldType::String => Value::String(String::new()),
            FieldType::Bytes => Value::Bytes(Bytes::new()),
            FieldType::Enum | FieldType::Message | FieldType::Group => return None,
        };
        Some(value)
    }

    /// Empty collection or singular default for `field`
    pub fn default_for(field: &FieldDescriptor) -> Value {
        if field.is_map() {
            Value::Map(HashMap::new())
        } else if field.is_repeated() {
            Value::List(Vec::new())
        } else {
            field.default_value()
        }
    }

    /// Whether this value may be stored in `field`
    pub fn is_valid_for(&self, field: &FieldDescriptor) -> bool {
        if field.is_map() {
            let Value::Map(entries) = self else {
                return false;
            };
            let Some((key_field, value_field)) = field.map_entry_fields() else {
                return false;
            };
            entries.iter().all(|(key, value)| {
                key.matches_kind(key_field.field_type()) && value.is_valid_singular(&value_field)
            })
        } else if field.is_repeated() {
            match self {
                Value::List(items) => items.iter().all(|item| item.is_valid_singular(field)),
                _ => false,
            }
        } else {
            self.is_valid_singular(field)
        }
    }

    fn is_valid_singular(&self, field: &FieldDescriptor) -> bool {
        match (field.field_type(), self) {
            (FieldType::Double, Value::F64(_))
            | (FieldType::Float, Value::F32(_))
            | (FieldType::Int32 | FieldType::Sint32 | FieldType::Sfixed32, Value::I32(_))
            | (FieldType::Int64 | FieldType::Sint64 | FieldType::Sfixed64, Value::I64(_))
            | (FieldType::Uint32 | FieldType::Fixed32, Value::U32(_))
            | (FieldType::Uint64 | FieldType::Fixed64, Value::U64(_))
            | (FieldType::Bool, Value::Bool(_))
            | (FieldType::String, Value::String(_))
            | (FieldType::Bytes, Value::Bytes(_))
            | (FieldType::Enum, Value::EnumNumber(_)) => true,
            (FieldType::Message | FieldType::Group, Value::Message(message)) => {
                field.message_type().as_ref() == Some(message.descriptor())
            }
            _ => false,
        }
    }

    /// Human readable description of what `field` accepts
    pub(crate) fn expected_for(field: &FieldDescriptor) -> String {
        if field.is_map() {
            "map".to_string()
        } else if field.is_repeated() {
            format!("repeated {}", field.field_type().as_str())
        } else {
            field.field_type().as_str().to_string()
        }
    }

    /// Returns the value as a `bool`, if it is one
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as an `i32`, if it is one
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a string slice, if it is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the enum number, if this is an enum value
    pub fn as_enum_number(&self) -> Option<i32> {
        match self {
            Value::EnumNumber(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the embedded message, if this is one
    pub fn as_message(&self) -> Option<&DynamicMessage> {
        match self {
            Value::Message(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the list items, if this is a repeated value
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    /// Mutable list items, if this is a repeated value
    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    /// Mutable map entries, if this is a map value
    pub fn as_map_mut(&mut self) -> Option<&mut HashMap<MapKey, Value>> {
        match self {
            Value::Map(v) => Some(v),
            _ => None,
        }
    }
}

impl MapKey {
    fn matches_kind(&self, kind: FieldType) -> bool {
        matches!(
            (kind, self),
            (FieldType::Bool, MapKey::Bool(_))
                | (
                    FieldType::Int32 | FieldType::Sint32 | FieldType::Sfixed32,
                    MapKey::I32(_)
                )
                | (
                    FieldType::Int64 | FieldType::Sint64 | FieldType::Sfixed64,
                    MapKey::I64(_)
                )
                | (FieldType::Uint32 | FieldType::Fixed32, MapKey::U32(_))
                | (FieldType::Uint64 | FieldType::Fixed64, MapKey::U64(_))
                | (FieldType::String, MapKey::String(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_values() {
        assert_eq!(Value::zero(FieldType::Int32), Some(Value::I32(0)));
        assert_eq!(Value::zero(FieldType::String), Some(Value::String(String::new())));
        assert_eq!(Value::zero(FieldType::Bytes), Some(Value::Bytes(Bytes::new())));
        assert_eq!(Value::zero(FieldType::Message), None);
        assert_eq!(Value::zero(FieldType::Enum), None);
    }

    #[test]
    fn test_map_key_kinds() {
        assert!(MapKey::String("a".into()).matches_kind(FieldType::String));
        assert!(MapKey::I32(1).matches_kind(FieldType::Sint32));
        assert!(!MapKey::I32(1).matches_kind(FieldType::Int64));
    }
}
