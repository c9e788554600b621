//! Field and extension descriptors.

use super::{descriptor_handle, DescriptorBase, FileDescriptor, Syntax, Target};
use super::{EnumDescriptor, MessageDescriptor, OneofDescriptor};
use crate::dynamic::DynamicMessage;
use crate::options::CustomOptions;
use crate::value::Value;
use bytes::Bytes;
use prost_types::field_descriptor_proto::{Label as ProtoLabel, Type as ProtoType};
use prost_types::FieldOptions;

/// Declared type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// `double`
    Double,
    /// `float`
    Float,
    /// `int64`
    Int64,
    /// `uint64`
    Uint64,
    /// `int32`
    Int32,
    /// `fixed64`
    Fixed64,
    /// `fixed32`
    Fixed32,
    /// `bool`
    Bool,
    /// `string`
    String,
    /// Legacy group
    Group,
    /// Embedded message
    Message,
    /// `bytes`
    Bytes,
    /// `uint32`
    Uint32,
    /// Enum
    Enum,
    /// `sfixed32`
    Sfixed32,
    /// `sfixed64`
    Sfixed64,
    /// `sint32`
    Sint32,
    /// `sint64`
    Sint64,
}

impl FieldType {
    pub(crate) fn from_proto(value: i32) -> Option<Self> {
        let kind = match ProtoType::try_from(value).ok()? {
            ProtoType::Double => FieldType::Double,
            ProtoType::Float => FieldType::Float,
            ProtoType::Int64 => FieldType::Int64,
            ProtoType::Uint64 => FieldType::Uint64,
            ProtoType::Int32 => FieldType::Int32,
            ProtoType::Fixed64 => FieldType::Fixed64,
            ProtoType::Fixed32 => FieldType::Fixed32,
            ProtoType::Bool => FieldType::Bool,
            ProtoType::String => FieldType::String,
            ProtoType::Group => FieldType::Group,
            ProtoType::Message => FieldType::Message,
            ProtoType::Bytes => FieldType::Bytes,
            ProtoType::Uint32 => FieldType::Uint32,
            ProtoType::Enum => FieldType::Enum,
            ProtoType::Sfixed32 => FieldType::Sfixed32,
            ProtoType::Sfixed64 => FieldType::Sfixed64,
            ProtoType::Sint32 => FieldType::Sint32,
            ProtoType::Sint64 => FieldType::Sint64,
        };
        Some(kind)
    }

    /// Returns the keyword used for this type in `.proto` source
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Double => "double",
            FieldType::Float => "float",
            FieldType::Int64 => "int64",
            FieldType::Uint64 => "uint64",
            FieldType::Int32 => "int32",
            FieldType::Fixed64 => "fixed64",
            FieldType::Fixed32 => "fixed32",
            FieldType::Bool => "bool",
            FieldType::String => "string",
            FieldType::Group => "group",
            FieldType::Message => "message",
            FieldType::Bytes => "bytes",
            FieldType::Uint32 => "uint32",
            FieldType::Enum => "enum",
            FieldType::Sfixed32 => "sfixed32",
            FieldType::Sfixed64 => "sfixed64",
            FieldType::Sint32 => "sint32",
            FieldType::Sint64 => "sint64",
        }
    }

    /// Message or group
    pub fn is_message(&self) -> bool {
        matches!(self, FieldType::Message | FieldType::Group)
    }
}

/// Field cardinality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    /// Singular
    Optional,
    /// Proto2 required
    Required,
    /// Repeated or map
    Repeated,
}

impl Label {
    pub(crate) fn from_proto(value: Option<i32>) -> Self {
        match value.map(ProtoLabel::try_from) {
            Some(Ok(ProtoLabel::Required)) => Label::Required,
            Some(Ok(ProtoLabel::Repeated)) => Label::Repeated,
            _ => Label::Optional,
        }
    }
}

#[derive(Debug)]
pub(crate) struct FieldInner {
    pub(crate) base: DescriptorBase,
    /// Message the field (or extension) is declared in
    pub(crate) scope: Option<usize>,
    pub(crate) number: u32,
    pub(crate) label: Label,
    /// Declared type; inferred from the resolved symbol during cross-link when absent
    pub(crate) kind: Option<FieldType>,
    pub(crate) type_name: Option<String>,
    pub(crate) extendee: Option<String>,
    /// Message whose instances carry this field; set during cross-link for extensions
    pub(crate) containing: Option<Target>,
    /// Resolved message or enum type
    pub(crate) type_link: Option<Target>,
    pub(crate) oneof: Option<usize>,
    pub(crate) proto3_optional: bool,
    pub(crate) json_name: String,
    pub(crate) property_name: Option<String>,
    pub(crate) default_raw: Option<String>,
    /// Explicit or implied default; `None` only for message-typed fields
    pub(crate) default: Option<Value>,
    pub(crate) is_map: bool,
    pub(crate) syntax: Syntax,
    pub(crate) options: Option<FieldOptions>,
    pub(crate) custom: Option<CustomOptions>,
}

/// A field of a message, or an extension
#[derive(Clone)]
pub struct FieldDescriptor {
    file: FileDescriptor,
    index: usize,
}

descriptor_handle!(FieldDescriptor, FieldInner, fields);

impl FieldDescriptor {
    /// Field number
    pub fn number(&self) -> u32 {
        self.inner().number
    }

    /// Declared (or inferred) type
    pub fn field_type(&self) -> FieldType {
        self.inner().kind.unwrap_or(FieldType::Message)
    }

    /// Cardinality
    pub fn label(&self) -> Label {
        self.inner().label
    }

    /// True for repeated and map fields
    pub fn is_repeated(&self) -> bool {
        self.inner().label == Label::Repeated
    }

    /// True for proto2 required fields
    pub fn is_required(&self) -> bool {
        self.inner().label == Label::Required
    }

    /// True if the field is a map, i.e. a repeated synthetic entry message
    pub fn is_map(&self) -> bool {
        self.inner().is_map
    }

    /// True if this descriptor is an extension
    pub fn is_extension(&self) -> bool {
        self.inner().extendee.is_some()
    }

    /// Whether repeated scalars use the packed encoding
    pub fn is_packed(&self) -> bool {
        if !self.is_repeated() || self.field_type().is_message() {
            return false;
        }
        match self.inner().options.as_ref().and_then(|o| o.packed) {
            Some(packed) => packed,
            None => {
                self.inner().syntax == Syntax::Proto3
                    && !matches!(self.field_type(), FieldType::String | FieldType::Bytes)
            }
        }
    }

    /// JSON name, explicit or derived from the field name
    pub fn json_name(&self) -> &str {
        &self.inner().json_name
    }

    /// Native member name supplied by generated code
    pub fn property_name(&self) -> Option<&str> {
        self.inner().property_name.as_deref()
    }

    /// True if declared with proto3 `optional`
    pub fn is_proto3_optional(&self) -> bool {
        self.inner().proto3_optional
    }

    /// Message whose instances carry this field.
    ///
    /// For extensions this is the extended type, not the declaring scope.
    pub fn containing_message(&self) -> MessageDescriptor {
        let target = self
            .inner()
            .containing
            .as_ref()
            .expect("containing message is linked during build");
        let (file, index) = target.resolve(&self.file);
        MessageDescriptor::new(file.clone(), index)
    }

    /// For extensions declared inside a message, that message
    pub fn extension_scope(&self) -> Option<MessageDescriptor> {
        if !self.is_extension() {
            return None;
        }
        self.inner()
            .scope
            .map(|index| MessageDescriptor::new(self.file.clone(), index))
    }

    /// Oneof this field belongs to, including synthetic proto3 `optional` oneofs
    pub fn containing_oneof(&self) -> Option<OneofDescriptor> {
        self.inner()
            .oneof
            .map(|index| OneofDescriptor::new(self.file.clone(), index))
    }

    /// Oneof this field belongs to, excluding synthetic oneofs
    pub fn real_containing_oneof(&self) -> Option<OneofDescriptor> {
        self.containing_oneof().filter(|oneof| !oneof.is_synthetic())
    }

    /// Whether the field tracks presence separately from its value
    pub fn has_presence(&self) -> bool {
        if self.is_repeated() {
            return false;
        }
        self.field_type().is_message()
            || self.inner().oneof.is_some()
            || self.is_extension()
            || self.inner().syntax == Syntax::Proto2
    }

    /// Type of a message or group field
    pub fn message_type(&self) -> Option<MessageDescriptor> {
        if !self.field_type().is_message() {
            return None;
        }
        self.inner().type_link.as_ref().map(|target| {
            let (file, index) = target.resolve(&self.file);
            MessageDescriptor::new(file.clone(), index)
        })
    }

    /// Type of an enum field
    pub fn enum_type(&self) -> Option<EnumDescriptor> {
        if self.field_type() != FieldType::Enum {
            return None;
        }
        self.inner().type_link.as_ref().map(|target| {
            let (file, index) = target.resolve(&self.file);
            EnumDescriptor::new(file.clone(), index)
        })
    }

    /// Key and value fields of a map field's entry type
    pub fn map_entry_fields(&self) -> Option<(FieldDescriptor, FieldDescriptor)> {
        if !self.is_map() {
            return None;
        }
        let entry = self.message_type()?;
        Some((entry.find_field_by_number(1)?, entry.find_field_by_number(2)?))
    }

    /// Whether the schema declared an explicit default
    pub fn has_default_value(&self) -> bool {
        self.inner().default_raw.is_some()
    }

    /// Default value for a singular field.
    ///
    /// Message-typed fields default to an empty instance of their type.
    pub fn default_value(&self) -> Value {
        if let Some(value) = &self.inner().default {
            return value.clone();
        }
        let message = self
            .message_type()
            .expect("fields without a default are message fields linked during build");
        Value::Message(DynamicMessage::new(message))
    }

    /// `FieldOptions` as declared, without custom options
    pub fn options(&self) -> Option<&FieldOptions> {
        self.inner().options.as_ref()
    }
}

/// Parse a declared default for a non-message, non-enum field.
pub(crate) fn parse_default(kind: FieldType, raw: &str) -> Option<Value> {
    let value = match kind {
        FieldType::Int32 | FieldType::Sint32 | FieldType::Sfixed32 => {
            Value::I32(i32::try_from(parse_integer(raw)?).ok()?)
        }
        FieldType::Int64 | FieldType::Sint64 | FieldType::Sfixed64 => {
            Value::I64(i64::try_from(parse_integer(raw)?).ok()?)
        }
        FieldType::Uint32 | FieldType::Fixed32 => {
            Value::U32(u32::try_from(parse_integer(raw)?).ok()?)
        }
        FieldType::Uint64 | FieldType::Fixed64 => {
            Value::U64(u64::try_from(parse_integer(raw)?).ok()?)
        }
        FieldType::Float => Value::F32(parse_float(raw)? as f32),
        FieldType::Double => Value::F64(parse_float(raw)?),
        FieldType::Bool => match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return None,
        },
        FieldType::String => Value::String(raw.to_string()),
        FieldType::Bytes => Value::Bytes(unescape_bytes(raw)?),
        FieldType::Enum | FieldType::Message | FieldType::Group => return None,
    };
    Some(value)
}

/// Decimal, `0x` hexadecimal or leading-zero octal, optionally negative.
fn parse_integer(raw: &str) -> Option<i128> {
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let magnitude = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i128::from_str_radix(hex, 16).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        i128::from_str_radix(&digits[1..], 8).ok()?
    } else {
        digits.parse::<i128>().ok()?
    };
    Some(if negative { -magnitude } else { magnitude })
}

fn parse_float(raw: &str) -> Option<f64> {
    match raw {
        "inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        "nan" => Some(f64::NAN),
        _ => raw.parse().ok(),
    }
}

/// Decode C-style escapes as written by protoc for `bytes` defaults.
fn unescape_bytes(raw: &str) -> Option<Bytes> {
    let input = raw.as_bytes();
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;

    while i < input.len() {
        let c = input[i];
        i += 1;
        if c != b'\\' {
            out.push(c);
            continue;
        }

        let escape = *input.get(i)?;
        i += 1;
        match escape {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'v' => out.push(0x0B),
            b'\\' | b'\'' | b'"' | b'?' => out.push(escape),
            b'0'..=b'7' => {
                let mut value = u32::from(escape - b'0');
                for _ in 0..2 {
                    match input.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            i += 1;
                        }
                        _ => break,
                    }
                }
                out.push(u8::try_from(value).ok()?);
            }
            b'x' | b'X' => {
                let mut value = 0u32;
                let mut digits = 0;
                while digits < 2 {
                    match input.get(i).and_then(|&d| (d as char).to_digit(16)) {
                        Some(d) => {
                            value = value * 16 + d;
                            i += 1;
                            digits += 1;
                        }
                        None => break,
                    }
                }
                if digits == 0 {
                    return None;
                }
                out.push(value as u8);
            }
            _ => return None,
        }
    }

    Some(Bytes::from(out))
}

/// Convert a snake_case name to lowerCamelCase
pub(crate) fn to_lower_camel_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = false;

    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_lower_camel_case() {
        assert_eq!(to_lower_camel_case("hello_world"), "helloWorld");
        assert_eq!(to_lower_camel_case("my_field_name"), "myFieldName");
        assert_eq!(to_lower_camel_case("simple"), "simple");
    }

    #[test]
    fn test_parse_integer_defaults() {
        assert_eq!(parse_default(FieldType::Int32, "-12"), Some(Value::I32(-12)));
        assert_eq!(parse_default(FieldType::Uint32, "0x1F"), Some(Value::U32(31)));
        assert_eq!(parse_default(FieldType::Int64, "010"), Some(Value::I64(8)));
        assert_eq!(parse_default(FieldType::Uint32, "-1"), None);
        assert_eq!(parse_default(FieldType::Int32, "3000000000"), None);
    }

    #[test]
    fn test_parse_float_defaults() {
        assert_eq!(parse_default(FieldType::Double, "1.5"), Some(Value::F64(1.5)));
        assert_eq!(
            parse_default(FieldType::Float, "-inf"),
            Some(Value::F32(f32::NEG_INFINITY))
        );
        match parse_default(FieldType::Double, "nan") {
            Some(Value::F64(v)) => assert!(v.is_nan()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_bool_default() {
        assert_eq!(parse_default(FieldType::Bool, "true"), Some(Value::Bool(true)));
        assert_eq!(parse_default(FieldType::Bool, "yes"), None);
    }

    #[test]
    fn test_unescape_bytes() {
        assert_eq!(
            unescape_bytes(r"a\n\001\x41\\"),
            Some(Bytes::from_static(b"a\n\x01A\\"))
        );
        assert_eq!(unescape_bytes(r"\q"), None);
        assert_eq!(unescape_bytes("\\"), None);
    }

    #[test]
    fn test_label_from_proto() {
        assert_eq!(Label::from_proto(None), Label::Optional);
        assert_eq!(Label::from_proto(Some(3)), Label::Repeated);
        assert_eq!(Label::from_proto(Some(2)), Label::Required);
    }
}
