//! Schema fixtures for tests.

use super::{BuildConfig, FileDescriptor};
use crate::error::Result;
use prost::Message;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, MessageOptions, OneofDescriptorProto,
};

pub(crate) fn file(name: &str, package: &str) -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some(name.to_string()),
        package: (!package.is_empty()).then(|| package.to_string()),
        ..Default::default()
    }
}

pub(crate) fn proto3(name: &str, package: &str) -> FileDescriptorProto {
    FileDescriptorProto {
        syntax: Some("proto3".to_string()),
        ..file(name, package)
    }
}

pub(crate) fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: fields,
        ..Default::default()
    }
}

pub(crate) fn field(name: &str, number: i32, kind: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(kind as i32),
        ..Default::default()
    }
}

pub(crate) fn typed(name: &str, number: i32, kind: Type, type_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(type_name.to_string()),
        ..field(name, number, kind)
    }
}

pub(crate) fn repeated(mut field: FieldDescriptorProto) -> FieldDescriptorProto {
    field.label = Some(Label::Repeated as i32);
    field
}

pub(crate) fn in_oneof(mut field: FieldDescriptorProto, oneof: i32) -> FieldDescriptorProto {
    field.oneof_index = Some(oneof);
    field
}

pub(crate) fn oneof(name: &str) -> OneofDescriptorProto {
    OneofDescriptorProto {
        name: Some(name.to_string()),
        options: None,
    }
}

pub(crate) fn enumeration(name: &str, values: &[(&str, i32)]) -> EnumDescriptorProto {
    EnumDescriptorProto {
        name: Some(name.to_string()),
        value: values
            .iter()
            .map(|(name, number)| EnumValueDescriptorProto {
                name: Some(name.to_string()),
                number: Some(*number),
                options: None,
            })
            .collect(),
        ..Default::default()
    }
}

/// Synthetic entry type for `map<key, value>`
pub(crate) fn map_entry(
    name: &str,
    key: FieldDescriptorProto,
    value: FieldDescriptorProto,
) -> DescriptorProto {
    DescriptorProto {
        options: Some(MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        }),
        ..message(name, vec![key, value])
    }
}

pub(crate) fn build(proto: &FileDescriptorProto, deps: &[FileDescriptor]) -> Result<FileDescriptor> {
    FileDescriptor::build(proto.encode_to_vec(), deps, None, &BuildConfig::default())
}

/// Append one field to a hand-built protobuf buffer.
pub(crate) fn put_varint_field(buf: &mut Vec<u8>, number: u32, value: u64) {
    put_varint(buf, u64::from(number) << 3);
    put_varint(buf, value);
}

pub(crate) fn put_bytes_field(buf: &mut Vec<u8>, number: u32, value: &[u8]) {
    put_varint(buf, (u64::from(number) << 3) | 2);
    put_varint(buf, value.len() as u64);
    buf.extend_from_slice(value);
}

fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}
