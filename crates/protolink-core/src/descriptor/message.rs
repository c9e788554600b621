//! Message and oneof descriptors.

use super::{descriptor_handle, DescriptorBase, EnumDescriptor, FieldDescriptor, FileDescriptor};
use crate::options::CustomOptions;
use prost_types::{MessageOptions, OneofOptions};
use std::collections::HashMap;
use std::ops::Range;

#[derive(Debug)]
pub(crate) struct MessageInner {
    pub(crate) base: DescriptorBase,
    pub(crate) parent: Option<usize>,
    pub(crate) nested: Vec<usize>,
    pub(crate) enums: Vec<usize>,
    /// Field arena indices in declaration order
    pub(crate) fields: Vec<usize>,
    /// Field arena indices sorted by number, filled during cross-link
    pub(crate) fields_in_number_order: Vec<usize>,
    pub(crate) fields_by_name: HashMap<String, usize>,
    pub(crate) fields_by_json_name: HashMap<String, usize>,
    pub(crate) oneofs: Vec<usize>,
    /// Extensions declared inside this message's scope
    pub(crate) extensions: Vec<usize>,
    /// Half-open ranges of numbers reserved for extensions
    pub(crate) extension_ranges: Vec<Range<u32>>,
    pub(crate) options: Option<MessageOptions>,
    pub(crate) custom: Option<CustomOptions>,
    pub(crate) generated_type: Option<String>,
}

impl MessageInner {
    pub(crate) fn is_map_entry(&self) -> bool {
        self.options
            .as_ref()
            .and_then(|options| options.map_entry)
            .unwrap_or(false)
    }

    pub(crate) fn is_message_set(&self) -> bool {
        self.options
            .as_ref()
            .and_then(|options| options.message_set_wire_format)
            .unwrap_or(false)
    }

    pub(crate) fn is_extension_number(&self, number: u32) -> bool {
        self.extension_ranges.iter().any(|range| range.contains(&number))
    }
}

/// A message type
#[derive(Clone)]
pub struct MessageDescriptor {
    file: FileDescriptor,
    index: usize,
}

descriptor_handle!(MessageDescriptor, MessageInner, messages);

impl MessageDescriptor {
    /// Enclosing message, for nested types
    pub fn parent_message(&self) -> Option<MessageDescriptor> {
        self.inner()
            .parent
            .map(|index| MessageDescriptor::new(self.file.clone(), index))
    }

    /// Fields in declaration order
    pub fn fields(&self) -> impl ExactSizeIterator<Item = FieldDescriptor> + '_ {
        self.inner()
            .fields
            .iter()
            .map(|&index| FieldDescriptor::new(self.file.clone(), index))
    }

    /// Fields sorted by field number
    pub fn fields_in_number_order(&self) -> impl ExactSizeIterator<Item = FieldDescriptor> + '_ {
        self.inner()
            .fields_in_number_order
            .iter()
            .map(|&index| FieldDescriptor::new(self.file.clone(), index))
    }

    /// Field with the given proto name
    pub fn find_field_by_name(&self, name: &str) -> Option<FieldDescriptor> {
        self.inner()
            .fields_by_name
            .get(name)
            .map(|&index| FieldDescriptor::new(self.file.clone(), index))
    }

    /// Field with the given JSON name
    pub fn find_field_by_json_name(&self, json_name: &str) -> Option<FieldDescriptor> {
        self.inner()
            .fields_by_json_name
            .get(json_name)
            .map(|&index| FieldDescriptor::new(self.file.clone(), index))
    }

    /// Field with the given number; extensions are not included
    pub fn find_field_by_number(&self, number: u32) -> Option<FieldDescriptor> {
        self.file
            .inner()
            .pool
            .find_field_by_number(self.index, number)
            .map(|index| FieldDescriptor::new(self.file.clone(), index))
    }

    /// Nested message types in declaration order
    pub fn nested_messages(&self) -> impl ExactSizeIterator<Item = MessageDescriptor> + '_ {
        self.inner()
            .nested
            .iter()
            .map(|&index| MessageDescriptor::new(self.file.clone(), index))
    }

    /// Nested enum types in declaration order
    pub fn enums(&self) -> impl ExactSizeIterator<Item = EnumDescriptor> + '_ {
        self.inner()
            .enums
            .iter()
            .map(|&index| EnumDescriptor::new(self.file.clone(), index))
    }

    /// Oneofs in declaration order, synthetic ones included
    pub fn oneofs(&self) -> impl ExactSizeIterator<Item = OneofDescriptor> + '_ {
        self.inner()
            .oneofs
            .iter()
            .map(|&index| OneofDescriptor::new(self.file.clone(), index))
    }

    /// Oneofs declared in the schema, skipping synthetic proto3 `optional` ones
    pub fn real_oneofs(&self) -> impl Iterator<Item = OneofDescriptor> + '_ {
        self.oneofs().filter(|oneof| !oneof.is_synthetic())
    }

    /// Extensions declared inside this message
    pub fn extensions(&self) -> impl ExactSizeIterator<Item = FieldDescriptor> + '_ {
        self.inner()
            .extensions
            .iter()
            .map(|&index| FieldDescriptor::new(self.file.clone(), index))
    }

    /// Number ranges reserved for extensions, end exclusive
    pub fn extension_ranges(&self) -> &[Range<u32>] {
        &self.inner().extension_ranges
    }

    /// Whether `number` falls in one of the extension ranges
    pub fn is_extension_number(&self, number: u32) -> bool {
        self.inner().is_extension_number(number)
    }

    /// True for the synthetic entry type behind a map field
    pub fn is_map_entry(&self) -> bool {
        self.inner().is_map_entry()
    }

    /// True if the message uses the legacy MessageSet wire format
    pub fn is_message_set(&self) -> bool {
        self.inner().is_message_set()
    }

    /// Native type name supplied by generated code
    pub fn generated_type_name(&self) -> Option<&str> {
        self.inner().generated_type.as_deref()
    }

    /// `MessageOptions` as declared, without custom options
    pub fn options(&self) -> Option<&MessageOptions> {
        self.inner().options.as_ref()
    }
}

#[derive(Debug)]
pub(crate) struct OneofInner {
    pub(crate) base: DescriptorBase,
    pub(crate) message: usize,
    /// Member field arena indices, filled during cross-link
    pub(crate) fields: Vec<usize>,
    pub(crate) options: Option<OneofOptions>,
    pub(crate) custom: Option<CustomOptions>,
    pub(crate) property_name: Option<String>,
}

/// A oneof group inside a message
#[derive(Clone)]
pub struct OneofDescriptor {
    file: FileDescriptor,
    index: usize,
}

descriptor_handle!(OneofDescriptor, OneofInner, oneofs);

impl OneofDescriptor {
    /// Message declaring this oneof
    pub fn containing_message(&self) -> MessageDescriptor {
        MessageDescriptor::new(self.file.clone(), self.inner().message)
    }

    /// Member fields in declaration order
    pub fn fields(&self) -> impl ExactSizeIterator<Item = FieldDescriptor> + '_ {
        self.inner()
            .fields
            .iter()
            .map(|&index| FieldDescriptor::new(self.file.clone(), index))
    }

    /// True for the oneof protoc synthesizes around a proto3 `optional` field
    pub fn is_synthetic(&self) -> bool {
        match self.inner().fields.as_slice() {
            [only] => self.file.inner().fields[*only].proto3_optional,
            _ => false,
        }
    }

    /// Native member name supplied by generated code
    pub fn property_name(&self) -> Option<&str> {
        self.inner().property_name.as_deref()
    }

    /// `OneofOptions` as declared, without custom options
    pub fn options(&self) -> Option<&OneofOptions> {
        self.inner().options.as_ref()
    }
}
