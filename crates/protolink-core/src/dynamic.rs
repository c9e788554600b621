//! Generic message instances backed by a field set.
//!
//! A [`DynamicMessage`] stores values by field number for the fields of its
//! own type and, in a side table keyed by full name, for extensions. Keying
//! extensions by name means an extension built in a later file still reaches
//! instances of a type built earlier.

use crate::descriptor::{FieldDescriptor, MessageDescriptor, OneofDescriptor};
use crate::error::{Error, Result};
use crate::value::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// A message instance whose shape is known only through its descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicMessage {
    descriptor: MessageDescriptor,
    fields: BTreeMap<u32, Value>,
    extensions: BTreeMap<String, (FieldDescriptor, Value)>,
}

impl DynamicMessage {
    /// An instance with every field unset
    pub fn new(descriptor: MessageDescriptor) -> Self {
        Self {
            descriptor,
            fields: BTreeMap::new(),
            extensions: BTreeMap::new(),
        }
    }

    /// The message type of this instance
    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }

    /// Whether `field` may be stored in this instance.
    ///
    /// Extensions match on the extended type's full name.
    pub fn accepts(&self, field: &FieldDescriptor) -> bool {
        let containing = field.containing_message();
        if field.is_extension() {
            containing.full_name() == self.descriptor.full_name()
        } else {
            containing == self.descriptor
        }
    }

    pub(crate) fn check_field(&self, field: &FieldDescriptor) -> Result<()> {
        if self.accepts(field) {
            Ok(())
        } else {
            Err(Error::MessageMismatch {
                field: field.full_name().to_string(),
                message: self.descriptor.full_name().to_string(),
            })
        }
    }

    fn stored(&self, field: &FieldDescriptor) -> Option<&Value> {
        if field.is_extension() {
            self.extensions
                .get(field.full_name())
                .map(|(_, value)| value)
        } else {
            self.fields.get(&field.number())
        }
    }

    /// Whether a value is stored for `field`.
    ///
    /// Repeated fields count as set when non-empty.
    pub fn has_field(&self, field: &FieldDescriptor) -> bool {
        match self.stored(field) {
            Some(Value::List(items)) => !items.is_empty(),
            Some(Value::Map(entries)) => !entries.is_empty(),
            Some(_) => true,
            None => false,
        }
    }

    /// The stored value, or the field's default when unset
    pub fn get_field(&self, field: &FieldDescriptor) -> Cow<'_, Value> {
        match self.stored(field) {
            Some(value) => Cow::Borrowed(value),
            None => Cow::Owned(Value::default_for(field)),
        }
    }

    /// Mutable access to the value of `field`, inserting its default first.
    ///
    /// Fails if the field belongs to another message type. For a oneof member
    /// this selects the member, clearing its siblings.
    pub fn get_field_mut(&mut self, field: &FieldDescriptor) -> Result<&mut Value> {
        self.check_field(field)?;
        if field.is_extension() {
            return Ok(&mut self
                .extensions
                .entry(field.full_name().to_string())
                .or_insert_with(|| (field.clone(), Value::default_for(field)))
                .1);
        }

        if let Some(oneof) = field.containing_oneof() {
            self.clear_siblings(&oneof, field.number());
        }
        Ok(self
            .fields
            .entry(field.number())
            .or_insert_with(|| Value::default_for(field)))
    }

    /// Store `value` in `field`.
    ///
    /// Fails if the field belongs to another message type or the value is of
    /// the wrong kind. Setting a oneof member clears whichever sibling was set.
    pub fn set_field(&mut self, field: &FieldDescriptor, value: Value) -> Result<()> {
        self.check_field(field)?;
        if !value.is_valid_for(field) {
            return Err(Error::invalid_value(
                field.full_name(),
                Value::expected_for(field),
            ));
        }

        if field.is_extension() {
            self.extensions
                .insert(field.full_name().to_string(), (field.clone(), value));
            return Ok(());
        }

        if let Some(oneof) = field.containing_oneof() {
            self.clear_siblings(&oneof, field.number());
        }
        self.fields.insert(field.number(), value);
        Ok(())
    }

    /// Remove any stored value for `field`
    pub fn clear_field(&mut self, field: &FieldDescriptor) {
        if field.is_extension() {
            self.extensions.remove(field.full_name());
        } else {
            self.fields.remove(&field.number());
        }
    }

    /// The member of `oneof` that currently holds a value
    pub fn oneof_case(&self, oneof: &OneofDescriptor) -> Option<FieldDescriptor> {
        oneof
            .fields()
            .find(|member| self.fields.contains_key(&member.number()))
    }

    /// Clear whichever member of `oneof` is set
    pub fn clear_oneof(&mut self, oneof: &OneofDescriptor) {
        for member in oneof.fields() {
            self.fields.remove(&member.number());
        }
    }

    fn clear_siblings(&mut self, oneof: &OneofDescriptor, keep: u32) {
        for member in oneof.fields() {
            if member.number() != keep {
                self.fields.remove(&member.number());
            }
        }
    }

    /// Set fields and extensions, fields first in number order
    pub fn fields(&self) -> impl Iterator<Item = (FieldDescriptor, &Value)> + '_ {
        let declared = self.fields.iter().filter_map(|(number, value)| {
            self.descriptor
                .find_field_by_number(*number)
                .map(|field| (field, value))
        });
        let extensions = self
            .extensions
            .values()
            .map(|(field, value)| (field.clone(), value));
        declared.chain(extensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::test_util::*;
    use crate::descriptor::FileDescriptor;
    use prost_types::descriptor_proto::ExtensionRange;
    use prost_types::field_descriptor_proto::Type;
    use prost_types::FieldDescriptorProto;

    fn shapes() -> FileDescriptor {
        let mut proto = file("shapes.proto", "geo");
        let mut shape = message(
            "Shape",
            vec![
                field("name", 1, Type::String),
                repeated(field("points", 2, Type::Int32)),
                typed("origin", 3, Type::Message, "Point"),
            ],
        );
        shape.extension_range.push(ExtensionRange {
            start: Some(100),
            end: Some(200),
            options: None,
        });
        proto.message_type.push(shape);
        proto
            .message_type
            .push(message("Point", vec![field("x", 1, Type::Int32)]));
        build(&proto, &[]).unwrap()
    }

    #[test]
    fn test_unset_fields_read_defaults() {
        let file = shapes();
        let shape: MessageDescriptor = file.find_symbol("geo.Shape").unwrap();
        let message = DynamicMessage::new(shape.clone());

        let name = shape.find_field_by_name("name").unwrap();
        assert_eq!(message.get_field(&name).as_str(), Some(""));
        assert!(!message.has_field(&name));

        let origin = shape.find_field_by_name("origin").unwrap();
        let point = message.get_field(&origin).into_owned();
        assert_eq!(point.as_message().unwrap().descriptor().name(), "Point");
    }

    #[test]
    fn test_set_field_validates_kind() {
        let file = shapes();
        let shape: MessageDescriptor = file.find_symbol("geo.Shape").unwrap();
        let name = shape.find_field_by_name("name").unwrap();
        let mut message = DynamicMessage::new(shape);

        let err = message.set_field(&name, Value::I32(3)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value for field 'geo.Shape.name': expected string"
        );
        message
            .set_field(&name, Value::String("square".into()))
            .unwrap();
        assert!(message.has_field(&name));
    }

    #[test]
    fn test_foreign_field_rejected() {
        let file = shapes();
        let shape: MessageDescriptor = file.find_symbol("geo.Shape").unwrap();
        let x: FieldDescriptor = file.find_symbol("geo.Point.x").unwrap();
        let mut message = DynamicMessage::new(shape);
        let err = message.set_field(&x, Value::I32(1)).unwrap_err();
        assert!(matches!(err, Error::MessageMismatch { .. }));

        let err = message.get_field_mut(&x).unwrap_err();
        assert_eq!(
            err.to_string(),
            "field 'geo.Point.x' does not belong to message type 'geo.Shape'"
        );
        assert_eq!(message.fields().count(), 0);
    }

    #[test]
    fn test_repeated_via_get_field_mut() {
        let file = shapes();
        let shape: MessageDescriptor = file.find_symbol("geo.Shape").unwrap();
        let points = shape.find_field_by_name("points").unwrap();
        let mut message = DynamicMessage::new(shape);

        assert!(!message.has_field(&points));
        message
            .get_field_mut(&points)
            .unwrap()
            .as_list_mut()
            .unwrap()
            .extend([Value::I32(1), Value::I32(2)]);
        assert!(message.has_field(&points));
        assert_eq!(message.get_field(&points).as_list().unwrap().len(), 2);
    }

    #[test]
    fn test_extension_from_later_file() {
        let base = shapes();
        let mut ext = file("ext.proto", "geo.ext");
        ext.dependency.push("shapes.proto".into());
        ext.extension.push(FieldDescriptorProto {
            extendee: Some(".geo.Shape".into()),
            ..field("color", 100, Type::String)
        });
        let ext = build(&ext, &[base.clone()]).unwrap();

        let color = ext.extensions().next().unwrap();
        let shape: MessageDescriptor = base.find_symbol("geo.Shape").unwrap();
        let mut message = DynamicMessage::new(shape);
        message
            .set_field(&color, Value::String("red".into()))
            .unwrap();
        assert!(message.has_field(&color));
        assert_eq!(message.fields().count(), 1);

        message.clear_field(&color);
        assert!(!message.has_field(&color));
    }
}
