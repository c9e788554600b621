//! Uniform get/set/has/clear over the ways a field can be stored.
//!
//! [`FieldAccessor`] is the capability; the storage strategies are:
//!
//! - a plain singular field
//! - a repeated or map field, mutated in place rather than replaced
//! - a member of a oneof, which shares one discriminant with its siblings
//! - an extension, stored beside the instance's own fields
//!
//! [`DynamicAccessor`] implements all four for [`DynamicMessage`]. Native
//! types describe their members with a table of [`FieldBinding`]s, one per
//! field in declaration order, and get [`GeneratedAccessor`]s back.

use crate::descriptor::{FieldDescriptor, MessageDescriptor, OneofDescriptor};
use crate::dynamic::DynamicMessage;
use crate::error::{Error, Result};
use crate::value::Value;
use std::fmt;

/// Reflective access to one field of messages of type `M`
pub trait FieldAccessor<M> {
    /// The field this accessor reads and writes
    fn descriptor(&self) -> &FieldDescriptor;

    /// Current value, or the default when unset
    fn get_value(&self, message: &M) -> Result<Value>;

    /// Whether the field is set.
    ///
    /// Fails for fields that do not track presence, repeated and map fields
    /// included.
    fn has_value(&self, message: &M) -> Result<bool>;

    /// Replace the field's value
    fn set_value(&self, message: &mut M, value: Value) -> Result<()>;

    /// Reset the field to its unset state
    fn clear(&self, message: &mut M) -> Result<()>;
}

/// Singular field outside any oneof
#[derive(Debug, Clone)]
pub struct SingleFieldAccessor {
    field: FieldDescriptor,
}

impl FieldAccessor<DynamicMessage> for SingleFieldAccessor {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.field
    }

    fn get_value(&self, message: &DynamicMessage) -> Result<Value> {
        message.check_field(&self.field)?;
        Ok(message.get_field(&self.field).into_owned())
    }

    fn has_value(&self, message: &DynamicMessage) -> Result<bool> {
        message.check_field(&self.field)?;
        if !self.field.has_presence() {
            return Err(Error::unsupported("has_value", self.field.full_name()));
        }
        Ok(message.has_field(&self.field))
    }

    fn set_value(&self, message: &mut DynamicMessage, value: Value) -> Result<()> {
        message.set_field(&self.field, value)
    }

    fn clear(&self, message: &mut DynamicMessage) -> Result<()> {
        message.check_field(&self.field)?;
        message.clear_field(&self.field);
        Ok(())
    }
}

/// Repeated or map field
#[derive(Debug, Clone)]
pub struct RepeatedFieldAccessor {
    field: FieldDescriptor,
}

impl RepeatedFieldAccessor {
    /// The collection stored in `message`, for in-place mutation
    pub fn get_mut<'m>(&self, message: &'m mut DynamicMessage) -> Result<&'m mut Value> {
        message.get_field_mut(&self.field)
    }
}

impl FieldAccessor<DynamicMessage> for RepeatedFieldAccessor {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.field
    }

    fn get_value(&self, message: &DynamicMessage) -> Result<Value> {
        message.check_field(&self.field)?;
        Ok(message.get_field(&self.field).into_owned())
    }

    fn has_value(&self, _message: &DynamicMessage) -> Result<bool> {
        Err(Error::unsupported("has_value", self.field.full_name()))
    }

    fn set_value(&self, _message: &mut DynamicMessage, _value: Value) -> Result<()> {
        Err(Error::unsupported("set_value", self.field.full_name()))
    }

    fn clear(&self, message: &mut DynamicMessage) -> Result<()> {
        message.check_field(&self.field)?;
        message.clear_field(&self.field);
        Ok(())
    }
}

/// Member of a oneof, including synthetic proto3 `optional` oneofs
#[derive(Debug, Clone)]
pub struct OneofFieldAccessor {
    field: FieldDescriptor,
    oneof: OneofDescriptor,
}

impl OneofFieldAccessor {
    fn is_selected(&self, message: &DynamicMessage) -> bool {
        message.oneof_case(&self.oneof).as_ref() == Some(&self.field)
    }

    /// The oneof this member belongs to
    pub fn oneof(&self) -> &OneofDescriptor {
        &self.oneof
    }
}

impl FieldAccessor<DynamicMessage> for OneofFieldAccessor {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.field
    }

    fn get_value(&self, message: &DynamicMessage) -> Result<Value> {
        message.check_field(&self.field)?;
        if self.is_selected(message) {
            Ok(message.get_field(&self.field).into_owned())
        } else {
            Ok(Value::default_for(&self.field))
        }
    }

    fn has_value(&self, message: &DynamicMessage) -> Result<bool> {
        message.check_field(&self.field)?;
        Ok(self.is_selected(message))
    }

    fn set_value(&self, message: &mut DynamicMessage, value: Value) -> Result<()> {
        message.set_field(&self.field, value)
    }

    fn clear(&self, message: &mut DynamicMessage) -> Result<()> {
        message.check_field(&self.field)?;
        // Clearing an unselected member leaves the selected sibling alone.
        if self.is_selected(message) {
            message.clear_oneof(&self.oneof);
        }
        Ok(())
    }
}

/// Extension field
#[derive(Debug, Clone)]
pub struct ExtensionAccessor {
    field: FieldDescriptor,
}

impl FieldAccessor<DynamicMessage> for ExtensionAccessor {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.field
    }

    fn get_value(&self, message: &DynamicMessage) -> Result<Value> {
        message.check_field(&self.field)?;
        Ok(message.get_field(&self.field).into_owned())
    }

    fn has_value(&self, message: &DynamicMessage) -> Result<bool> {
        message.check_field(&self.field)?;
        if self.field.is_repeated() {
            return Err(Error::unsupported("has_value", self.field.full_name()));
        }
        Ok(message.has_field(&self.field))
    }

    fn set_value(&self, message: &mut DynamicMessage, value: Value) -> Result<()> {
        if self.field.is_repeated() {
            return Err(Error::unsupported("set_value", self.field.full_name()));
        }
        message.set_field(&self.field, value)
    }

    fn clear(&self, message: &mut DynamicMessage) -> Result<()> {
        message.check_field(&self.field)?;
        message.clear_field(&self.field);
        Ok(())
    }
}

/// Accessor for any field of a [`DynamicMessage`], chosen by storage kind
#[derive(Debug, Clone)]
pub enum DynamicAccessor {
    /// Plain singular field
    Single(SingleFieldAccessor),
    /// Repeated or map field
    Repeated(RepeatedFieldAccessor),
    /// Oneof member
    Oneof(OneofFieldAccessor),
    /// Extension
    Extension(ExtensionAccessor),
}

impl DynamicAccessor {
    /// Pick the storage strategy for `field`
    pub fn for_field(field: FieldDescriptor) -> Self {
        if field.is_extension() {
            DynamicAccessor::Extension(ExtensionAccessor { field })
        } else if field.is_repeated() {
            DynamicAccessor::Repeated(RepeatedFieldAccessor { field })
        } else if let Some(oneof) = field.containing_oneof() {
            DynamicAccessor::Oneof(OneofFieldAccessor { field, oneof })
        } else {
            DynamicAccessor::Single(SingleFieldAccessor { field })
        }
    }

    fn as_accessor(&self) -> &dyn FieldAccessor<DynamicMessage> {
        match self {
            DynamicAccessor::Single(a) => a,
            DynamicAccessor::Repeated(a) => a,
            DynamicAccessor::Oneof(a) => a,
            DynamicAccessor::Extension(a) => a,
        }
    }
}

impl FieldAccessor<DynamicMessage> for DynamicAccessor {
    fn descriptor(&self) -> &FieldDescriptor {
        self.as_accessor().descriptor()
    }

    fn get_value(&self, message: &DynamicMessage) -> Result<Value> {
        self.as_accessor().get_value(message)
    }

    fn has_value(&self, message: &DynamicMessage) -> Result<bool> {
        self.as_accessor().has_value(message)
    }

    fn set_value(&self, message: &mut DynamicMessage, value: Value) -> Result<()> {
        self.as_accessor().set_value(message, value)
    }

    fn clear(&self, message: &mut DynamicMessage) -> Result<()> {
        self.as_accessor().clear(message)
    }
}

/// Dispatch table for `message`, indexed by field declaration position
pub fn accessors(message: &MessageDescriptor) -> Vec<DynamicAccessor> {
    message.fields().map(DynamicAccessor::for_field).collect()
}

/// Native member functions for one field of `M`.
///
/// `set` is `None` for repeated and map fields, which are mutated through
/// the collection `get` exposes. `has` is `None` for fields without presence.
pub struct FieldBinding<M> {
    /// Read the member
    pub get: fn(&M) -> Value,
    /// Replace the member
    pub set: Option<fn(&mut M, Value) -> Result<()>>,
    /// Presence of the member
    pub has: Option<fn(&M) -> bool>,
    /// Reset the member
    pub clear: fn(&mut M),
}

impl<M> Clone for FieldBinding<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for FieldBinding<M> {}

/// Accessor for a native type built from a [`FieldBinding`]
pub struct GeneratedAccessor<M> {
    field: FieldDescriptor,
    binding: FieldBinding<M>,
}

impl<M> Clone for GeneratedAccessor<M> {
    fn clone(&self) -> Self {
        Self {
            field: self.field.clone(),
            binding: self.binding,
        }
    }
}

impl<M> fmt::Debug for GeneratedAccessor<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedAccessor")
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}

impl<M> GeneratedAccessor<M> {
    /// Pair each field of `message`, in declaration order, with its binding
    pub fn table(
        message: &MessageDescriptor,
        bindings: Vec<FieldBinding<M>>,
    ) -> Result<Vec<GeneratedAccessor<M>>> {
        let fields = message.fields();
        if fields.len() != bindings.len() {
            return Err(Error::validation(
                message.full_name(),
                format!(
                    "Generated code has the wrong number of properties for message {} ({} supplied, {} declared).",
                    message.full_name(),
                    bindings.len(),
                    fields.len()
                ),
            ));
        }

        Ok(fields
            .zip(bindings)
            .map(|(field, binding)| GeneratedAccessor { field, binding })
            .collect())
    }
}

impl<M> FieldAccessor<M> for GeneratedAccessor<M> {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.field
    }

    fn get_value(&self, message: &M) -> Result<Value> {
        Ok((self.binding.get)(message))
    }

    fn has_value(&self, message: &M) -> Result<bool> {
        match self.binding.has {
            Some(has) => Ok(has(message)),
            None => Err(Error::unsupported("has_value", self.field.full_name())),
        }
    }

    fn set_value(&self, message: &mut M, value: Value) -> Result<()> {
        if !value.is_valid_for(&self.field) {
            return Err(Error::invalid_value(
                self.field.full_name(),
                Value::expected_for(&self.field),
            ));
        }
        match self.binding.set {
            Some(set) => set(message, value),
            None => Err(Error::unsupported("set_value", self.field.full_name())),
        }
    }

    fn clear(&self, message: &mut M) -> Result<()> {
        (self.binding.clear)(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::test_util::*;
    use crate::descriptor::FileDescriptor;
    use prost_types::field_descriptor_proto::Type;
    use prost_types::FieldDescriptorProto;

    fn sample() -> FileDescriptor {
        let mut proto = proto3("sample.proto", "test");
        let mut opt = in_oneof(field("nickname", 5, Type::String), 1);
        opt.proto3_optional = Some(true);
        let mut msg = message(
            "Sample",
            vec![
                field("id", 1, Type::Int64),
                in_oneof(field("x", 2, Type::Int32), 0),
                in_oneof(field("y", 3, Type::String), 0),
                repeated(field("tags", 4, Type::String)),
                opt,
            ],
        );
        msg.oneof_decl.push(oneof("choice"));
        msg.oneof_decl.push(oneof("_nickname"));
        proto.message_type.push(msg);
        build(&proto, &[]).unwrap()
    }

    fn table(file: &FileDescriptor) -> (MessageDescriptor, Vec<DynamicAccessor>) {
        let message: MessageDescriptor = file.find_symbol("test.Sample").unwrap();
        let table = accessors(&message);
        (message, table)
    }

    #[test]
    fn test_accessor_kinds() {
        let file = sample();
        let (_, table) = table(&file);
        assert!(matches!(table[0], DynamicAccessor::Single(_)));
        assert!(matches!(table[1], DynamicAccessor::Oneof(_)));
        assert!(matches!(table[3], DynamicAccessor::Repeated(_)));
        assert!(matches!(table[4], DynamicAccessor::Oneof(_)));
        assert_eq!(table[3].descriptor().name(), "tags");
    }

    #[test]
    fn test_oneof_exclusivity() {
        let file = sample();
        let (message_type, table) = table(&file);
        let mut message = DynamicMessage::new(message_type.clone());
        let (x, y) = (&table[1], &table[2]);

        x.set_value(&mut message, Value::I32(7)).unwrap();
        assert!(x.has_value(&message).unwrap());

        y.set_value(&mut message, Value::String("hi".into())).unwrap();
        assert!(!x.has_value(&message).unwrap());
        assert!(y.has_value(&message).unwrap());
        assert_eq!(x.get_value(&message).unwrap(), Value::I32(0));

        let choice = message_type.oneofs().next().unwrap();
        assert_eq!(message.oneof_case(&choice).unwrap().number(), 3);

        // Clearing the unselected member leaves the selection alone.
        x.clear(&mut message).unwrap();
        assert!(y.has_value(&message).unwrap());
        y.clear(&mut message).unwrap();
        assert!(message.oneof_case(&choice).is_none());
    }

    #[test]
    fn test_plain_field_without_presence() {
        let file = sample();
        let (message_type, table) = table(&file);
        let mut message = DynamicMessage::new(message_type);
        let id = &table[0];

        assert_eq!(id.get_value(&message).unwrap(), Value::I64(0));
        assert!(matches!(
            id.has_value(&message),
            Err(Error::Unsupported { operation: "has_value", .. })
        ));
        id.set_value(&mut message, Value::I64(42)).unwrap();
        assert_eq!(id.get_value(&message).unwrap(), Value::I64(42));
        id.clear(&mut message).unwrap();
        assert_eq!(id.get_value(&message).unwrap(), Value::I64(0));
    }

    #[test]
    fn test_proto3_optional_tracks_presence() {
        let file = sample();
        let (message_type, table) = table(&file);
        let mut message = DynamicMessage::new(message_type);
        let nickname = &table[4];

        assert!(!nickname.has_value(&message).unwrap());
        nickname
            .set_value(&mut message, Value::String(String::new()))
            .unwrap();
        assert!(nickname.has_value(&message).unwrap());
    }

    #[test]
    fn test_repeated_field() {
        let file = sample();
        let (message_type, table) = table(&file);
        let mut message = DynamicMessage::new(message_type);
        let DynamicAccessor::Repeated(tags) = &table[3] else {
            panic!("expected repeated accessor");
        };

        assert!(tags.has_value(&message).is_err());
        assert!(tags
            .set_value(&mut message, Value::List(vec![]))
            .is_err());

        tags.get_mut(&mut message)
            .unwrap()
            .as_list_mut()
            .unwrap()
            .push(Value::String("a".into()));
        assert_eq!(tags.get_value(&message).unwrap().as_list().unwrap().len(), 1);

        tags.clear(&mut message).unwrap();
        assert!(tags.get_value(&message).unwrap().as_list().unwrap().is_empty());
    }

    #[test]
    fn test_extension_accessor() {
        let mut base = file("base.proto", "");
        let mut extendable = message("Base", vec![]);
        extendable
            .extension_range
            .push(prost_types::descriptor_proto::ExtensionRange {
                start: Some(10),
                end: Some(20),
                options: None,
            });
        base.message_type.push(extendable);
        let base = build(&base, &[]).unwrap();

        let mut ext = file("ext.proto", "");
        ext.dependency.push("base.proto".into());
        ext.extension.push(FieldDescriptorProto {
            extendee: Some("Base".into()),
            ..field("flag", 10, Type::Bool)
        });
        let ext = build(&ext, &[base.clone()]).unwrap();

        let accessor = DynamicAccessor::for_field(ext.extensions().next().unwrap());
        assert!(matches!(accessor, DynamicAccessor::Extension(_)));

        let mut message = DynamicMessage::new(base.find_symbol("Base").unwrap());
        assert!(!accessor.has_value(&message).unwrap());
        accessor.set_value(&mut message, Value::Bool(true)).unwrap();
        assert!(accessor.has_value(&message).unwrap());
        assert_eq!(accessor.get_value(&message).unwrap(), Value::Bool(true));
        accessor.clear(&mut message).unwrap();
        assert!(!accessor.has_value(&message).unwrap());
    }

    #[test]
    fn test_accessor_rejects_other_message() {
        let file = sample();
        let (_, table) = table(&file);

        let mut other = proto3("other.proto", "test.other");
        other.message_type.push(message("Other", vec![]));
        let other = build(&other, &[]).unwrap();
        let message = DynamicMessage::new(other.find_symbol("test.other.Other").unwrap());

        let err = table[0].get_value(&message).unwrap_err();
        assert!(matches!(err, Error::MessageMismatch { .. }));
    }

    #[derive(Default)]
    struct Point {
        x: i32,
        label: Option<String>,
    }

    fn point_bindings() -> Vec<FieldBinding<Point>> {
        vec![
            FieldBinding {
                get: |p| Value::I32(p.x),
                set: Some(|p, v| {
                    p.x = v.as_i32().unwrap_or_default();
                    Ok(())
                }),
                has: None,
                clear: |p| p.x = 0,
            },
            FieldBinding {
                get: |p| Value::String(p.label.clone().unwrap_or_default()),
                set: Some(|p, v| {
                    p.label = v.as_str().map(str::to_string);
                    Ok(())
                }),
                has: Some(|p| p.label.is_some()),
                clear: |p| p.label = None,
            },
        ]
    }

    fn point_file() -> FileDescriptor {
        let mut proto = file("point.proto", "");
        let mut x = field("x", 1, Type::Int32);
        x.label = Some(prost_types::field_descriptor_proto::Label::Required as i32);
        proto.message_type.push(message(
            "Point",
            vec![x, field("label", 2, Type::String)],
        ));
        build(&proto, &[]).unwrap()
    }

    #[test]
    fn test_generated_accessors() {
        let file = point_file();
        let descriptor: MessageDescriptor = file.find_symbol("Point").unwrap();
        let table = GeneratedAccessor::table(&descriptor, point_bindings()).unwrap();
        assert_eq!(
            format!("{:?}", table[0]),
            "GeneratedAccessor { field: FieldDescriptor(\"Point.x\"), .. }"
        );

        let mut point = Point::default();
        table[0].set_value(&mut point, Value::I32(4)).unwrap();
        assert_eq!(point.x, 4);
        assert!(table[0].has_value(&point).is_err());

        assert!(!table[1].has_value(&point).unwrap());
        table[1]
            .set_value(&mut point, Value::String("corner".into()))
            .unwrap();
        assert!(table[1].has_value(&point).unwrap());
        assert!(table[1].set_value(&mut point, Value::I32(1)).is_err());
        table[1].clear(&mut point).unwrap();
        assert_eq!(table[1].get_value(&point).unwrap(), Value::String(String::new()));
    }

    #[test]
    fn test_generated_table_count_mismatch() {
        let file = point_file();
        let descriptor: MessageDescriptor = file.find_symbol("Point").unwrap();
        let mut bindings = point_bindings();
        bindings.pop();
        let err = GeneratedAccessor::table(&descriptor, bindings).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.symbol(), Some("Point"));
    }
}
