//! Enum and enum value descriptors.

use super::{descriptor_handle, DescriptorBase, FileDescriptor, MessageDescriptor};
use crate::options::CustomOptions;
use prost_types::{EnumOptions, EnumValueOptions};

#[derive(Debug)]
pub(crate) struct EnumInner {
    pub(crate) base: DescriptorBase,
    pub(crate) parent: Option<usize>,
    /// Value arena indices in declaration order
    pub(crate) values: Vec<usize>,
    pub(crate) options: Option<EnumOptions>,
    pub(crate) custom: Option<CustomOptions>,
    pub(crate) generated_type: Option<String>,
}

/// An enum type
#[derive(Clone)]
pub struct EnumDescriptor {
    file: FileDescriptor,
    index: usize,
}

descriptor_handle!(EnumDescriptor, EnumInner, enums);

impl EnumDescriptor {
    /// Enclosing message, for nested enums
    pub fn parent_message(&self) -> Option<MessageDescriptor> {
        self.inner()
            .parent
            .map(|index| MessageDescriptor::new(self.file.clone(), index))
    }

    /// Values in declaration order, aliases included
    pub fn values(&self) -> impl ExactSizeIterator<Item = EnumValueDescriptor> + '_ {
        self.inner()
            .values
            .iter()
            .map(|&index| EnumValueDescriptor::new(self.file.clone(), index))
    }

    /// The value every field of this type defaults to
    pub fn default_value(&self) -> EnumValueDescriptor {
        // Translation rejects enums without values.
        EnumValueDescriptor::new(self.file.clone(), self.inner().values[0])
    }

    /// First-declared value with the given number
    pub fn find_value_by_number(&self, number: i32) -> Option<EnumValueDescriptor> {
        self.file
            .inner()
            .pool
            .find_enum_value_by_number(self.index, number)
            .map(|index| EnumValueDescriptor::new(self.file.clone(), index))
    }

    /// Value with the given name
    pub fn find_value_by_name(&self, name: &str) -> Option<EnumValueDescriptor> {
        self.values().find(|value| value.name() == name)
    }

    /// Whether aliases (several names for one number) are permitted
    pub fn allows_alias(&self) -> bool {
        self.inner()
            .options
            .as_ref()
            .and_then(|options| options.allow_alias)
            .unwrap_or(false)
    }

    /// Native type name supplied by generated code
    pub fn generated_type_name(&self) -> Option<&str> {
        self.inner().generated_type.as_deref()
    }

    /// `EnumOptions` as declared, without custom options
    pub fn options(&self) -> Option<&EnumOptions> {
        self.inner().options.as_ref()
    }
}

#[derive(Debug)]
pub(crate) struct EnumValueInner {
    pub(crate) base: DescriptorBase,
    pub(crate) parent: usize,
    pub(crate) number: i32,
    pub(crate) options: Option<EnumValueOptions>,
    pub(crate) custom: Option<CustomOptions>,
}

/// One named value of an enum.
///
/// Values are scoped as siblings of their enum, so `pkg.Color.RED` has the
/// full name `pkg.RED`.
#[derive(Clone)]
pub struct EnumValueDescriptor {
    file: FileDescriptor,
    index: usize,
}

descriptor_handle!(EnumValueDescriptor, EnumValueInner, enum_values);

impl EnumValueDescriptor {
    /// Numeric value
    pub fn number(&self) -> i32 {
        self.inner().number
    }

    /// Enum declaring this value
    pub fn parent_enum(&self) -> EnumDescriptor {
        EnumDescriptor::new(self.file.clone(), self.inner().parent)
    }

    /// `EnumValueOptions` as declared, without custom options
    pub fn options(&self) -> Option<&EnumValueOptions> {
        self.inner().options.as_ref()
    }
}
