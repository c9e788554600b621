//! Linked descriptor graph.
//!
//! A built file owns every node declared in it, stored in flat per-kind
//! vectors and addressed by index. The public descriptor types are cheap
//! handles: a reference-counted [`FileDescriptor`] plus an index. Links to
//! types declared in other files go through [`Target::Foreign`], which holds
//! that (already built) file directly, so the graph has no ownership cycles
//! even when messages reference each other.
//!
//! Building happens in two passes, see [`file`] for the orchestration:
//!
//! 1. translate: mirror the `FileDescriptorProto` tree into the arena and
//!    register every name in the [`DescriptorPool`](crate::pool::DescriptorPool)
//! 2. cross-link: resolve every type reference through scoped lookup and run
//!    the checks that need the whole symbol table

mod enums;
mod field;
pub(crate) mod file;
mod message;
mod service;

pub use enums::{EnumDescriptor, EnumValueDescriptor};
pub use field::{FieldDescriptor, FieldType, Label};
pub use file::{BuildConfig, FileDescriptor};
pub use message::{MessageDescriptor, OneofDescriptor};
pub use service::{MethodDescriptor, ServiceDescriptor};

use crate::error::{Error, Result};

/// Proto syntax version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    /// Proto2 syntax
    Proto2,
    /// Proto3 syntax
    Proto3,
}

impl Syntax {
    /// Returns the syntax declaration string
    pub fn as_str(&self) -> &'static str {
        match self {
            Syntax::Proto2 => "proto2",
            Syntax::Proto3 => "proto3",
        }
    }
}

impl TryFrom<&str> for Syntax {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        match value {
            "" | "proto2" => Ok(Syntax::Proto2),
            "proto3" => Ok(Syntax::Proto3),
            _ => Err(Error::UnsupportedSyntax {
                syntax: value.to_string(),
            }),
        }
    }
}

/// Identity shared by every node in the arena.
#[derive(Debug, Clone)]
pub(crate) struct DescriptorBase {
    /// Position among same-kind siblings
    pub(crate) index: usize,
    pub(crate) name: String,
    pub(crate) full_name: String,
    /// Path of this declaration inside the `FileDescriptorProto`
    pub(crate) path: Vec<i32>,
}

impl DescriptorBase {
    pub(crate) fn new(index: usize, name: &str, full_name: String, path: Vec<i32>) -> Self {
        Self {
            index,
            name: name.to_string(),
            full_name,
            path,
        }
    }
}

/// Resolved link to a node, either in the file being built or in a dependency.
#[derive(Debug, Clone)]
pub(crate) enum Target {
    Local(usize),
    Foreign(FileDescriptor, usize),
}

impl Target {
    /// Materialize the link relative to the file that owns it.
    pub(crate) fn resolve<'a>(&'a self, owner: &'a FileDescriptor) -> (&'a FileDescriptor, usize) {
        self.resolve_with(owner, |file| file)
    }

    /// Same as [`Target::resolve`], over any view of the files involved.
    ///
    /// During cross-linking the owner is still a bare arena, so `view` maps a
    /// built dependency to that same shape.
    pub(crate) fn resolve_with<'a, F>(
        &'a self,
        owner: &'a F,
        view: fn(&'a FileDescriptor) -> &'a F,
    ) -> (&'a F, usize) {
        match self {
            Target::Local(index) => (owner, *index),
            Target::Foreign(file, index) => (view(file), *index),
        }
    }
}

/// Join a scope and a local name into a full name.
pub(crate) fn join_name(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope, name)
    }
}

/// Implicit descriptor for one dotted prefix of a package name.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PackageDescriptor {
    full_name: String,
    file: FileDescriptor,
}

impl PackageDescriptor {
    pub(crate) fn new(full_name: impl Into<String>, file: FileDescriptor) -> Self {
        Self {
            full_name: full_name.into(),
            file,
        }
    }

    /// The last component of the package name
    pub fn name(&self) -> &str {
        self.full_name
            .rsplit_once('.')
            .map_or(self.full_name.as_str(), |(_, name)| name)
    }

    /// The dotted package name
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// The file that first declared this package in its pool
    pub fn file(&self) -> &FileDescriptor {
        &self.file
    }
}

impl std::fmt::Debug for PackageDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PackageDescriptor").field(&self.full_name).finish()
    }
}

/// Any symbol that can live in a descriptor pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Descriptor {
    /// Package placeholder
    Package(PackageDescriptor),
    /// Message type
    Message(MessageDescriptor),
    /// Field or extension
    Field(FieldDescriptor),
    /// Enum type
    Enum(EnumDescriptor),
    /// Enum value
    EnumValue(EnumValueDescriptor),
    /// Oneof
    Oneof(OneofDescriptor),
    /// Service
    Service(ServiceDescriptor),
    /// Service method
    Method(MethodDescriptor),
}

impl Descriptor {
    /// Fully-qualified name of the symbol
    pub fn full_name(&self) -> &str {
        match self {
            Descriptor::Package(d) => d.full_name(),
            Descriptor::Message(d) => d.full_name(),
            Descriptor::Field(d) => d.full_name(),
            Descriptor::Enum(d) => d.full_name(),
            Descriptor::EnumValue(d) => d.full_name(),
            Descriptor::Oneof(d) => d.full_name(),
            Descriptor::Service(d) => d.full_name(),
            Descriptor::Method(d) => d.full_name(),
        }
    }

    /// Local name of the symbol
    pub fn name(&self) -> &str {
        match self {
            Descriptor::Package(d) => d.name(),
            Descriptor::Message(d) => d.name(),
            Descriptor::Field(d) => d.name(),
            Descriptor::Enum(d) => d.name(),
            Descriptor::EnumValue(d) => d.name(),
            Descriptor::Oneof(d) => d.name(),
            Descriptor::Service(d) => d.name(),
            Descriptor::Method(d) => d.name(),
        }
    }

    /// File the symbol was declared in
    pub fn file(&self) -> &FileDescriptor {
        match self {
            Descriptor::Package(d) => d.file(),
            Descriptor::Message(d) => d.file(),
            Descriptor::Field(d) => d.file(),
            Descriptor::Enum(d) => d.file(),
            Descriptor::EnumValue(d) => d.file(),
            Descriptor::Oneof(d) => d.file(),
            Descriptor::Service(d) => d.file(),
            Descriptor::Method(d) => d.file(),
        }
    }

    /// Custom option values of the symbol; packages carry none
    pub fn custom_options(&self) -> &crate::options::CustomOptions {
        match self {
            Descriptor::Package(_) => crate::options::CustomOptions::empty(),
            Descriptor::Message(d) => d.custom_options(),
            Descriptor::Field(d) => d.custom_options(),
            Descriptor::Enum(d) => d.custom_options(),
            Descriptor::EnumValue(d) => d.custom_options(),
            Descriptor::Oneof(d) => d.custom_options(),
            Descriptor::Service(d) => d.custom_options(),
            Descriptor::Method(d) => d.custom_options(),
        }
    }

    /// Short label for the descriptor kind, used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Descriptor::Package(_) => "package",
            Descriptor::Message(_) => "message",
            Descriptor::Field(_) => "field",
            Descriptor::Enum(_) => "enum",
            Descriptor::EnumValue(_) => "enum value",
            Descriptor::Oneof(_) => "oneof",
            Descriptor::Service(_) => "service",
            Descriptor::Method(_) => "method",
        }
    }
}

/// Conversion from the tagged [`Descriptor`] to one concrete kind.
///
/// Used by typed lookups, where a symbol of the wrong kind reads as absent.
pub trait FromDescriptor: Sized {
    /// Returns the concrete descriptor if `descriptor` is of this kind
    fn from_descriptor(descriptor: Descriptor) -> Option<Self>;
}

impl FromDescriptor for Descriptor {
    fn from_descriptor(descriptor: Descriptor) -> Option<Self> {
        Some(descriptor)
    }
}

macro_rules! impl_from_descriptor {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl FromDescriptor for $ty {
                fn from_descriptor(descriptor: Descriptor) -> Option<Self> {
                    match descriptor {
                        Descriptor::$variant(d) => Some(d),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_from_descriptor! {
    Package => PackageDescriptor,
    Message => MessageDescriptor,
    Field => FieldDescriptor,
    Enum => EnumDescriptor,
    EnumValue => EnumValueDescriptor,
    Oneof => OneofDescriptor,
    Service => ServiceDescriptor,
    Method => MethodDescriptor,
}

/// Identity, hashing and debug output shared by every arena handle.
macro_rules! descriptor_handle {
    ($ty:ident, $inner:ident, $field:ident) => {
        impl $ty {
            pub(crate) fn new(file: FileDescriptor, index: usize) -> Self {
                Self { file, index }
            }

            fn inner(&self) -> &$inner {
                &self.file.inner().$field[self.index]
            }

            /// Position among same-kind siblings
            pub fn index(&self) -> usize {
                self.inner().base.index
            }

            /// Local name
            pub fn name(&self) -> &str {
                &self.inner().base.name
            }

            /// Fully-qualified dotted name
            pub fn full_name(&self) -> &str {
                &self.inner().base.full_name
            }

            /// File this descriptor was declared in
            pub fn file(&self) -> &FileDescriptor {
                &self.file
            }

            /// Comments and source span, when the schema carried source info
            pub fn declaration(&self) -> Option<&crate::source::Declaration> {
                self.file.declaration(&self.inner().base.path)
            }

            /// Custom option values captured from this descriptor's options
            pub fn custom_options(&self) -> &crate::options::CustomOptions {
                self.inner()
                    .custom
                    .as_ref()
                    .unwrap_or_else(|| crate::options::CustomOptions::empty())
            }
        }

        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.file == other.file && self.index == other.index
            }
        }

        impl Eq for $ty {}

        impl std::hash::Hash for $ty {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                self.file.hash(state);
                self.index.hash(state);
            }
        }

        impl std::fmt::Debug for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_tuple(stringify!($ty)).field(&self.full_name()).finish()
            }
        }
    };
}

pub(crate) use descriptor_handle;

#[cfg(test)]
pub(crate) mod test_util;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax() {
        assert_eq!(Syntax::try_from("").unwrap(), Syntax::Proto2);
        assert_eq!(Syntax::try_from("proto2").unwrap(), Syntax::Proto2);
        assert_eq!(Syntax::try_from("proto3").unwrap(), Syntax::Proto3);
        assert!(Syntax::try_from("proto4").is_err());
    }

    #[test]
    fn test_join_name() {
        assert_eq!(join_name("", "Foo"), "Foo");
        assert_eq!(join_name("a.b", "Foo"), "a.b.Foo");
    }
}
