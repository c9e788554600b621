//! File descriptors and the two-pass build.
//!
//! [`FileDescriptor::build`] decodes a serialized `FileDescriptorProto`,
//! checks it against the dependencies it was handed, then runs:
//!
//! - **translate**: one walk over the proto tree that fills the per-kind
//!   arenas, registers every name in the file's pool and, alongside the
//!   decoded tree, walks the raw blob to capture custom option values
//!   (prost drops fields it does not know).
//! - **cross-link**: resolves every type name through scoped lookup, infers
//!   undeclared field types, parses defaults and runs the checks that need
//!   the complete symbol table.
//!
//! Only a fully linked file is ever wrapped in its `Arc`; any error abandons
//! the build.

use super::enums::{EnumInner, EnumValueInner};
use super::field::{parse_default, to_lower_camel_case, FieldInner};
use super::message::{MessageInner, OneofInner};
use super::service::{MethodInner, ServiceInner};
use super::{
    join_name, Descriptor, DescriptorBase, EnumDescriptor, EnumValueDescriptor, FieldDescriptor,
    FieldType, FromDescriptor, Label, MessageDescriptor, MethodDescriptor, OneofDescriptor,
    PackageDescriptor, ServiceDescriptor, Syntax, Target,
};
use crate::error::{Error, Result};
use crate::generated::GeneratedCodeInfo;
use crate::options::CustomOptions;
use crate::pool::{DescriptorPool, Found, Symbol};
use crate::source::{self, Declaration};
use crate::value::Value;
use crate::wire::{length_delimited, merged_message, read_fields, RawField, MAX_VALID_NUMBER};
use bytes::Bytes;
use prost::Message;
use prost_types::{
    DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileOptions,
    ServiceDescriptorProto,
};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, trace};

/// Options controlling how a file descriptor is built
#[derive(Debug, Clone)]
pub struct BuildConfig {
    allow_unknown_dependencies: bool,
    capture_custom_options: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            allow_unknown_dependencies: false,
            capture_custom_options: true,
        }
    }
}

impl BuildConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignore public dependencies that were not supplied instead of failing
    pub fn allow_unknown_dependencies(mut self, allow: bool) -> Self {
        self.allow_unknown_dependencies = allow;
        self
    }

    /// Scan raw option bytes for custom option values
    pub fn capture_custom_options(mut self, capture: bool) -> Self {
        self.capture_custom_options = capture;
        self
    }
}

#[derive(Debug)]
pub(crate) struct FileInner {
    pub(crate) name: String,
    pub(crate) package: String,
    pub(crate) syntax: Syntax,
    pub(crate) dependencies: Vec<FileDescriptor>,
    pub(crate) public_dependencies: Vec<FileDescriptor>,
    pub(crate) pool: DescriptorPool,
    pub(crate) messages: Vec<MessageInner>,
    pub(crate) fields: Vec<FieldInner>,
    pub(crate) oneofs: Vec<OneofInner>,
    pub(crate) enums: Vec<EnumInner>,
    pub(crate) enum_values: Vec<EnumValueInner>,
    pub(crate) services: Vec<ServiceInner>,
    pub(crate) methods: Vec<MethodInner>,
    pub(crate) top_messages: Vec<usize>,
    pub(crate) top_enums: Vec<usize>,
    pub(crate) top_extensions: Vec<usize>,
    pub(crate) declarations: HashMap<Vec<i32>, Declaration>,
    pub(crate) options: Option<FileOptions>,
    pub(crate) custom: Option<CustomOptions>,
    pub(crate) proto: FileDescriptorProto,
    pub(crate) serialized: Bytes,
}

/// A fully linked `.proto` file.
///
/// Cloning is cheap; every descriptor handed out by a file shares its
/// allocation. Two handles are equal only if they refer to the same build.
#[derive(Clone)]
pub struct FileDescriptor {
    inner: Arc<FileInner>,
}

impl FileDescriptor {
    /// Build a file with no dependencies using the default configuration
    pub fn from_bytes(data: impl Into<Bytes>) -> Result<Self> {
        Self::build(data, &[], None, &BuildConfig::default())
    }

    /// Build a file for generated code.
    ///
    /// Public dependencies the generated code did not supply are ignored.
    pub fn from_generated_code(
        data: impl Into<Bytes>,
        dependencies: &[FileDescriptor],
        generated: &GeneratedCodeInfo,
    ) -> Result<Self> {
        let config = BuildConfig::new().allow_unknown_dependencies(true);
        Self::build(data, dependencies, Some(generated), &config)
    }

    /// Build a file descriptor from its serialized `FileDescriptorProto`.
    ///
    /// `dependencies` must be the already built files named by the proto's
    /// `dependency` list, in the same order.
    pub fn build(
        data: impl Into<Bytes>,
        dependencies: &[FileDescriptor],
        generated: Option<&GeneratedCodeInfo>,
        config: &BuildConfig,
    ) -> Result<Self> {
        let data = data.into();
        let proto = FileDescriptorProto::decode(data.clone())?;
        let name = proto.name().to_string();
        let syntax = Syntax::try_from(proto.syntax())?;

        debug!(
            "Building {} ({}, {} dependencies)",
            name,
            syntax.as_str(),
            dependencies.len()
        );

        let public_dependencies = determine_public_dependencies(&proto, dependencies, config)?;
        check_dependencies(&proto, dependencies)?;

        let mut inner = FileInner {
            name: name.clone(),
            package: proto.package().to_string(),
            syntax,
            dependencies: dependencies.to_vec(),
            public_dependencies,
            pool: DescriptorPool::new(&name, dependencies),
            messages: Vec::new(),
            fields: Vec::new(),
            oneofs: Vec::new(),
            enums: Vec::new(),
            enum_values: Vec::new(),
            services: Vec::new(),
            methods: Vec::new(),
            top_messages: Vec::new(),
            top_enums: Vec::new(),
            top_extensions: Vec::new(),
            declarations: source::declarations(proto.source_code_info.as_ref()),
            options: proto.options.clone(),
            custom: None,
            proto: FileDescriptorProto::default(),
            serialized: Bytes::new(),
        };

        Translator {
            file: &mut inner,
            capture: config.capture_custom_options,
        }
        .translate(&proto, &data, generated)?;

        cross_link(&mut inner)?;

        debug!(
            "Built {}: {} messages, {} enums, {} services",
            name,
            inner.messages.len(),
            inner.enums.len(),
            inner.services.len()
        );

        inner.proto = proto;
        inner.serialized = data;
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Build an ordered list of serialized files.
    ///
    /// Every file's dependencies must appear earlier in the list, which is
    /// the order protoc hands files to plugins.
    pub fn build_from_byte_strings<I, B>(blobs: I) -> Result<Vec<FileDescriptor>>
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let config = BuildConfig::default();
        let mut built = Vec::new();
        let mut by_name: HashMap<String, FileDescriptor> = HashMap::new();

        for blob in blobs {
            let data = blob.into();
            let proto = FileDescriptorProto::decode(data.clone())?;

            let dependencies = proto
                .dependency
                .iter()
                .map(|name| {
                    by_name
                        .get(name)
                        .cloned()
                        .ok_or_else(|| Error::DependencyMissing { name: name.clone() })
                })
                .collect::<Result<Vec<_>>>()?;

            let file = Self::build(data, &dependencies, None, &config)?;
            if by_name.contains_key(file.name()) {
                return Err(Error::DuplicateFile {
                    name: file.name().to_string(),
                });
            }
            by_name.insert(file.name().to_string(), file.clone());
            built.push(file);
        }

        Ok(built)
    }

    pub(crate) fn inner(&self) -> &FileInner {
        &self.inner
    }

    /// File name, relative to the source root
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Package name; empty when the file declares none
    pub fn package(&self) -> &str {
        &self.inner.package
    }

    /// Syntax the file was written in
    pub fn syntax(&self) -> Syntax {
        self.inner.syntax
    }

    /// Direct imports in declaration order
    pub fn dependencies(&self) -> &[FileDescriptor] {
        &self.inner.dependencies
    }

    /// Imports this file re-exports with `import public`
    pub fn public_dependencies(&self) -> &[FileDescriptor] {
        &self.inner.public_dependencies
    }

    /// Top-level message types in declaration order
    pub fn messages(&self) -> impl ExactSizeIterator<Item = MessageDescriptor> + '_ {
        self.inner
            .top_messages
            .iter()
            .map(|&index| MessageDescriptor::new(self.clone(), index))
    }

    /// Every message type declared in this file, nested ones included
    pub fn all_messages(&self) -> impl ExactSizeIterator<Item = MessageDescriptor> + '_ {
        (0..self.inner.messages.len()).map(|index| MessageDescriptor::new(self.clone(), index))
    }

    /// Top-level enum types in declaration order
    pub fn enums(&self) -> impl ExactSizeIterator<Item = EnumDescriptor> + '_ {
        self.inner
            .top_enums
            .iter()
            .map(|&index| EnumDescriptor::new(self.clone(), index))
    }

    /// Services in declaration order
    pub fn services(&self) -> impl ExactSizeIterator<Item = ServiceDescriptor> + '_ {
        (0..self.inner.services.len()).map(|index| ServiceDescriptor::new(self.clone(), index))
    }

    /// Top-level extensions in declaration order
    pub fn extensions(&self) -> impl ExactSizeIterator<Item = FieldDescriptor> + '_ {
        self.inner
            .top_extensions
            .iter()
            .map(|&index| FieldDescriptor::new(self.clone(), index))
    }

    /// The decoded proto this file was built from
    pub fn to_proto(&self) -> &FileDescriptorProto {
        &self.inner.proto
    }

    /// The serialized bytes this file was built from
    pub fn serialized_data(&self) -> &Bytes {
        &self.inner.serialized
    }

    /// `FileOptions` as declared, without custom options
    pub fn options(&self) -> Option<&FileOptions> {
        self.inner.options.as_ref()
    }

    /// Custom option values captured from the file options
    pub fn custom_options(&self) -> &CustomOptions {
        self.inner
            .custom
            .as_ref()
            .unwrap_or_else(|| CustomOptions::empty())
    }

    pub(crate) fn declaration(&self, path: &[i32]) -> Option<&Declaration> {
        self.inner.declarations.get(path)
    }

    /// Find a symbol by full name in this file or any file visible from it.
    ///
    /// A symbol of another kind reads as absent.
    pub fn find_symbol<T: FromDescriptor>(&self, full_name: &str) -> Option<T> {
        let found = self.inner.pool.find(full_name)?;
        T::from_descriptor(self.descriptor_for(found))
    }

    /// Resolve `name` the way a reference written inside `relative_to` would be
    pub fn lookup_symbol(&self, name: &str, relative_to: &str) -> Result<Descriptor> {
        let found = self.inner.pool.lookup(name, relative_to)?;
        Ok(self.descriptor_for(found))
    }

    /// Find a top-level type declared in this file by its name relative to
    /// the package. Dotted names never match.
    pub fn find_type_by_name<T: FromDescriptor>(&self, name: &str) -> Option<T> {
        if name.contains('.') {
            return None;
        }
        let full_name = join_name(&self.inner.package, name);
        match self.inner.pool.find_local(&full_name)? {
            Symbol::Package => None,
            symbol => T::from_descriptor(self.descriptor_for(Found {
                file: None,
                symbol,
                full_name,
            })),
        }
    }

    /// Every symbol declared in this file, sorted by full name
    pub fn symbols(&self) -> Vec<Descriptor> {
        let mut names: Vec<_> = self.inner.pool.local_symbols().collect();
        names.sort_by(|a, b| a.0.cmp(b.0));
        names
            .into_iter()
            .map(|(name, symbol)| {
                self.descriptor_for(Found {
                    file: None,
                    symbol,
                    full_name: name.to_string(),
                })
            })
            .collect()
    }

    fn descriptor_for(&self, found: Found) -> Descriptor {
        let file = found.file.unwrap_or_else(|| self.clone());
        match found.symbol {
            Symbol::Package => Descriptor::Package(PackageDescriptor::new(found.full_name, file)),
            Symbol::Message(index) => Descriptor::Message(MessageDescriptor::new(file, index)),
            Symbol::Field(index) => Descriptor::Field(FieldDescriptor::new(file, index)),
            Symbol::Enum(index) => Descriptor::Enum(EnumDescriptor::new(file, index)),
            Symbol::EnumValue(index) => {
                Descriptor::EnumValue(EnumValueDescriptor::new(file, index))
            }
            Symbol::Oneof(index) => Descriptor::Oneof(OneofDescriptor::new(file, index)),
            Symbol::Service(index) => Descriptor::Service(ServiceDescriptor::new(file, index)),
            Symbol::Method(index) => Descriptor::Method(MethodDescriptor::new(file, index)),
        }
    }
}

impl PartialEq for FileDescriptor {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for FileDescriptor {}

impl Hash for FileDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.inner).hash(state);
    }
}

impl fmt::Debug for FileDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileDescriptor")
            .field("name", &self.inner.name)
            .field("package", &self.inner.package)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for FileDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileDescriptor for {}", self.inner.name)
    }
}

fn determine_public_dependencies(
    proto: &FileDescriptorProto,
    dependencies: &[FileDescriptor],
    config: &BuildConfig,
) -> Result<Vec<FileDescriptor>> {
    let mut public = Vec::new();

    for &index in &proto.public_dependency {
        let name = usize::try_from(index)
            .ok()
            .and_then(|index| proto.dependency.get(index))
            .ok_or_else(|| Error::validation(proto.name(), "Invalid public dependency index."))?;

        match dependencies.iter().find(|file| file.name() == name) {
            Some(file) => public.push(file.clone()),
            None if config.allow_unknown_dependencies => {
                trace!("Ignoring unknown public dependency {}", name);
            }
            None => {
                return Err(Error::validation(
                    proto.name(),
                    format!("Invalid public dependency: {}", name),
                ))
            }
        }
    }

    Ok(public)
}

fn check_dependencies(proto: &FileDescriptorProto, dependencies: &[FileDescriptor]) -> Result<()> {
    let matches = dependencies.len() == proto.dependency.len()
        && dependencies
            .iter()
            .zip(&proto.dependency)
            .all(|(file, name)| file.name() == name);

    if !matches {
        return Err(Error::validation(
            proto.name(),
            "Dependencies passed to FileDescriptor::build don't match those listed in the FileDescriptorProto.",
        ));
    }
    Ok(())
}

/// Raw fields of one message inside the serialized file.
#[derive(Debug, Default)]
struct RawNode<'a> {
    fields: Vec<RawField<'a>>,
}

impl<'a> RawNode<'a> {
    fn parse(data: &'a [u8]) -> Result<Self> {
        Ok(Self {
            fields: read_fields(data)?,
        })
    }

    /// Nodes for each occurrence of a repeated message field, padded to `count`.
    fn children(&self, number: u32, count: usize) -> Result<Vec<RawNode<'a>>> {
        let mut children = length_delimited(&self.fields, number)
            .into_iter()
            .take(count)
            .map(RawNode::parse)
            .collect::<Result<Vec<_>>>()?;
        children.resize_with(count, RawNode::default);
        Ok(children)
    }

    fn custom_options(&self, number: u32) -> Result<Option<CustomOptions>> {
        match merged_message(&self.fields, number) {
            Some(options) => CustomOptions::parse(&options),
            None => Ok(None),
        }
    }
}

/// Enclosing declaration of the node being translated.
struct Scope<'s> {
    /// Arena index of the enclosing message
    message: Option<usize>,
    /// Full name children are qualified with
    name: &'s str,
    path: &'s [i32],
}

impl Scope<'_> {
    fn child_path(&self, number: i32, index: usize) -> Vec<i32> {
        let mut path = self.path.to_vec();
        path.push(number);
        path.push(index as i32);
        path
    }
}

enum Membership {
    Field { oneof_base: usize, oneof_count: usize },
    Extension,
}

fn check_count(symbol: &str, what: &str, generated: usize, declared: usize) -> Result<()> {
    if generated != declared {
        return Err(Error::validation(
            symbol,
            format!(
                "Generated code has the wrong number of {} for {} ({} supplied, {} declared).",
                what, symbol, generated, declared
            ),
        ));
    }
    Ok(())
}

struct Translator<'f> {
    file: &'f mut FileInner,
    capture: bool,
}

impl Translator<'_> {
    fn translate(
        &mut self,
        proto: &FileDescriptorProto,
        data: &[u8],
        generated: Option<&GeneratedCodeInfo>,
    ) -> Result<()> {
        trace!("Translating {}", proto.name());

        let raw = if self.capture {
            RawNode::parse(data)?
        } else {
            RawNode::default()
        };

        let package = proto.package().to_string();
        if !package.is_empty() {
            self.file.pool.add_package(&package)?;
        }

        if let Some(info) = generated {
            check_count(proto.name(), "message types", info.nested_types.len(), proto.message_type.len())?;
            check_count(proto.name(), "enum types", info.nested_enums.len(), proto.enum_type.len())?;
        }

        let scope = Scope {
            message: None,
            name: &package,
            path: &[],
        };

        let raw_messages = raw.children(4, proto.message_type.len())?;
        for (i, (message, raw_message)) in proto.message_type.iter().zip(&raw_messages).enumerate() {
            let info = generated.and_then(|g| g.nested_types.get(i)).and_then(Option::as_ref);
            let index = self.message(message, raw_message, &scope, i, info)?;
            self.file.top_messages.push(index);
        }

        let raw_enums = raw.children(5, proto.enum_type.len())?;
        for (i, (enum_type, raw_enum)) in proto.enum_type.iter().zip(&raw_enums).enumerate() {
            let generated_type = generated.and_then(|g| g.nested_enums.get(i)).cloned();
            let index = self.enum_type(enum_type, raw_enum, &scope, i, generated_type)?;
            self.file.top_enums.push(index);
        }

        let raw_services = raw.children(6, proto.service.len())?;
        for (i, (service, raw_service)) in proto.service.iter().zip(&raw_services).enumerate() {
            self.service(service, raw_service, &package, i)?;
        }

        let raw_extensions = raw.children(7, proto.extension.len())?;
        for (i, (extension, raw_extension)) in proto.extension.iter().zip(&raw_extensions).enumerate()
        {
            let index = self.field(extension, raw_extension, &scope, i, Membership::Extension, None)?;
            self.file.top_extensions.push(index);
        }

        self.file.custom = raw.custom_options(8)?;
        Ok(())
    }

    fn message(
        &mut self,
        proto: &DescriptorProto,
        raw: &RawNode<'_>,
        scope: &Scope<'_>,
        index: usize,
        generated: Option<&GeneratedCodeInfo>,
    ) -> Result<usize> {
        let full_name = join_name(scope.name, proto.name());
        let path = scope.child_path(if scope.message.is_some() { 3 } else { 4 }, index);

        if let Some(info) = generated {
            check_count(&full_name, "properties", info.property_names.len(), proto.field.len())?;
            check_count(&full_name, "oneofs", info.oneof_names.len(), proto.oneof_decl.len())?;
            check_count(&full_name, "nested types", info.nested_types.len(), proto.nested_type.len())?;
            check_count(&full_name, "nested enums", info.nested_enums.len(), proto.enum_type.len())?;
        }

        let message_index = self.file.messages.len();
        self.file.messages.push(MessageInner {
            base: DescriptorBase::new(index, proto.name(), full_name.clone(), path.clone()),
            parent: scope.message,
            nested: Vec::new(),
            enums: Vec::new(),
            fields: Vec::new(),
            fields_in_number_order: Vec::new(),
            fields_by_name: HashMap::new(),
            fields_by_json_name: HashMap::new(),
            oneofs: Vec::new(),
            extensions: Vec::new(),
            extension_ranges: proto
                .extension_range
                .iter()
                .map(|range| range.start().max(0) as u32..range.end().max(0) as u32)
                .collect(),
            options: proto.options.clone(),
            custom: raw.custom_options(7)?,
            generated_type: generated.and_then(|info| info.type_name.clone()),
        });

        let inner_scope = Scope {
            message: Some(message_index),
            name: &full_name,
            path: &path,
        };

        let oneof_base = self.file.oneofs.len();
        let raw_oneofs = raw.children(8, proto.oneof_decl.len())?;
        for (i, (oneof, raw_oneof)) in proto.oneof_decl.iter().zip(&raw_oneofs).enumerate() {
            let oneof_name = join_name(&full_name, oneof.name());
            let oneof_index = self.file.oneofs.len();
            self.file.oneofs.push(OneofInner {
                base: DescriptorBase::new(i, oneof.name(), oneof_name.clone(), inner_scope.child_path(8, i)),
                message: message_index,
                fields: Vec::new(),
                options: oneof.options.clone(),
                custom: raw_oneof.custom_options(2)?,
                property_name: generated.and_then(|info| info.oneof_names.get(i)).cloned(),
            });
            self.file
                .pool
                .add_symbol(oneof.name(), &oneof_name, Symbol::Oneof(oneof_index))?;
            self.file.messages[message_index].oneofs.push(oneof_index);
        }

        let raw_nested = raw.children(3, proto.nested_type.len())?;
        for (i, (nested, raw_child)) in proto.nested_type.iter().zip(&raw_nested).enumerate() {
            let info = generated.and_then(|g| g.nested_types.get(i)).and_then(Option::as_ref);
            let child = self.message(nested, raw_child, &inner_scope, i, info)?;
            self.file.messages[message_index].nested.push(child);
        }

        let raw_enums = raw.children(4, proto.enum_type.len())?;
        for (i, (enum_type, raw_enum)) in proto.enum_type.iter().zip(&raw_enums).enumerate() {
            let generated_type = generated.and_then(|g| g.nested_enums.get(i)).cloned();
            let child = self.enum_type(enum_type, raw_enum, &inner_scope, i, generated_type)?;
            self.file.messages[message_index].enums.push(child);
        }

        let raw_fields = raw.children(2, proto.field.len())?;
        for (i, (field, raw_field)) in proto.field.iter().zip(&raw_fields).enumerate() {
            let membership = Membership::Field {
                oneof_base,
                oneof_count: proto.oneof_decl.len(),
            };
            let property_name = generated.and_then(|g| g.property_names.get(i)).cloned();
            self.field(field, raw_field, &inner_scope, i, membership, property_name)?;
        }

        let raw_extensions = raw.children(6, proto.extension.len())?;
        for (i, (extension, raw_extension)) in proto.extension.iter().zip(&raw_extensions).enumerate()
        {
            let child =
                self.field(extension, raw_extension, &inner_scope, i, Membership::Extension, None)?;
            self.file.messages[message_index].extensions.push(child);
        }

        self.file
            .pool
            .add_symbol(proto.name(), &full_name, Symbol::Message(message_index))?;
        Ok(message_index)
    }

    fn field(
        &mut self,
        proto: &FieldDescriptorProto,
        raw: &RawNode<'_>,
        scope: &Scope<'_>,
        index: usize,
        membership: Membership,
        property_name: Option<String>,
    ) -> Result<usize> {
        let name = proto.name();
        let full_name = join_name(scope.name, name);
        let path_number = match (&membership, scope.message) {
            (Membership::Field { .. }, _) => 2,
            (Membership::Extension, Some(_)) => 6,
            (Membership::Extension, None) => 7,
        };

        let number = proto.number();
        if number <= 0 {
            return Err(Error::validation(
                &full_name,
                "Field numbers must be positive integers.",
            ));
        }
        if number as u32 > MAX_VALID_NUMBER {
            return Err(Error::validation(
                &full_name,
                format!("Field numbers cannot be greater than {}.", MAX_VALID_NUMBER),
            ));
        }

        let kind = match proto.r#type {
            None => None,
            Some(value) => Some(FieldType::from_proto(value).ok_or_else(|| {
                Error::validation(&full_name, format!("Unknown field type {}.", value))
            })?),
        };

        let syntax = self.file.syntax;
        if syntax == Syntax::Proto3 {
            if kind == Some(FieldType::Group) {
                return Err(Error::validation(
                    &full_name,
                    "Groups are not supported in proto3 syntax.",
                ));
            }
            if proto.default_value.is_some() {
                return Err(Error::validation(
                    &full_name,
                    "Explicit default values are not allowed in proto3.",
                ));
            }
        }

        let (containing, oneof) = match membership {
            Membership::Extension => {
                if proto.extendee.is_none() {
                    return Err(Error::validation(
                        &full_name,
                        "FieldDescriptorProto.Extendee not set for extension field.",
                    ));
                }
                (None, None)
            }
            Membership::Field {
                oneof_base,
                oneof_count,
            } => {
                if proto.extendee.is_some() {
                    return Err(Error::validation(
                        &full_name,
                        "FieldDescriptorProto.Extendee set for non-extension field.",
                    ));
                }
                let oneof = match proto.oneof_index {
                    None => None,
                    Some(i) if i >= 0 && (i as usize) < oneof_count => {
                        Some(oneof_base + i as usize)
                    }
                    Some(_) => {
                        let message_name = scope
                            .message
                            .map_or("", |m| self.file.messages[m].base.name.as_str());
                        return Err(Error::validation(
                            &full_name,
                            format!(
                                "FieldDescriptorProto.oneof_index is out of range for type {}",
                                message_name
                            ),
                        ));
                    }
                };
                (scope.message.map(Target::Local), oneof)
            }
        };

        let json_name = proto
            .json_name
            .clone()
            .unwrap_or_else(|| to_lower_camel_case(name));

        let field_index = self.file.fields.len();
        self.file.fields.push(FieldInner {
            base: DescriptorBase::new(index, name, full_name.clone(), scope.child_path(path_number, index)),
            scope: scope.message,
            number: number as u32,
            label: Label::from_proto(proto.label),
            kind,
            type_name: proto.type_name.clone(),
            extendee: proto.extendee.clone(),
            containing: containing.clone(),
            type_link: None,
            oneof,
            proto3_optional: proto.proto3_optional(),
            json_name: json_name.clone(),
            property_name,
            default_raw: proto.default_value.clone(),
            default: None,
            is_map: false,
            syntax,
            options: proto.options.clone(),
            custom: raw.custom_options(8)?,
        });
        self.file
            .pool
            .add_symbol(name, &full_name, Symbol::Field(field_index))?;

        if let Some(Target::Local(message)) = containing {
            let message = &mut self.file.messages[message];
            message.fields.push(field_index);
            message.fields_by_name.insert(name.to_string(), field_index);
            message
                .fields_by_json_name
                .entry(json_name)
                .or_insert(field_index);
        }

        Ok(field_index)
    }

    fn enum_type(
        &mut self,
        proto: &EnumDescriptorProto,
        raw: &RawNode<'_>,
        scope: &Scope<'_>,
        index: usize,
        generated_type: Option<String>,
    ) -> Result<usize> {
        let full_name = join_name(scope.name, proto.name());
        let path = scope.child_path(if scope.message.is_some() { 4 } else { 5 }, index);

        if proto.value.is_empty() {
            return Err(Error::validation(
                &full_name,
                "Enums must contain at least one value.",
            ));
        }

        let enum_index = self.file.enums.len();
        self.file.enums.push(EnumInner {
            base: DescriptorBase::new(index, proto.name(), full_name.clone(), path.clone()),
            parent: scope.message,
            values: Vec::new(),
            options: proto.options.clone(),
            custom: raw.custom_options(3)?,
            generated_type,
        });

        let raw_values = raw.children(2, proto.value.len())?;
        for (i, (value, raw_value)) in proto.value.iter().zip(&raw_values).enumerate() {
            // Values are siblings of their enum, not children.
            let value_name = join_name(scope.name, value.name());
            let mut value_path = path.clone();
            value_path.extend([2, i as i32]);

            let value_index = self.file.enum_values.len();
            self.file.enum_values.push(EnumValueInner {
                base: DescriptorBase::new(i, value.name(), value_name.clone(), value_path),
                parent: enum_index,
                number: value.number(),
                options: value.options.clone(),
                custom: raw_value.custom_options(3)?,
            });
            self.file
                .pool
                .add_symbol(value.name(), &value_name, Symbol::EnumValue(value_index))?;
            self.file
                .pool
                .add_enum_value_by_number(enum_index, value.number(), value_index);
            self.file.enums[enum_index].values.push(value_index);
        }

        self.file
            .pool
            .add_symbol(proto.name(), &full_name, Symbol::Enum(enum_index))?;
        Ok(enum_index)
    }

    fn service(
        &mut self,
        proto: &ServiceDescriptorProto,
        raw: &RawNode<'_>,
        package: &str,
        index: usize,
    ) -> Result<usize> {
        let full_name = join_name(package, proto.name());
        let path = vec![6, index as i32];

        let service_index = self.file.services.len();
        self.file.services.push(ServiceInner {
            base: DescriptorBase::new(index, proto.name(), full_name.clone(), path.clone()),
            methods: Vec::new(),
            options: proto.options.clone(),
            custom: raw.custom_options(3)?,
        });

        let raw_methods = raw.children(2, proto.method.len())?;
        for (i, (method, raw_method)) in proto.method.iter().zip(&raw_methods).enumerate() {
            let method_name = join_name(&full_name, method.name());
            let mut method_path = path.clone();
            method_path.extend([2, i as i32]);

            let method_index = self.file.methods.len();
            self.file.methods.push(MethodInner {
                base: DescriptorBase::new(i, method.name(), method_name.clone(), method_path),
                service: service_index,
                input_type_name: method.input_type().to_string(),
                output_type_name: method.output_type().to_string(),
                input: None,
                output: None,
                client_streaming: method.client_streaming(),
                server_streaming: method.server_streaming(),
                options: method.options.clone(),
                custom: raw_method.custom_options(4)?,
            });
            self.file
                .pool
                .add_symbol(method.name(), &method_name, Symbol::Method(method_index))?;
            self.file.services[service_index].methods.push(method_index);
        }

        self.file
            .pool
            .add_symbol(proto.name(), &full_name, Symbol::Service(service_index))?;
        Ok(service_index)
    }
}

/// Everything cross-link learns about one field.
struct FieldLink {
    kind: FieldType,
    containing: Option<Target>,
    type_link: Option<Target>,
    is_map: bool,
    default: Option<Value>,
}

fn cross_link(file: &mut FileInner) -> Result<()> {
    debug!(
        "Cross-linking {}: {} fields, {} methods",
        file.name,
        file.fields.len(),
        file.methods.len()
    );

    for message_index in 0..file.messages.len() {
        let message = &file.messages[message_index];
        if message.is_message_set() && !message.fields.is_empty() {
            return Err(Error::validation(
                &message.base.full_name,
                "MessageSets cannot have fields, only extensions.",
            ));
        }

        let entries: Vec<(u32, usize, String)> = message
            .fields
            .iter()
            .map(|&f| (file.fields[f].number, f, file.fields[f].base.full_name.clone()))
            .collect();
        for (number, field, full_name) in entries {
            file.pool
                .add_field_by_number(message_index, number, field, &full_name)?;
        }

        let mut order = file.messages[message_index].fields.clone();
        order.sort_by_key(|&f| file.fields[f].number);
        file.messages[message_index].fields_in_number_order = order;
    }

    for index in 0..file.fields.len() {
        let link = link_field(file, index)?;
        let field = &mut file.fields[index];
        field.kind = Some(link.kind);
        field.containing = link.containing;
        field.type_link = link.type_link;
        field.is_map = link.is_map;
        field.default = link.default;

        if let Some(oneof) = field.oneof {
            file.oneofs[oneof].fields.push(index);
        }
    }

    for index in 0..file.methods.len() {
        let method = &file.methods[index];
        let input = link_method_type(file, &method.input_type_name, &method.base.full_name)?;
        let output = link_method_type(file, &method.output_type_name, &method.base.full_name)?;
        let method = &mut file.methods[index];
        method.input = Some(input);
        method.output = Some(output);
    }

    Ok(())
}

fn link_method_type(file: &FileInner, type_name: &str, method: &str) -> Result<Target> {
    let found = file.pool.lookup(type_name, method)?;
    match found.symbol {
        Symbol::Message(index) => Ok(found.target(index)),
        _ => Err(Error::validation(
            method,
            format!("\"{}\" is not a message type.", type_name),
        )),
    }
}

fn link_field(file: &FileInner, index: usize) -> Result<FieldLink> {
    let field = &file.fields[index];
    let full_name = field.base.full_name.as_str();
    trace!("Linking field {}", full_name);

    let mut containing = field.containing.clone();
    if let Some(extendee) = &field.extendee {
        let found = file.pool.lookup(extendee, full_name)?;
        let Symbol::Message(message) = found.symbol else {
            return Err(Error::validation(
                full_name,
                format!("\"{}\" is not a message type.", extendee),
            ));
        };
        let target = found.target(message);
        let (owner_file, message) = target.resolve_with(file, FileDescriptor::inner);
        let message = &owner_file.messages[message];
        if !message.is_extension_number(field.number) {
            return Err(Error::validation(
                full_name,
                format!(
                    "\"{}\" does not declare {} as an extension number.",
                    message.base.full_name, field.number
                ),
            ));
        }
        containing = Some(target);
    }

    let mut kind = field.kind;
    let mut type_link = None;
    match &field.type_name {
        Some(type_name) => {
            let found = file.pool.lookup(type_name, full_name)?;
            let resolved = match kind {
                Some(kind) => kind,
                None => match found.symbol {
                    Symbol::Message(_) => FieldType::Message,
                    Symbol::Enum(_) => FieldType::Enum,
                    _ => {
                        return Err(Error::validation(
                            full_name,
                            format!("\"{}\" is not a type.", type_name),
                        ))
                    }
                },
            };

            if resolved.is_message() {
                let Symbol::Message(message) = found.symbol else {
                    return Err(Error::validation(
                        full_name,
                        format!("\"{}\" is not a message type.", type_name),
                    ));
                };
                if field.default_raw.is_some() {
                    return Err(Error::validation(
                        full_name,
                        "Messages can't have default values.",
                    ));
                }
                type_link = Some(found.target(message));
            } else if resolved == FieldType::Enum {
                let Symbol::Enum(enum_index) = found.symbol else {
                    return Err(Error::validation(
                        full_name,
                        format!("\"{}\" is not an enum type.", type_name),
                    ));
                };
                type_link = Some(found.target(enum_index));
            } else {
                return Err(Error::validation(
                    full_name,
                    "Field with primitive type has type_name.",
                ));
            }
            kind = Some(resolved);
        }
        None => {
            if kind.map_or(true, |kind| kind.is_message() || kind == FieldType::Enum) {
                return Err(Error::validation(
                    full_name,
                    "Field with message or enum type missing type_name.",
                ));
            }
        }
    }

    let kind = kind.unwrap_or(FieldType::Message);

    if let Some(target) = &containing {
        let (owner_file, message) = target.resolve_with(file, FileDescriptor::inner);
        if field.extendee.is_some()
            && owner_file.messages[message].is_message_set()
            && (field.label != Label::Optional || kind != FieldType::Message)
        {
            return Err(Error::validation(
                full_name,
                "Extensions of MessageSets must be optional messages.",
            ));
        }
    }

    let is_map = field.label == Label::Repeated
        && kind == FieldType::Message
        && type_link.as_ref().is_some_and(|target| {
            let (owner_file, message) = target.resolve_with(file, FileDescriptor::inner);
            owner_file.messages[message].is_map_entry()
        });

    let default = link_default(file, field, kind, type_link.as_ref())?;

    Ok(FieldLink {
        kind,
        containing,
        type_link,
        is_map,
        default,
    })
}

fn link_default(
    file: &FileInner,
    field: &FieldInner,
    kind: FieldType,
    type_link: Option<&Target>,
) -> Result<Option<Value>> {
    let full_name = field.base.full_name.as_str();

    let enum_values = |target: &Target| -> Vec<(String, i32)> {
        let (owner_file, enum_index) = target.resolve_with(file, FileDescriptor::inner);
        owner_file.enums[enum_index]
            .values
            .iter()
            .map(|&v| {
                let value = &owner_file.enum_values[v];
                (value.base.name.clone(), value.number)
            })
            .collect()
    };

    let Some(raw) = &field.default_raw else {
        return Ok(match kind {
            FieldType::Message | FieldType::Group => None,
            FieldType::Enum => type_link
                .and_then(|target| enum_values(target).first().map(|(_, n)| Value::EnumNumber(*n))),
            other => Value::zero(other),
        });
    };

    if field.label == Label::Repeated {
        return Err(Error::validation(
            full_name,
            "Repeated fields cannot have default values.",
        ));
    }

    if kind == FieldType::Enum {
        let values = type_link.map(enum_values).unwrap_or_default();
        return match values.iter().find(|(name, _)| name == raw) {
            Some((_, number)) => Ok(Some(Value::EnumNumber(*number))),
            None => Err(Error::validation(
                full_name,
                format!("Unknown enum default value: \"{}\"", raw),
            )),
        };
    }

    parse_default(kind, raw).map(Some).ok_or_else(|| {
        Error::validation(
            full_name,
            format!("Could not parse default value: \"{}\"", raw),
        )
    })
}
