//! Binding information supplied by generated code.
//!
//! Code generators describe how each schema type maps onto native types:
//! the native type name, one property name per field, one name per oneof,
//! and the same information for nested types. The tree mirrors the schema
//! tree exactly; when it is supplied, every count must match or the build
//! fails. Purely dynamic use passes no info at all.

/// Native binding for one message (or, at the root, one file)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedCodeInfo {
    /// Native type name; `None` at the file root
    pub type_name: Option<String>,
    /// Native member name for each field, in declaration order
    pub property_names: Vec<String>,
    /// Native member name for each oneof, in declaration order
    pub oneof_names: Vec<String>,
    /// Info for each nested message; `None` for synthetic map entries
    pub nested_types: Vec<Option<GeneratedCodeInfo>>,
    /// Native type name for each nested enum
    pub nested_enums: Vec<String>,
}

impl GeneratedCodeInfo {
    /// Root info for a file
    pub fn file(nested_types: Vec<Option<GeneratedCodeInfo>>, nested_enums: Vec<String>) -> Self {
        Self {
            nested_types,
            nested_enums,
            ..Self::default()
        }
    }

    /// Info for a message with the given native type and property names
    pub fn message<S: Into<String>>(
        type_name: impl Into<String>,
        property_names: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            type_name: Some(type_name.into()),
            property_names: property_names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sets the oneof names
    pub fn with_oneofs<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.oneof_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the nested message info
    pub fn with_nested_types(mut self, nested: Vec<Option<GeneratedCodeInfo>>) -> Self {
        self.nested_types = nested;
        self
    }

    /// Sets the nested enum names
    pub fn with_nested_enums<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.nested_enums = names.into_iter().map(Into::into).collect();
        self
    }
}
