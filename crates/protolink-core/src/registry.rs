//! Flattened lookup of message types across files.

use crate::descriptor::{FileDescriptor, MessageDescriptor};
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Map from full name to message type over a closure of files.
///
/// Each file's dependencies are included, and nested types are included. When two
/// files declare a message under the same full name, whichever is visited
/// last is kept.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    messages: HashMap<String, MessageDescriptor>,
}

impl TypeRegistry {
    /// A registry with no types
    pub fn empty() -> Self {
        Self::default()
    }

    /// Index every message in `files` and everything they import
    pub fn from_files<'a>(files: impl IntoIterator<Item = &'a FileDescriptor>) -> Self {
        let mut registry = Self::default();
        let mut visited = HashSet::new();
        for file in files {
            registry.add_file(file, &mut visited);
        }
        trace!("Type registry holds {} message types", registry.len());
        registry
    }

    /// Index the files declaring `messages`, with their dependencies
    pub fn from_messages<'a>(messages: impl IntoIterator<Item = &'a MessageDescriptor>) -> Self {
        let files: Vec<FileDescriptor> = messages.into_iter().map(|m| m.file().clone()).collect();
        Self::from_files(&files)
    }

    fn add_file(&mut self, file: &FileDescriptor, visited: &mut HashSet<FileDescriptor>) {
        if !visited.insert(file.clone()) {
            return;
        }
        for message in file.messages() {
            self.add_message(message);
        }
        for dependency in file.dependencies() {
            self.add_file(dependency, visited);
        }
    }

    fn add_message(&mut self, message: MessageDescriptor) {
        for nested in message.nested_messages() {
            self.add_message(nested);
        }
        self.messages.insert(message.full_name().to_string(), message);
    }

    /// Message type with the given full name
    pub fn find(&self, full_name: &str) -> Option<&MessageDescriptor> {
        self.messages.get(full_name)
    }

    /// Number of distinct full names
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the registry holds no types
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::test_util::*;
    use prost_types::field_descriptor_proto::Type;

    fn files() -> (FileDescriptor, FileDescriptor) {
        let mut base = file("base.proto", "base");
        let mut outer = message("Outer", vec![]);
        outer.nested_type.push(message("Inner", vec![]));
        base.message_type.push(outer);
        let base = build(&base, &[]).unwrap();

        let mut app = file("app.proto", "app");
        app.dependency.push("base.proto".into());
        app.message_type.push(message(
            "Root",
            vec![typed("o", 1, Type::Message, ".base.Outer")],
        ));
        let app = build(&app, &[base.clone()]).unwrap();
        (base, app)
    }

    #[test]
    fn test_from_files_walks_dependencies_and_nesting() {
        let (_, app) = files();
        let registry = TypeRegistry::from_files([&app]);
        assert_eq!(registry.len(), 3);
        assert!(registry.find("app.Root").is_some());
        assert!(registry.find("base.Outer").is_some());
        assert_eq!(
            registry.find("base.Outer.Inner").unwrap().name(),
            "Inner"
        );
        assert!(registry.find("base.Missing").is_none());
    }

    #[test]
    fn test_shared_dependency_visited_once() {
        let (base, app) = files();
        let registry = TypeRegistry::from_files([&app, &base, &app]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_from_messages() {
        let (base, _) = files();
        let outer: MessageDescriptor = base.find_symbol("base.Outer").unwrap();
        let registry = TypeRegistry::from_messages([&outer]);
        assert_eq!(registry.len(), 2);
        assert!(TypeRegistry::empty().is_empty());
    }
}
