//! Per-file symbol table.
//!
//! Every file owns one [`DescriptorPool`]. It maps fully-qualified names to
//! arena indices for the file's own declarations and falls back to the pools
//! of its visible dependencies: every direct import, plus whatever those
//! files re-export through `import public`, transitively.
//!
//! Name resolution follows C++ scoping. See [`DescriptorPool::lookup`].

use crate::descriptor::{FileDescriptor, Target};
use crate::error::{Error, Result};
use std::collections::HashMap;
use tracing::trace;

/// Kind and arena index of a registered symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Symbol {
    Package,
    Message(usize),
    Field(usize),
    Enum(usize),
    EnumValue(usize),
    Oneof(usize),
    Service(usize),
    Method(usize),
}

impl Symbol {
    fn is_package(self) -> bool {
        matches!(self, Symbol::Package)
    }
}

/// A symbol together with the pool it was found in.
///
/// `file` is `None` for the pool's own file, which is still under
/// construction while lookups run.
#[derive(Debug, Clone)]
pub(crate) struct Found {
    pub(crate) file: Option<FileDescriptor>,
    pub(crate) symbol: Symbol,
    pub(crate) full_name: String,
}

impl Found {
    /// Build a link to `index`, which must belong to `self.symbol`'s kind.
    pub(crate) fn target(&self, index: usize) -> Target {
        match &self.file {
            None => Target::Local(index),
            Some(file) => Target::Foreign(file.clone(), index),
        }
    }
}

/// Symbol table for a single file and its visible dependencies
#[derive(Debug, Default)]
pub(crate) struct DescriptorPool {
    file_name: String,
    symbols: HashMap<String, Symbol>,
    /// (containing message, number) -> (field, field full name)
    fields_by_number: HashMap<(usize, u32), (usize, String)>,
    /// (enum, number) -> first value declared with that number
    enum_values_by_number: HashMap<(usize, i32), usize>,
    /// Direct imports plus their public imports, deduplicated, in discovery order
    dependencies: Vec<FileDescriptor>,
}

impl DescriptorPool {
    /// Creates a pool whose fallback closure covers `direct` and every file
    /// they publicly re-export.
    pub(crate) fn new(file_name: &str, direct: &[FileDescriptor]) -> Self {
        let mut dependencies = Vec::new();
        for file in direct {
            if !dependencies.contains(file) {
                dependencies.push(file.clone());
            }
            Self::import_public_dependencies(file, &mut dependencies);
        }

        trace!(
            "Pool for {} sees {} dependency file(s)",
            file_name,
            dependencies.len()
        );

        Self {
            file_name: file_name.to_string(),
            dependencies,
            ..Self::default()
        }
    }

    fn import_public_dependencies(file: &FileDescriptor, dependencies: &mut Vec<FileDescriptor>) {
        for public in file.public_dependencies() {
            if !dependencies.contains(public) {
                dependencies.push(public.clone());
                Self::import_public_dependencies(public, dependencies);
            }
        }
    }

    /// Symbols declared in this file, in no particular order
    pub(crate) fn local_symbols(&self) -> impl Iterator<Item = (&str, Symbol)> + '_ {
        self.symbols.iter().map(|(name, symbol)| (name.as_str(), *symbol))
    }

    /// Exact lookup of a symbol declared in this file
    pub(crate) fn find_local(&self, full_name: &str) -> Option<Symbol> {
        self.symbols.get(full_name).copied()
    }

    /// Exact lookup here, then in every visible dependency.
    pub(crate) fn find(&self, full_name: &str) -> Option<Found> {
        if let Some(symbol) = self.find_local(full_name) {
            return Some(Found {
                file: None,
                symbol,
                full_name: full_name.to_string(),
            });
        }

        self.dependencies.iter().find_map(|file| {
            file.inner()
                .pool
                .find_local(full_name)
                .map(|symbol| Found {
                    file: Some(file.clone()),
                    symbol,
                    full_name: full_name.to_string(),
                })
        })
    }

    /// Register a symbol under `full_name`.
    ///
    /// Only a package placeholder may be replaced.
    pub(crate) fn add_symbol(&mut self, name: &str, full_name: &str, symbol: Symbol) -> Result<()> {
        validate_identifier(name, full_name)?;

        if let Some(existing) = self.symbols.get(full_name) {
            if !existing.is_package() {
                let description = match full_name.rsplit_once('.') {
                    None => format!("\"{}\" is already defined.", full_name),
                    Some((scope, local)) => {
                        format!("\"{}\" is already defined in \"{}\".", local, scope)
                    }
                };
                return Err(Error::validation(full_name, description));
            }
        }

        if let Some(file) = self.defining_dependency(full_name) {
            return Err(Error::validation(
                full_name,
                format!(
                    "\"{}\" is already defined in file \"{}\".",
                    full_name,
                    file.name()
                ),
            ));
        }

        trace!("Registering {:?} {}", symbol, full_name);
        self.symbols.insert(full_name.to_string(), symbol);
        Ok(())
    }

    /// Dependency file that declares `full_name` as something other than a package
    fn defining_dependency(&self, full_name: &str) -> Option<&FileDescriptor> {
        self.dependencies.iter().find(|file| {
            file.inner()
                .pool
                .find_local(full_name)
                .is_some_and(|symbol| !symbol.is_package())
        })
    }

    /// Register `full_name` and every dotted prefix of it as a package.
    pub(crate) fn add_package(&mut self, full_name: &str) -> Result<()> {
        let name = match full_name.rsplit_once('.') {
            Some((parent, name)) => {
                self.add_package(parent)?;
                name
            }
            None => full_name,
        };
        validate_identifier(name, full_name)?;

        match self.symbols.get(full_name) {
            Some(Symbol::Package) => return Ok(()),
            Some(_) => {
                return Err(Error::validation(
                    full_name,
                    format!(
                        "\"{}\" is already defined (as something other than a package) in file \"{}\".",
                        full_name, self.file_name
                    ),
                ))
            }
            None => {}
        }

        if let Some(file) = self.defining_dependency(full_name) {
            return Err(Error::validation(
                full_name,
                format!(
                    "\"{}\" is already defined (as something other than a package) in file \"{}\".",
                    full_name,
                    file.name()
                ),
            ));
        }

        self.symbols.insert(full_name.to_string(), Symbol::Package);
        Ok(())
    }

    /// Resolve `name` as written inside the declaration `relative_to`.
    ///
    /// A leading `.` makes the name fully qualified. Otherwise the first
    /// component is searched for in each enclosing scope of `relative_to`,
    /// innermost first. The scope where it first resolves is the only one in
    /// which the complete name is then tried. If no scope matches, the name is
    /// tried once at the root.
    pub(crate) fn lookup(&self, name: &str, relative_to: &str) -> Result<Found> {
        let found = if let Some(qualified) = name.strip_prefix('.') {
            self.find(qualified)
        } else {
            self.lookup_scoped(name, relative_to)
        };

        found.ok_or_else(|| {
            Error::validation(relative_to, format!("\"{}\" is not defined.", name))
        })
    }

    fn lookup_scoped(&self, name: &str, relative_to: &str) -> Option<Found> {
        let first_part = name.split('.').next().unwrap_or(name);
        let mut scope = relative_to;

        while let Some((outer, _)) = scope.rsplit_once('.') {
            if let Some(found) = self.find(&format!("{}.{}", outer, first_part)) {
                if first_part.len() == name.len() {
                    return Some(found);
                }
                // Only the scope that bound the first component is considered.
                return self.find(&format!("{}.{}", outer, name));
            }
            scope = outer;
        }

        self.find(name)
    }

    /// Index a field by (containing message, number).
    pub(crate) fn add_field_by_number(
        &mut self,
        message: usize,
        number: u32,
        field: usize,
        field_full_name: &str,
    ) -> Result<()> {
        if let Some((_, existing)) = self.fields_by_number.get(&(message, number)) {
            let (scope, existing_name) = existing
                .rsplit_once('.')
                .unwrap_or(("", existing.as_str()));
            return Err(Error::validation(
                field_full_name,
                format!(
                    "Field number {} has already been used in \"{}\" by field \"{}\".",
                    number, scope, existing_name
                ),
            ));
        }

        self.fields_by_number
            .insert((message, number), (field, field_full_name.to_string()));
        Ok(())
    }

    /// Field of `message` with the given number
    pub(crate) fn find_field_by_number(&self, message: usize, number: u32) -> Option<usize> {
        self.fields_by_number
            .get(&(message, number))
            .map(|(field, _)| *field)
    }

    /// Index an enum value by (enum, number); the first value for a number wins.
    pub(crate) fn add_enum_value_by_number(&mut self, enum_index: usize, number: i32, value: usize) {
        self.enum_values_by_number
            .entry((enum_index, number))
            .or_insert(value);
    }

    /// First-declared value of `enum_index` with the given number
    pub(crate) fn find_enum_value_by_number(&self, enum_index: usize, number: i32) -> Option<usize> {
        self.enum_values_by_number.get(&(enum_index, number)).copied()
    }
}

/// Check a local name against `[A-Za-z_][A-Za-z0-9_]*`.
pub(crate) fn validate_identifier(name: &str, full_name: &str) -> Result<()> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(Error::validation(full_name, "Missing name."));
    };

    let valid = (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid {
        return Err(Error::validation(
            full_name,
            format!("\"{}\" is not a valid identifier.", name),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> DescriptorPool {
        DescriptorPool::new("test.proto", &[])
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("Foo_1", "Foo_1").is_ok());
        assert!(validate_identifier("_x", "_x").is_ok());
        assert!(validate_identifier("", "a.").is_err());
        assert!(validate_identifier("1abc", "1abc").is_err());
        assert!(validate_identifier("a-b", "a-b").is_err());
    }

    #[test]
    fn test_add_package_registers_prefixes() {
        let mut pool = pool();
        pool.add_package("a.b.c").unwrap();
        assert_eq!(pool.find_local("a"), Some(Symbol::Package));
        assert_eq!(pool.find_local("a.b"), Some(Symbol::Package));
        assert_eq!(pool.find_local("a.b.c"), Some(Symbol::Package));
        // Re-adding is fine
        pool.add_package("a.b").unwrap();
    }

    #[test]
    fn test_add_package_conflicts_with_symbol() {
        let mut pool = pool();
        pool.add_symbol("a", "a", Symbol::Message(0)).unwrap();
        let err = pool.add_package("a.b").unwrap_err();
        assert_eq!(err.symbol(), Some("a"));
        assert!(err.to_string().contains("other than a package"));
    }

    #[test]
    fn test_duplicate_symbol_rejected() {
        let mut pool = pool();
        pool.add_symbol("Foo", "pkg.Foo", Symbol::Message(0)).unwrap();
        let err = pool.add_symbol("Foo", "pkg.Foo", Symbol::Enum(0)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "pkg.Foo: \"Foo\" is already defined in \"pkg\"."
        );
    }

    #[test]
    fn test_symbol_may_replace_package_placeholder() {
        let mut pool = pool();
        pool.add_package("a.b").unwrap();
        pool.add_symbol("b", "a.b", Symbol::Message(3)).unwrap();
        assert_eq!(pool.find_local("a.b"), Some(Symbol::Message(3)));
    }

    #[test]
    fn test_invalid_symbol_name() {
        let mut pool = pool();
        let err = pool.add_symbol("Fo o", "Fo o", Symbol::Message(0)).unwrap_err();
        assert!(err.to_string().contains("not a valid identifier"));
    }

    #[test]
    fn test_lookup_walks_outward() {
        let mut pool = pool();
        pool.add_package("a.b").unwrap();
        pool.add_symbol("Foo", "a.Foo", Symbol::Message(0)).unwrap();

        let found = pool.lookup("Foo", "a.b.c").unwrap();
        assert_eq!(found.symbol, Symbol::Message(0));
        assert!(found.file.is_none());
    }

    #[test]
    fn test_lookup_prefers_innermost_scope() {
        let mut pool = pool();
        pool.add_symbol("Foo", "a.Foo", Symbol::Message(0)).unwrap();
        pool.add_symbol("Foo", "a.b.Foo", Symbol::Message(1)).unwrap();
        pool.add_symbol("Foo", "Foo", Symbol::Message(2)).unwrap();

        assert_eq!(pool.lookup("Foo", "a.b.c").unwrap().symbol, Symbol::Message(1));
        assert_eq!(pool.lookup("Foo", "a.x").unwrap().symbol, Symbol::Message(0));
        assert_eq!(pool.lookup(".Foo", "a.b.c").unwrap().symbol, Symbol::Message(2));
    }

    #[test]
    fn test_lookup_compound_name_stops_at_first_binding() {
        let mut pool = pool();
        pool.add_symbol("b", "a.b", Symbol::Message(0)).unwrap();
        pool.add_symbol("C", "b.C", Symbol::Message(1)).unwrap();

        // "b" binds to a.b, so "b.C" is only tried as a.b.C.
        let err = pool.lookup("b.C", "a.x.y").unwrap_err();
        assert_eq!(err.to_string(), "a.x.y: \"b.C\" is not defined.");

        pool.add_symbol("C", "a.b.C", Symbol::Message(2)).unwrap();
        assert_eq!(pool.lookup("b.C", "a.x.y").unwrap().symbol, Symbol::Message(2));
    }

    #[test]
    fn test_lookup_falls_back_to_root() {
        let mut pool = pool();
        pool.add_symbol("C", "b.C", Symbol::Message(1)).unwrap();
        assert_eq!(pool.lookup("b.C", "x.y").unwrap().symbol, Symbol::Message(1));
    }

    #[test]
    fn test_lookup_unknown_names_requester() {
        let pool = pool();
        let err = pool.lookup("Missing", "pkg.Msg.field").unwrap_err();
        assert_eq!(err.symbol(), Some("pkg.Msg.field"));
    }

    #[test]
    fn test_duplicate_field_number() {
        let mut pool = pool();
        pool.add_field_by_number(0, 1, 0, "pkg.Msg.a").unwrap();
        pool.add_field_by_number(1, 1, 1, "pkg.Other.a").unwrap();
        let err = pool.add_field_by_number(0, 1, 2, "pkg.Msg.b").unwrap_err();
        assert_eq!(err.symbol(), Some("pkg.Msg.b"));
        assert_eq!(
            err.to_string(),
            "pkg.Msg.b: Field number 1 has already been used in \"pkg.Msg\" by field \"a\"."
        );
        assert_eq!(pool.find_field_by_number(0, 1), Some(0));
    }

    #[test]
    fn test_enum_value_alias_keeps_first() {
        let mut pool = pool();
        pool.add_enum_value_by_number(0, 0, 10);
        pool.add_enum_value_by_number(0, 0, 11);
        assert_eq!(pool.find_enum_value_by_number(0, 0), Some(10));
        assert_eq!(pool.find_enum_value_by_number(0, 1), None);
    }
}
