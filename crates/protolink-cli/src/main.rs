//! protolink - Link and inspect Protocol Buffer descriptor sets
//!
//! This tool loads serialized `FileDescriptorSet` blobs (as written by
//! `protoc --descriptor_set_out --include_imports`), builds every file into a
//! linked descriptor graph and reports what it found.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser};
use prost::Message;
use prost_types::FileDescriptorProto;
use protolink_core::wire::{length_delimited, read_fields};
use protolink_core::{Descriptor, FileDescriptor, TypeRegistry};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Link and inspect Protocol Buffer descriptor sets
#[derive(Parser, Debug)]
#[command(name = "protolink")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// List every symbol declared in the loaded files
    #[arg(long)]
    list: bool,

    /// Resolve a type name as protoc would inside --scope
    #[arg(long, value_name = "NAME")]
    lookup: Option<String>,

    /// Fully-qualified name of the declaration the lookup is written in
    #[arg(long, value_name = "SCOPE", default_value = "", requires = "lookup")]
    scope: String,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single descriptor set
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of descriptor sets
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

/// `FileDescriptorSet.file`
const SET_FILE_FIELD: u32 = 1;

/// One serialized file taken from a descriptor set.
///
/// The bytes are kept as read so option extensions the decoder does not know
/// about reach the linker intact.
#[derive(Debug)]
struct CollectedFile {
    name: String,
    dependencies: Vec<String>,
    data: Vec<u8>,
}

/// Collects serialized files from several descriptor sets, skipping repeats
#[derive(Default)]
struct ProtoCollector {
    /// Maps proto filename -> content hash of the first version seen
    seen: HashMap<String, String>,
    files: Vec<CollectedFile>,
    stats: CollectorStats,
}

#[derive(Default)]
struct CollectorStats {
    total_found: usize,
    duplicates_skipped: usize,
    conflicts_skipped: usize,
}

impl ProtoCollector {
    fn new() -> Self {
        Self::default()
    }

    /// Compute a short hash of the content (first 8 chars of blake3)
    fn content_hash(content: &[u8]) -> String {
        let hash = blake3::hash(content);
        hash.to_hex()[..8].to_string()
    }

    /// Add one serialized file; returns false if it was skipped
    fn add(&mut self, data: &[u8], source: &Path) -> Result<bool> {
        let header = FileDescriptorProto::decode(data)
            .with_context(|| format!("Malformed file entry in {}", source.display()))?;
        self.stats.total_found += 1;
        let name = header.name().to_string();
        let hash = Self::content_hash(data);

        Ok(match self.seen.get(&name) {
            Some(existing) if *existing == hash => {
                debug!("Skipping duplicate: {} (hash: {})", name, hash);
                self.stats.duplicates_skipped += 1;
                false
            }
            Some(existing) => {
                warn!(
                    "Skipping {} from {}: content differs from the first copy ({} vs {})",
                    name,
                    source.display(),
                    hash,
                    existing
                );
                self.stats.conflicts_skipped += 1;
                false
            }
            None => {
                self.seen.insert(name.clone(), hash);
                self.files.push(CollectedFile {
                    name,
                    dependencies: header.dependency,
                    data: data.to_vec(),
                });
                true
            }
        })
    }

    /// Order files so every file follows the files it imports.
    ///
    /// Imports that no loaded file provides are left for the build to report.
    fn into_build_order(self) -> Vec<CollectedFile> {
        let names: Vec<String> = self.files.iter().map(|file| file.name.clone()).collect();
        let mut by_name: HashMap<String, CollectedFile> = self
            .files
            .into_iter()
            .map(|file| (file.name.clone(), file))
            .collect();
        let mut placed = HashSet::new();
        let mut ordered = Vec::with_capacity(names.len());

        fn place(
            name: &str,
            by_name: &mut HashMap<String, CollectedFile>,
            placed: &mut HashSet<String>,
            ordered: &mut Vec<CollectedFile>,
        ) {
            if placed.contains(name) {
                return;
            }
            let Some(file) = by_name.remove(name) else {
                return;
            };
            placed.insert(name.to_string());
            for dependency in &file.dependencies {
                place(dependency, by_name, placed, ordered);
            }
            ordered.push(file);
        }

        for name in &names {
            place(name, &mut by_name, &mut placed, &mut ordered);
        }
        ordered
    }

    fn print_summary(&self) {
        info!(
            "Summary: {} found, {} duplicates skipped, {} conflicts skipped",
            self.stats.total_found, self.stats.duplicates_skipped, self.stats.conflicts_skipped
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    let mut collector = ProtoCollector::new();
    if let Some(ref file) = cli.input.file {
        collect_single_file(file, &mut collector)?;
    } else if let Some(ref directory) = cli.input.directory {
        collect_directory(directory, &mut collector)?;
    } else {
        bail!("Either --file or --directory must be specified")
    }
    collector.print_summary();

    let files = link(collector)?;
    report(&cli, &files)
}

/// Read a single descriptor set
fn collect_single_file(file: &Path, collector: &mut ProtoCollector) -> Result<()> {
    if !file.exists() {
        bail!("Input file does not exist: {}", file.display());
    }
    if !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }
    read_descriptor_set(file, collector)
}

/// Read every descriptor set below a directory
fn collect_directory(directory: &Path, collector: &mut ProtoCollector) -> Result<()> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());
    let mut sets_read = 0;

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || !is_descriptor_set(path) {
            trace!("Skipping: {}", path.display());
            continue;
        }

        if let Err(e) = read_descriptor_set(path, collector) {
            // Log error but continue with other files
            warn!("Error reading {}: {:#}", path.display(), e);
            continue;
        }
        sets_read += 1;
    }

    info!("Read {} descriptor set(s)", sets_read);
    Ok(())
}

/// Descriptor sets by their conventional extensions
fn is_descriptor_set(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| matches!(ext.to_lowercase().as_str(), "pb" | "binpb" | "desc" | "protoset"))
        .unwrap_or(false)
}

fn read_descriptor_set(path: &Path, collector: &mut ProtoCollector) -> Result<()> {
    trace!("Reading {}", path.display());
    let data =
        fs::read(path).with_context(|| format!("Failed to read input file: {}", path.display()))?;

    let fields = read_fields(&data)
        .with_context(|| format!("Not a FileDescriptorSet: {}", path.display()))?;
    let files = length_delimited(&fields, SET_FILE_FIELD);

    debug!("{} holds {} file(s)", path.display(), files.len());
    for file in files {
        collector.add(file, path)?;
    }
    Ok(())
}

/// Build every collected file, dependencies first
fn link(collector: ProtoCollector) -> Result<Vec<FileDescriptor>> {
    let blobs = collector.into_build_order().into_iter().map(|file| file.data);
    let files =
        FileDescriptor::build_from_byte_strings(blobs).context("Failed to link descriptors")?;
    info!("Linked {} file(s)", files.len());
    Ok(files)
}

fn report(cli: &Cli, files: &[FileDescriptor]) -> Result<()> {
    if let Some(ref name) = cli.lookup {
        return lookup(files, name, &cli.scope);
    }

    for file in files {
        if cli.list {
            for symbol in file.symbols() {
                println!("{}", describe(&symbol));
            }
        } else {
            println!(
                "{}: {} messages, {} enums, {} services, {} extensions",
                file.name(),
                file.all_messages().len(),
                file.symbols()
                    .iter()
                    .filter(|s| matches!(s, Descriptor::Enum(_)))
                    .count(),
                file.services().len(),
                file.extensions().len()
            );
        }
    }

    if !cli.list {
        let registry = TypeRegistry::from_files(files);
        println!("{} message types in registry", registry.len());
    }
    Ok(())
}

/// One `--list` line: kind, full name and any custom option numbers
fn describe(symbol: &Descriptor) -> String {
    let mut line = format!("{:<10} {}", symbol.kind_name(), symbol.full_name());
    let numbers: Vec<String> = symbol
        .custom_options()
        .field_numbers()
        .map(|n| n.to_string())
        .collect();
    if !numbers.is_empty() {
        line.push_str(&format!(" [options: {}]", numbers.join(", ")));
    }
    line
}

/// Resolve `name` from `scope` in the last file that can see it
fn lookup(files: &[FileDescriptor], name: &str, scope: &str) -> Result<()> {
    for file in files.iter().rev() {
        match file.lookup_symbol(name, scope) {
            Ok(found) => {
                println!(
                    "{} {} (declared in {})",
                    found.kind_name(),
                    found.full_name(),
                    found.file().name()
                );
                return Ok(());
            }
            Err(e) => trace!("Not visible from {}: {}", file.name(), e),
        }
    }
    bail!("\"{}\" is not defined in scope \"{}\"", name, scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::encoding::{encode_key, encode_varint, WireType};
    use prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorSet};
    use tempfile::TempDir;

    fn proto(name: &str, package: &str, deps: &[&str]) -> FileDescriptorProto {
        FileDescriptorProto {
            name: Some(name.to_string()),
            package: Some(package.to_string()),
            dependency: deps.iter().map(|d| d.to_string()).collect(),
            ..Default::default()
        }
    }

    fn with_message(mut file: FileDescriptorProto, name: &str, type_name: Option<&str>) -> FileDescriptorProto {
        let field = type_name.map(|type_name| FieldDescriptorProto {
            name: Some("link".into()),
            number: Some(1),
            r#type: Some(prost_types::field_descriptor_proto::Type::Message as i32),
            type_name: Some(type_name.to_string()),
            ..Default::default()
        });
        file.message_type.push(DescriptorProto {
            name: Some(name.to_string()),
            field: field.into_iter().collect(),
            ..Default::default()
        });
        file
    }

    fn add(collector: &mut ProtoCollector, file: &FileDescriptorProto) -> bool {
        collector.add(&file.encode_to_vec(), Path::new("set.pb")).unwrap()
    }

    fn put_bytes(buf: &mut Vec<u8>, number: u32, payload: &[u8]) {
        encode_key(number, WireType::LengthDelimited, buf);
        encode_varint(payload.len() as u64, buf);
        buf.extend_from_slice(payload);
    }

    #[test]
    fn test_collector_deduplication() {
        let mut collector = ProtoCollector::new();

        assert!(add(&mut collector, &proto("a.proto", "a", &[])));
        assert!(!add(&mut collector, &proto("a.proto", "a", &[])));
        assert!(!add(&mut collector, &proto("a.proto", "other", &[])));

        assert_eq!(collector.stats.total_found, 3);
        assert_eq!(collector.stats.duplicates_skipped, 1);
        assert_eq!(collector.stats.conflicts_skipped, 1);
        assert_eq!(collector.files.len(), 1);
    }

    #[test]
    fn test_collector_rejects_malformed_entry() {
        let mut collector = ProtoCollector::new();
        let err = collector.add(&[0x0a, 0x05, b'a'], Path::new("bad.pb")).unwrap_err();
        assert!(err.to_string().contains("bad.pb"));
        assert_eq!(collector.stats.total_found, 0);
    }

    #[test]
    fn test_build_order_puts_imports_first() {
        let mut collector = ProtoCollector::new();
        add(&mut collector, &proto("c.proto", "c", &["b.proto"]));
        add(&mut collector, &proto("b.proto", "b", &["a.proto"]));
        add(&mut collector, &proto("a.proto", "a", &[]));

        let names: Vec<String> = collector
            .into_build_order()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["a.proto", "b.proto", "c.proto"]);
    }

    #[test]
    fn test_content_hash() {
        let hash1 = ProtoCollector::content_hash(b"hello");
        let hash2 = ProtoCollector::content_hash(b"hello");
        let hash3 = ProtoCollector::content_hash(b"world");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 8);
    }

    #[test]
    fn test_is_descriptor_set() {
        assert!(is_descriptor_set(Path::new("/tmp/api.pb")));
        assert!(is_descriptor_set(Path::new("/tmp/api.BINPB")));
        assert!(!is_descriptor_set(Path::new("/tmp/api.proto")));
        assert!(!is_descriptor_set(Path::new("/tmp/api")));
    }

    #[test]
    fn test_directory_links_across_sets() {
        let temp_dir = TempDir::new().unwrap();
        let base = with_message(proto("base.proto", "base", &[]), "Id", None);
        let app = with_message(
            proto("app.proto", "app", &["base.proto"]),
            "User",
            Some(".base.Id"),
        );

        // app.pb carries its import too, as --include_imports would
        let app_set = FileDescriptorSet {
            file: vec![base.clone(), app],
        };
        let base_set = FileDescriptorSet { file: vec![base] };
        fs::write(temp_dir.path().join("app.pb"), app_set.encode_to_vec()).unwrap();
        fs::write(temp_dir.path().join("base.pb"), base_set.encode_to_vec()).unwrap();
        fs::write(temp_dir.path().join("notes.txt"), b"ignored").unwrap();

        let mut collector = ProtoCollector::new();
        collect_directory(temp_dir.path(), &mut collector).unwrap();
        assert_eq!(collector.stats.duplicates_skipped, 1);

        let files = link(collector).unwrap();
        assert_eq!(files.len(), 2);
        lookup(&files, "Id", "base.Other").unwrap();
        assert!(lookup(&files, "Missing", "app").is_err());

        let registry = TypeRegistry::from_files(&files);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_custom_options_survive_loading() {
        // message Thing { option (ext) = 7; } with the extension numbered 50000
        let mut options = Vec::new();
        encode_key(50000, WireType::Varint, &mut options);
        encode_varint(7, &mut options);

        let mut message = DescriptorProto {
            name: Some("Thing".into()),
            ..Default::default()
        }
        .encode_to_vec();
        put_bytes(&mut message, 7, &options);

        let mut file = proto("opts.proto", "opts", &[]).encode_to_vec();
        put_bytes(&mut file, 4, &message);

        let mut set = Vec::new();
        put_bytes(&mut set, SET_FILE_FIELD, &file);

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("opts.pb");
        fs::write(&path, &set).unwrap();

        let mut collector = ProtoCollector::new();
        collect_single_file(&path, &mut collector).unwrap();
        let files = link(collector).unwrap();

        let thing = files[0].find_symbol::<Descriptor>("opts.Thing").unwrap();
        assert_eq!(thing.custom_options().try_get_int32(50000), Some(7));
        assert_eq!(describe(&thing), "message    opts.Thing [options: 50000]");
    }

    #[test]
    fn test_missing_import_fails_to_link() {
        let mut collector = ProtoCollector::new();
        add(&mut collector, &proto("app.proto", "app", &["gone.proto"]));
        let err = link(collector).unwrap_err();
        assert!(format!("{:#}", err).contains("dependency missing: gone.proto"));
    }

    #[test]
    fn test_describe_lists_kind() {
        let file = FileDescriptor::from_bytes(
            with_message(proto("a.proto", "pkg", &[]), "Thing", None).encode_to_vec(),
        )
        .unwrap();
        let lines: Vec<String> = file.symbols().iter().map(describe).collect();
        assert!(lines.iter().any(|l| l.starts_with("message") && l.ends_with("pkg.Thing")));
        assert!(lines.iter().any(|l| l.starts_with("package")));
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
