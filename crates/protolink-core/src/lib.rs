//! # protolink-core
//!
//! A descriptor pool and cross-linking engine for Protocol Buffer schemas.
//!
//! This crate turns serialized `FileDescriptorProto` blobs into a fully
//! linked, queryable type system:
//! - Building file descriptors against already built dependencies
//! - Resolving type names with C++ scoping rules across files
//! - Validating schemas (duplicate names and numbers, wrong kinds, bad defaults)
//! - Capturing custom option values without an extension registry
//! - Reflective field access over dynamic and native message instances
//!
//! ## Architecture
//!
//! - [`descriptor`]: The linked descriptor graph and the two-pass build
//! - [`options`]: Custom option values captured from raw option bytes
//! - [`accessor`]: Field accessor capability and dispatch tables
//! - [`dynamic`]: Generic message instances
//! - [`registry`]: Flattened message lookup across files
//! - [`wire`]: Raw protobuf wire format reading
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use protolink_core::{FileDescriptor, MessageDescriptor};
//! use std::fs;
//!
//! // Files must be built after the files they import
//! let base = FileDescriptor::from_bytes(fs::read("base.pb")?)?;
//! let app = FileDescriptor::build(
//!     fs::read("app.pb")?,
//!     &[base],
//!     None,
//!     &Default::default(),
//! )?;
//!
//! let user: MessageDescriptor = app.find_symbol("app.User").expect("declared in app.proto");
//! for field in user.fields() {
//!     println!("{} = {}", field.name(), field.number());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod accessor;
pub mod descriptor;
pub mod dynamic;
pub mod error;
pub mod generated;
pub mod options;
mod pool;
pub mod registry;
pub mod source;
pub mod value;
pub mod wire;

// Re-export primary types for convenience
pub use accessor::{accessors, DynamicAccessor, FieldAccessor, FieldBinding, GeneratedAccessor};
pub use descriptor::{
    BuildConfig, Descriptor, EnumDescriptor, EnumValueDescriptor, FieldDescriptor, FieldType,
    FileDescriptor, FromDescriptor, Label, MessageDescriptor, MethodDescriptor, OneofDescriptor,
    PackageDescriptor, ServiceDescriptor, Syntax,
};
pub use dynamic::DynamicMessage;
pub use error::{Error, Result};
pub use generated::GeneratedCodeInfo;
pub use options::{CustomOptions, OptionValue};
pub use registry::TypeRegistry;
pub use source::Declaration;
pub use value::{MapKey, Value};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum valid protobuf field number (2^29 - 1)
pub const MAX_FIELD_NUMBER: u32 = wire::MAX_VALID_NUMBER;
