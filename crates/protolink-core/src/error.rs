//! Error types for the protolink-core library.
//!
//! Building a file descriptor fails with exactly one kind of error,
//! [`Error::DescriptorValidation`], which names the offending symbol. The
//! remaining variants belong to the boundaries around the build: decoding the
//! schema blob, scanning raw option bytes, loading several blobs at once and
//! dispatching field accessors against message instances.

use thiserror::Error;

/// Result type alias for protolink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all protolink operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A schema failed validation while its file descriptor was being built
    #[error("{symbol}: {description}")]
    DescriptorValidation {
        /// Fully-qualified name of the offending symbol
        symbol: String,
        /// What went wrong
        description: String,
    },

    /// Failed to parse FileDescriptorProto
    #[error("failed to parse FileDescriptorProto: {0}")]
    DescriptorParse(#[from] prost::DecodeError),

    /// Invalid protobuf wire format
    #[error("invalid protobuf wire format at offset {offset}: {details}")]
    InvalidWireFormat {
        /// Byte offset where the error occurred
        offset: usize,
        /// Detailed description of the issue
        details: String,
    },

    /// Failed to decode varint
    #[error("failed to decode varint at offset {offset}: buffer too small or invalid encoding")]
    VarintDecode {
        /// Byte offset where the error occurred
        offset: usize,
    },

    /// Unsupported proto syntax version
    #[error("unsupported proto syntax: '{syntax}'")]
    UnsupportedSyntax {
        /// The unsupported syntax string
        syntax: String,
    },

    /// A blob named a dependency that was not built before it
    #[error("dependency missing: {name}")]
    DependencyMissing {
        /// Name of the missing file
        name: String,
    },

    /// Two blobs in one load described the same file
    #[error("duplicate descriptor name: {name}")]
    DuplicateFile {
        /// Name of the repeated file
        name: String,
    },

    /// The accessor operation has no meaning for this field's storage
    #[error("{operation} is not supported for field '{field}'")]
    Unsupported {
        /// Operation that was attempted
        operation: &'static str,
        /// Full name of the field
        field: String,
    },

    /// A value of the wrong kind was supplied for a field
    #[error("invalid value for field '{field}': expected {expected}")]
    InvalidValue {
        /// Full name of the field
        field: String,
        /// Human readable description of the accepted kind
        expected: String,
    },

    /// An accessor was applied to an instance of a different message type
    #[error("field '{field}' does not belong to message type '{message}'")]
    MessageMismatch {
        /// Full name of the field
        field: String,
        /// Full name of the instance's message type
        message: String,
    },

    /// A message-typed custom option could not be merged
    #[error("failed to decode custom option {number}: {source}")]
    OptionDecode {
        /// Field number of the option
        number: u32,
        /// Underlying decode error
        #[source]
        source: prost::DecodeError,
    },
}

impl Error {
    /// Creates a new descriptor validation error
    pub fn validation(symbol: impl Into<String>, description: impl Into<String>) -> Self {
        Self::DescriptorValidation {
            symbol: symbol.into(),
            description: description.into(),
        }
    }

    /// Creates a new wire format error
    pub fn invalid_wire_format(offset: usize, details: impl Into<String>) -> Self {
        Self::InvalidWireFormat {
            offset,
            details: details.into(),
        }
    }

    /// Creates a new varint decode error
    pub fn varint_decode(offset: usize) -> Self {
        Self::VarintDecode { offset }
    }

    /// Creates a new unsupported-operation error
    pub fn unsupported(operation: &'static str, field: impl Into<String>) -> Self {
        Self::Unsupported {
            operation,
            field: field.into(),
        }
    }

    /// Creates a new invalid value error
    pub fn invalid_value(field: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            expected: expected.into(),
        }
    }

    /// Returns the offending symbol for validation errors
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Self::DescriptorValidation { symbol, .. } => Some(symbol),
            _ => None,
        }
    }

    /// Returns true if this error was raised while validating a schema
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::DescriptorValidation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::validation("pkg.Foo.bar", "Field numbers must be positive integers.");
        assert_eq!(
            err.to_string(),
            "pkg.Foo.bar: Field numbers must be positive integers."
        );
        assert_eq!(err.symbol(), Some("pkg.Foo.bar"));
    }

    #[test]
    fn test_is_validation() {
        assert!(Error::validation("a", "b").is_validation());
        assert!(!Error::varint_decode(3).is_validation());
        assert!(Error::unsupported("has_value", "a.b").symbol().is_none());
    }
}
