//! Error types for multiformats_core.

use thiserror::Error;

/// Result type alias using multiformats_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while encoding, decoding or registering multiformats.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error from an underlying reader or writer.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Malformed text or structurally invalid binary input.
    #[error("Format error: {reason}")]
    Format { reason: String },

    /// A registry already holds an entry with this name or code.
    #[error("Duplicate {kind} definition: {key}")]
    DuplicateDefinition { kind: &'static str, key: String },

    /// A name or code is not present in a registry.
    #[error("Unknown {kind}: {name}")]
    UnknownAlgorithm { kind: &'static str, name: String },

    /// Well-formed framing carrying semantically wrong content.
    #[error("Invalid data: {reason}")]
    InvalidData { reason: String },

    /// An argument supplied by the caller is unusable.
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// A value that cannot be represented in the target encoding.
    #[error("Unsupported value: {reason}")]
    UnsupportedValue { reason: String },

    /// Input ended before a complete value was read.
    #[error("Unexpected end of input")]
    EndOfInput,

    /// A varint does not fit the requested integer width.
    #[error("Varint exceeds the {bits}-bit range")]
    Overflow { bits: u32 },

    /// The algorithm is known by name and code but has no local implementation.
    #[error("Algorithm not implemented: {algorithm}")]
    NotImplemented { algorithm: String },
}

/// Discriminant of [`Error`], for matching without destructuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Format,
    DuplicateDefinition,
    UnknownAlgorithm,
    InvalidData,
    InvalidArgument,
    UnsupportedValue,
    EndOfInput,
    Overflow,
    NotImplemented,
}

impl Error {
    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io { .. } => ErrorKind::Io,
            Error::Format { .. } => ErrorKind::Format,
            Error::DuplicateDefinition { .. } => ErrorKind::DuplicateDefinition,
            Error::UnknownAlgorithm { .. } => ErrorKind::UnknownAlgorithm,
            Error::InvalidData { .. } => ErrorKind::InvalidData,
            Error::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Error::UnsupportedValue { .. } => ErrorKind::UnsupportedValue,
            Error::EndOfInput => ErrorKind::EndOfInput,
            Error::Overflow { .. } => ErrorKind::Overflow,
            Error::NotImplemented { .. } => ErrorKind::NotImplemented,
        }
    }

    /// Create a Format error.
    pub fn format(reason: impl Into<String>) -> Self {
        Error::Format {
            reason: reason.into(),
        }
    }

    /// Create a DuplicateDefinition error.
    pub fn duplicate_definition(kind: &'static str, key: impl Into<String>) -> Self {
        Error::DuplicateDefinition {
            kind,
            key: key.into(),
        }
    }

    /// Create an UnknownAlgorithm error.
    pub fn unknown_algorithm(kind: &'static str, name: impl Into<String>) -> Self {
        Error::UnknownAlgorithm {
            kind,
            name: name.into(),
        }
    }

    /// Create an InvalidData error.
    pub fn invalid_data(reason: impl Into<String>) -> Self {
        Error::InvalidData {
            reason: reason.into(),
        }
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create an UnsupportedValue error.
    pub fn unsupported_value(reason: impl Into<String>) -> Self {
        Error::UnsupportedValue {
            reason: reason.into(),
        }
    }

    /// Create an Overflow error.
    pub fn overflow(bits: u32) -> Self {
        Error::Overflow { bits }
    }

    /// Create a NotImplemented error.
    pub fn not_implemented(algorithm: impl Into<String>) -> Self {
        Error::NotImplemented {
            algorithm: algorithm.into(),
        }
    }

    /// Map a truncated read onto [`Error::EndOfInput`], keeping other I/O errors.
    pub(crate) fn from_read(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::EndOfInput
        } else {
            Error::Io { source: err }
        }
    }
}
