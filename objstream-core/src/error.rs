//! Error types for object stream encoding and decoding.

use std::io;
use thiserror::Error;

/// The error type for every encode and decode operation.
///
/// None of these are recovered from inside the engine: each one propagates to
/// the caller of the top-level `write_object`/`read_object`.
#[derive(Debug, Error)]
pub enum StreamError {
    /// A generic object's class is neither serializable nor externalizable.
    #[error("not serializable: {0}")]
    NotSerializable(String),

    /// A class description in the stream does not match the local class.
    #[error("invalid class {class}: {reason}")]
    InvalidClass {
        /// Fully qualified class name.
        class: String,
        /// What did not match.
        reason: String,
    },

    /// The resolver has no local class for a name found in the stream.
    #[error("class not found: {0}")]
    ClassNotFound(String),

    /// The stream contains bytes that cannot be part of a well-formed stream.
    #[error("stream corrupted: {0}")]
    StreamCorrupted(String),

    /// A back-reference points at a handle with no live entry.
    #[error("unresolved reference to handle {0:#x}")]
    UnresolvedReference(u32),

    /// The byte source ran out in the middle of a record.
    #[error("unexpected end of input: {0}")]
    UnexpectedEof(String),

    /// The byte source ended cleanly at a record boundary.
    #[error("end of stream")]
    EndOfStream,

    /// Primitive block data (or the end of a custom block) was found where an
    /// object was expected.
    #[error("optional data: {length} bytes of block data remaining (end of block: {eof})")]
    OptionalData {
        /// Bytes left in the current block.
        length: usize,
        /// True when the end of the custom data block was reached.
        eof: bool,
    },

    /// An operation was called in a stream state that does not allow it,
    /// such as a field walk outside a custom hook.
    #[error("not active: {0}")]
    NotActive(String),

    /// An object graph violates a stream rule.
    #[error("invalid object: {0}")]
    InvalidObject(String),

    /// A field lookup or assignment failed.
    #[error("field {field}: {reason}")]
    Field {
        /// Field name.
        field: String,
        /// What went wrong.
        reason: String,
    },

    /// A string does not fit a 2-byte modified UTF-8 length prefix.
    #[error("encoded string too long: {0} bytes")]
    StringTooLong(usize),

    /// The writer recorded a failure in the stream in place of an object.
    #[error("write aborted: {kind}: {message}")]
    WriteAborted {
        /// Short name of the failure kind recorded by the writer.
        kind: String,
        /// Message recorded by the writer.
        message: String,
    },

    /// I/O errors from the byte sink or source.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StreamError {
    /// Returns a stable short name for this error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamError::NotSerializable(_) => "NotSerializable",
            StreamError::InvalidClass { .. } => "InvalidClass",
            StreamError::ClassNotFound(_) => "ClassNotFound",
            StreamError::StreamCorrupted(_) => "StreamCorrupted",
            StreamError::UnresolvedReference(_) => "UnresolvedReference",
            StreamError::UnexpectedEof(_) => "UnexpectedEof",
            StreamError::EndOfStream => "EndOfStream",
            StreamError::OptionalData { .. } => "OptionalData",
            StreamError::NotActive(_) => "NotActive",
            StreamError::InvalidObject(_) => "InvalidObject",
            StreamError::Field { .. } => "Field",
            StreamError::StringTooLong(_) => "StringTooLong",
            StreamError::WriteAborted { .. } => "WriteAborted",
            StreamError::Io(_) => "Io",
        }
    }

    /// Returns true for a clean end of stream at a record boundary.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, StreamError::EndOfStream)
    }

    pub(crate) fn invalid_class(class: impl Into<String>, reason: impl Into<String>) -> Self {
        StreamError::InvalidClass {
            class: class.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        StreamError::Field {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// A specialized `Result` type for object stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;
