//! Error types and result types for conversion and collection operations.
//!
//! Conversion failures are reported through [`ConversionError`], and every fallible
//! engine operation returns a [`ConversionResult<T>`]. Operations that reach a
//! storage collaborator use [`StoreError`], which wraps conversion failures.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors raised while converting between host values and documents.
///
/// Each variant carries the runtime type name of the offending value where one exists,
/// and the low-level coercion message where one was produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    /// No conversion path exists for the value and no usable fallback was supplied.
    #[error("Cannot convert value of type {type_name} to a document value: {detail}")]
    UnsupportedType {
        /// Runtime type of the value that could not be converted.
        type_name: String,
        /// The original coercion error message.
        detail: String,
    },
    /// The recursion ceiling was hit while descending into nested values.
    #[error("Data exceed the default maximum serialization depth {0}")]
    DepthExceeded(usize),
    /// A mapping key is not a non-empty string.
    #[error("Dictionary keys must be non-empty strings, found {0}")]
    InvalidKeyType(String),
    /// A document required for an identity query has no identity field.
    #[error("Document must have the field {0}")]
    MissingIdentity(String),
    /// The value cannot be used as an update specification.
    #[error("Invalid update object: {0}")]
    InvalidUpdateObject(String),
    /// The value cannot be used as a field projection.
    #[error("Invalid projection object: {0}")]
    InvalidProjectionObject(String),
    /// The value cannot be used as a query.
    #[error("Invalid query object type: {0}")]
    InvalidQueryObjectType(String),
    /// The value cannot be used as a sort specification.
    #[error("Invalid sort object: {0}")]
    InvalidSortObject(String),
    /// A caller-supplied conversion hook or computed selector failed.
    #[error("Conversion callback failed for value of type {type_name}: {message}")]
    ConversionCallbackFailure {
        /// Runtime type of the value handed to the callback.
        type_name: String,
        /// The callback's own error message.
        message: String,
    },
    /// A wrapper view no longer resolves to a document or array in its backing storage.
    #[error("Wrapper view is detached from its backing storage at {0}")]
    StaleView(String),
    /// Serialization error when bridging typed values through serde.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A specialized `Result` type for conversion operations.
pub type ConversionResult<T> = Result<T, ConversionError>;

impl From<BsonError> for ConversionError {
    fn from(err: BsonError) -> Self {
        ConversionError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for ConversionError {
    fn from(err: SerdeJsonError) -> Self {
        ConversionError::Serialization(err.to_string())
    }
}

/// Represents all possible errors that can occur when a collection applies derived specs.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A host value could not be converted into a document, query or update.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    /// A document with the given identity already exists in the collection.
    #[error("Document {0} already exists")]
    DocumentAlreadyExists(String),
    /// The document or update has an invalid structure for the requested operation.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// Error during collection initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
    /// Serialization/deserialization error in the storage path.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A specialized `Result` type for collection operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<BsonError> for StoreError {
    fn from(err: BsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
