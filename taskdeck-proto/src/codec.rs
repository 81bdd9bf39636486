//! Binary encoding of stored task documents.
//!
//! The document store keeps each task as an opaque postcard blob so that
//! reads always go through [`TaskDocument::into_task`] normalization.

use crate::task::TaskDocument;

/// Error type for document encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Encodes a [`TaskDocument`] using postcard.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the document cannot be serialized.
pub fn encode_document(document: &TaskDocument) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(document).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a [`TaskDocument`] from postcard bytes.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the bytes are not a valid document.
pub fn decode_document(bytes: &[u8]) -> Result<TaskDocument, CodecError> {
    postcard::from_bytes(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}
