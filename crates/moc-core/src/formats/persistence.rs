//! # Persistence Format
//!
//! One document per request.
//!
//! Format: Header (5 bytes) + postcard-serialized `Request`.
//! - 4 bytes: Magic ("MOCR")
//! - 1 byte: Version
//!
//! ## Load Checks
//!
//! Before the payload is parsed:
//! - Size bounds (`HEADER_SIZE..=MAX_DOCUMENT_SIZE`)
//! - Magic bytes and version
//!
//! After parsing, the stage/task ordering invariants are re-verified, so a
//! hand-edited document cannot smuggle in an impossible workflow state.

use crate::primitives::{FORMAT_VERSION, MAGIC_BYTES, MAX_DOCUMENT_SIZE};
use crate::request::Request;
use crate::MocError;

/// Size of the document header in bytes.
pub const HEADER_SIZE: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The header that precedes every request document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl DocumentHeader {
    /// Create a header with the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *MAGIC_BYTES,
            version: FORMAT_VERSION,
        }
    }

    /// Validate magic and version.
    pub fn validate(&self) -> Result<(), MocError> {
        if &self.magic != MAGIC_BYTES {
            return Err(MocError::DeserializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != FORMAT_VERSION {
            return Err(MocError::DeserializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version, FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let [a, b, c, d] = self.magic;
        [a, b, c, d, self.version]
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MocError> {
        match bytes {
            [a, b, c, d, version, ..] => Ok(Self {
                magic: [*a, *b, *c, *d],
                version: *version,
            }),
            _ => Err(MocError::DeserializationError(
                "Header too short".to_string(),
            )),
        }
    }
}

impl Default for DocumentHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a request to a document (header + payload).
pub fn document_to_bytes(request: &Request) -> Result<Vec<u8>, MocError> {
    let payload =
        postcard::to_stdvec(request).map_err(|e| MocError::SerializationError(e.to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_SIZE.saturating_add(payload.len()));
    bytes.extend_from_slice(&DocumentHeader::new().to_bytes());
    bytes.extend_from_slice(&payload);

    if bytes.len() > MAX_DOCUMENT_SIZE {
        return Err(MocError::SerializationError(format!(
            "Document size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_DOCUMENT_SIZE
        )));
    }

    Ok(bytes)
}

/// Deserialize a request from a document.
pub fn document_from_bytes(bytes: &[u8]) -> Result<Request, MocError> {
    if bytes.len() > MAX_DOCUMENT_SIZE {
        return Err(MocError::DeserializationError(format!(
            "Document size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_DOCUMENT_SIZE
        )));
    }

    let header = DocumentHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = bytes.get(HEADER_SIZE..).unwrap_or_default();
    let request: Request = postcard::from_bytes(payload).map_err(|e| {
        MocError::DeserializationError(format!("Failed to deserialize request: {}", e))
    })?;

    request.check_invariants()?;
    Ok(request)
}

// =============================================================================
// TESTS
// =============================================================================
