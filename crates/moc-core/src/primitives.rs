//! # Fixed Primitives
//!
//! Hardcoded runtime constants for the MOC workflow CORE.
//!
//! These values are compiled into the binary and are immutable at runtime.

// =============================================================================
// RISK MATRIX
// =============================================================================

/// Lowest severity / probability level on the risk matrix.
pub const MIN_RISK_LEVEL: u8 = 1;

/// Highest severity / probability level on the risk matrix.
///
/// Probability letters are derived from this range (`A` = 1), so widening the
/// matrix only requires changing this constant.
pub const MAX_RISK_LEVEL: u8 = 4;

/// Largest severity x probability product still classified as `Low`.
pub const LOW_BAND_MAX: u8 = 2;

/// Largest product still classified as `Medium`.
pub const MEDIUM_BAND_MAX: u8 = 6;

/// Largest product still classified as `High`. Anything above is `Critical`.
pub const HIGH_BAND_MAX: u8 = 10;

// =============================================================================
// DOCUMENT FORMAT
// =============================================================================

/// Magic bytes for the request document header.
pub const MAGIC_BYTES: &[u8; 4] = b"MOCR";

/// Current document format version.
///
/// Increment this when making breaking changes to the serialized `Request`.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for short intake fields (title, area, unit, names).
pub const MAX_FIELD_LENGTH: usize = 256;

/// Maximum length for free text (justification, comments, remarks).
pub const MAX_TEXT_LENGTH: usize = 8192;

/// Maximum number of attachment references on a single task or request.
pub const MAX_ATTACHMENTS: usize = 64;

/// Maximum size of a serialized request document (1 MiB).
pub const MAX_DOCUMENT_SIZE: usize = 1024 * 1024;

// =============================================================================
// SESSION
// =============================================================================

/// Events kept in a session's volatile log before the oldest are dropped.
pub const MAX_EVENT_LOG: usize = 1024;
