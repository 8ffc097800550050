//! Request and response types exchanged between the service and its callers.
//!
//! These types are serialised as JSON over the HTTP API consumed by the CRUD
//! services that own applicant and application records.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Codec endpoints
// ---------------------------------------------------------------------------

/// Request body for `POST /v1/seal`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealRequest {
    /// Identifier to protect. `null` and `""` are returned unchanged.
    pub plaintext: Option<String>,
}

/// Successful response body for `POST /v1/seal`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealResponse {
    /// `<fingerprint>:<payload>` string to persist in place of the plaintext.
    pub sealed: Option<String>,
}

/// Request body for `POST /v1/open`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRequest {
    /// Raw value read from the protected storage column.
    pub stored: Option<String>,
}

/// How a stored value was interpreted when opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenStatus {
    /// Nothing was stored (`null` or `""`).
    Absent,
    /// Pre-migration plaintext, returned without an integrity check.
    Legacy,
    /// A sealed envelope that decrypted and verified successfully.
    Sealed,
    /// A sealed envelope that is malformed, fails authentication, or whose
    /// fingerprint does not match its payload. `plaintext` is always `null`.
    Unrecoverable,
}

/// Successful response body for `POST /v1/open`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenResponse {
    /// Recovered identifier, or `null` when absent or unrecoverable.
    pub plaintext: Option<String>,
    /// Interpretation of the stored value.
    pub status: OpenStatus,
}

/// Request body for `POST /v1/fingerprint`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintRequest {
    /// Candidate identifier.
    pub plaintext: String,
}

/// Successful response body for `POST /v1/fingerprint`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintResponse {
    /// 64 lowercase hex characters.
    pub fingerprint: String,
}

// ---------------------------------------------------------------------------
// Identifier registry endpoints
// ---------------------------------------------------------------------------

/// Request body for `POST /v1/identifiers/check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    /// Plaintext identifier submitted by a new applicant.
    pub candidate: String,
}

/// Successful response body for `POST /v1/identifiers/check`.
///
/// The matching record is deliberately not disclosed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    /// `true` if the identifier is already registered.
    pub duplicate: bool,
}

/// Request body for `POST /v1/identifiers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Owning record ID. A random UUID is assigned when omitted.
    #[serde(default)]
    pub record_id: Option<String>,
    /// Plaintext identifier to seal and store.
    pub plaintext: String,
}

/// Successful response body for `POST /v1/identifiers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    /// Record the identifier was stored under.
    pub record_id: String,
    /// The sealed value that was persisted.
    pub stored: String,
}

/// Successful response body for `GET /v1/identifiers/:record_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifierResponse {
    /// Record the identifier belongs to.
    pub record_id: String,
    /// Recovered identifier, or `null` when unrecoverable.
    pub plaintext: Option<String>,
    /// Interpretation of the stored value.
    pub status: OpenStatus,
}

/// Successful response body for `POST /v1/identifiers/migrate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrateResponse {
    /// Legacy rows rewritten as sealed envelopes.
    pub resealed: usize,
    /// Legacy rows left untouched because a sealed row already holds the same identifier.
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Record adapter endpoints
// ---------------------------------------------------------------------------

/// Record shapes that carry a protected identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordShape {
    /// An applicant account.
    User,
    /// A loan application, optionally embedding its applicant's `user` record.
    Application,
}

/// Request body for `POST /v1/records/open` and `POST /v1/records/seal`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordRequest {
    /// Shape of `record` (or of every element, when `record` is an array).
    pub shape: RecordShape,
    /// A record, an array of records, or `null`.
    pub record: serde_json::Value,
}

/// Successful response body for the record endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordResponse {
    /// The transformed record.
    pub record: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"bad_request"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&crate::ServiceError> for ErrorResponse {
    fn from(err: &crate::ServiceError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status: `"ok"` or `"degraded"`.
    pub status: String,
    /// Fingerprint mode in effect: `"sha256"` or `"hmac-sha256"`.
    pub fingerprint_mode: String,
    /// Number of identifiers held by the backing store.
    pub identifiers_stored: usize,
}
