//! Error types for the ResolveDB client.
//!
//! Protocol errors carry one of the closed set of wire codes (`E001`-`E014`).
//! Everything else is a local failure: refused dispatch, bad ciphertext,
//! unparseable responses.

use std::fmt;

/// Protocol error codes defined by the ResolveDB wire protocol.
///
/// `E000` (success) is not represented here; a successful response maps to
/// `Ok`, never to an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// E001: malformed query
    BadRequest,
    /// E002: missing or invalid auth
    Unauthorized,
    /// E003: insufficient permissions
    Forbidden,
    /// E004: resource not found
    NotFound,
    /// E005: resource already exists
    Conflict,
    /// E006: data exceeds limits
    PayloadTooLarge,
    /// E007: invalid data format
    InvalidFormat,
    /// E008: version conflict
    VersionMismatch,
    /// E009: namespace issues
    NamespaceError,
    /// E010: internal error (retryable)
    ServerError,
    /// E011: service unavailable
    Unavailable,
    /// E012: query timeout (retryable)
    Timeout,
    /// E013: rate limit exceeded (retryable)
    RateLimited,
    /// E014: encryption required
    EncryptionRequired,
}

impl ErrorCode {
    /// The wire representation, e.g. `"E004"`.
    pub fn as_wire(&self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "E001",
            ErrorCode::Unauthorized => "E002",
            ErrorCode::Forbidden => "E003",
            ErrorCode::NotFound => "E004",
            ErrorCode::Conflict => "E005",
            ErrorCode::PayloadTooLarge => "E006",
            ErrorCode::InvalidFormat => "E007",
            ErrorCode::VersionMismatch => "E008",
            ErrorCode::NamespaceError => "E009",
            ErrorCode::ServerError => "E010",
            ErrorCode::Unavailable => "E011",
            ErrorCode::Timeout => "E012",
            ErrorCode::RateLimited => "E013",
            ErrorCode::EncryptionRequired => "E014",
        }
    }

    /// Parse a wire code. `"E000"` and unknown codes yield `None`.
    pub fn from_wire(code: &str) -> Option<ErrorCode> {
        match code {
            "E001" => Some(ErrorCode::BadRequest),
            "E002" => Some(ErrorCode::Unauthorized),
            "E003" => Some(ErrorCode::Forbidden),
            "E004" => Some(ErrorCode::NotFound),
            "E005" => Some(ErrorCode::Conflict),
            "E006" => Some(ErrorCode::PayloadTooLarge),
            "E007" => Some(ErrorCode::InvalidFormat),
            "E008" => Some(ErrorCode::VersionMismatch),
            "E009" => Some(ErrorCode::NamespaceError),
            "E010" => Some(ErrorCode::ServerError),
            "E011" => Some(ErrorCode::Unavailable),
            "E012" => Some(ErrorCode::Timeout),
            "E013" => Some(ErrorCode::RateLimited),
            "E014" => Some(ErrorCode::EncryptionRequired),
            _ => None,
        }
    }

    /// Default human-readable message for this code.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "malformed query",
            ErrorCode::Unauthorized => "authentication required",
            ErrorCode::Forbidden => "insufficient permissions",
            ErrorCode::NotFound => "resource not found",
            ErrorCode::Conflict => "resource already exists",
            ErrorCode::PayloadTooLarge => "data exceeds size limit",
            ErrorCode::InvalidFormat => "invalid data format",
            ErrorCode::VersionMismatch => "version conflict",
            ErrorCode::NamespaceError => "namespace error",
            ErrorCode::ServerError => "internal server error",
            ErrorCode::Unavailable => "service unavailable",
            ErrorCode::Timeout => "query timeout",
            ErrorCode::RateLimited => "rate limit exceeded",
            ErrorCode::EncryptionRequired => "encryption required",
        }
    }

    /// True if a request failing with this code may be retried.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::ServerError | ErrorCode::Timeout | ErrorCode::RateLimited
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// ResolveDB client error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Protocol error reported by the server (or mapped from a word status).
    #[error("resolvedb [{code}]: {message}{}", fmt_details(.details))]
    Protocol {
        /// Wire code.
        code: ErrorCode,
        /// Human-readable message (defaults to the code's canonical message).
        message: String,
        /// Additional details from the server, if any.
        details: String,
    },

    /// The session nonce counter wrapped; the encryption key must be rotated.
    #[error("resolvedb: nonce counter exhausted, rotate encryption key")]
    NonceExhausted,

    /// An authenticated request was refused because no encrypted transport
    /// is available and security enforcement is on.
    #[error("resolvedb: authenticated requests require encrypted transport")]
    EncryptedTransportRequired,

    /// The response could not be parsed as UQRP.
    #[error("resolvedb: invalid response format")]
    InvalidResponse,

    /// Ciphertext or chunk integrity verification failed. Both failures
    /// surface this same kind so callers cannot tell which check tripped.
    #[error("resolvedb: data integrity verification failed")]
    ChunkIntegrity,

    /// A JWT used a forbidden algorithm.
    #[error("resolvedb: forbidden JWT algorithm")]
    ForbiddenAlgorithm,

    /// A security token failed construction or validation.
    #[error("resolvedb: invalid token: {0}")]
    InvalidToken(String),

    /// A cryptographic primitive was misused (bad key length, derivation
    /// failure, missing entropy).
    #[error("resolvedb: crypto: {0}")]
    Crypto(String),

    /// The client configuration is invalid or incomplete.
    #[error("resolvedb: invalid configuration: {0}")]
    Config(String),

    /// A transport failed to complete the query.
    #[error("resolvedb: transport: {0}")]
    Transport(String),

    /// An encode or decode step failed.
    #[error("resolvedb: encoding: {0}")]
    Encoding(String),

    /// JSON (de)serialization failed.
    #[error("resolvedb: json: {0}")]
    Json(#[from] serde_json::Error),
}

fn fmt_details(details: &str) -> String {
    if details.is_empty() {
        String::new()
    } else {
        format!(" ({details})")
    }
}

impl Error {
    /// Build a protocol error with the code's canonical message.
    pub fn protocol(code: ErrorCode, details: impl Into<String>) -> Error {
        Error::Protocol {
            code,
            message: code.message().to_string(),
            details: details.into(),
        }
    }

    /// Build a protocol error from a raw wire code string.
    ///
    /// `"E000"` yields `None` (success is not an error); unknown codes map to
    /// a generic error that preserves the raw code in the message.
    pub fn from_wire_code(code: &str, details: impl Into<String>) -> Option<Error> {
        if code == "E000" {
            return None;
        }
        match ErrorCode::from_wire(code) {
            Some(c) => Some(Error::protocol(c, details)),
            None => Some(Error::Protocol {
                code: ErrorCode::ServerError,
                message: format!("unknown error ({code})"),
                details: details.into(),
            }),
        }
    }

    /// The protocol code carried by this error, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Error::Protocol { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True if the failed request may be retried: transient protocol errors
    /// and transport I/O failures.
    pub fn retryable(&self) -> bool {
        match self {
            Error::Protocol { code, .. } => code.retryable(),
            Error::Transport(_) => true,
            _ => false,
        }
    }

    /// True if this error indicates the resource was not found.
    pub fn is_not_found(&self) -> bool {
        self.code() == Some(ErrorCode::NotFound)
    }

    /// True if this error indicates authentication is required or invalid.
    pub fn is_unauthorized(&self) -> bool {
        self.code() == Some(ErrorCode::Unauthorized)
    }

    /// True if this error indicates rate limiting.
    pub fn is_rate_limited(&self) -> bool {
        self.code() == Some(ErrorCode::RateLimited)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
