//! Error types for pdfquiz.
//!
//! Three families live here:
//! - [`QuizError`] for configuration and document-file failures outside the
//!   session (the binary reports these and exits).
//! - [`SessionError`] for the user-visible messages the session state machine
//!   records; none of them are fatal.
//! - [`ExtractionError`] for the reasons an extraction gateway call failed.

use std::path::PathBuf;

/// A specialized `Result` type for pdfquiz operations.
pub type Result<T> = std::result::Result<T, QuizError>;

/// Errors that can occur while loading configuration or documents.
///
/// Variants include actionable suggestions where possible.
#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your pdfquiz.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Document Loading Errors
    // ========================================================================
    /// Document file was not found at the specified path.
    #[error("Document not found: '{path}'\n\nSuggestion: Check the path to the PDF file")]
    DocumentNotFound {
        /// Path where the document was expected.
        path: PathBuf,
    },

    /// Document file exceeds the configured size limit.
    #[error("Document exceeds size limit ({limit_kb}KB): '{path}' is {size_kb}KB\n\nSuggestion: Split the PDF or raise maxDocumentSize in pdfquiz.json")]
    DocumentTooLarge {
        /// Path to the oversized document.
        path: PathBuf,
        /// Actual size in kilobytes.
        size_kb: u64,
        /// Configured limit in kilobytes.
        limit_kb: u64,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl QuizError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `DocumentNotFound` error.
    #[must_use]
    pub fn document_not_found(path: impl Into<PathBuf>) -> Self {
        Self::DocumentNotFound { path: path.into() }
    }

    /// Creates a new `DocumentTooLarge` error from byte counts.
    #[must_use]
    pub fn document_too_large(path: impl Into<PathBuf>, size_bytes: u64, limit_bytes: u64) -> Self {
        Self::DocumentTooLarge {
            path: path.into(),
            size_kb: size_bytes / 1024,
            limit_kb: limit_bytes / 1024,
        }
    }
}

/// User-visible errors recorded by the session state machine.
///
/// The `Display` output is the message shown to the user. Every variant is
/// recoverable: the session stays in or returns to `awaiting_document`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The selected document's declared type is not PDF.
    #[error("Please select a PDF file (got '{declared_type}').")]
    InvalidDocumentType {
        /// The MIME type the document was declared with.
        declared_type: String,
    },

    /// Generation was requested with no document selected.
    #[error("Please select a PDF file first.")]
    NoDocumentSelected,

    /// The extraction gateway failed or returned unusable data.
    ///
    /// `reason` is kept for logging; the user only sees the generic message.
    #[error("Failed to generate a quiz from this document. Please try again.")]
    ExtractionFailure {
        /// Underlying cause, for logs.
        reason: String,
    },

    /// Extraction succeeded but no valid questions survived validation.
    #[error("No recognizable questions were found in this document.")]
    EmptyResult,
}

impl SessionError {
    /// Creates a new `InvalidDocumentType` error.
    #[must_use]
    pub fn invalid_document_type(declared_type: impl Into<String>) -> Self {
        Self::InvalidDocumentType {
            declared_type: declared_type.into(),
        }
    }

    /// Creates a new `ExtractionFailure` from any displayable cause.
    #[must_use]
    pub fn extraction_failure(reason: impl std::fmt::Display) -> Self {
        Self::ExtractionFailure {
            reason: reason.to_string(),
        }
    }

    /// Stable machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidDocumentType { .. } => "invalid_document_type",
            Self::NoDocumentSelected => "no_document_selected",
            Self::ExtractionFailure { .. } => "extraction_failure",
            Self::EmptyResult => "empty_result",
        }
    }
}

/// Reasons an extraction gateway call can fail.
///
/// The session treats every variant identically: it records an
/// [`SessionError::ExtractionFailure`] and returns to `awaiting_document`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    /// The request never produced a response (connection, DNS, TLS, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The gateway answered with a non-success status.
    #[error("gateway returned HTTP {status}: {body}")]
    Gateway {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The response could not be interpreted as a list of question records.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// No response arrived within the configured bound.
    #[error("extraction timed out after {timeout_secs}s")]
    Timeout {
        /// The timeout that elapsed, in seconds.
        timeout_secs: u64,
    },

    /// The extraction was cancelled before it completed.
    #[error("extraction cancelled")]
    Cancelled,
}
