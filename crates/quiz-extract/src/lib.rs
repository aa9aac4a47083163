//! pdfquiz extraction client
//!
//! An [`ExtractionGateway`](quiz_core::ExtractionGateway) backed by an HTTP
//! extraction service.
//!
//! The service receives the document and the target schema as a multipart
//! form and answers with a JSON array of question records.

mod client;

pub use client::HttpExtractionGateway;

use thiserror::Error;

/// Errors that can occur while setting up an extraction client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The endpoint is not an absolute http(s) URL.
    #[error("invalid extraction endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// The endpoint as configured.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

impl ClientError {
    /// Creates an `InvalidEndpoint` error.
    #[must_use]
    pub fn invalid_endpoint(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_endpoint_display() {
        let err = ClientError::invalid_endpoint("ftp://host", "scheme must be http or https");
        assert_eq!(
            err.to_string(),
            "invalid extraction endpoint 'ftp://host': scheme must be http or https"
        );
    }
}
