//! HTTP client for the extraction service.

use futures::future::BoxFuture;
use futures::FutureExt;
use quiz_core::{
    parse_extraction_response, ExtractionConfig, ExtractionError, ExtractionGateway,
    ExtractionRequest, ExtractionResult,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use tracing::{debug, info, instrument, warn};

use crate::ClientError;

/// Longest gateway error body kept in an `ExtractionError::Gateway`.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Extraction gateway that POSTs documents to an HTTP service.
///
/// Each request is a `multipart/form-data` body with two parts:
/// - `document`: the document bytes, with its MIME type and file name
/// - `schema`: the target JSON schema
///
/// # Example
///
/// ```no_run
/// use quiz_extract::HttpExtractionGateway;
///
/// let gateway = HttpExtractionGateway::new("http://127.0.0.1:8080/extract")
///     .unwrap()
///     .with_api_key("secret");
/// ```
#[derive(Clone)]
pub struct HttpExtractionGateway {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl std::fmt::Debug for HttpExtractionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpExtractionGateway")
            .field("endpoint", &self.endpoint.as_str())
            .field("has_api_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl HttpExtractionGateway {
    /// Creates a gateway for the given endpoint, without authentication.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidEndpoint` if `endpoint` is not an
    /// absolute http(s) URL, or `ClientError::Build` if the HTTP client
    /// cannot be created.
    pub fn new(endpoint: &str) -> Result<Self, ClientError> {
        let url = Url::parse(endpoint)
            .map_err(|e| ClientError::invalid_endpoint(endpoint, e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::invalid_endpoint(
                endpoint,
                "scheme must be http or https",
            ));
        }

        let client = Client::builder().build()?;

        Ok(Self {
            client,
            endpoint: url,
            api_key: None,
        })
    }

    /// Creates a gateway from configuration.
    ///
    /// The API key is read from the environment variable named by
    /// `apiKeyEnv`; an unset or empty variable means no authentication.
    ///
    /// # Errors
    ///
    /// Same as [`HttpExtractionGateway::new`].
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ClientError> {
        let gateway = Self::new(&config.endpoint)?;

        match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => {
                debug!(env = %config.api_key_env, "Using extraction API key from environment");
                Ok(gateway.with_api_key(key))
            }
            _ => {
                debug!(env = %config.api_key_env, "No extraction API key set");
                Ok(gateway)
            }
        }
    }

    /// Sets the bearer token sent with every request.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// The endpoint requests are sent to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    #[instrument(skip(self, request), fields(document = %request.document.display_name()))]
    async fn send(&self, request: &ExtractionRequest) -> ExtractionResult {
        let document = Part::bytes(request.document.bytes().to_vec())
            .file_name(request.document.display_name().to_string())
            .mime_str(request.mime_type)
            .map_err(|e| ExtractionError::Transport(e.to_string()))?;
        let form = Form::new()
            .part("document", document)
            .text("schema", request.schema.to_string());

        let mut builder = self.client.post(self.endpoint.clone()).multipart(form);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        info!(
            endpoint = %self.endpoint,
            size_bytes = request.document.size_bytes(),
            "Sending document to extraction service"
        );

        let response = builder.send().await.map_err(|e| {
            warn!(error = %e, "Extraction request failed");
            ExtractionError::Transport(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExtractionError::Transport(e.to_string()))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Extraction service returned an error");
            return Err(ExtractionError::Gateway {
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY_CHARS),
            });
        }

        debug!(body_len = body.len(), "Extraction service responded");
        parse_extraction_response(&body)
    }
}

impl ExtractionGateway for HttpExtractionGateway {
    fn extract<'a>(&'a self, request: &'a ExtractionRequest) -> BoxFuture<'a, ExtractionResult> {
        self.send(request).boxed()
    }
}

/// Keeps at most `max_chars` characters of `text`.
fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use quiz_core::{Document, PDF_MIME_TYPE};

    use super::*;

    fn request() -> ExtractionRequest {
        ExtractionRequest::for_document(Document::new(
            b"%PDF-1.4".to_vec(),
            PDF_MIME_TYPE,
            "quiz.pdf",
        ))
    }

    #[test]
    fn test_new_accepts_http_and_https() {
        assert!(HttpExtractionGateway::new("http://127.0.0.1:8080/extract").is_ok());
        assert!(HttpExtractionGateway::new("https://extract.example.com/v1").is_ok());
    }

    #[test]
    fn test_new_rejects_other_schemes() {
        let err = HttpExtractionGateway::new("ftp://example.com/extract").unwrap_err();
        assert!(matches!(err, ClientError::InvalidEndpoint { .. }));
    }

    #[test]
    fn test_new_rejects_relative_url() {
        let err = HttpExtractionGateway::new("/extract").unwrap_err();
        assert!(matches!(err, ClientError::InvalidEndpoint { .. }));
    }

    #[test]
    fn test_from_config_without_key() {
        let config = ExtractionConfig {
            endpoint: "http://127.0.0.1:8080/extract".to_string(),
            api_key_env: "PDFQUIZ_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            timeout_secs: 5,
        };

        let gateway = HttpExtractionGateway::from_config(&config).unwrap();

        assert_eq!(gateway.endpoint(), "http://127.0.0.1:8080/extract");
        assert!(gateway.api_key.is_none());
    }

    #[test]
    fn test_debug_hides_api_key() {
        let gateway = HttpExtractionGateway::new("http://127.0.0.1:8080/extract")
            .unwrap()
            .with_api_key("super-secret");

        let debug = format!("{gateway:?}");

        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("has_api_key: true"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("héllo", 2), "hé...");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_error() {
        // Port 9 (discard) is not expected to be listening locally.
        let gateway = HttpExtractionGateway::new("http://127.0.0.1:9/extract").unwrap();

        let err = gateway.extract(&request()).await.unwrap_err();

        assert!(matches!(err, ExtractionError::Transport(_)));
    }
}
