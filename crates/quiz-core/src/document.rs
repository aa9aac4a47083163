//! Source documents handed to the extraction gateway.
//!
//! A [`Document`] is an opaque byte stream with a declared MIME type and a
//! display name. Only the declared type decides whether it is a PDF.

use std::path::Path;

use crate::error::{QuizError, Result};

/// MIME type of PDF documents.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// MIME type used when the type cannot be inferred.
pub const OCTET_STREAM_MIME_TYPE: &str = "application/octet-stream";

/// A user-supplied document.
#[derive(Clone, PartialEq, Eq)]
pub struct Document {
    bytes: Vec<u8>,
    declared_type: String,
    display_name: String,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("display_name", &self.display_name)
            .field("declared_type", &self.declared_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

impl Document {
    /// Creates a document from raw bytes and the type the caller declared.
    #[must_use]
    pub fn new(
        bytes: impl Into<Vec<u8>>,
        declared_type: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            declared_type: declared_type.into(),
            display_name: display_name.into(),
        }
    }

    /// Loads a document from disk.
    ///
    /// The declared type is inferred from the file extension and the file
    /// name becomes the display name.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::DocumentNotFound` if the file doesn't exist and
    /// `QuizError::DocumentTooLarge` if it exceeds `max_size` bytes.
    pub fn load(path: impl AsRef<Path>, max_size: u64) -> Result<Self> {
        let path = path.as_ref();

        let metadata = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                QuizError::document_not_found(path)
            } else {
                QuizError::Io(e)
            }
        })?;

        if !metadata.is_file() {
            return Err(QuizError::document_not_found(path));
        }

        let file_size = metadata.len();
        if file_size > max_size {
            return Err(QuizError::document_too_large(path, file_size, max_size));
        }

        let bytes = std::fs::read(path)?;
        let display_name = path.file_name().map_or_else(
            || path.display().to_string(),
            |name| name.to_string_lossy().to_string(),
        );

        Ok(Self {
            bytes,
            declared_type: mime_type_for_path(path).to_string(),
            display_name,
        })
    }

    /// The raw document bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The MIME type the document was declared with.
    #[must_use]
    pub fn declared_type(&self) -> &str {
        &self.declared_type
    }

    /// Name shown to the user.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Size of the document in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if the declared type is PDF.
    #[must_use]
    pub fn is_pdf(&self) -> bool {
        is_pdf_mime_type(&self.declared_type)
    }
}

/// Returns `true` if `mime_type` denotes a PDF.
///
/// Comparison ignores case, surrounding whitespace and parameters, so
/// `"Application/PDF; charset=binary"` matches.
#[must_use]
pub fn is_pdf_mime_type(mime_type: &str) -> bool {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    essence.eq_ignore_ascii_case(PDF_MIME_TYPE)
}

/// Infers a MIME type from a path's extension.
#[must_use]
pub fn mime_type_for_path(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => PDF_MIME_TYPE,
        _ => OCTET_STREAM_MIME_TYPE,
    }
}
