//! pdfquiz core
//!
//! Turns extracted question records into a validated question set and
//! drives a quiz attempt through its phases. Also provides the HTTP adapter
//! that front-ends use to render a session.

pub mod api;
pub mod config;
pub mod document;
pub mod error;
pub mod gateway;
pub mod question;
pub mod session;

pub use api::{create_router, AppState, SelectRequest};
pub use config::{Config, ExtractionConfig, ServerConfig};
pub use document::{is_pdf_mime_type, Document, OCTET_STREAM_MIME_TYPE, PDF_MIME_TYPE};
pub use error::{ExtractionError, QuizError, Result, SessionError};
pub use gateway::{
    extract_with_timeout, extraction_schema, parse_extraction_response, ExtractionGateway,
    ExtractionRequest, ExtractionResult,
};
pub use question::{
    build_question_set, Question, QuestionSet, RawQuestion, RejectReason, MAX_OPTIONS,
    MIN_OPTIONS,
};
pub use session::{
    AnswerStatus, Attempt, ErrorView, ExtractionTicket, Phase, QuestionView, Session, SessionView,
};
