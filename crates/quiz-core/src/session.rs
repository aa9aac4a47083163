//! Quiz session state machine.
//!
//! A [`Session`] owns the phase, the selected document, the installed
//! [`QuestionSet`] and the running [`Attempt`]. All transitions go through
//! its command methods; triggers that are not defined for the current phase
//! (or whose guard fails) are ignored and leave the session unchanged.
//!
//! The phases move as follows:
//! - `AwaitingDocument` -> `Extracting` when generation is requested with a
//!   PDF selected
//! - `Extracting` -> `Answering` when extraction yields at least one valid
//!   question
//! - `Extracting` -> `AwaitingDocument` on failure, cancellation or an empty
//!   result
//! - `Answering` -> `Summary` when advancing past the last answered question
//! - `Summary` -> `AwaitingDocument` on restart

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::document::Document;
use crate::error::{ExtractionError, SessionError};
use crate::gateway::{
    extract_with_timeout, ExtractionGateway, ExtractionRequest, ExtractionResult,
};
use crate::question::{build_question_set, Question, QuestionSet};

// ============================================================================
// Phase and AnswerStatus
// ============================================================================

/// Coarse-grained state of the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for the user to select a document and request generation.
    #[default]
    AwaitingDocument,
    /// An extraction call is in flight.
    Extracting,
    /// The user is answering questions.
    Answering,
    /// All questions answered; the final score is available.
    Summary,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingDocument => write!(f, "awaiting_document"),
            Self::Extracting => write!(f, "extracting"),
            Self::Answering => write!(f, "answering"),
            Self::Summary => write!(f, "summary"),
        }
    }
}

/// Grading state of the current question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    /// Not yet submitted.
    #[default]
    Unanswered,
    /// Submitted and correct.
    Correct,
    /// Submitted and incorrect.
    Incorrect,
}

impl AnswerStatus {
    /// Returns `true` once the current question has been submitted.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unanswered)
    }
}

impl std::fmt::Display for AnswerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unanswered => write!(f, "unanswered"),
            Self::Correct => write!(f, "correct"),
            Self::Incorrect => write!(f, "incorrect"),
        }
    }
}

// ============================================================================
// Attempt
// ============================================================================

/// One run through a question set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    current_index: usize,
    pending_selection: Option<String>,
    answer_status: AnswerStatus,
    score: usize,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl Attempt {
    fn new() -> Self {
        Self {
            current_index: 0,
            pending_selection: None,
            answer_status: AnswerStatus::Unanswered,
            score: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Index of the active question.
    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current_index
    }

    /// The tentatively chosen option, if any.
    #[must_use]
    pub fn pending_selection(&self) -> Option<&str> {
        self.pending_selection.as_deref()
    }

    /// Grading state of the active question.
    #[must_use]
    pub const fn answer_status(&self) -> AnswerStatus {
        self.answer_status
    }

    /// Questions answered correctly so far.
    #[must_use]
    pub const fn score(&self) -> usize {
        self.score
    }

    /// When the attempt began.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// When the attempt reached the summary, if it has.
    #[must_use]
    pub const fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Time spent on the attempt, up to now if it is still running.
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at.unwrap_or_else(Utc::now) - self.started_at
    }
}

// ============================================================================
// ExtractionTicket
// ============================================================================

/// Handle for an in-flight extraction.
///
/// Returned by [`Session::request_generation`]; the caller runs `request`
/// through a gateway and hands the outcome back with the same `id` to
/// [`Session::complete_extraction`].
#[derive(Debug, Clone)]
pub struct ExtractionTicket {
    /// Identifies this extraction; outcomes for any other id are ignored.
    pub id: u64,
    /// The gateway request to run.
    pub request: ExtractionRequest,
}

// ============================================================================
// Session
// ============================================================================

/// The quiz session controller.
#[derive(Debug, Default)]
pub struct Session {
    phase: Phase,
    document: Option<Document>,
    error: Option<SessionError>,
    questions: Option<QuestionSet>,
    attempt: Option<Attempt>,
    last_ticket: u64,
    in_flight: Option<u64>,
}

impl Session {
    /// Creates a session awaiting a document.
    ///
    /// # Examples
    ///
    /// ```
    /// use quiz_core::{Phase, Session};
    ///
    /// let session = Session::new();
    /// assert_eq!(session.phase(), Phase::AwaitingDocument);
    /// assert!(session.error().is_none());
    /// assert_eq!(session.question_count(), 0);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// The current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// The current user-visible error, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    /// The stored document, if any.
    #[must_use]
    pub const fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    /// Display name of the stored document, if any.
    #[must_use]
    pub fn document_name(&self) -> Option<&str> {
        self.document.as_ref().map(Document::display_name)
    }

    /// The installed question set, if any.
    #[must_use]
    pub const fn questions(&self) -> Option<&QuestionSet> {
        self.questions.as_ref()
    }

    /// Number of questions in the installed set, or 0.
    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.as_ref().map_or(0, QuestionSet::len)
    }

    /// The running or finished attempt, if any.
    #[must_use]
    pub const fn attempt(&self) -> Option<&Attempt> {
        self.attempt.as_ref()
    }

    /// Index of the active question; defined only while answering.
    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        match self.phase {
            Phase::Answering => self.attempt.as_ref().map(Attempt::current_index),
            _ => None,
        }
    }

    /// The active question; defined only while answering.
    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        let index = self.current_index()?;
        self.questions.as_ref()?.get(index)
    }

    /// The tentatively selected option of the active question.
    #[must_use]
    pub fn pending_selection(&self) -> Option<&str> {
        match self.phase {
            Phase::Answering => self.attempt.as_ref()?.pending_selection(),
            _ => None,
        }
    }

    /// Grading state of the active question; defined only while answering.
    #[must_use]
    pub fn answer_status(&self) -> Option<AnswerStatus> {
        match self.phase {
            Phase::Answering => self.attempt.as_ref().map(Attempt::answer_status),
            _ => None,
        }
    }

    /// Correctly answered questions so far, or 0 without an attempt.
    #[must_use]
    pub fn score(&self) -> usize {
        self.attempt.as_ref().map_or(0, Attempt::score)
    }

    /// Id of the in-flight extraction, if one is running.
    #[must_use]
    pub const fn in_flight_ticket(&self) -> Option<u64> {
        self.in_flight
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Selects a document.
    ///
    /// Accepted only while awaiting a document. A PDF is stored and any error
    /// cleared; anything else records `InvalidDocumentType` and discards the
    /// stored document.
    ///
    /// Returns `true` if the trigger was applied.
    pub fn select_document(&mut self, document: Document) -> bool {
        if self.phase != Phase::AwaitingDocument {
            return self.reject("select_document");
        }

        if document.is_pdf() {
            info!(
                document = %document.display_name(),
                size_bytes = document.size_bytes(),
                "Document selected"
            );
            self.document = Some(document);
            self.error = None;
        } else {
            warn!(
                document = %document.display_name(),
                declared_type = %document.declared_type(),
                "Rejected non-PDF document"
            );
            self.error = Some(SessionError::invalid_document_type(
                document.declared_type(),
            ));
            self.document = None;
        }
        true
    }

    /// Requests question generation for the stored document.
    ///
    /// With a document stored, moves to `Extracting` and returns the ticket
    /// to run through the gateway. Without one, records
    /// `NoDocumentSelected` and returns `None`. Outside `AwaitingDocument`
    /// this is a no-op returning `None`.
    pub fn request_generation(&mut self) -> Option<ExtractionTicket> {
        if self.phase != Phase::AwaitingDocument {
            self.reject("request_generation");
            return None;
        }

        let Some(document) = self.document.clone() else {
            debug!("Generation requested without a document");
            self.error = Some(SessionError::NoDocumentSelected);
            return None;
        };

        self.last_ticket += 1;
        let id = self.last_ticket;
        self.in_flight = Some(id);
        self.error = None;
        self.phase = Phase::Extracting;

        info!(
            ticket = id,
            document = %document.display_name(),
            "Extraction started"
        );

        Some(ExtractionTicket {
            id,
            request: ExtractionRequest::for_document(document),
        })
    }

    /// Delivers the outcome of the extraction identified by `ticket`.
    ///
    /// - At least one valid question: installs the set, starts a fresh
    ///   attempt and moves to `Answering`.
    /// - No valid question: records `EmptyResult`, discards the document and
    ///   returns to `AwaitingDocument`.
    /// - Any failure: records `ExtractionFailure`, discards the document and
    ///   returns to `AwaitingDocument`.
    ///
    /// Outcomes for a ticket that is not in flight are ignored.
    pub fn complete_extraction(&mut self, ticket: u64, outcome: ExtractionResult) -> bool {
        if self.phase != Phase::Extracting || self.in_flight != Some(ticket) {
            debug!(ticket, in_flight = ?self.in_flight, "Ignoring stale extraction outcome");
            return self.reject("complete_extraction");
        }
        self.in_flight = None;

        let failure = match outcome.map_err(SessionError::extraction_failure) {
            Ok(records) => match build_question_set(records) {
                Ok(questions) => {
                    info!(
                        ticket,
                        questions = questions.len(),
                        "Extraction succeeded, starting attempt"
                    );
                    self.questions = Some(questions);
                    self.attempt = Some(Attempt::new());
                    self.error = None;
                    self.phase = Phase::Answering;
                    return true;
                }
                Err(empty) => empty,
            },
            Err(failure) => failure,
        };

        match &failure {
            SessionError::ExtractionFailure { reason } => {
                warn!(ticket, %reason, "Extraction failed");
            }
            other => warn!(ticket, error = %other, "Extraction produced no usable questions"),
        }

        self.error = Some(failure);
        self.document = None;
        self.questions = None;
        self.attempt = None;
        self.phase = Phase::AwaitingDocument;
        true
    }

    /// Cancels the in-flight extraction, if any.
    ///
    /// Treated as an extraction failure.
    pub fn cancel_extraction(&mut self) -> bool {
        match self.in_flight {
            Some(ticket) if self.phase == Phase::Extracting => {
                info!(ticket, "Extraction cancelled");
                self.complete_extraction(ticket, Err(ExtractionError::Cancelled))
            }
            _ => self.reject("cancel_extraction"),
        }
    }

    /// Tentatively selects an option of the active question.
    ///
    /// Accepted only while the active question is unanswered and `option` is
    /// one of its options. A later selection overwrites an earlier one.
    pub fn select_option(&mut self, option: &str) -> bool {
        let accepts = self.answer_status() == Some(AnswerStatus::Unanswered)
            && self
                .current_question()
                .is_some_and(|question| question.has_option(option));
        if !accepts {
            return self.reject("select_option");
        }
        let Some(attempt) = self.attempt.as_mut() else {
            return false;
        };

        debug!(index = attempt.current_index, option, "Option selected");
        attempt.pending_selection = Some(option.to_string());
        true
    }

    /// Submits the pending selection for grading.
    ///
    /// Accepted only while answering, with a selection pending and the
    /// question still unanswered; the score increases by one if correct.
    pub fn submit_answer(&mut self) -> bool {
        let graded = match (self.attempt.as_ref(), self.current_question()) {
            (Some(attempt), Some(question)) if !attempt.answer_status.is_resolved() => attempt
                .pending_selection
                .as_deref()
                .map(|selection| question.is_correct(selection)),
            _ => None,
        };
        let Some(correct) = graded else {
            return self.reject("submit_answer");
        };
        let Some(attempt) = self.attempt.as_mut() else {
            return false;
        };

        if correct {
            attempt.score += 1;
            attempt.answer_status = AnswerStatus::Correct;
        } else {
            attempt.answer_status = AnswerStatus::Incorrect;
        }

        info!(
            index = attempt.current_index,
            correct,
            score = attempt.score,
            "Answer submitted"
        );
        true
    }

    /// Moves past the active question once it has been submitted.
    ///
    /// After the last question the session moves to `Summary`.
    pub fn advance(&mut self) -> bool {
        if !self.answer_status().is_some_and(|status| status.is_resolved()) {
            return self.reject("advance");
        }
        let count = self.question_count();
        let Some(attempt) = self.attempt.as_mut() else {
            return false;
        };

        if attempt.current_index + 1 >= count {
            attempt.finished_at = Some(Utc::now());
            info!(score = attempt.score, total = count, "Attempt finished");
            self.phase = Phase::Summary;
        } else {
            attempt.current_index += 1;
            attempt.pending_selection = None;
            attempt.answer_status = AnswerStatus::Unanswered;
            debug!(index = attempt.current_index, "Advanced to next question");
        }
        true
    }

    /// Discards the question set, attempt, document and error.
    ///
    /// Accepted only from `Summary`.
    pub fn restart(&mut self) -> bool {
        if self.phase != Phase::Summary {
            return self.reject("restart");
        }

        info!(score = self.score(), total = self.question_count(), "Restarting");
        self.questions = None;
        self.attempt = None;
        self.document = None;
        self.error = None;
        self.phase = Phase::AwaitingDocument;
        true
    }

    /// Requests generation and runs the extraction to completion.
    ///
    /// For single-owner drivers that can hold the session across the call.
    /// Returns `true` if the session ends up answering.
    pub async fn generate<G>(&mut self, gateway: &G, timeout: Duration) -> bool
    where
        G: ExtractionGateway + ?Sized,
    {
        let Some(ticket) = self.request_generation() else {
            return false;
        };
        let outcome = extract_with_timeout(gateway, &ticket.request, timeout).await;
        self.complete_extraction(ticket.id, outcome);
        self.phase == Phase::Answering
    }

    /// Logs an ignored trigger and returns `false`.
    fn reject(&self, trigger: &'static str) -> bool {
        debug!(phase = %self.phase, trigger, "Ignoring trigger");
        false
    }

    // ------------------------------------------------------------------------
    // Snapshot
    // ------------------------------------------------------------------------

    /// Renders every query into one serializable snapshot.
    ///
    /// The correct option is only revealed once the active question has been
    /// submitted.
    #[must_use]
    pub fn view(&self) -> SessionView {
        let question = self.current_question();
        let answer_status = self.answer_status();
        let correct_option = match (question, answer_status) {
            (Some(question), Some(status)) if status.is_resolved() => {
                Some(question.correct_option().to_string())
            }
            _ => None,
        };
        let duration_secs = match self.phase {
            Phase::Summary => self.attempt.as_ref().map(|a| a.elapsed().num_seconds()),
            _ => None,
        };

        SessionView {
            phase: self.phase,
            error: self.error.as_ref().map(ErrorView::from),
            document_name: self.document_name().map(str::to_string),
            question_count: self.question_count(),
            current_index: self.current_index(),
            question: question.map(QuestionView::from),
            pending_selection: self.pending_selection().map(str::to_string),
            answer_status,
            correct_option,
            score: self.score(),
            duration_secs,
        }
    }
}

// ============================================================================
// SessionView
// ============================================================================

/// Serializable snapshot of a session for presentation adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    /// Current phase.
    pub phase: Phase,
    /// User-visible error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorView>,
    /// Display name of the stored document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
    /// Number of questions in the installed set.
    pub question_count: usize,
    /// Index of the active question (answering only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_index: Option<usize>,
    /// The active question (answering only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<QuestionView>,
    /// The pending selection (answering only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_selection: Option<String>,
    /// Grading state of the active question (answering only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_status: Option<AnswerStatus>,
    /// Correct option, revealed after submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_option: Option<String>,
    /// Questions answered correctly so far.
    pub score: usize,
    /// Attempt duration in seconds (summary only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<i64>,
}

/// A user-visible error in a [`SessionView`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorView {
    /// Machine-readable code.
    pub code: String,
    /// Message for the user.
    pub message: String,
}

impl From<&SessionError> for ErrorView {
    fn from(error: &SessionError) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// The active question in a [`SessionView`], without its answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    /// Question text.
    pub prompt: String,
    /// Options in display order.
    pub options: Vec<String>,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        Self {
            prompt: question.prompt().to_string(),
            options: question.options().to_vec(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
