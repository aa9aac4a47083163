//! Question model and validation of raw extraction output.
//!
//! The extraction gateway is untrusted: every [`RawQuestion`] is checked
//! before it becomes a [`Question`], and records that fail are dropped
//! without aborting the batch.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SessionError;

/// Fewest options a question may have.
pub const MIN_OPTIONS: usize = 2;

/// Most options a question may have.
pub const MAX_OPTIONS: usize = 5;

// ============================================================================
// RawQuestion
// ============================================================================

/// One unvalidated question record as returned by the extraction gateway.
///
/// Field names follow the extraction schema. Missing fields deserialize to
/// empty values and are rejected by validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawQuestion {
    /// Question text.
    #[serde(default)]
    pub question: String,

    /// Candidate answers.
    #[serde(default)]
    pub options: Vec<String>,

    /// The correct answer; must equal one of `options`.
    #[serde(default)]
    pub answer: String,
}

impl RawQuestion {
    /// Creates a raw record from its parts.
    #[must_use]
    pub fn new<S: Into<String>>(
        question: impl Into<String>,
        options: impl IntoIterator<Item = S>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            options: options.into_iter().map(Into::into).collect(),
            answer: answer.into(),
        }
    }
}

/// Why a raw record was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The prompt is empty or whitespace.
    EmptyPrompt,
    /// The option count is outside `MIN_OPTIONS..=MAX_OPTIONS`.
    OptionCount(usize),
    /// An option is empty or whitespace.
    EmptyOption,
    /// Two options have the same text.
    DuplicateOption(String),
    /// The answer does not equal any option.
    AnswerNotInOptions(String),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPrompt => write!(f, "empty prompt"),
            Self::OptionCount(n) => write!(
                f,
                "{n} options (expected {MIN_OPTIONS} to {MAX_OPTIONS})"
            ),
            Self::EmptyOption => write!(f, "empty option"),
            Self::DuplicateOption(option) => write!(f, "duplicate option '{option}'"),
            Self::AnswerNotInOptions(answer) => {
                write!(f, "answer '{answer}' is not one of the options")
            }
        }
    }
}

// ============================================================================
// Question
// ============================================================================

/// A validated multiple-choice question.
///
/// Construction goes through [`Question::try_from_raw`], so every instance
/// has a non-empty prompt, 2 to 5 distinct non-empty options, and a correct
/// option that is byte-for-byte one of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    prompt: String,
    options: Vec<String>,
    correct_option: String,
}

impl Question {
    /// Validates a raw record.
    ///
    /// The prompt is trimmed. Options and the answer are kept exactly as
    /// given, since the answer must match an option byte-for-byte.
    pub fn try_from_raw(raw: RawQuestion) -> Result<Self, RejectReason> {
        let prompt = raw.question.trim();
        if prompt.is_empty() {
            return Err(RejectReason::EmptyPrompt);
        }

        let count = raw.options.len();
        if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&count) {
            return Err(RejectReason::OptionCount(count));
        }

        let mut seen = HashSet::with_capacity(count);
        for option in &raw.options {
            if option.trim().is_empty() {
                return Err(RejectReason::EmptyOption);
            }
            if !seen.insert(option.as_str()) {
                return Err(RejectReason::DuplicateOption(option.clone()));
            }
        }

        if !raw.options.contains(&raw.answer) {
            return Err(RejectReason::AnswerNotInOptions(raw.answer));
        }

        Ok(Self {
            prompt: prompt.to_string(),
            options: raw.options,
            correct_option: raw.answer,
        })
    }

    /// The question text.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// The options, in display order.
    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// The correct option.
    #[must_use]
    pub fn correct_option(&self) -> &str {
        &self.correct_option
    }

    /// Returns `true` if `option` is one of this question's options.
    #[must_use]
    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }

    /// Returns `true` if `option` is the correct option.
    #[must_use]
    pub fn is_correct(&self, option: &str) -> bool {
        self.correct_option == option
    }
}

// ============================================================================
// QuestionSet
// ============================================================================

/// An immutable, ordered set of validated questions from one extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuestionSet {
    questions: Vec<Question>,
}

impl QuestionSet {
    /// Validates raw records, keeping the ones that pass in their original
    /// order. The result may be empty.
    #[must_use]
    pub fn from_raw(records: impl IntoIterator<Item = RawQuestion>) -> Self {
        let mut questions = Vec::new();
        let mut rejected = 0usize;

        for (index, raw) in records.into_iter().enumerate() {
            match Question::try_from_raw(raw) {
                Ok(question) => questions.push(question),
                Err(reason) => {
                    rejected += 1;
                    warn!(index, %reason, "Dropping malformed question record");
                }
            }
        }

        debug!(kept = questions.len(), rejected, "Built question set");
        Self { questions }
    }

    /// Number of questions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Returns `true` if there are no questions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// The question at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// Iterates over the questions in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Question> {
        self.questions.iter()
    }
}

impl<'a> IntoIterator for &'a QuestionSet {
    type Item = &'a Question;
    type IntoIter = std::slice::Iter<'a, Question>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Builds a question set from raw extraction output.
///
/// Malformed records are skipped.
///
/// # Errors
///
/// Returns [`SessionError::EmptyResult`] if no record survives validation.
pub fn build_question_set(
    records: impl IntoIterator<Item = RawQuestion>,
) -> Result<QuestionSet, SessionError> {
    let set = QuestionSet::from_raw(records);
    if set.is_empty() {
        return Err(SessionError::EmptyResult);
    }
    Ok(set)
}
