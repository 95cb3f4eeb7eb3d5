//! # Core Type Definitions
//!
//! This module contains all core types for the Decis knowledge engine:
//! - Identifiers (`ElementId`, `QuestionId`, `TargetId`)
//! - Record addressing (`Domain`, `Coord`, `RecordRef`, subject strings)
//! - Error types (`DecisError`, `ImportWarning`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier for a decorated text element in an `ElementStore`.
///
/// Derived from content (UUIDv3 in the store's namespace), never assigned
/// sequentially. Equal content yields an equal id within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId(pub Uuid);

/// Ordinal identifier for a question. Slots are append-only; a deleted
/// question leaves a tombstone so ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QuestionId(pub u64);

impl QuestionId {
    /// The id as a vector index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Ordinal identifier for a target. Append-only, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetId(pub u64);

impl TargetId {
    /// The id as a vector index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

// =============================================================================
// DOMAIN SELECTOR
// =============================================================================

/// The three target domains of the decision framework.
///
/// Each domain carries its own qualification rule in the query engine:
/// Monitoring targets must pass every applicable criterion, Assessment
/// targets fail only criteria they are explicitly linked to, and
/// ControlRules targets are not gated at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Domain {
    Monitoring,
    Assessment,
    ControlRules,
}

/// All domains in canonical order.
pub const DOMAINS: [Domain; 3] = [Domain::Monitoring, Domain::Assessment, Domain::ControlRules];

impl Domain {
    /// The full selector name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monitoring => "Monitoring",
            Self::Assessment => "Assessment",
            Self::ControlRules => "ControlRules",
        }
    }

    /// The single-letter tag used in subject strings.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Monitoring => 'M',
            Self::Assessment => 'A',
            Self::ControlRules => 'C',
        }
    }

    /// Resolve a selector token. Accepts the full name or its first letter,
    /// case-insensitively.
    pub fn parse(token: &str) -> Result<Self, DecisError> {
        let lower = token.to_ascii_lowercase();
        for domain in DOMAINS {
            if lower == domain.as_str().to_ascii_lowercase()
                || lower == domain.letter().to_ascii_lowercase().to_string()
            {
                return Ok(domain);
            }
        }
        Err(DecisError::BadSelector(token.to_string()))
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// SPREADSHEET COORDINATES
// =============================================================================

/// A record's line within its source sheet: a whole row or a whole column.
/// Exactly one of the two is ever present, matching the subject-string
/// encoding where a reference is either column letters or a row number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Coord {
    /// A 1-based row number.
    Row(u32),
    /// A 1-based column index.
    Col(u32),
}

impl Coord {
    /// The subject-string suffix: column letters for a column, the decimal
    /// number for a row.
    #[must_use]
    pub fn suffix(self) -> String {
        match self {
            Self::Row(r) => r.to_string(),
            Self::Col(c) => column_letter(c),
        }
    }

    /// Human-readable label, e.g. `Row 8` or `Col F`.
    #[must_use]
    pub fn label(self) -> String {
        match self {
            Self::Row(r) => format!("Row {}", r),
            Self::Col(c) => format!("Col {}", column_letter(c)),
        }
    }
}

/// A fully-qualified record reference: domain plus row-or-column coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    pub domain: Domain,
    pub coord: Coord,
}

impl RecordRef {
    /// Create a reference.
    #[must_use]
    pub const fn new(domain: Domain, coord: Coord) -> Self {
        Self { domain, coord }
    }

    /// Encode as a subject string, e.g. `Monitoring:F` or `Assessment:40`.
    #[must_use]
    pub fn subject(&self) -> String {
        format!("{}:{}", self.domain.as_str(), self.coord.suffix())
    }

    /// Decode a subject string. The shape is `<domain>...:<letters|digits>`
    /// where the domain is recognized by its first letter and the suffix is
    /// either column letters or a row number, never both.
    pub fn parse_subject(subject: &str) -> Result<Self, DecisError> {
        let (head, tail) = subject
            .rsplit_once(':')
            .ok_or_else(|| DecisError::BadSelector(subject.to_string()))?;

        let first = head
            .chars()
            .next()
            .ok_or_else(|| DecisError::BadSelector(subject.to_string()))?;
        let domain = DOMAINS
            .into_iter()
            .find(|d| d.letter() == first)
            .ok_or_else(|| DecisError::BadSelector(subject.to_string()))?;

        if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_uppercase()) {
            let col = column_index(tail).ok_or_else(|| DecisError::BadSelector(subject.to_string()))?;
            return Ok(Self::new(domain, Coord::Col(col)));
        }
        if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) {
            let row: u32 = tail
                .parse()
                .map_err(|_| DecisError::BadSelector(subject.to_string()))?;
            return Ok(Self::new(domain, Coord::Row(row)));
        }
        Err(DecisError::BadSelector(subject.to_string()))
    }
}

/// Convert a 1-based column index to spreadsheet letters (1 -> A, 27 -> AA).
#[must_use]
pub fn column_letter(mut col: u32) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push(u8::try_from(rem).unwrap_or(0) + b'A');
        col = (col - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Convert spreadsheet letters to a 1-based column index (A -> 1, AA -> 27).
/// Returns `None` for empty or non-alphabetic input.
#[must_use]
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut col: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_uppercase() {
            return None;
        }
        col = col.checked_mul(26)?.checked_add(c as u32 - 'A' as u32 + 1)?;
    }
    Some(col)
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Decis engine.
///
/// - No silent failures
/// - Use `Result<T, DecisError>` for fallible operations
/// - Mutation precondition failures leave the store in its prior state
#[derive(Debug, Error)]
pub enum DecisError {
    /// A cell or record had no usable content. Callers skip, not fatal.
    #[error("Empty input")]
    EmptyInput,

    /// An unknown domain token or malformed subject string.
    #[error("Bad selector: {0}")]
    BadSelector(String),

    /// An element update would silently merge two distinct identities.
    /// The caller must redirect references to the existing id explicitly.
    #[error("Identity collision: content already belongs to element {existing:?}")]
    IdentityCollision { existing: ElementId },

    /// A refactored answer list is missing one of the current answers.
    #[error("Incomplete answer set: missing '{0}'")]
    IncompleteAnswerSet(String),

    /// A refactored answer list contains a repeated answer.
    #[error("Duplicate answer: '{0}'")]
    DuplicateAnswer(String),

    /// An answer literal matched more than one entry in the answer list.
    #[error("Ambiguous answer: '{0}'")]
    AmbiguousAnswer(String),

    /// An answer literal matched no entry in the answer list.
    #[error("Answer not found: '{0}'")]
    AnswerNotFound(String),

    /// Post-merge answer lists diverged. Indicates a logic defect; the
    /// check is defensive and should be unreachable.
    #[error("Answer list mismatch after question merge")]
    AnswerListMismatch,

    /// A destructive mutation has side effects and was not pre-approved.
    /// Carries the impact counts so a caller can present them.
    #[error("Confirmation required: {criteria} criteria and {caveats} caveat rows affected")]
    ConfirmationRequired { criteria: usize, caveats: usize },

    /// The requested question does not exist or is tombstoned.
    #[error("Question not found: {0:?}")]
    QuestionNotFound(QuestionId),

    /// The requested target does not exist.
    #[error("Target not found: {0:?}")]
    TargetNotFound(TargetId),

    /// The requested element is not in the store.
    #[error("Element not found: {0:?}")]
    ElementNotFound(ElementId),

    /// A reorder argument is not a permutation of the answer indices.
    #[error("Invalid permutation: {0}")]
    InvalidPermutation(String),

    /// A search pattern failed to compile as a regex.
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred (app layer only; the core does no I/O).
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// IMPORT WARNINGS
// =============================================================================

/// Non-fatal resolution failures recorded during import.
///
/// A literal threshold or answer with no match in the question's answer
/// list is stored as a null index and surfaced here so a human can
/// reconcile the source data. Import always continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportWarning {
    /// A criterion's literal threshold had no match in the answer list.
    ThresholdUnresolved {
        question: QuestionId,
        target: TargetId,
        literal: String,
    },
    /// A caveat's literal answer had no match in the answer list.
    AnswerUnresolved {
        question: QuestionId,
        target: TargetId,
        literal: String,
    },
}

impl std::fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ThresholdUnresolved {
                question,
                target,
                literal,
            } => write!(
                f,
                "question {}, target {}: threshold '{}' not in answer list",
                question.0, target.0, literal
            ),
            Self::AnswerUnresolved {
                question,
                target,
                literal,
            } => write!(
                f,
                "question {}, target {}: answer '{}' not in answer list",
                question.0, target.0, literal
            ),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
