//! # Question and Target Records
//!
//! The two entity kinds of the framework. A question carries an ordered
//! answer domain and may be derived from other questions through the
//! satisfied-by relation; a target is an evaluated option in one of the
//! three domains.

use crate::primitives::DEFAULT_ANSWERS;
use crate::types::{Coord, DecisError, Domain, ElementId, QuestionId, RecordRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// ANSWER NORMALIZATION
// =============================================================================

/// Spellings accepted as an affirmative answer in source grids.
const YES_FORMS: [&str; 9] = [
    "y", "yes", "if yes", "true", "yes.", "y.", "applicable", "if applicable", "always",
];

/// Spellings accepted as a negative answer in source grids.
const NO_FORMS: [&str; 9] = [
    "n", "no", "if no", "if not", "false", "no.", "n.", "not applicable", "never",
];

/// Whether the literal reads as "Yes".
#[must_use]
pub fn is_yes(answer: &str) -> bool {
    YES_FORMS.contains(&answer.trim().to_ascii_lowercase().as_str())
}

/// Whether the literal reads as "No".
#[must_use]
pub fn is_no(answer: &str) -> bool {
    NO_FORMS.contains(&answer.trim().to_ascii_lowercase().as_str())
}

/// Collapse yes/no spellings to the canonical "Yes"/"No"; leave everything
/// else untouched.
#[must_use]
pub fn cast_answer(text: &str) -> String {
    if is_yes(text) {
        "Yes".to_string()
    } else if is_no(text) {
        "No".to_string()
    } else {
        text.to_string()
    }
}

// =============================================================================
// QUESTION
// =============================================================================

/// An aggregation of one or more source-grid questions sharing a semantic
/// identity.
///
/// `valid_answers` is ordinal: index 0 is the weakest, most permissive
/// answer. Every criteria threshold and caveat answer index referencing
/// this question must stay strictly below `valid_answers.len()` — the
/// mutation engine maintains that invariant across structural edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Source lines this question was read from.
    pub references: Vec<RecordRef>,
    /// The ordered answer domain. No duplicates.
    pub valid_answers: Vec<String>,
    /// True while the answer list is still the built-in ["No", "Yes"].
    pub default_answers: bool,
    /// Questions whose answers derive this question's answer (as their max).
    /// Non-empty means the question is never prompted directly.
    pub satisfied_by: BTreeSet<QuestionId>,
    /// Inverse of `satisfied_by`; maintained, not serialized.
    #[serde(skip)]
    pub satisfies: BTreeSet<QuestionId>,
    pub title: Option<ElementId>,
    pub category: Option<ElementId>,
}

impl Question {
    /// Create a question with the default answer domain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            references: Vec::new(),
            valid_answers: DEFAULT_ANSWERS.iter().map(|s| (*s).to_string()).collect(),
            default_answers: true,
            satisfied_by: BTreeSet::new(),
            satisfies: BTreeSet::new(),
            title: None,
            category: None,
        }
    }

    /// Fold a source-grid answer list into this question.
    ///
    /// Normalized yes/no answers replace the default list wholesale the
    /// first time meaningful answers arrive; afterwards new answers append
    /// in first-seen order.
    pub fn absorb_answers<'a>(&mut self, answers: impl IntoIterator<Item = &'a str>) {
        let incoming: Vec<String> = answers.into_iter().map(cast_answer).collect();
        if incoming.is_empty() {
            return;
        }
        if self.default_answers {
            let mut replacement = Vec::new();
            for a in incoming {
                if !replacement.contains(&a) {
                    replacement.push(a);
                }
            }
            self.valid_answers = replacement;
            self.default_answers = false;
        } else {
            for a in incoming {
                if !self.valid_answers.contains(&a) {
                    self.valid_answers.push(a);
                }
            }
        }
    }

    /// Resolve a literal answer to its unique ordinal index.
    pub fn answer_index(&self, literal: &str) -> Result<usize, DecisError> {
        let matches: Vec<usize> = self
            .valid_answers
            .iter()
            .enumerate()
            .filter(|(_, a)| a.as_str() == literal)
            .map(|(i, _)| i)
            .collect();
        match matches.as_slice() {
            [] => Err(DecisError::AnswerNotFound(literal.to_string())),
            [i] => Ok(*i),
            _ => Err(DecisError::AmbiguousAnswer(literal.to_string())),
        }
    }

    /// Whether this question's answer is derived from other questions.
    #[must_use]
    pub fn is_derived(&self) -> bool {
        !self.satisfied_by.is_empty()
    }
}

impl Default for Question {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TARGET
// =============================================================================

/// An evaluated option: a monitoring method, an assessment method, or a
/// control rule, depending on its domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub domain: Domain,
    pub coord: Coord,
    pub title: Option<ElementId>,
    pub category: Option<ElementId>,
}

impl Target {
    /// Create a target at a source line.
    #[must_use]
    pub const fn new(domain: Domain, coord: Coord) -> Self {
        Self {
            domain,
            coord,
            title: None,
            category: None,
        }
    }

    /// The target's source reference.
    #[must_use]
    pub const fn reference(&self) -> RecordRef {
        RecordRef::new(self.domain, self.coord)
    }
}

// =============================================================================
// TESTS
// =============================================================================
