//! # Relation Tables
//!
//! The two association tables of the knowledge base, plus the colormap.
//!
//! Criteria and Caveats are explicit typed tables, each implementing the
//! small [`RelationTable`] interface. Rows are replaced wholesale under
//! mutation (`replace_all`), never edited cell-by-cell in place: the
//! mutation engine builds complete replacement tables before installing
//! them, so a failure mid-rewrite leaves the store untouched.

use crate::primitives::DEFAULT_COLORMAP;
use crate::types::{ElementId, QuestionId, TargetId};
use serde::{Deserialize, Serialize};

// =============================================================================
// ROWS
// =============================================================================

/// A pass/fail gate: the target passes iff the user's answer index for the
/// question is `>= threshold`. A `None` threshold records an unresolved
/// literal from import; such rows never gate anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CriterionRow {
    pub question: QuestionId,
    pub target: TargetId,
    pub threshold: Option<u32>,
}

/// An annotation: if the user's answer index for the question equals
/// `answer`, the note applies to the target. A `None` answer records an
/// unresolved literal from import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CaveatRow {
    pub question: QuestionId,
    pub target: TargetId,
    pub answer: Option<u32>,
    pub note: ElementId,
}

// =============================================================================
// RELATION TABLE INTERFACE
// =============================================================================

/// The shared surface of the two association tables.
///
/// Rows carry foreign-key-like references to questions and targets; the
/// interface exposes them uniformly so callers never dispatch on table
/// identity.
pub trait RelationTable {
    type Row: Clone;

    /// All rows, in insertion order.
    fn rows(&self) -> &[Self::Row];

    /// Rows referencing a question.
    fn rows_for_question(&self, question: QuestionId) -> Vec<&Self::Row>;

    /// Rows referencing a target.
    fn rows_for_target(&self, target: TargetId) -> Vec<&Self::Row>;

    /// Append a row.
    fn add_row(&mut self, row: Self::Row);

    /// Remove every row matching the predicate; returns how many went.
    fn remove_rows(&mut self, predicate: impl Fn(&Self::Row) -> bool) -> usize;

    /// Atomic whole-table swap. The only entry point the mutation engine
    /// uses to install rewritten rows.
    fn replace_all(&mut self, new_rows: Vec<Self::Row>);
}

macro_rules! relation_table {
    ($table:ident, $row:ty) => {
        /// An append-only-by-default association table.
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $table(Vec<$row>);

        impl $table {
            /// Create an empty table.
            #[must_use]
            pub const fn new() -> Self {
                Self(Vec::new())
            }

            /// Number of rows.
            #[must_use]
            pub fn len(&self) -> usize {
                self.0.len()
            }

            /// Whether the table has no rows.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl RelationTable for $table {
            type Row = $row;

            fn rows(&self) -> &[$row] {
                &self.0
            }

            fn rows_for_question(&self, question: QuestionId) -> Vec<&$row> {
                self.0.iter().filter(|r| r.question == question).collect()
            }

            fn rows_for_target(&self, target: TargetId) -> Vec<&$row> {
                self.0.iter().filter(|r| r.target == target).collect()
            }

            fn add_row(&mut self, row: $row) {
                self.0.push(row);
            }

            fn remove_rows(&mut self, predicate: impl Fn(&$row) -> bool) -> usize {
                let before = self.0.len();
                self.0.retain(|r| !predicate(r));
                before - self.0.len()
            }

            fn replace_all(&mut self, new_rows: Vec<$row>) {
                self.0 = new_rows;
            }
        }
    };
}

relation_table!(Criteria, CriterionRow);
relation_table!(Caveats, CaveatRow);

// =============================================================================
// COLORMAP
// =============================================================================

/// One colormap entry: an RGB fill, its human name, and its note weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorEntry {
    pub rgb: String,
    pub name: String,
    pub score: i64,
}

/// The external lookup table giving each note fill color a name and a
/// numeric weight. Order is preserved for serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Colormap(Vec<ColorEntry>);

impl Colormap {
    /// An empty colormap.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// The built-in map (green 1, yellow -1, orange -1, red -10).
    #[must_use]
    pub fn builtin() -> Self {
        Self(
            DEFAULT_COLORMAP
                .iter()
                .map(|(rgb, name, score)| ColorEntry {
                    rgb: (*rgb).to_string(),
                    name: (*name).to_string(),
                    score: *score,
                })
                .collect(),
        )
    }

    /// Build from explicit entries, preserving order.
    #[must_use]
    pub fn from_entries(entries: Vec<ColorEntry>) -> Self {
        Self(entries)
    }

    /// All entries in order.
    #[must_use]
    pub fn entries(&self) -> &[ColorEntry] {
        &self.0
    }

    /// Name for an RGB fill, if mapped.
    #[must_use]
    pub fn name_for(&self, rgb: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.rgb.eq_ignore_ascii_case(rgb))
            .map(|e| e.name.as_str())
    }

    /// Score for an RGB fill; unmapped fills weigh nothing.
    #[must_use]
    pub fn score_for(&self, rgb: &str) -> i64 {
        self.0
            .iter()
            .find(|e| e.rgb.eq_ignore_ascii_case(rgb))
            .map_or(0, |e| e.score)
    }

    /// RGB fill for a color name, if mapped.
    #[must_use]
    pub fn rgb_for(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
            .map(|e| e.rgb.as_str())
    }
}

impl Default for Colormap {
    fn default() -> Self {
        Self::builtin()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cri(q: u64, t: u64, thr: u32) -> CriterionRow {
        CriterionRow {
            question: QuestionId(q),
            target: TargetId(t),
            threshold: Some(thr),
        }
    }

    #[test]
    fn rows_for_question_and_target() {
        let mut table = Criteria::new();
        table.add_row(cri(1, 10, 0));
        table.add_row(cri(1, 11, 1));
        table.add_row(cri(2, 10, 2));

        assert_eq!(table.rows_for_question(QuestionId(1)).len(), 2);
        assert_eq!(table.rows_for_target(TargetId(10)).len(), 2);
        assert_eq!(table.rows_for_question(QuestionId(3)).len(), 0);
    }

    #[test]
    fn remove_rows_counts() {
        let mut table = Criteria::new();
        table.add_row(cri(1, 10, 0));
        table.add_row(cri(2, 10, 0));

        let removed = table.remove_rows(|r| r.question == QuestionId(1));
        assert_eq!(removed, 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn replace_all_swaps_wholesale() {
        let mut table = Criteria::new();
        table.add_row(cri(1, 10, 0));
        table.replace_all(vec![cri(5, 50, 2), cri(6, 60, 1)]);
        assert_eq!(table.len(), 2);
        assert!(table.rows_for_question(QuestionId(1)).is_empty());
    }

    #[test]
    fn builtin_colormap_lookups() {
        let map = Colormap::builtin();
        assert_eq!(map.name_for("0000FF00"), Some("green"));
        assert_eq!(map.score_for("00FF0000"), -10);
        assert_eq!(map.score_for("12345678"), 0);
        assert_eq!(map.rgb_for("GREEN"), Some("0000FF00"));
    }
}
