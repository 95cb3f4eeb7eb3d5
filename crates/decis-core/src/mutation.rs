//! # Mutation Engine
//!
//! Structural edits to the knowledge base: reshaping a question's ordinal
//! answer domain and merging question identities.
//!
//! Every answer-domain edit shares one algorithmic core: build an explicit
//! `old index -> new index` mapping (with a deletion sentinel) over the
//! question's current answer list, rewrite every criterion threshold and
//! caveat answer for that question through the mapping into complete
//! replacement tables, swap both tables in, and only then update
//! `valid_answers` itself. A precondition failure before the swap leaves
//! the store untouched.

use crate::store::DataStore;
use crate::tables::{CaveatRow, CriterionRow, RelationTable};
use crate::types::{DecisError, QuestionId};
use std::collections::BTreeSet;

// =============================================================================
// INDEX MAPPING
// =============================================================================

/// Per-old-index disposition for an answer-domain rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// The answer moves to this new index.
    Moved(u32),
    /// Rows carrying this index are removed.
    Dropped,
}

/// Rewrite both relation tables for one question through an index map.
///
/// Rows for other questions pass through untouched, as do rows whose
/// index is the unresolved-import sentinel. Both replacement tables are
/// fully built before either swap. Returns how many (criteria, caveat)
/// rows were dropped.
fn rewrite_tables(store: &mut DataStore, question: QuestionId, map: &[Slot]) -> (usize, usize) {
    let remap = |index: Option<u32>| -> Option<Option<u32>> {
        match index {
            None => Some(None),
            Some(old) => match map.get(old as usize) {
                Some(Slot::Moved(new)) => Some(Some(*new)),
                Some(Slot::Dropped) | None => None,
            },
        }
    };

    let mut new_criteria: Vec<CriterionRow> = Vec::with_capacity(store.criteria.len());
    let mut new_caveats: Vec<CaveatRow> = Vec::with_capacity(store.caveats.len());
    let mut dropped_criteria = 0;
    let mut dropped_caveats = 0;

    for row in store.criteria.rows() {
        if row.question != question {
            new_criteria.push(*row);
        } else if let Some(threshold) = remap(row.threshold) {
            new_criteria.push(CriterionRow { threshold, ..*row });
        } else {
            dropped_criteria += 1;
        }
    }
    for row in store.caveats.rows() {
        if row.question != question {
            new_caveats.push(*row);
        } else if let Some(answer) = remap(row.answer) {
            new_caveats.push(CaveatRow { answer, ..*row });
        } else {
            dropped_caveats += 1;
        }
    }

    store.criteria.replace_all(new_criteria);
    store.caveats.replace_all(new_caveats);
    (dropped_criteria, dropped_caveats)
}

// =============================================================================
// MUTATION ENGINE
// =============================================================================

/// The only writer of the knowledge base after import.
#[derive(Debug, Clone, Copy, Default)]
pub struct MutationEngine;

impl MutationEngine {
    /// Replace a question's answer list with a reordered superset.
    ///
    /// `new_answers` must contain every current answer (else
    /// `IncompleteAnswerSet`) and no repeats (else `DuplicateAnswer`);
    /// beyond that it may insert new answers anywhere. Every relation row
    /// keeps its resolved literal answer; only the indices move.
    pub fn refactor_answers(
        store: &mut DataStore,
        question: QuestionId,
        new_answers: Vec<String>,
    ) -> Result<(), DecisError> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for answer in &new_answers {
            if !seen.insert(answer.as_str()) {
                return Err(DecisError::DuplicateAnswer(answer.clone()));
            }
        }

        let current = store.question(question)?.valid_answers.clone();
        let mut map = Vec::with_capacity(current.len());
        for answer in &current {
            let position = new_answers
                .iter()
                .position(|a| a == answer)
                .ok_or_else(|| DecisError::IncompleteAnswerSet(answer.clone()))?;
            map.push(Slot::Moved(position as u32));
        }

        rewrite_tables(store, question, &map);
        let record = store.question_mut(question)?;
        record.valid_answers = new_answers;
        record.default_answers = false;
        Ok(())
    }

    /// Reorder a question's answers by index permutation.
    ///
    /// `permutation` lists the current indices in their new order and may
    /// be 0- or 1-indexed; it must cover every index exactly once.
    /// Delegates to [`Self::refactor_answers`].
    pub fn reorder_answers(
        store: &mut DataStore,
        question: QuestionId,
        permutation: &[usize],
    ) -> Result<(), DecisError> {
        let current = store.question(question)?.valid_answers.clone();
        let n = current.len();
        if permutation.len() != n {
            return Err(DecisError::InvalidPermutation(format!(
                "expected {n} indices, got {}",
                permutation.len()
            )));
        }

        let mut sorted = permutation.to_vec();
        sorted.sort_unstable();
        let offset = if sorted.iter().copied().eq(0..n) {
            0
        } else if sorted.iter().copied().eq(1..=n) {
            1
        } else {
            return Err(DecisError::InvalidPermutation(format!(
                "indices are not a permutation of 0..{n} or 1..={n}"
            )));
        };

        let new_answers = permutation
            .iter()
            .map(|&i| current[i - offset].clone())
            .collect();
        Self::refactor_answers(store, question, new_answers)
    }

    /// Collapse several answers into one.
    ///
    /// Every row carrying a merged answer is remapped to `merge_to`
    /// (defaulting to the first of `answers`); the now-orphaned merged
    /// answers are then deleted from the answer list. Row count for the
    /// question is conserved.
    pub fn merge_answers(
        store: &mut DataStore,
        question: QuestionId,
        answers: &[String],
        merge_to: Option<&str>,
    ) -> Result<(), DecisError> {
        let first = answers.first().ok_or(DecisError::EmptyInput)?;
        let target_literal = merge_to.unwrap_or(first.as_str()).to_string();

        let record = store.question(question)?;
        let target_index = record.answer_index(&target_literal)? as u32;
        let mut merged_indices = BTreeSet::new();
        for answer in answers {
            merged_indices.insert(record.answer_index(answer)?);
        }
        let n = record.valid_answers.len();

        let map: Vec<Slot> = (0..n)
            .map(|i| {
                if merged_indices.contains(&i) {
                    Slot::Moved(target_index)
                } else {
                    Slot::Moved(i as u32)
                }
            })
            .collect();
        rewrite_tables(store, question, &map);

        // No rows reference the orphans any more; deleting them is pure
        // answer-list cleanup.
        let orphans: Vec<String> = answers
            .iter()
            .filter(|a| a.as_str() != target_literal)
            .cloned()
            .collect();
        for orphan in orphans {
            Self::delete_answer(store, question, &orphan, true)?;
        }
        Ok(())
    }

    /// Count the rows a [`Self::delete_answer`] call would remove, without
    /// touching the store.
    pub fn preview_delete_answer(
        store: &DataStore,
        question: QuestionId,
        answer: &str,
    ) -> Result<(usize, usize), DecisError> {
        let index = store.question(question)?.answer_index(answer)? as u32;
        let criteria = store
            .criteria
            .rows_for_question(question)
            .iter()
            .filter(|r| r.threshold == Some(index))
            .count();
        let caveats = store
            .caveats
            .rows_for_question(question)
            .iter()
            .filter(|r| r.answer == Some(index))
            .count();
        Ok((criteria, caveats))
    }

    /// Remove an answer from a question's answer list.
    ///
    /// Rows whose index equals the deleted answer are removed, not
    /// remapped; all higher indices decrement by one. When matching rows
    /// exist and `confirmed` is false the operation aborts with
    /// `ConfirmationRequired` carrying the impact counts, so interactive
    /// callers can present them and retry.
    pub fn delete_answer(
        store: &mut DataStore,
        question: QuestionId,
        answer: &str,
        confirmed: bool,
    ) -> Result<(), DecisError> {
        let (criteria, caveats) = Self::preview_delete_answer(store, question, answer)?;
        if (criteria > 0 || caveats > 0) && !confirmed {
            return Err(DecisError::ConfirmationRequired { criteria, caveats });
        }

        let record = store.question(question)?;
        let index = record.answer_index(answer)?;
        let n = record.valid_answers.len();
        let map: Vec<Slot> = (0..n)
            .map(|i| {
                if i == index {
                    Slot::Dropped
                } else if i > index {
                    Slot::Moved((i - 1) as u32)
                } else {
                    Slot::Moved(i as u32)
                }
            })
            .collect();
        rewrite_tables(store, question, &map);

        let record = store.question_mut(question)?;
        record.valid_answers.remove(index);
        Ok(())
    }

    /// Merge several question identities into one.
    ///
    /// All questions are first refactored onto the union of their answer
    /// lists (first-seen order), so the group shares one ordinal answer
    /// space. The smallest id survives; every relation row, attribute
    /// mapping, and satisfied-by link pointing at a merged id is
    /// redirected to it, and the merged questions' references and
    /// derivation sets are folded in before their slots are tombstoned.
    pub fn merge_questions(
        store: &mut DataStore,
        questions: &[QuestionId],
    ) -> Result<QuestionId, DecisError> {
        let ids: BTreeSet<QuestionId> = questions.iter().copied().collect();
        let survivor = *ids.first().ok_or(DecisError::EmptyInput)?;
        for &id in &ids {
            store.question(id)?;
        }
        if ids.len() == 1 {
            return Ok(survivor);
        }

        // Step 1: the common answer list, first-seen across the group in
        // the caller-supplied order.
        let mut common: Vec<String> = Vec::new();
        for &id in questions {
            for answer in &store.question(id)?.valid_answers {
                if !common.contains(answer) {
                    common.push(answer.clone());
                }
            }
        }

        // Step 2: refactor everyone onto it, then check the lists really
        // are identical.
        for &id in &ids {
            Self::refactor_answers(store, id, common.clone())?;
        }
        for &id in &ids {
            if store.question(id)?.valid_answers != common {
                return Err(DecisError::AnswerListMismatch);
            }
        }

        // Step 3: redirect relation rows and attribute mappings.
        let redirect = |id: QuestionId| if ids.contains(&id) { survivor } else { id };
        let new_criteria: Vec<CriterionRow> = store
            .criteria
            .rows()
            .iter()
            .map(|r| CriterionRow {
                question: redirect(r.question),
                ..*r
            })
            .collect();
        let new_caveats: Vec<CaveatRow> = store
            .caveats
            .rows()
            .iter()
            .map(|r| CaveatRow {
                question: redirect(r.question),
                ..*r
            })
            .collect();
        store.criteria.replace_all(new_criteria);
        store.caveats.replace_all(new_caveats);

        let mut remapped = Vec::with_capacity(store.question_attributes.len());
        for &(q, a) in &store.question_attributes {
            let pair = (redirect(q), a);
            if !remapped.contains(&pair) {
                remapped.push(pair);
            }
        }
        store.question_attributes = remapped;

        // Step 4: fold merged records into the survivor and tombstone them.
        let mut references = Vec::new();
        let mut satisfied_by = BTreeSet::new();
        let mut satisfies = BTreeSet::new();
        let mut title = None;
        let mut category = None;
        for &id in &ids {
            let record = store.question(id)?;
            for r in &record.references {
                if !references.contains(r) {
                    references.push(*r);
                }
            }
            satisfied_by.extend(record.satisfied_by.iter().map(|&q| redirect(q)));
            satisfies.extend(record.satisfies.iter().map(|&q| redirect(q)));
            title = title.or(record.title);
            category = category.or(record.category);
        }
        // self-links created by the redirect are meaningless
        satisfied_by.remove(&survivor);
        satisfies.remove(&survivor);

        let record = store.question_mut(survivor)?;
        record.references = references;
        record.satisfied_by = satisfied_by;
        record.satisfies = satisfies;
        record.title = title;
        record.category = category;
        for &id in &ids {
            if id != survivor {
                store.tombstone_question(id);
            }
        }

        // Other questions' derivation links may still point at merged ids.
        for slot in store.questions.iter_mut().flatten() {
            slot.satisfied_by = slot.satisfied_by.iter().map(|&q| redirect(q)).collect();
            slot.satisfies = slot.satisfies.iter().map(|&q| redirect(q)).collect();
        }
        let record = store.question_mut(survivor)?;
        record.satisfied_by.remove(&survivor);
        record.satisfies.remove(&survivor);

        Ok(survivor)
    }
}

// =============================================================================
// TESTS
// =============================================================================
