//! # Data Store
//!
//! The aggregate knowledge base: two element stores (attributes and
//! notes), the question and target enumerations, the attribute mapping
//! tables, the two relation tables, and the colormap.
//!
//! Questions and targets are created during import and are append-only;
//! after import the mutation engine is the only writer. A deleted
//! question leaves a `None` tombstone so existing ids stay valid.

use crate::element::ElementStore;
use crate::records::{Question, Target};
use crate::tables::{Caveats, Colormap, Criteria, RelationTable};
use crate::types::{DecisError, Domain, ElementId, QuestionId, TargetId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

// =============================================================================
// DATA STORE
// =============================================================================

/// The in-memory knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataStore {
    pub(crate) attributes: ElementStore,
    pub(crate) notes: ElementStore,
    pub(crate) questions: Vec<Option<Question>>,
    pub(crate) targets: Vec<Target>,
    pub(crate) question_attributes: Vec<(QuestionId, ElementId)>,
    pub(crate) target_attributes: Vec<(TargetId, ElementId)>,
    pub(crate) criteria: Criteria,
    pub(crate) caveats: Caveats,
    pub(crate) colormap: Colormap,
}

impl DataStore {
    /// Create an empty store with fresh namespaces and the built-in
    /// colormap.
    #[must_use]
    pub fn new() -> Self {
        Self::with_namespaces(Uuid::new_v4(), Uuid::new_v4())
    }

    /// Create an empty store with known element namespaces, as when
    /// re-importing a serialized document.
    #[must_use]
    pub fn with_namespaces(attr_ns: Uuid, note_ns: Uuid) -> Self {
        Self {
            attributes: ElementStore::with_namespace(attr_ns),
            notes: ElementStore::with_namespace(note_ns),
            questions: Vec::new(),
            targets: Vec::new(),
            question_attributes: Vec::new(),
            target_attributes: Vec::new(),
            criteria: Criteria::new(),
            caveats: Caveats::new(),
            colormap: Colormap::builtin(),
        }
    }

    // -------------------------------------------------------------------------
    // Element stores
    // -------------------------------------------------------------------------

    /// The attribute element store (titles, categories, prompts).
    #[must_use]
    pub const fn attributes(&self) -> &ElementStore {
        &self.attributes
    }

    /// The note element store (annotations whose fill color scores them).
    #[must_use]
    pub const fn notes(&self) -> &ElementStore {
        &self.notes
    }

    /// All attribute ids with exactly this text.
    #[must_use]
    pub fn find_attribute(&self, text: &str) -> Vec<ElementId> {
        self.attributes.find(text)
    }

    /// Look up or mint an attribute element.
    pub fn find_or_create_attribute(&mut self, text: &str) -> ElementId {
        self.attributes.get_or_create(text, None)
    }

    /// Look up or mint a note element.
    pub fn find_or_create_note(&mut self, text: &str, fill_color: Option<&str>) -> ElementId {
        self.notes.get_or_create(text, fill_color)
    }

    /// Rebind an attribute to new text. Fails with `IdentityCollision`
    /// when the text already belongs to a different attribute.
    pub fn update_attribute(&mut self, id: ElementId, new_text: &str) -> Result<(), DecisError> {
        self.attributes.update(id, new_text, None)
    }

    /// A note's text and mapped color name.
    pub fn note(&self, id: ElementId) -> Result<(&str, Option<&str>), DecisError> {
        let element = self
            .notes
            .get(id)
            .ok_or(DecisError::ElementNotFound(id))?;
        Ok((
            element.text.as_str(),
            self.colormap.name_for(&element.fill_color),
        ))
    }

    // -------------------------------------------------------------------------
    // Questions
    // -------------------------------------------------------------------------

    /// Append a question, returning its permanent id.
    pub fn add_question(&mut self, question: Question) -> QuestionId {
        let id = QuestionId(self.questions.len() as u64);
        self.questions.push(Some(question));
        id
    }

    /// Place a question at an explicit id, growing the enumeration with
    /// tombstones as needed. Used by importers that must preserve ids.
    pub fn set_question(&mut self, id: QuestionId, question: Question) {
        if self.questions.len() <= id.index() {
            self.questions.resize(id.index() + 1, None);
        }
        self.questions[id.index()] = Some(question);
    }

    /// A live question by id.
    pub fn question(&self, id: QuestionId) -> Result<&Question, DecisError> {
        self.questions
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(DecisError::QuestionNotFound(id))
    }

    pub(crate) fn question_mut(&mut self, id: QuestionId) -> Result<&mut Question, DecisError> {
        self.questions
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(DecisError::QuestionNotFound(id))
    }

    pub(crate) fn tombstone_question(&mut self, id: QuestionId) {
        if let Some(slot) = self.questions.get_mut(id.index()) {
            *slot = None;
        }
    }

    /// All live questions in id order.
    pub fn questions(&self) -> impl Iterator<Item = (QuestionId, &Question)> {
        self.questions
            .iter()
            .enumerate()
            .filter_map(|(i, q)| q.as_ref().map(|q| (QuestionId(i as u64), q)))
    }

    /// Number of live questions.
    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.iter().filter(|q| q.is_some()).count()
    }

    /// Record that `of` is satisfied by `by`, maintaining both directions
    /// of the relation.
    pub fn link_satisfied_by(&mut self, of: QuestionId, by: QuestionId) -> Result<(), DecisError> {
        self.question(of)?;
        self.question(by)?;
        if let Ok(q) = self.question_mut(of) {
            q.satisfied_by.insert(by);
        }
        if let Ok(q) = self.question_mut(by) {
            q.satisfies.insert(of);
        }
        Ok(())
    }

    /// Recompute every `satisfies` set from the serialized `satisfied_by`
    /// sets. Importers call this once after loading.
    pub(crate) fn rebuild_satisfies(&mut self) {
        let links: Vec<(QuestionId, QuestionId)> = self
            .questions()
            .flat_map(|(id, q)| q.satisfied_by.iter().map(move |&by| (by, id)))
            .collect();
        for slot in self.questions.iter_mut().flatten() {
            slot.satisfies.clear();
        }
        for (by, of) in links {
            if let Some(Some(q)) = self.questions.get_mut(by.index()) {
                q.satisfies.insert(of);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Targets
    // -------------------------------------------------------------------------

    /// Append a target, returning its permanent id.
    pub fn add_target(&mut self, target: Target) -> TargetId {
        let id = TargetId(self.targets.len() as u64);
        self.targets.push(target);
        id
    }

    /// A target by id.
    pub fn target(&self, id: TargetId) -> Result<&Target, DecisError> {
        self.targets
            .get(id.index())
            .ok_or(DecisError::TargetNotFound(id))
    }

    pub(crate) fn target_mut(&mut self, id: TargetId) -> Result<&mut Target, DecisError> {
        self.targets
            .get_mut(id.index())
            .ok_or(DecisError::TargetNotFound(id))
    }

    /// All targets in id order.
    pub fn targets(&self) -> impl Iterator<Item = (TargetId, &Target)> {
        self.targets
            .iter()
            .enumerate()
            .map(|(i, t)| (TargetId(i as u64), t))
    }

    /// Number of targets.
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Targets belonging to a domain.
    #[must_use]
    pub fn targets_for(&self, domain: Domain) -> BTreeSet<TargetId> {
        self.targets()
            .filter(|(_, t)| t.domain == domain)
            .map(|(id, _)| id)
            .collect()
    }

    // -------------------------------------------------------------------------
    // Attribute mappings and record metadata
    // -------------------------------------------------------------------------

    /// Associate an attribute with a question (deduplicated).
    pub fn add_attribute_mapping(
        &mut self,
        question: QuestionId,
        attribute: ElementId,
    ) -> Result<(), DecisError> {
        self.question(question)?;
        if !self.question_attributes.contains(&(question, attribute)) {
            self.question_attributes.push((question, attribute));
        }
        Ok(())
    }

    /// Associate an attribute with a target (deduplicated).
    pub fn add_target_attribute_mapping(
        &mut self,
        target: TargetId,
        attribute: ElementId,
    ) -> Result<(), DecisError> {
        self.target(target)?;
        if !self.target_attributes.contains(&(target, attribute)) {
            self.target_attributes.push((target, attribute));
        }
        Ok(())
    }

    /// Attribute texts mapped to a question, in mapping order.
    #[must_use]
    pub fn attributes_of_question(&self, question: QuestionId) -> Vec<&str> {
        self.question_attributes
            .iter()
            .filter(|(q, _)| *q == question)
            .filter_map(|(_, a)| self.attributes.get(*a))
            .map(|e| e.text.as_str())
            .collect()
    }

    /// Attribute texts mapped to a target, in mapping order.
    #[must_use]
    pub fn attributes_of_target(&self, target: TargetId) -> Vec<&str> {
        self.target_attributes
            .iter()
            .filter(|(t, _)| *t == target)
            .filter_map(|(_, a)| self.attributes.get(*a))
            .map(|e| e.text.as_str())
            .collect()
    }

    /// Questions mapped to any of the given attribute ids.
    #[must_use]
    pub fn questions_with_attribute(&self, attribute: ElementId) -> Vec<QuestionId> {
        let mut out: Vec<QuestionId> = self
            .question_attributes
            .iter()
            .filter(|(_, a)| *a == attribute)
            .map(|(q, _)| *q)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Targets mapped to any of the given attribute ids.
    #[must_use]
    pub fn targets_with_attribute(&self, attribute: ElementId) -> Vec<TargetId> {
        let mut out: Vec<TargetId> = self
            .target_attributes
            .iter()
            .filter(|(_, a)| *a == attribute)
            .map(|(t, _)| *t)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Set a question's title attribute.
    pub fn set_question_title(
        &mut self,
        question: QuestionId,
        attribute: ElementId,
    ) -> Result<(), DecisError> {
        self.question_mut(question)?.title = Some(attribute);
        Ok(())
    }

    /// Set a question's category attribute.
    pub fn set_question_category(
        &mut self,
        question: QuestionId,
        attribute: ElementId,
    ) -> Result<(), DecisError> {
        self.question_mut(question)?.category = Some(attribute);
        Ok(())
    }

    /// Set a target's title attribute.
    pub fn set_target_title(
        &mut self,
        target: TargetId,
        attribute: ElementId,
    ) -> Result<(), DecisError> {
        self.target_mut(target)?.title = Some(attribute);
        Ok(())
    }

    /// Set a target's category attribute.
    pub fn set_target_category(
        &mut self,
        target: TargetId,
        attribute: ElementId,
    ) -> Result<(), DecisError> {
        self.target_mut(target)?.category = Some(attribute);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Relation tables and colormap
    // -------------------------------------------------------------------------

    /// The criteria table.
    #[must_use]
    pub const fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    /// The caveats table.
    #[must_use]
    pub const fn caveats(&self) -> &Caveats {
        &self.caveats
    }

    /// Append a criterion row.
    pub fn add_criterion(&mut self, row: crate::tables::CriterionRow) {
        self.criteria.add_row(row);
    }

    /// Append a caveat row.
    pub fn add_caveat(&mut self, row: crate::tables::CaveatRow) {
        self.caveats.add_row(row);
    }

    /// The colormap.
    #[must_use]
    pub const fn colormap(&self) -> &Colormap {
        &self.colormap
    }

    /// Replace the colormap.
    pub fn set_colormap(&mut self, colormap: Colormap) {
        self.colormap = colormap;
    }

    // -------------------------------------------------------------------------
    // Invariants
    // -------------------------------------------------------------------------

    /// Check that every relation row's question and target exist and that
    /// every resolved threshold/answer index is in range for its
    /// question's answer list. Used by tests and importers.
    #[must_use]
    pub fn check_referential_integrity(&self) -> bool {
        let question_ok = |id: QuestionId, ordinal: Option<u32>| {
            self.question(id).is_ok_and(|q| {
                ordinal.is_none_or(|i| (i as usize) < q.valid_answers.len())
            })
        };
        self.criteria.rows().iter().all(|r| {
            question_ok(r.question, r.threshold) && self.target(r.target).is_ok()
        }) && self.caveats.rows().iter().all(|r| {
            question_ok(r.question, r.answer)
                && self.target(r.target).is_ok()
                && self.notes.get(r.note).is_some()
        }) && self.attributes.is_consistent()
            && self.notes.is_consistent()
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Question, Target};
    use crate::tables::{CaveatRow, CriterionRow};
    use crate::types::Coord;

    fn store_with_one_of_each() -> (DataStore, QuestionId, TargetId) {
        let mut store = DataStore::new();
        let q = store.add_question(Question::new());
        let t = store.add_target(Target::new(Domain::Monitoring, Coord::Row(8)));
        (store, q, t)
    }

    #[test]
    fn ids_are_dense_and_stable() {
        let (mut store, q0, t0) = store_with_one_of_each();
        let q1 = store.add_question(Question::new());
        assert_eq!(q0, QuestionId(0));
        assert_eq!(q1, QuestionId(1));
        assert_eq!(t0, TargetId(0));
    }

    #[test]
    fn tombstone_preserves_slots() {
        let (mut store, q0, _) = store_with_one_of_each();
        let q1 = store.add_question(Question::new());
        store.tombstone_question(q0);

        assert!(store.question(q0).is_err());
        assert!(store.question(q1).is_ok());
        assert_eq!(store.question_count(), 1);
        // the slot is not reused
        let q2 = store.add_question(Question::new());
        assert_eq!(q2, QuestionId(2));
    }

    #[test]
    fn attribute_mapping_deduplicates() {
        let (mut store, q, _) = store_with_one_of_each();
        let a = store.find_or_create_attribute("Data needs");
        store.add_attribute_mapping(q, a).expect("map");
        store.add_attribute_mapping(q, a).expect("map again");

        assert_eq!(store.attributes_of_question(q), vec!["Data needs"]);
        assert_eq!(store.questions_with_attribute(a), vec![q]);
    }

    #[test]
    fn satisfied_by_links_both_directions() {
        let (mut store, q0, _) = store_with_one_of_each();
        let q1 = store.add_question(Question::new());
        store.link_satisfied_by(q0, q1).expect("link");

        assert!(store.question(q0).expect("q0").satisfied_by.contains(&q1));
        assert!(store.question(q1).expect("q1").satisfies.contains(&q0));
    }

    #[test]
    fn rebuild_satisfies_from_scratch() {
        let (mut store, q0, _) = store_with_one_of_each();
        let q1 = store.add_question(Question::new());
        store
            .question_mut(q0)
            .expect("q0")
            .satisfied_by
            .insert(q1);
        store.rebuild_satisfies();
        assert!(store.question(q1).expect("q1").satisfies.contains(&q0));
    }

    #[test]
    fn targets_for_filters_by_domain() {
        let (mut store, _, t0) = store_with_one_of_each();
        let t1 = store.add_target(Target::new(Domain::Assessment, Coord::Col(7)));

        assert_eq!(
            store.targets_for(Domain::Monitoring),
            [t0].into_iter().collect()
        );
        assert_eq!(
            store.targets_for(Domain::Assessment),
            [t1].into_iter().collect()
        );
        assert!(store.targets_for(Domain::ControlRules).is_empty());
    }

    #[test]
    fn note_reports_color_name() {
        let (mut store, _, _) = store_with_one_of_each();
        let n = store.find_or_create_note("needs survey data", Some("00FF0000"));
        let (text, color) = store.note(n).expect("note");
        assert_eq!(text, "needs survey data");
        assert_eq!(color, Some("red"));
    }

    #[test]
    fn referential_integrity_catches_out_of_range() {
        let (mut store, q, t) = store_with_one_of_each();
        let n = store.find_or_create_note("note", None);
        store.add_criterion(CriterionRow {
            question: q,
            target: t,
            threshold: Some(1),
        });
        store.add_caveat(CaveatRow {
            question: q,
            target: t,
            answer: Some(0),
            note: n,
        });
        assert!(store.check_referential_integrity());

        store.add_criterion(CriterionRow {
            question: q,
            target: t,
            threshold: Some(9),
        });
        assert!(!store.check_referential_integrity());
    }
}
