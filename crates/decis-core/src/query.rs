//! # Query Engine
//!
//! Read-only views over the knowledge base: selector-scoped filtering of
//! targets against their criteria, caveat-note profiling of a single
//! target, and free-text search with set algebra across the tables.
//!
//! Answers arrive as a map from question id to ordinal answer index.
//! Derived questions (non-empty `satisfied_by`) are never answered
//! directly; their effective answer is resolved transitively as the
//! maximum over their satisfiers' answers.

use crate::primitives::MAX_SEARCH_TERMS;
use crate::store::DataStore;
use crate::tables::RelationTable;
use crate::types::{DecisError, Domain, ElementId, QuestionId, TargetId};
use std::collections::{BTreeMap, BTreeSet};

/// Supplied answers, by question id.
pub type AnswerMap = BTreeMap<QuestionId, u32>;

// =============================================================================
// RESULT SHAPES
// =============================================================================

/// The caveat profile of one target under a set of answers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetProfile {
    /// Applicable notes grouped by color name (or raw RGB when the fill
    /// is not in the colormap), in deterministic order.
    pub notes_by_color: BTreeMap<String, Vec<ElementId>>,
    /// The weighted note score; higher ranks better.
    pub score: i64,
}

/// One excluded target and the criteria it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTarget {
    pub target: TargetId,
    /// (question, required threshold, resolved answer) per failed row.
    pub failures: Vec<(QuestionId, u32, u32)>,
}

/// Search hits at each level of the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchHits {
    pub elements: BTreeSet<ElementId>,
    pub questions: BTreeSet<QuestionId>,
    pub targets: BTreeSet<TargetId>,
}

// =============================================================================
// QUERY ENGINE
// =============================================================================

/// Read-only companion to the mutation engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryEngine;

impl QueryEngine {
    /// Targets belonging to a domain.
    #[must_use]
    pub fn targets_for(store: &DataStore, domain: Domain) -> BTreeSet<TargetId> {
        store.targets_for(domain)
    }

    /// Criteria questions gating at least one target in the domain, sorted,
    /// excluding derived questions (they are evaluated through their
    /// satisfiers and never prompted).
    #[must_use]
    pub fn criteria_for(store: &DataStore, domain: Domain) -> Vec<QuestionId> {
        let targets = store.targets_for(domain);
        Self::prompted_questions(
            store,
            store
                .criteria()
                .rows()
                .iter()
                .filter(|r| targets.contains(&r.target))
                .map(|r| r.question),
        )
    }

    /// Caveat questions annotating at least one target in the domain,
    /// sorted, excluding derived questions.
    #[must_use]
    pub fn caveats_for(store: &DataStore, domain: Domain) -> Vec<QuestionId> {
        let targets = store.targets_for(domain);
        Self::prompted_questions(
            store,
            store
                .caveats()
                .rows()
                .iter()
                .filter(|r| targets.contains(&r.target))
                .map(|r| r.question),
        )
    }

    fn prompted_questions(
        store: &DataStore,
        ids: impl Iterator<Item = QuestionId>,
    ) -> Vec<QuestionId> {
        let set: BTreeSet<QuestionId> = ids
            .filter(|&q| store.question(q).is_ok_and(|r| !r.is_derived()))
            .collect();
        set.into_iter().collect()
    }

    /// A question's effective answer: the supplied one, or for a derived
    /// question the maximum over its satisfiers' effective answers.
    /// `None` when the question (or every satisfier) is unanswered.
    #[must_use]
    pub fn resolve_answer(store: &DataStore, question: QuestionId, answers: &AnswerMap) -> Option<u32> {
        Self::resolve_answer_inner(store, question, answers, &mut BTreeSet::new())
    }

    fn resolve_answer_inner(
        store: &DataStore,
        question: QuestionId,
        answers: &AnswerMap,
        visiting: &mut BTreeSet<QuestionId>,
    ) -> Option<u32> {
        if let Some(&answer) = answers.get(&question) {
            return Some(answer);
        }
        // a derivation cycle can never produce an answer
        if !visiting.insert(question) {
            return None;
        }
        let record = store.question(question).ok()?;
        let resolved = record
            .satisfied_by
            .iter()
            .filter_map(|&by| Self::resolve_answer_inner(store, by, answers, visiting))
            .max();
        visiting.remove(&question);
        resolved
    }

    /// Verify that every satisfier of a derived question shares the
    /// question's exact answer list. The max-over-satisfiers resolution
    /// is only meaningful in one shared ordinal space; this precondition
    /// is checked on demand rather than enforced at mutation time.
    pub fn check_satisfier_lists(store: &DataStore, question: QuestionId) -> Result<(), DecisError> {
        let record = store.question(question)?;
        for &by in &record.satisfied_by {
            if store.question(by)?.valid_answers != record.valid_answers {
                return Err(DecisError::AnswerListMismatch);
            }
        }
        Ok(())
    }

    /// Targets in the domain qualifying under the supplied answers.
    ///
    /// Monitoring targets must pass every applicable criterion: the result
    /// is the intersection of each criterion's passing set. Assessment
    /// targets fail only criteria they are explicitly linked to, so
    /// linked-but-failing targets are subtracted instead. ControlRules
    /// targets are not gated. Criteria whose question has no resolvable
    /// answer do not gate, nor do rows with an unresolved threshold.
    #[must_use]
    pub fn filter_qualifying(
        store: &DataStore,
        domain: Domain,
        answers: &AnswerMap,
    ) -> BTreeSet<TargetId> {
        let candidates = store.targets_for(domain);
        if domain == Domain::ControlRules {
            return candidates;
        }

        let questions: BTreeSet<QuestionId> = store
            .criteria()
            .rows()
            .iter()
            .filter(|r| candidates.contains(&r.target))
            .map(|r| r.question)
            .collect();

        let mut qualifying = candidates.clone();
        for question in questions {
            let Some(answer) = Self::resolve_answer(store, question, answers) else {
                continue;
            };
            let rows = store.criteria().rows_for_question(question);
            match domain {
                Domain::Monitoring => {
                    let passing: BTreeSet<TargetId> = rows
                        .iter()
                        .filter(|r| candidates.contains(&r.target))
                        .filter(|r| r.threshold.is_none_or(|t| answer >= t))
                        .map(|r| r.target)
                        .collect();
                    qualifying = qualifying.intersection(&passing).copied().collect();
                }
                Domain::Assessment => {
                    for row in rows {
                        if let Some(threshold) = row.threshold {
                            if answer < threshold {
                                qualifying.remove(&row.target);
                            }
                        }
                    }
                }
                Domain::ControlRules => {}
            }
        }
        qualifying
    }

    /// For each non-qualifying target in the domain, the criteria rows it
    /// failed under the supplied answers.
    #[must_use]
    pub fn failure_report(
        store: &DataStore,
        domain: Domain,
        answers: &AnswerMap,
    ) -> Vec<FailedTarget> {
        let qualifying = Self::filter_qualifying(store, domain, answers);
        let mut report = Vec::new();
        for target in store.targets_for(domain) {
            if qualifying.contains(&target) {
                continue;
            }
            let failures: Vec<(QuestionId, u32, u32)> = store
                .criteria()
                .rows_for_target(target)
                .iter()
                .filter_map(|r| {
                    let threshold = r.threshold?;
                    let answer = Self::resolve_answer(store, r.question, answers)?;
                    (answer < threshold).then_some((r.question, threshold, answer))
                })
                .collect();
            report.push(FailedTarget { target, failures });
        }
        report
    }

    /// Profile one target: every caveat note triggered by the supplied
    /// answers, grouped by color, plus the weighted score used to rank
    /// qualifying targets.
    #[must_use]
    pub fn score_target(store: &DataStore, target: TargetId, answers: &AnswerMap) -> TargetProfile {
        let mut profile = TargetProfile::default();
        for row in store.caveats().rows_for_target(target) {
            let Some(expected) = row.answer else { continue };
            if Self::resolve_answer(store, row.question, answers) != Some(expected) {
                continue;
            }
            let Some(element) = store.notes().get(row.note) else {
                continue;
            };
            let color = store
                .colormap()
                .name_for(&element.fill_color)
                .map_or_else(|| element.fill_color.clone(), str::to_string);
            profile.notes_by_color.entry(color).or_default().push(row.note);
            profile.score += store.colormap().score_for(&element.fill_color);
        }
        profile
    }

    /// Free-text search across the model.
    ///
    /// Each term runs as a case-insensitive regex over attribute text (or
    /// note text when `search_notes`), and each term's element hits are
    /// propagated to the questions and targets referencing them. Per-term
    /// results combine by intersection (match-all, the default) or union
    /// (`match_any`), applied independently at the element, question, and
    /// target levels.
    pub fn search(
        store: &DataStore,
        terms: &[String],
        search_notes: bool,
        match_any: bool,
    ) -> Result<SearchHits, DecisError> {
        if terms.is_empty() {
            return Err(DecisError::EmptyInput);
        }
        if terms.len() > MAX_SEARCH_TERMS {
            return Err(DecisError::InvalidPattern(format!(
                "too many search terms (max {MAX_SEARCH_TERMS})"
            )));
        }

        let mut combined: Option<SearchHits> = None;
        for term in terms {
            let hits = Self::search_one(store, term, search_notes)?;
            combined = Some(match combined {
                None => hits,
                Some(acc) => combine(acc, hits, match_any),
            });
        }
        Ok(combined.unwrap_or_default())
    }

    fn search_one(
        store: &DataStore,
        term: &str,
        search_notes: bool,
    ) -> Result<SearchHits, DecisError> {
        let mut hits = SearchHits::default();
        if search_notes {
            hits.elements = store.notes().search(term, None)?.into_iter().collect();
            for row in store.caveats().rows() {
                if hits.elements.contains(&row.note) {
                    hits.questions.insert(row.question);
                    hits.targets.insert(row.target);
                }
            }
        } else {
            hits.elements = store.attributes().search(term, None)?.into_iter().collect();
            for &element in &hits.elements {
                hits.questions.extend(store.questions_with_attribute(element));
                hits.targets.extend(store.targets_with_attribute(element));
            }
            for (id, record) in store.questions() {
                if record.title.is_some_and(|t| hits.elements.contains(&t))
                    || record.category.is_some_and(|c| hits.elements.contains(&c))
                {
                    hits.questions.insert(id);
                }
            }
            for (id, record) in store.targets() {
                if record.title.is_some_and(|t| hits.elements.contains(&t))
                    || record.category.is_some_and(|c| hits.elements.contains(&c))
                {
                    hits.targets.insert(id);
                }
            }
        }
        Ok(hits)
    }
}

fn combine(a: SearchHits, b: SearchHits, match_any: bool) -> SearchHits {
    fn merge<T: Ord + Copy>(a: &BTreeSet<T>, b: &BTreeSet<T>, union: bool) -> BTreeSet<T> {
        if union {
            a.union(b).copied().collect()
        } else {
            a.intersection(b).copied().collect()
        }
    }
    SearchHits {
        elements: merge(&a.elements, &b.elements, match_any),
        questions: merge(&a.questions, &b.questions, match_any),
        targets: merge(&a.targets, &b.targets, match_any),
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

    fn question_with(store: &mut DataStore, answers: &[&str]) -> QuestionId {
        let mut q = Question::new();
        q.absorb_answers(answers.iter().copied());
        store.add_question(q)
    }

    fn criterion(store: &mut DataStore, q: QuestionId, t: TargetId, threshold: u32) {
        store.add_criterion(CriterionRow {
            question: q,
            target: t,
            threshold: Some(threshold),
        });
    }

    /// Two criteria over two monitoring targets: T1 passes both under the
    /// answer map, T2 fails one.
    fn monitoring_fixture() -> (DataStore, TargetId, TargetId, AnswerMap) {
        let mut store = DataStore::new();
        let q0 = question_with(&mut store, &["No", "Yes"]);
        let q1 = question_with(&mut store, &["Low", "Medium", "High"]);
        let t1 = store.add_target(Target::new(Domain::Monitoring, Coord::Row(2)));
        let t2 = store.add_target(Target::new(Domain::Monitoring, Coord::Row(3)));
        criterion(&mut store, q0, t1, 1);
        criterion(&mut store, q0, t2, 1);
        criterion(&mut store, q1, t1, 1);
        criterion(&mut store, q1, t2, 2);

        let answers: AnswerMap = [(q0, 1), (q1, 1)].into_iter().collect();
        (store, t1, t2, answers)
    }

    #[test]
    fn monitoring_requires_all_criteria() {
        let (store, t1, _t2, answers) = monitoring_fixture();
        let qualifying = QueryEngine::filter_qualifying(&store, Domain::Monitoring, &answers);
        assert_eq!(qualifying, [t1].into_iter().collect());
    }

    #[test]
    fn assessment_fails_only_linked_criteria() {
        let mut store = DataStore::new();
        let q = question_with(&mut store, &["No", "Yes"]);
        let linked = store.add_target(Target::new(Domain::Assessment, Coord::Col(2)));
        let unlinked = store.add_target(Target::new(Domain::Assessment, Coord::Col(3)));
        criterion(&mut store, q, linked, 1);

        let answers: AnswerMap = [(q, 0)].into_iter().collect();
        let qualifying = QueryEngine::filter_qualifying(&store, Domain::Assessment, &answers);
        // the unlinked target is unaffected by the failed criterion
        assert_eq!(qualifying, [unlinked].into_iter().collect());
    }

    #[test]
    fn control_rules_always_qualify() {
        let mut store = DataStore::new();
        let q = question_with(&mut store, &["No", "Yes"]);
        let t = store.add_target(Target::new(Domain::ControlRules, Coord::Row(5)));
        criterion(&mut store, q, t, 1);

        let answers: AnswerMap = [(q, 0)].into_iter().collect();
        let qualifying = QueryEngine::filter_qualifying(&store, Domain::ControlRules, &answers);
        assert_eq!(qualifying, [t].into_iter().collect());
    }

    #[test]
    fn unanswered_criteria_do_not_gate() {
        let (store, t1, t2, _) = monitoring_fixture();
        let qualifying =
            QueryEngine::filter_qualifying(&store, Domain::Monitoring, &AnswerMap::new());
        assert_eq!(qualifying, [t1, t2].into_iter().collect());
    }

    #[test]
    fn criteria_for_sorts_and_excludes_derived() {
        let (mut store, _, _, _) = monitoring_fixture();
        let derived = question_with(&mut store, &["No", "Yes"]);
        let satisfier = question_with(&mut store, &["No", "Yes"]);
        store.link_satisfied_by(derived, satisfier).expect("link");
        let t = store.add_target(Target::new(Domain::Monitoring, Coord::Row(9)));
        criterion(&mut store, derived, t, 1);

        let prompted = QueryEngine::criteria_for(&store, Domain::Monitoring);
        assert_eq!(prompted, vec![QuestionId(0), QuestionId(1)]);
        assert!(!prompted.contains(&derived));
    }

    #[test]
    fn resolve_answer_takes_max_over_satisfiers() {
        let mut store = DataStore::new();
        let derived = question_with(&mut store, &["Low", "Medium", "High"]);
        let s1 = question_with(&mut store, &["Low", "Medium", "High"]);
        let s2 = question_with(&mut store, &["Low", "Medium", "High"]);
        store.link_satisfied_by(derived, s1).expect("link");
        store.link_satisfied_by(derived, s2).expect("link");

        let answers: AnswerMap = [(s1, 0), (s2, 2)].into_iter().collect();
        assert_eq!(QueryEngine::resolve_answer(&store, derived, &answers), Some(2));
        assert_eq!(
            QueryEngine::resolve_answer(&store, derived, &AnswerMap::new()),
            None
        );
        QueryEngine::check_satisfier_lists(&store, derived).expect("lists match");
    }

    #[test]
    fn check_satisfier_lists_catches_divergence() {
        let mut store = DataStore::new();
        let derived = question_with(&mut store, &["No", "Yes"]);
        let satisfier = question_with(&mut store, &["Low", "High"]);
        store.link_satisfied_by(derived, satisfier).expect("link");

        assert!(matches!(
            QueryEngine::check_satisfier_lists(&store, derived),
            Err(DecisError::AnswerListMismatch)
        ));
    }

    #[test]
    fn score_target_groups_notes_by_color() {
        let mut store = DataStore::new();
        let q = question_with(&mut store, &["No", "Yes"]);
        let t = store.add_target(Target::new(Domain::Monitoring, Coord::Row(2)));
        let green = store.find_or_create_note("well tested", Some("0000FF00"));
        let red = store.find_or_create_note("very costly", Some("00FF0000"));
        let dormant = store.find_or_create_note("only when absent", Some("0000FF00"));
        store.add_caveat(CaveatRow { question: q, target: t, answer: Some(1), note: green });
        store.add_caveat(CaveatRow { question: q, target: t, answer: Some(1), note: red });
        store.add_caveat(CaveatRow { question: q, target: t, answer: Some(0), note: dormant });

        let answers: AnswerMap = [(q, 1)].into_iter().collect();
        let profile = QueryEngine::score_target(&store, t, &answers);
        assert_eq!(profile.notes_by_color.get("green"), Some(&vec![green]));
        assert_eq!(profile.notes_by_color.get("red"), Some(&vec![red]));
        assert_eq!(profile.score, 1 - 10);
    }

    #[test]
    fn failure_report_names_failed_rows() {
        let (store, _t1, t2, answers) = monitoring_fixture();
        let report = QueryEngine::failure_report(&store, Domain::Monitoring, &answers);
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].target, t2);
        assert_eq!(report[0].failures, vec![(QuestionId(1), 2, 1)]);
    }

    #[test]
    fn search_propagates_to_questions_and_targets() {
        let mut store = DataStore::new();
        let q = question_with(&mut store, &["No", "Yes"]);
        let t = store.add_target(Target::new(Domain::Monitoring, Coord::Row(2)));
        let a = store.find_or_create_attribute("Biomass survey");
        store.add_attribute_mapping(q, a).expect("map");
        let title = store.find_or_create_attribute("Acoustic biomass index");
        store.set_target_title(t, title).expect("title");

        let hits = QueryEngine::search(&store, &["biomass".into()], false, false).expect("search");
        assert!(hits.elements.contains(&a));
        assert!(hits.questions.contains(&q));
        assert!(hits.targets.contains(&t));
    }

    #[test]
    fn search_all_intersects_and_any_unions() {
        let mut store = DataStore::new();
        let q0 = question_with(&mut store, &["No", "Yes"]);
        let q1 = question_with(&mut store, &["No", "Yes"]);
        let both = store.find_or_create_attribute("annual survey cost");
        let cost_only = store.find_or_create_attribute("gear cost");
        store.add_attribute_mapping(q0, both).expect("map");
        store.add_attribute_mapping(q1, cost_only).expect("map");

        let terms = vec!["survey".to_string(), "cost".to_string()];
        let all = QueryEngine::search(&store, &terms, false, false).expect("search");
        assert_eq!(all.questions, [q0].into_iter().collect());

        let any = QueryEngine::search(&store, &terms, false, true).expect("search");
        assert_eq!(any.questions, [q0, q1].into_iter().collect());
    }

    #[test]
    fn search_notes_goes_through_caveats() {
        let mut store = DataStore::new();
        let q = question_with(&mut store, &["No", "Yes"]);
        let t = store.add_target(Target::new(Domain::Assessment, Coord::Col(4)));
        let note = store.find_or_create_note("requires ageing data", Some("00FFFF00"));
        store.add_caveat(CaveatRow { question: q, target: t, answer: Some(1), note });

        let hits = QueryEngine::search(&store, &["ageing".into()], true, false).expect("search");
        assert_eq!(hits.questions, [q].into_iter().collect());
        assert_eq!(hits.targets, [t].into_iter().collect());
    }

    #[test]
    fn search_rejects_empty_and_oversized_input() {
        let store = DataStore::new();
        assert!(matches!(
            QueryEngine::search(&store, &[], false, false),
            Err(DecisError::EmptyInput)
        ));
        let terms: Vec<String> = (0..=MAX_SEARCH_TERMS).map(|i| format!("t{i}")).collect();
        assert!(QueryEngine::search(&store, &terms, false, false).is_err());
    }
}
