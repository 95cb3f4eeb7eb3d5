//! # JSON Exchange Format
//!
//! The human-readable document form of a [`DataStore`]: seven named
//! parts (attributes, notes, questions, targets, criteria, caveats,
//! colormap).
//!
//! Criteria thresholds and caveat answers are written as *literal*
//! answer strings, not ordinal indices, so the document survives
//! answer-domain reordering between export and re-import. Element ids
//! are re-derived from content at export time, which keeps
//! `import(export(store))` idempotent even after elements were rebound
//! by updates.

use crate::element::ElementStore;
use crate::primitives::{DEFAULT_ANSWERS, FILL_NONE};
use crate::records::{Question, Target};
use crate::store::DataStore;
use crate::tables::{CaveatRow, ColorEntry, Colormap, CriterionRow, RelationTable};
use crate::types::{
    DecisError, ElementId, ImportWarning, QuestionId, RecordRef, TargetId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// =============================================================================
// DOCUMENT MODEL
// =============================================================================

/// One serialized element. The color is the raw ARGB fill, omitted for
/// colorless elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDoc {
    pub id: Uuid,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// One element store: its namespace plus its elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSetDoc {
    #[serde(rename = "nsUuid")]
    pub ns_uuid: Uuid,
    pub elements: Vec<ElementDoc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDoc {
    #[serde(rename = "QuestionID")]
    pub id: u64,
    #[serde(rename = "References")]
    pub references: Vec<String>,
    #[serde(rename = "ValidAnswers")]
    pub valid_answers: Vec<String>,
    #[serde(rename = "Attributes")]
    pub attributes: Vec<Uuid>,
    #[serde(
        rename = "SatisfiedBy",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub satisfied_by: Option<Vec<u64>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDoc {
    #[serde(rename = "TargetID")]
    pub id: u64,
    #[serde(rename = "Reference")]
    pub reference: String,
    #[serde(rename = "Attributes")]
    pub attributes: Vec<Uuid>,
}

/// A criterion with its threshold as a literal answer string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionDoc {
    #[serde(rename = "QuestionID")]
    pub question: u64,
    #[serde(rename = "Threshold")]
    pub threshold: String,
    #[serde(rename = "TargetID")]
    pub target: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaveatAnswerDoc {
    #[serde(rename = "Answer")]
    pub answer: String,
    #[serde(rename = "NoteID")]
    pub note: Uuid,
}

/// All caveats of one (question, target) pair, grouped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaveatGroupDoc {
    #[serde(rename = "QuestionID")]
    pub question: u64,
    #[serde(rename = "TargetID")]
    pub target: u64,
    #[serde(rename = "Answers")]
    pub answers: Vec<CaveatAnswerDoc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorDoc {
    #[serde(rename = "RGB")]
    pub rgb: String,
    #[serde(rename = "ColorName")]
    pub name: String,
    #[serde(rename = "Score")]
    pub score: i64,
}

/// The complete exchange document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub attributes: ElementSetDoc,
    pub notes: ElementSetDoc,
    pub questions: Vec<QuestionDoc>,
    pub targets: Vec<TargetDoc>,
    pub criteria: Vec<CriterionDoc>,
    pub caveats: Vec<CaveatGroupDoc>,
    pub colormap: Vec<ColorDoc>,
}

// =============================================================================
// EXPORT
// =============================================================================

/// Serialize a store into an exchange document.
///
/// Rows whose threshold/answer index is the unresolved-import sentinel
/// have no literal to write and are left out. Tombstoned question slots
/// are skipped; their ids simply never appear.
#[must_use]
pub fn export_document(store: &DataStore) -> Document {
    let (attributes, attr_ids) = export_element_set(store.attributes());
    let (notes, note_ids) = export_element_set(store.notes());

    let questions = store
        .questions()
        .map(|(id, record)| QuestionDoc {
            id: id.0,
            references: record.references.iter().map(RecordRef::subject).collect(),
            valid_answers: record.valid_answers.clone(),
            attributes: store
                .question_attributes
                .iter()
                .filter(|(q, _)| *q == id)
                .filter_map(|(_, a)| attr_ids.get(a).map(|e| e.0))
                .collect(),
            satisfied_by: if record.satisfied_by.is_empty() {
                None
            } else {
                Some(record.satisfied_by.iter().map(|q| q.0).collect())
            },
        })
        .collect();

    let targets = store
        .targets()
        .map(|(id, record)| TargetDoc {
            id: id.0,
            reference: record.reference().subject(),
            attributes: store
                .target_attributes
                .iter()
                .filter(|(t, _)| *t == id)
                .filter_map(|(_, a)| attr_ids.get(a).map(|e| e.0))
                .collect(),
        })
        .collect();

    let criteria = store
        .criteria()
        .rows()
        .iter()
        .filter_map(|row| {
            let literal = resolve_literal(store, row.question, row.threshold)?;
            Some(CriterionDoc {
                question: row.question.0,
                threshold: literal,
                target: row.target.0,
            })
        })
        .collect();

    let mut groups: BTreeMap<(u64, u64), Vec<CaveatAnswerDoc>> = BTreeMap::new();
    for row in store.caveats().rows() {
        let Some(literal) = resolve_literal(store, row.question, row.answer) else {
            continue;
        };
        let Some(note) = note_ids.get(&row.note) else {
            continue;
        };
        groups
            .entry((row.question.0, row.target.0))
            .or_default()
            .push(CaveatAnswerDoc {
                answer: literal,
                note: note.0,
            });
    }
    let caveats = groups
        .into_iter()
        .map(|((question, target), answers)| CaveatGroupDoc {
            question,
            target,
            answers,
        })
        .collect();

    let colormap = store
        .colormap()
        .entries()
        .iter()
        .map(|e| ColorDoc {
            rgb: e.rgb.clone(),
            name: e.name.clone(),
            score: e.score,
        })
        .collect();

    Document {
        attributes,
        notes,
        questions,
        targets,
        criteria,
        caveats,
        colormap,
    }
}

/// Serialize one element store, re-deriving every id from content so the
/// document's ids are always the content hashes. Returns the document
/// part plus the stored-id to derived-id remap used by referencing rows.
fn export_element_set(store: &ElementStore) -> (ElementSetDoc, BTreeMap<ElementId, ElementId>) {
    let mut elements = Vec::with_capacity(store.len());
    let mut remap = BTreeMap::new();
    for (id, element) in store.iter() {
        let derived = store.derive_id(element);
        remap.insert(id, derived);
        elements.push(ElementDoc {
            id: derived.0,
            text: element.text.clone(),
            color: (element.fill_color != FILL_NONE).then(|| element.fill_color.clone()),
        });
    }
    (
        ElementSetDoc {
            ns_uuid: store.namespace(),
            elements,
        },
        remap,
    )
}

fn resolve_literal(store: &DataStore, question: QuestionId, index: Option<u32>) -> Option<String> {
    let record = store.question(question).ok()?;
    record.valid_answers.get(index? as usize).cloned()
}

// =============================================================================
// IMPORT
// =============================================================================

/// Rebuild a store from an exchange document.
///
/// Element ids are re-derived from content inside the document's
/// namespaces, so a document produced by a different exporter of the
/// same content arrives at the same ids. Threshold and answer literals
/// with no match in their question's answer list are stored as null
/// indices and reported as warnings; import always continues.
pub fn import_document(doc: &Document) -> Result<(DataStore, Vec<ImportWarning>), DecisError> {
    let mut store = DataStore::with_namespaces(doc.attributes.ns_uuid, doc.notes.ns_uuid);
    let mut warnings = Vec::new();

    let attr_remap = import_element_set(&mut store, &doc.attributes, false);
    let note_remap = import_element_set(&mut store, &doc.notes, true);

    // Targets are never tombstoned, so the enumeration must be dense.
    let mut target_docs: Vec<&TargetDoc> = doc.targets.iter().collect();
    target_docs.sort_by_key(|t| t.id);
    for (position, target_doc) in target_docs.iter().enumerate() {
        if target_doc.id != position as u64 {
            return Err(DecisError::SerializationError(format!(
                "sparse target enumeration: expected id {position}, found {}",
                target_doc.id
            )));
        }
        let reference = RecordRef::parse_subject(&target_doc.reference)?;
        let id = store.add_target(Target::new(reference.domain, reference.coord));
        for attr in &target_doc.attributes {
            if let Some(&actual) = attr_remap.get(&ElementId(*attr)) {
                store.add_target_attribute_mapping(id, actual)?;
            }
        }
    }

    for question_doc in &doc.questions {
        let id = QuestionId(question_doc.id);
        let mut record = Question::new();
        for subject in &question_doc.references {
            record.references.push(RecordRef::parse_subject(subject)?);
        }
        if !question_doc.valid_answers.is_empty() {
            record.valid_answers = question_doc.valid_answers.clone();
            record.default_answers = record
                .valid_answers
                .iter()
                .map(String::as_str)
                .eq(DEFAULT_ANSWERS);
        }
        if let Some(satisfied_by) = &question_doc.satisfied_by {
            record.satisfied_by = satisfied_by.iter().map(|&q| QuestionId(q)).collect();
        }
        store.set_question(id, record);
        for attr in &question_doc.attributes {
            if let Some(&actual) = attr_remap.get(&ElementId(*attr)) {
                store.add_attribute_mapping(id, actual)?;
            }
        }
    }
    store.rebuild_satisfies();

    for criterion in &doc.criteria {
        let question = QuestionId(criterion.question);
        let target = TargetId(criterion.target);
        store.target(target)?;
        let threshold = match store
            .question(question)?
            .answer_index(&criterion.threshold)
        {
            Ok(index) => Some(index as u32),
            Err(_) => {
                warnings.push(ImportWarning::ThresholdUnresolved {
                    question,
                    target,
                    literal: criterion.threshold.clone(),
                });
                None
            }
        };
        store.add_criterion(CriterionRow {
            question,
            target,
            threshold,
        });
    }

    for group in &doc.caveats {
        let question = QuestionId(group.question);
        let target = TargetId(group.target);
        store.target(target)?;
        for entry in &group.answers {
            let note = note_remap
                .get(&ElementId(entry.note))
                .copied()
                .ok_or(DecisError::ElementNotFound(ElementId(entry.note)))?;
            let answer = match store.question(question)?.answer_index(&entry.answer) {
                Ok(index) => Some(index as u32),
                Err(_) => {
                    warnings.push(ImportWarning::AnswerUnresolved {
                        question,
                        target,
                        literal: entry.answer.clone(),
                    });
                    None
                }
            };
            store.add_caveat(CaveatRow {
                question,
                target,
                answer,
                note,
            });
        }
    }

    if !doc.colormap.is_empty() {
        store.set_colormap(Colormap::from_entries(
            doc.colormap
                .iter()
                .map(|c| ColorEntry {
                    rgb: c.rgb.clone(),
                    name: c.name.clone(),
                    score: c.score,
                })
                .collect(),
        ));
    }

    Ok((store, warnings))
}

/// Insert one document part's elements, returning the document-id to
/// actual-id remap.
fn import_element_set(
    store: &mut DataStore,
    doc: &ElementSetDoc,
    notes: bool,
) -> BTreeMap<ElementId, ElementId> {
    let mut remap = BTreeMap::new();
    for element in &doc.elements {
        let actual = if notes {
            store.find_or_create_note(&element.text, element.color.as_deref())
        } else {
            store.find_or_create_attribute(&element.text)
        };
        remap.insert(ElementId(element.id), actual);
    }
    remap
}

// =============================================================================
// TESTS
// =============================================================================
