//! # Grid Ingest
//!
//! One-shot import of a decision-framework spreadsheet into a
//! [`DataStore`].
//!
//! The cell-reading collaborator sits behind [`SheetSource`]: the engine
//! never touches a workbook format directly, it only asks for resolved
//! cells. A sheet is a header band plus a data grid; one axis of the grid
//! holds questions, the other targets, and the orientation differs per
//! source workbook, so the per-sheet layout is described by a
//! [`SheetSpec`].
//!
//! Import is an ordered, non-resumable pass. Unresolvable threshold or
//! answer literals are recorded as null indices and surfaced as warnings;
//! everything else either imports or fails the whole run.

use crate::primitives::CRITERION_MARKER;
use crate::records::{cast_answer, Question, Target};
use crate::store::DataStore;
use crate::tables::{CaveatRow, CriterionRow};
use crate::types::{Coord, DecisError, Domain, ImportWarning, QuestionId, RecordRef, TargetId};

// =============================================================================
// SHEET SOURCE
// =============================================================================

/// A non-empty cell's content, with merged ranges already resolved to
/// their anchor cell by the implementor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellData {
    pub text: String,
    /// Resolved ARGB fill, when the cell has one.
    pub fill_color: Option<String>,
}

/// The import collaborator contract: a scannable grid of resolved cells.
///
/// Implementations must report empty cells as `None` rather than as
/// empty-text cells, and must resolve a request inside a merged range to
/// the range's anchor. Rows and columns are 1-based.
pub trait SheetSource {
    fn cell(&self, row: u32, col: u32) -> Option<CellData>;
    fn max_row(&self) -> u32;
    fn max_column(&self) -> u32;
}

/// Per-sheet layout description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSpec {
    pub domain: Domain,
    /// Whether question records run along rows (targets along columns)
    /// or the other way around.
    pub questions_in_rows: bool,
    /// Top-left cell of the data grid, 1-based (row, column). Everything
    /// above/left of it is the header band.
    pub grid_start: (u32, u32),
    /// The header line holding each question's answer sense: a row when
    /// questions run along columns, a column otherwise. Defaults to the
    /// last header line before the grid.
    pub answer_sense: Option<u32>,
}

// =============================================================================
// GRID IMPORTER
// =============================================================================

/// Builds a [`DataStore`] from one or more sheets.
#[derive(Debug, Default)]
pub struct GridImporter {
    store: DataStore,
    warnings: Vec<ImportWarning>,
}

impl GridImporter {
    /// Start an import into a fresh store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: DataStore::new(),
            warnings: Vec::new(),
        }
    }

    /// Scan one sheet into the store.
    pub fn import_sheet(
        &mut self,
        source: &impl SheetSource,
        spec: &SheetSpec,
    ) -> Result<(), DecisError> {
        let (start_row, start_col) = spec.grid_start;
        if start_row < 2 || start_col < 2 {
            return Err(DecisError::BadSelector(format!(
                "grid start ({start_row}, {start_col}) leaves no header band"
            )));
        }

        let question_lines: Vec<Coord> = if spec.questions_in_rows {
            (start_row..=source.max_row()).map(Coord::Row).collect()
        } else {
            (start_col..=source.max_column()).map(Coord::Col).collect()
        };
        let target_lines: Vec<Coord> = if spec.questions_in_rows {
            (start_col..=source.max_column()).map(Coord::Col).collect()
        } else {
            (start_row..=source.max_row()).map(Coord::Row).collect()
        };

        let mut targets = Vec::with_capacity(target_lines.len());
        for &coord in &target_lines {
            let id = self.add_target(source, spec, coord)?;
            targets.push((coord, id));
        }

        for &coord in &question_lines {
            let (question, is_criterion, trigger) = self.add_question(source, spec, coord)?;
            self.scan_grid_line(source, spec, coord, question, is_criterion, trigger, &targets);
        }
        Ok(())
    }

    /// Finish the pass, yielding the store and the accumulated warnings.
    #[must_use]
    pub fn finish(self) -> (DataStore, Vec<ImportWarning>) {
        (self.store, self.warnings)
    }

    /// Warnings recorded so far.
    #[must_use]
    pub fn warnings(&self) -> &[ImportWarning] {
        &self.warnings
    }

    fn add_target(
        &mut self,
        source: &impl SheetSource,
        spec: &SheetSpec,
        coord: Coord,
    ) -> Result<TargetId, DecisError> {
        let id = self
            .store
            .add_target(Target::new(spec.domain, coord));
        for cell in header_cells(source, spec, coord) {
            let attr = self
                .store
                .find_or_create_attribute(&cell.text);
            self.store.add_target_attribute_mapping(id, attr)?;
        }
        Ok(id)
    }

    /// Create a question from its header band. Returns the id, whether it
    /// is a criterion question, and the caveat trigger literal (the
    /// answer-sense text, when it names a single answer).
    fn add_question(
        &mut self,
        source: &impl SheetSource,
        spec: &SheetSpec,
        coord: Coord,
    ) -> Result<(QuestionId, bool, Option<String>), DecisError> {
        let mut question = Question::new();
        question.references.push(RecordRef::new(spec.domain, coord));
        let id = self.store.add_question(question);

        let mut is_criterion = false;
        for cell in header_cells(source, spec, coord) {
            let attr = self.store.find_or_create_attribute(&cell.text);
            self.store.add_attribute_mapping(id, attr)?;
            if cell.text.to_ascii_lowercase().contains(CRITERION_MARKER) {
                is_criterion = true;
            }
        }

        // The answer-sense cell either lists the whole ordinal answer
        // domain (semicolon-delimited, increasing stringency) or names the
        // single answer that triggers the question's caveats.
        let mut trigger = None;
        if let Some(cell) = answer_sense_cell(source, spec, coord) {
            let parts: Vec<&str> = cell
                .text
                .split(';')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect();
            if parts.len() > 1 {
                if let Ok(q) = self.store.question_mut(id) {
                    q.absorb_answers(parts.iter().copied());
                }
            } else if let Some(single) = parts.first() {
                // a single literal names the caveat trigger; the answer
                // domain itself stays as-is
                trigger = Some(cast_answer(single));
            }
        }
        Ok((id, is_criterion, trigger))
    }

    fn scan_grid_line(
        &mut self,
        source: &impl SheetSource,
        spec: &SheetSpec,
        coord: Coord,
        question: QuestionId,
        is_criterion: bool,
        trigger: Option<String>,
        targets: &[(Coord, TargetId)],
    ) {
        for &(cross, target) in targets {
            let (row, col) = intersect(coord, cross);
            let Some(cell) = source.cell(row, col) else {
                continue;
            };
            if is_criterion {
                self.add_criterion_cell(question, target, &cell);
            } else {
                self.add_caveat_cell(question, target, trigger.as_deref(), &cell);
            }
        }
    }

    /// A criterion cell's text is a threshold literal. Grid literals not
    /// yet in the answer list extend it first (first-seen order), so a
    /// question with no declared answer sense derives its domain from the
    /// grid content the way the source workbooks do.
    fn add_criterion_cell(&mut self, question: QuestionId, target: TargetId, cell: &CellData) {
        let literal = cast_answer(&cell.text);
        let threshold = {
            if let Ok(record) = self.store.question_mut(question) {
                if record.answer_index(&literal).is_err() && record.default_answers {
                    record.absorb_answers([literal.as_str()]);
                }
            }
            match self.store.question(question).and_then(|q| q.answer_index(&literal)) {
                Ok(index) => Some(index as u32),
                Err(_) => {
                    self.warnings.push(ImportWarning::ThresholdUnresolved {
                        question,
                        target,
                        literal,
                    });
                    None
                }
            }
        };
        self.store.add_criterion(CriterionRow {
            question,
            target,
            threshold,
        });
    }

    /// A caveat cell is an annotation note; the triggering answer is the
    /// question's answer-sense literal.
    fn add_caveat_cell(
        &mut self,
        question: QuestionId,
        target: TargetId,
        trigger: Option<&str>,
        cell: &CellData,
    ) {
        let note = self
            .store
            .find_or_create_note(&cell.text, cell.fill_color.as_deref());
        let answer = match trigger {
            Some(literal) => match self
                .store
                .question(question)
                .and_then(|q| q.answer_index(literal))
            {
                Ok(index) => Some(index as u32),
                Err(_) => {
                    self.warnings.push(ImportWarning::AnswerUnresolved {
                        question,
                        target,
                        literal: literal.to_string(),
                    });
                    None
                }
            },
            None => {
                self.warnings.push(ImportWarning::AnswerUnresolved {
                    question,
                    target,
                    literal: String::new(),
                });
                None
            }
        };
        self.store.add_caveat(CaveatRow {
            question,
            target,
            answer,
            note,
        });
    }
}

/// Header-band cells of a record line, in reading order.
fn header_cells(
    source: &impl SheetSource,
    spec: &SheetSpec,
    coord: Coord,
) -> Vec<CellData> {
    let (start_row, start_col) = spec.grid_start;
    let refs: Vec<(u32, u32)> = match coord {
        Coord::Col(c) => (1..start_row).map(|r| (r, c)).collect(),
        Coord::Row(r) => (1..start_col).map(|c| (r, c)).collect(),
    };
    refs.into_iter()
        .filter_map(|(r, c)| source.cell(r, c))
        .collect()
}

/// The answer-sense cell for a question line.
fn answer_sense_cell(
    source: &impl SheetSource,
    spec: &SheetSpec,
    coord: Coord,
) -> Option<CellData> {
    let (start_row, start_col) = spec.grid_start;
    match coord {
        Coord::Col(c) => source.cell(spec.answer_sense.unwrap_or(start_row - 1), c),
        Coord::Row(r) => source.cell(r, spec.answer_sense.unwrap_or(start_col - 1)),
    }
}

/// The grid cell where a question line crosses a target line.
fn intersect(a: Coord, b: Coord) -> (u32, u32) {
    match (a, b) {
        (Coord::Row(r), Coord::Col(c)) | (Coord::Col(c), Coord::Row(r)) => (r, c),
        // same-axis lines never cross under a well-formed SheetSpec
        (Coord::Row(r), Coord::Row(_)) => (r, 0),
        (Coord::Col(c), Coord::Col(_)) => (0, c),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryEngine;
    use crate::tables::RelationTable;
    use std::collections::BTreeMap;

    /// A tiny in-memory sheet keyed by (row, col).
    struct FakeSheet {
        cells: BTreeMap<(u32, u32), CellData>,
        max_row: u32,
        max_column: u32,
    }

    impl FakeSheet {
        fn new(max_row: u32, max_column: u32) -> Self {
            Self {
                cells: BTreeMap::new(),
                max_row,
                max_column,
            }
        }

        fn set(&mut self, row: u32, col: u32, text: &str) {
            self.set_colored(row, col, text, None);
        }

        fn set_colored(&mut self, row: u32, col: u32, text: &str, fill: Option<&str>) {
            self.cells.insert(
                (row, col),
                CellData {
                    text: text.to_string(),
                    fill_color: fill.map(str::to_string),
                },
            );
        }
    }

    impl SheetSource for FakeSheet {
        fn cell(&self, row: u32, col: u32) -> Option<CellData> {
            self.cells.get(&(row, col)).cloned()
        }

        fn max_row(&self) -> u32 {
            self.max_row
        }

        fn max_column(&self) -> u32 {
            self.max_column
        }
    }

    /// Questions along columns (as in the monitoring workbook): header
    /// rows 1-2, answer sense in row 2, grid from (3, 3). Targets along
    /// rows with header columns 1-2.
    fn monitoring_sheet() -> (FakeSheet, SheetSpec) {
        let mut sheet = FakeSheet::new(4, 4);
        // question C: a criterion with a declared ordinal domain
        sheet.set(1, 3, "Data quality criterion");
        sheet.set(2, 3, "Low; Medium; High");
        // question D: a caveat triggered on Yes
        sheet.set(1, 4, "Gear conflicts?");
        sheet.set(2, 4, "if yes");
        // two targets in rows 3-4
        sheet.set(3, 1, "Acoustic survey");
        sheet.set(4, 1, "Logbook program");
        // grid: criterion thresholds
        sheet.set(3, 3, "Medium");
        sheet.set(4, 3, "High");
        // grid: caveat notes
        sheet.set_colored(3, 4, "check seasonal closures", Some("00FFFF00"));

        let spec = SheetSpec {
            domain: Domain::Monitoring,
            questions_in_rows: false,
            grid_start: (3, 3),
            answer_sense: Some(2),
        };
        (sheet, spec)
    }

    #[test]
    fn imports_questions_targets_and_rows() {
        let (sheet, spec) = monitoring_sheet();
        let mut importer = GridImporter::new();
        importer.import_sheet(&sheet, &spec).expect("import");
        let (store, warnings) = importer.finish();

        assert!(warnings.is_empty());
        assert_eq!(store.question_count(), 2);
        assert_eq!(store.target_count(), 2);
        assert_eq!(store.criteria().len(), 2);
        assert_eq!(store.caveats().len(), 1);
        assert!(store.check_referential_integrity());

        let criterion = QueryEngine::criteria_for(&store, Domain::Monitoring)[0];
        let record = store.question(criterion).expect("criterion question");
        assert_eq!(record.valid_answers, vec!["Low", "Medium", "High"]);
        assert_eq!(record.references[0].subject(), "Monitoring:C");
    }

    #[test]
    fn caveat_trigger_resolves_through_answer_sense() {
        let (sheet, spec) = monitoring_sheet();
        let mut importer = GridImporter::new();
        importer.import_sheet(&sheet, &spec).expect("import");
        let (store, _) = importer.finish();

        let row = store.caveats().rows()[0];
        let record = store.question(row.question).expect("caveat question");
        // "if yes" collapsed to "Yes" at index 1 of the default domain
        assert_eq!(record.valid_answers, vec!["No", "Yes"]);
        assert_eq!(row.answer, Some(1));
        let (text, color) = store.note(row.note).expect("note");
        assert_eq!(text, "check seasonal closures");
        assert_eq!(color, Some("yellow"));
    }

    #[test]
    fn criterion_without_answer_sense_derives_domain_from_grid() {
        let mut sheet = FakeSheet::new(3, 3);
        sheet.set(1, 3, "Cost criterion");
        sheet.set(3, 1, "Only target");
        sheet.set(3, 3, "Cheap");
        let spec = SheetSpec {
            domain: Domain::ControlRules,
            questions_in_rows: false,
            grid_start: (3, 3),
            answer_sense: Some(2),
        };

        let mut importer = GridImporter::new();
        importer.import_sheet(&sheet, &spec).expect("import");
        let (store, warnings) = importer.finish();

        assert!(warnings.is_empty());
        let row = store.criteria().rows()[0];
        let record = store.question(row.question).expect("question");
        assert!(record.valid_answers.contains(&"Cheap".to_string()));
        assert_eq!(row.threshold, record.answer_index("Cheap").ok().map(|i| i as u32));
    }

    #[test]
    fn unresolved_threshold_warns_and_continues() {
        let (mut sheet, spec) = monitoring_sheet();
        // a grid literal outside the declared domain
        sheet.set(4, 3, "Perfect");

        let mut importer = GridImporter::new();
        importer.import_sheet(&sheet, &spec).expect("import");
        let (store, warnings) = importer.finish();

        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            &warnings[0],
            ImportWarning::ThresholdUnresolved { literal, .. } if literal == "Perfect"
        ));
        // the row is present with a null threshold and never gates
        assert!(store.criteria().rows().iter().any(|r| r.threshold.is_none()));
    }

    #[test]
    fn questions_in_rows_orientation() {
        // transpose of the monitoring layout: questions along rows,
        // targets along columns, answer sense in column 2
        let mut sheet = FakeSheet::new(4, 4);
        sheet.set(3, 1, "Data quality criterion");
        sheet.set(3, 2, "Low; High");
        sheet.set(1, 3, "Rule A");
        sheet.set(1, 4, "Rule B");
        sheet.set(3, 3, "Low");
        sheet.set(3, 4, "High");
        let spec = SheetSpec {
            domain: Domain::ControlRules,
            questions_in_rows: true,
            grid_start: (3, 3),
            answer_sense: Some(2),
        };

        let mut importer = GridImporter::new();
        importer.import_sheet(&sheet, &spec).expect("import");
        let (store, warnings) = importer.finish();

        assert!(warnings.is_empty());
        assert_eq!(store.question_count(), 1);
        assert_eq!(store.target_count(), 2);
        let thresholds: Vec<Option<u32>> =
            store.criteria().rows().iter().map(|r| r.threshold).collect();
        assert_eq!(thresholds, vec![Some(0), Some(1)]);
    }

    #[test]
    fn grid_start_must_leave_a_header_band() {
        let sheet = FakeSheet::new(2, 2);
        let spec = SheetSpec {
            domain: Domain::Monitoring,
            questions_in_rows: false,
            grid_start: (1, 1),
            answer_sense: None,
        };
        let mut importer = GridImporter::new();
        assert!(importer.import_sheet(&sheet, &spec).is_err());
    }
}
