//! # decis-core
//!
//! The in-memory knowledge engine for Decis - THE LOGIC.
//!
//! This crate implements the CORE substrate - a deterministic model of a
//! fixed decision framework (questions, targets, pass/fail criteria,
//! annotated caveats) extracted from spreadsheets, with referentially
//! consistent mutation of that model as its schema evolves.
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Is the ONLY place where the knowledge base exists (stateful)
//! - Does no file I/O; formats are pure byte/document transformations
//! - Is single-writer: the mutation engine is the sole writer after import
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod element;
pub mod formats;
pub mod ingest;
pub mod mutation;
pub mod primitives;
pub mod query;
pub mod records;
pub mod store;
pub mod tables;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Coord, DOMAINS, DecisError, Domain, ElementId, ImportWarning, QuestionId, RecordRef, TargetId,
    column_index, column_letter,
};

// =============================================================================
// RE-EXPORTS: Knowledge Engine
// =============================================================================

pub use element::{Element, ElementStore};
pub use ingest::{CellData, GridImporter, SheetSource, SheetSpec};
pub use mutation::MutationEngine;
pub use query::{AnswerMap, FailedTarget, QueryEngine, SearchHits, TargetProfile};
pub use records::{Question, Target, cast_answer, is_no, is_yes};
pub use store::DataStore;
pub use tables::{Caveats, CaveatRow, ColorEntry, Colormap, Criteria, CriterionRow, RelationTable};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{Document, SnapshotHeader, export_document, import_document, store_from_bytes, store_to_bytes};
