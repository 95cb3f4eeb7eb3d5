//! # Decis CLI Module
//!
//! ## Available Commands
//!
//! - `stats` - Show knowledge base statistics
//! - `show` - List the targets or prompted questions of a domain
//! - `search` - Free-text search over attributes or notes
//! - `filter` - Targets qualifying under an answer file
//! - `score` - Rank qualifying targets by caveat profile
//! - `answers` - Reshape a question's answer domain (refactor/reorder/merge/delete)
//! - `merge-questions` - Consolidate question identities
//! - `import` / `export` - JSON exchange documents
//! - `init` - Create an empty knowledge base

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::execute;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Decis - decision framework knowledge base
///
/// Maintains an in-memory model of questions, targets, criteria, and
/// caveats, with referentially consistent schema edits.
#[derive(Parser, Debug)]
#[command(name = "decis")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the knowledge base snapshot
    #[arg(short = 'D', long, global = true, default_value = "decis.bin")]
    pub database: PathBuf,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show knowledge base statistics
    Stats,

    /// List a domain's targets and prompted questions
    Show {
        /// Domain selector (Monitoring, Assessment, ControlRules, or M/A/C)
        #[arg(short, long)]
        domain: String,
    },

    /// Free-text search over attribute or note text
    Search {
        /// Search terms (each a case-insensitive regex)
        terms: Vec<String>,

        /// Search note text instead of attribute text
        #[arg(short, long)]
        notes: bool,

        /// Match any term instead of all terms
        #[arg(long)]
        any: bool,
    },

    /// Targets qualifying under the supplied answers
    Filter {
        /// Domain selector
        #[arg(short, long)]
        domain: String,

        /// Path to an answers file: {"answers":[{"QuestionID":n,"Answer":n}]}
        #[arg(short, long)]
        answers: PathBuf,

        /// Also report failed criteria per excluded target
        #[arg(long)]
        failures: bool,
    },

    /// Rank qualifying targets by caveat profile score
    Score {
        /// Domain selector
        #[arg(short, long)]
        domain: String,

        /// Path to an answers file
        #[arg(short, long)]
        answers: PathBuf,
    },

    /// Reshape a question's answer domain
    Answers {
        #[command(subcommand)]
        command: AnswerCommands,
    },

    /// Merge question identities into the smallest id
    MergeQuestions {
        /// Question ids to merge (comma-separated)
        #[arg(long, value_delimiter = ',')]
        ids: Vec<u64>,
    },

    /// Import a JSON exchange document into a new knowledge base
    Import {
        /// Path to the JSON document
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Export the knowledge base as a JSON exchange document
    Export {
        /// Output path
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Create an empty knowledge base
    Init,
}

/// Answer-domain subcommands.
#[derive(Subcommand, Debug)]
pub enum AnswerCommands {
    /// Replace the answer list with a reordered superset
    Refactor {
        /// Question id
        #[arg(short, long)]
        question: u64,

        /// The new answer list, in order (comma-separated)
        #[arg(long, value_delimiter = ',')]
        list: Vec<String>,
    },

    /// Reorder answers by index permutation
    Reorder {
        /// Question id
        #[arg(short, long)]
        question: u64,

        /// Current indices in their new order (comma-separated, 0- or 1-indexed)
        #[arg(long, value_delimiter = ',')]
        order: Vec<usize>,
    },

    /// Collapse several answers into one
    Merge {
        /// Question id
        #[arg(short, long)]
        question: u64,

        /// Answers to merge (comma-separated)
        #[arg(long, value_delimiter = ',')]
        merge: Vec<String>,

        /// Surviving answer (defaults to the first of --merge)
        #[arg(long)]
        into: Option<String>,
    },

    /// Delete an answer, removing the rows that reference it
    Delete {
        /// Question id
        #[arg(short, long)]
        question: u64,

        /// The answer to delete
        #[arg(short, long)]
        answer: String,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}
