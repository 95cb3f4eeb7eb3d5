//! # CLI Command Implementations
//!
//! File handling plus thin calls into the core engines. The interactive
//! confirmation for destructive deletes lives here; the core itself only
//! accepts a pre-approved flag.

use crate::cli::{AnswerCommands, Cli, Commands};
use decis_core::{
    AnswerMap, DataStore, DecisError, Domain, MutationEngine, QueryEngine, QuestionId,
    export_document, import_document, store_from_bytes, store_to_bytes,
};
use serde::Deserialize;
use std::path::Path;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum file size for JSON documents (100 MB).
///
/// This prevents memory exhaustion from malicious or accidental large files.
const MAX_DOCUMENT_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), DecisError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| DecisError::IoError(format!("Cannot read file metadata: {e}")))?;

    if metadata.len() > max_size {
        return Err(DecisError::SerializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

// =============================================================================
// SNAPSHOT I/O
// =============================================================================

fn load_store(path: &Path) -> Result<DataStore, DecisError> {
    validate_file_size(path, MAX_DOCUMENT_FILE_SIZE)?;
    let bytes = std::fs::read(path)
        .map_err(|e| DecisError::IoError(format!("Cannot read '{}': {e}", path.display())))?;
    store_from_bytes(&bytes)
}

fn save_store(path: &Path, store: &DataStore) -> Result<(), DecisError> {
    let bytes = store_to_bytes(store)?;
    std::fs::write(path, bytes)
        .map_err(|e| DecisError::IoError(format!("Cannot write '{}': {e}", path.display())))
}

// =============================================================================
// ANSWER FILES
// =============================================================================

#[derive(Debug, Deserialize)]
struct AnswerEntry {
    #[serde(rename = "QuestionID")]
    question: u64,
    #[serde(rename = "Answer")]
    answer: u32,
}

#[derive(Debug, Deserialize)]
struct AnswerFile {
    answers: Vec<AnswerEntry>,
}

fn load_answers(path: &Path) -> Result<AnswerMap, DecisError> {
    validate_file_size(path, MAX_DOCUMENT_FILE_SIZE)?;
    let text = std::fs::read_to_string(path)
        .map_err(|e| DecisError::IoError(format!("Cannot read '{}': {e}", path.display())))?;
    let file: AnswerFile = serde_json::from_str(&text)
        .map_err(|e| DecisError::SerializationError(format!("Bad answers file: {e}")))?;
    Ok(file
        .answers
        .into_iter()
        .map(|a| (QuestionId(a.question), a.answer))
        .collect())
}

// =============================================================================
// COMMAND DISPATCH
// =============================================================================

/// Execute the parsed command line.
pub fn execute(cli: Cli) -> Result<(), DecisError> {
    match cli.command {
        Commands::Init => {
            let store = DataStore::new();
            save_store(&cli.database, &store)?;
            println!("Initialized empty knowledge base at {}", cli.database.display());
            Ok(())
        }
        Commands::Stats => cmd_stats(&cli.database, cli.json_mode),
        Commands::Show { domain } => cmd_show(&cli.database, &domain),
        Commands::Search { terms, notes, any } => cmd_search(&cli.database, &terms, notes, any),
        Commands::Filter {
            domain,
            answers,
            failures,
        } => cmd_filter(&cli.database, &domain, &answers, failures),
        Commands::Score { domain, answers } => cmd_score(&cli.database, &domain, &answers),
        Commands::Answers { command } => cmd_answers(&cli.database, command),
        Commands::MergeQuestions { ids } => cmd_merge_questions(&cli.database, &ids),
        Commands::Import { file } => cmd_import(&cli.database, &file),
        Commands::Export { file } => cmd_export(&cli.database, &file),
    }
}

fn cmd_stats(database: &Path, json_mode: bool) -> Result<(), DecisError> {
    let store = load_store(database)?;
    if json_mode {
        let stats = serde_json::json!({
            "questions": store.question_count(),
            "targets": store.target_count(),
            "attributes": store.attributes().len(),
            "notes": store.notes().len(),
            "criteria": count_rows(&store).0,
            "caveats": count_rows(&store).1,
        });
        println!("{stats}");
    } else {
        let (criteria, caveats) = count_rows(&store);
        println!("Questions:  {}", store.question_count());
        println!("Targets:    {}", store.target_count());
        println!("Attributes: {}", store.attributes().len());
        println!("Notes:      {}", store.notes().len());
        println!("Criteria:   {criteria}");
        println!("Caveats:    {caveats}");
    }
    Ok(())
}

fn count_rows(store: &DataStore) -> (usize, usize) {
    use decis_core::RelationTable;
    (store.criteria().rows().len(), store.caveats().rows().len())
}

fn cmd_show(database: &Path, domain: &str) -> Result<(), DecisError> {
    let store = load_store(database)?;
    let domain = Domain::parse(domain)?;

    println!("{domain} targets:");
    for target in store.targets_for(domain) {
        let record = store.target(target)?;
        let title = record
            .title
            .and_then(|t| store.attributes().get(t))
            .map_or_else(
                || record.reference().subject(),
                |e| e.text.clone(),
            );
        println!("  [{}] {title}", target.0);
    }

    println!("{domain} criteria questions:");
    for question in QueryEngine::criteria_for(&store, domain) {
        print_question(&store, question)?;
    }
    println!("{domain} caveat questions:");
    for question in QueryEngine::caveats_for(&store, domain) {
        print_question(&store, question)?;
    }
    Ok(())
}

fn print_question(store: &DataStore, question: QuestionId) -> Result<(), DecisError> {
    let record = store.question(question)?;
    let attrs = store.attributes_of_question(question);
    let label = attrs.first().copied().unwrap_or("(untitled)");
    println!(
        "  [{}] {label} — answers: {}",
        question.0,
        record.valid_answers.join(" | ")
    );
    Ok(())
}

fn cmd_search(database: &Path, terms: &[String], notes: bool, any: bool) -> Result<(), DecisError> {
    let store = load_store(database)?;
    let hits = QueryEngine::search(&store, terms, notes, any)?;

    println!(
        "{} elements, {} questions, {} targets",
        hits.elements.len(),
        hits.questions.len(),
        hits.targets.len()
    );
    for question in &hits.questions {
        print_question(&store, *question)?;
    }
    for target in &hits.targets {
        let record = store.target(*target)?;
        println!("  [{}] {}", target.0, record.reference().subject());
    }
    Ok(())
}

fn cmd_filter(
    database: &Path,
    domain: &str,
    answers: &Path,
    failures: bool,
) -> Result<(), DecisError> {
    let store = load_store(database)?;
    let domain = Domain::parse(domain)?;
    let answers = load_answers(answers)?;

    let qualifying = QueryEngine::filter_qualifying(&store, domain, &answers);
    println!("{} of {} {domain} targets qualify:", qualifying.len(), store.targets_for(domain).len());
    for target in &qualifying {
        let record = store.target(*target)?;
        println!("  [{}] {}", target.0, record.reference().subject());
    }

    if failures {
        for failed in QueryEngine::failure_report(&store, domain, &answers) {
            println!("  excluded [{}]:", failed.target.0);
            for (question, threshold, answer) in failed.failures {
                println!(
                    "    question {} requires index >= {threshold}, answered {answer}",
                    question.0
                );
            }
        }
    }
    Ok(())
}

fn cmd_score(database: &Path, domain: &str, answers: &Path) -> Result<(), DecisError> {
    let store = load_store(database)?;
    let domain = Domain::parse(domain)?;
    let answers = load_answers(answers)?;

    let mut ranked: Vec<(i64, u64)> = QueryEngine::filter_qualifying(&store, domain, &answers)
        .into_iter()
        .map(|t| (QueryEngine::score_target(&store, t, &answers).score, t.0))
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    for (score, target) in ranked {
        let profile = QueryEngine::score_target(
            &store,
            decis_core::TargetId(target),
            &answers,
        );
        println!("[{target}] score {score}");
        for (color, notes) in &profile.notes_by_color {
            for note in notes {
                let (text, _) = store.note(*note)?;
                println!("  ({color}) {text}");
            }
        }
    }
    Ok(())
}

fn cmd_answers(database: &Path, command: AnswerCommands) -> Result<(), DecisError> {
    let mut store = load_store(database)?;
    match command {
        AnswerCommands::Refactor { question, list } => {
            MutationEngine::refactor_answers(&mut store, QuestionId(question), list)?;
            tracing::info!(question, "answer list refactored");
        }
        AnswerCommands::Reorder { question, order } => {
            MutationEngine::reorder_answers(&mut store, QuestionId(question), &order)?;
            tracing::info!(question, "answers reordered");
        }
        AnswerCommands::Merge {
            question,
            merge,
            into,
        } => {
            MutationEngine::merge_answers(&mut store, QuestionId(question), &merge, into.as_deref())?;
            tracing::info!(question, "answers merged");
        }
        AnswerCommands::Delete {
            question,
            answer,
            yes,
        } => {
            let id = QuestionId(question);
            let (criteria, caveats) = MutationEngine::preview_delete_answer(&store, id, &answer)?;
            if (criteria > 0 || caveats > 0) && !yes && !confirm_delete(criteria, caveats)? {
                println!("Aborted.");
                return Ok(());
            }
            MutationEngine::delete_answer(&mut store, id, &answer, true)?;
            tracing::info!(question, criteria, caveats, "answer deleted");
        }
    }
    save_store(database, &store)
}

/// Ask the user to approve a destructive delete.
fn confirm_delete(criteria: usize, caveats: usize) -> Result<bool, DecisError> {
    println!("Deleting this answer removes {criteria} criteria and {caveats} caveat rows.");
    println!("Proceed? [y/N]");
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .map_err(|e| DecisError::IoError(format!("Cannot read confirmation: {e}")))?;
    Ok(line.trim().eq_ignore_ascii_case("y"))
}

fn cmd_merge_questions(database: &Path, ids: &[u64]) -> Result<(), DecisError> {
    let mut store = load_store(database)?;
    let ids: Vec<QuestionId> = ids.iter().map(|&i| QuestionId(i)).collect();
    let survivor = MutationEngine::merge_questions(&mut store, &ids)?;
    println!("Merged into question {}", survivor.0);
    save_store(database, &store)
}

fn cmd_import(database: &Path, file: &Path) -> Result<(), DecisError> {
    validate_file_size(file, MAX_DOCUMENT_FILE_SIZE)?;
    let text = std::fs::read_to_string(file)
        .map_err(|e| DecisError::IoError(format!("Cannot read '{}': {e}", file.display())))?;
    let doc: decis_core::Document = serde_json::from_str(&text)
        .map_err(|e| DecisError::SerializationError(format!("Bad document: {e}")))?;

    let (store, warnings) = import_document(&doc)?;
    for warning in &warnings {
        tracing::warn!("{warning}");
    }
    save_store(database, &store)?;
    println!(
        "Imported {} questions, {} targets ({} warnings)",
        store.question_count(),
        store.target_count(),
        warnings.len()
    );
    Ok(())
}

fn cmd_export(database: &Path, file: &Path) -> Result<(), DecisError> {
    let store = load_store(database)?;
    let doc = export_document(&store);
    let text = serde_json::to_string_pretty(&doc)
        .map_err(|e| DecisError::SerializationError(e.to_string()))?;
    std::fs::write(file, text)
        .map_err(|e| DecisError::IoError(format!("Cannot write '{}': {e}", file.display())))?;
    println!("Exported to {}", file.display());
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn temp_path(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        dir.path().join(name)
    }

    #[test]
    fn snapshot_save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = temp_path(&dir, "store.bin");
        let store = DataStore::new();

        save_store(&path, &store).expect("save");
        let restored = load_store(&path).expect("load");
        assert_eq!(restored.question_count(), 0);
    }

    #[test]
    fn answers_file_parses() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = temp_path(&dir, "answers.json");
        let mut file = std::fs::File::create(&path).expect("create");
        file.write_all(br#"{"answers":[{"QuestionID":3,"Answer":1},{"QuestionID":7,"Answer":0}]}"#)
            .expect("write");

        let answers = load_answers(&path).expect("parse");
        assert_eq!(answers.get(&QuestionId(3)), Some(&1));
        assert_eq!(answers.get(&QuestionId(7)), Some(&0));
    }

    #[test]
    fn bad_answers_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = temp_path(&dir, "answers.json");
        std::fs::write(&path, b"not json").expect("write");
        assert!(load_answers(&path).is_err());
    }

    #[test]
    fn missing_snapshot_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = temp_path(&dir, "absent.bin");
        assert!(matches!(load_store(&path), Err(DecisError::IoError(_))));
    }
}
