//! # Innate Primitives
//!
//! Hardcoded runtime constants for the Decis engine.
//!
//! These values are compiled into the binary and are immutable at runtime.

/// The default ordinal answer list for questions whose source never
/// declared one. Index order encodes increasing stringency.
pub const DEFAULT_ANSWERS: [&str; 2] = ["No", "Yes"];

/// The fill color assigned to elements with no (or unparseable) fill:
/// fully transparent ARGB.
pub const FILL_NONE: &str = "00000000";

/// Attribute text marking a question as a criterion question.
///
/// Matched case-insensitively as a substring, so both "Criterion" and
/// "criteria" qualify.
pub const CRITERION_MARKER: &str = "criteri";

/// Magic bytes for the Decis binary snapshot header.
///
/// - File Header = Magic Bytes ("DECS") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"DECS";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the snapshot format.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum allowed payload size for the snapshot format.
///
/// Validated BEFORE deserialization so corrupted or hostile input cannot
/// trigger unbounded allocation.
pub const MAX_SNAPSHOT_PAYLOAD_SIZE: usize = 100 * 1024 * 1024; // 100 MB

/// Maximum number of search terms accepted by a single query.
pub const MAX_SEARCH_TERMS: usize = 32;

/// The built-in colormap: (RGB, name, score).
///
/// Scores weight caveat notes when profiling a target, so the default
/// profile score works out to `greens - yellows - oranges - 10 * reds`.
pub const DEFAULT_COLORMAP: [(&str, &str, i64); 4] = [
    ("0000FF00", "green", 1),
    ("00FFFF00", "yellow", -1),
    ("00FFA500", "orange", -1),
    ("00FF0000", "red", -10),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"DECS");
    }

    #[test]
    fn default_answers_ordinal() {
        // "No" is the weakest answer and must come first
        assert_eq!(DEFAULT_ANSWERS[0], "No");
    }

    #[test]
    fn colormap_scores_match_profile_formula() {
        let score: i64 = DEFAULT_COLORMAP.iter().map(|(_, _, s)| *s).sum();
        // 1 - 1 - 1 - 10
        assert_eq!(score, -11);
    }
}
