//! Keyword expression matching against statement labels.
//!
//! The grammar is deliberately small: commas separate alternatives, and
//! within an alternative every whitespace-separated word must appear in the
//! label as a case-insensitive substring. `"ORANGE ABONNEMENT"` requires
//! both words; `"ORANGE,SFR"` is satisfied by either word alone.

/// Whether a statement label satisfies a keyword expression.
///
/// An empty or blank expression matches nothing, so an unconfigured keyword
/// field never silently matches every label. Blank alternatives produced by
/// stray commas are skipped for the same reason.
pub fn label_matches(label: &str, expression: &str) -> bool {
    let haystack = label.to_lowercase();
    expression
        .split(',')
        .map(str::trim)
        .filter(|alternative| !alternative.is_empty())
        .any(|alternative| {
            alternative
                .split_whitespace()
                .all(|word| haystack.contains(&word.to_lowercase()))
        })
}
