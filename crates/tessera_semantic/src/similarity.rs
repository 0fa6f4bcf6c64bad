//! Did-you-mean suggestions based on Levenshtein distance.

/// A requested name that does not exist, with the closest valid names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Misspelling {
    pub word: String,
    /// Closest first; ties keep candidate order.
    pub similar_words: Vec<String>,
}

/// Rank `candidates` by edit distance to `target`.
///
/// Candidates further than `threshold` are dropped, the rest are sorted by
/// distance (stable) and truncated to `top_k`.
pub fn closest_words<S: AsRef<str>>(
    target: &str,
    candidates: &[S],
    top_k: Option<usize>,
    threshold: Option<usize>,
) -> Vec<String> {
    let mut distances: Vec<(&str, usize)> = candidates
        .iter()
        .map(|c| (c.as_ref(), strsim::levenshtein(target, c.as_ref())))
        .filter(|(_, distance)| threshold.map_or(true, |max| *distance <= max))
        .collect();

    distances.sort_by_key(|(_, distance)| *distance);

    if let Some(k) = top_k {
        distances.truncate(k);
    }

    distances.into_iter().map(|(word, _)| word.to_string()).collect()
}

/// Report every target missing from `words`, with suggestions.
///
/// Exact (case-sensitive) matches are skipped. The tolerance scales with the
/// target: `max(1, chars / 2)` edits, so short names only match near-exact.
pub fn misspellings<T: AsRef<str>, W: AsRef<str>>(
    targets: &[T],
    words: &[W],
    top_k: Option<usize>,
) -> Vec<Misspelling> {
    targets
        .iter()
        .map(AsRef::as_ref)
        .filter(|target| !words.iter().any(|w| w.as_ref() == *target))
        .map(|target| Misspelling {
            word: target.to_string(),
            similar_words: closest_words(
                target,
                words,
                top_k,
                Some(std::cmp::max(1, target.chars().count() / 2)),
            ),
        })
        .collect()
}
