//! Backend error message cleanup.
//!
//! Query failures come back wrapped in transport decoration: Flight SQL
//! status prefixes, phase annotations, JVM exception class names, and
//! repr-style brackets and quotes. [`NoiseTable`] strips the known shapes so
//! the caller sees only the backend's own sentence.

use regex::Regex;

/// Substrings removed wherever they appear.
pub const DEFAULT_NOISE: &[&str] = &[
    "INVALID_ARGUMENT: [FlightSQL]",
    "(InvalidArgument; Prepare)",
    "(InvalidArgument; ExecuteQuery)",
    "Failed to prepare statement:",
];

/// Fully qualified JVM exception names, e.g. `com.acme.sl.DataPlatformException:`.
const JVM_EXCEPTION_PREFIX: &str = r"(?:[a-z_][a-z0-9_]*\.)+[A-Z][A-Za-z0-9_]*(?:Exception|Error):";

/// Repr-style wrapper some clients put around failures.
const QUERY_FAILED_WRAPPER: &str = "QueryFailedError(";

/// Table of known noise patterns.
#[derive(Debug, Clone)]
pub struct NoiseTable {
    literals: Vec<String>,
    patterns: Vec<Regex>,
}

impl NoiseTable {
    pub fn new(literals: impl IntoIterator<Item = impl Into<String>>, patterns: Vec<Regex>) -> Self {
        Self {
            literals: literals.into_iter().map(Into::into).collect(),
            patterns,
        }
    }

    /// Remove every known noise substring and trim.
    pub fn clean(&self, raw: &str) -> String {
        let mut message = raw.to_string();
        for literal in &self.literals {
            message = message.replace(literal.as_str(), "");
        }
        for pattern in &self.patterns {
            message = pattern.replace_all(&message, "").into_owned();
        }
        message.trim().to_string()
    }

    /// Unwrap `QueryFailedError([" ... "])` decoration, then [`clean`](Self::clean).
    pub fn clean_query_failure(&self, raw: &str) -> String {
        let mut message = raw.trim();
        if let Some(inner) = message
            .strip_prefix(QUERY_FAILED_WRAPPER)
            .and_then(|rest| rest.strip_suffix(')'))
        {
            message = inner.trim();
        }
        message = strip_pair(message, '[', ']');
        message = strip_pair(message, '"', '"');
        message = strip_pair(message, '\'', '\'');
        self.clean(message)
    }
}

impl Default for NoiseTable {
    fn default() -> Self {
        let patterns = Regex::new(JVM_EXCEPTION_PREFIX).into_iter().collect();
        Self::new(DEFAULT_NOISE.iter().copied(), patterns)
    }
}

fn strip_pair(s: &str, open: char, close: char) -> &str {
    s.strip_prefix(open)
        .and_then(|rest| rest.strip_suffix(close))
        .map(str::trim)
        .unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flight_sql_noise_removed() {
        let table = NoiseTable::default();
        let raw = "INVALID_ARGUMENT: [FlightSQL] Failed to prepare statement: (InvalidArgument; Prepare) foo bar";
        assert_eq!(table.clean(raw), "foo bar");
        assert_eq!(table.clean_query_failure(raw), "foo bar");
    }

    #[test]
    fn test_execute_phase_and_exception_prefix_removed() {
        let table = NoiseTable::default();
        let raw = "(InvalidArgument; ExecuteQuery) com.acme.semanticlayer.exceptions.DataPlatformException: column \"x\" does not exist";
        assert_eq!(table.clean(raw), "column \"x\" does not exist");
    }

    #[test]
    fn test_wrapper_unwrapped() {
        let table = NoiseTable::default();
        let raw = r#"QueryFailedError(["INVALID_ARGUMENT: [FlightSQL] metric not found"])"#;
        assert_eq!(table.clean_query_failure(raw), "metric not found");
    }

    #[test]
    fn test_unrecognized_text_untouched() {
        let table = NoiseTable::default();
        assert_eq!(table.clean("connection reset by peer"), "connection reset by peer");
        // Inner parentheses are not wrapper decoration.
        assert_eq!(table.clean_query_failure("bad grain (day)"), "bad grain (day)");
    }

    #[test]
    fn test_custom_table() {
        let table = NoiseTable::new(["[backend]"], Vec::new());
        assert_eq!(table.clean("[backend] timeout"), "timeout");
    }
}
