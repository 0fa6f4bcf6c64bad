//! Query parameter validation with did-you-mean suggestions.

use crate::metadata::MetadataCache;
use crate::similarity::{misspellings, Misspelling};
use crate::types::GroupByParam;
use tessera_graphql::GraphqlError;

/// Suggestions offered per unknown name.
pub const SUGGESTION_LIMIT: usize = 5;

/// Check that every requested metric and group-by target exists.
///
/// Returns `Ok(Some(message))` for unknown names. Dimension names are only
/// checked once every metric is known, since an invalid metric set makes the
/// dimension listing meaningless.
pub async fn validate_query_params(
    cache: &MetadataCache,
    metrics: &[String],
    group_by: &[GroupByParam],
) -> Result<Option<String>, GraphqlError> {
    let known_metrics: Vec<String> = cache.list_metrics().await?.into_iter().map(|m| m.name).collect();
    let unknown = misspellings(metrics, &known_metrics, Some(SUGGESTION_LIMIT));
    if !unknown.is_empty() {
        return Ok(Some(format_errors("Metric", &unknown)));
    }

    if group_by.is_empty() {
        return Ok(None);
    }

    let known_dimensions: Vec<String> = cache
        .get_dimensions(metrics)
        .await?
        .into_iter()
        .map(|d| d.name)
        .collect();
    let targets: Vec<&str> = group_by.iter().map(|g| g.name.as_str()).collect();
    let unknown = misspellings(&targets, &known_dimensions, Some(SUGGESTION_LIMIT));
    if !unknown.is_empty() {
        return Ok(Some(format_errors("Dimension", &unknown)));
    }

    Ok(None)
}

fn format_errors(kind: &str, unknown: &[Misspelling]) -> String {
    let messages: Vec<String> = unknown
        .iter()
        .map(|m| {
            let mut message = format!("{} {} not found.", kind, m.word);
            if !m.similar_words.is_empty() {
                message.push_str(&format!(" Did you mean: {}?", m.similar_words.join(", ")));
            }
            message
        })
        .collect();
    format!("Errors: {}", messages.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_errors_with_and_without_suggestions() {
        let unknown = vec![
            Misspelling {
                word: "revehue".to_string(),
                similar_words: vec!["revenue".to_string(), "revenues".to_string()],
            },
            Misspelling {
                word: "xyz".to_string(),
                similar_words: Vec::new(),
            },
        ];

        assert_eq!(
            format_errors("Metric", &unknown),
            "Errors: Metric revehue not found. Did you mean: revenue, revenues?, Metric xyz not found."
        );
    }
}
