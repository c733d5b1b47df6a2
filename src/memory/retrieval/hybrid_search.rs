//! Hybrid search: merging vector hits with full-text hits.
//!
//! Lexical relevance is not on the cosine scale, so lexical hits carry a fixed
//! sentinel score that is de-weighted here. Vector matches outrank lexical-only
//! matches of the same nominal score.

use std::collections::HashSet;

use crate::memory::core::document::SearchResult;
use crate::memory::core::ids::DocumentId;

/// Factor applied to the score of hits found only by full-text search.
pub const LEXICAL_WEIGHT: f32 = 0.8;

/// Merge vector and lexical results into one ranked list of at most `limit`.
///
/// A document found by both keeps its vector score. Lexical-only hits are
/// added with their score multiplied by [`LEXICAL_WEIGHT`]. Ties keep vector
/// hits first.
#[must_use]
pub fn merge_hybrid(
    vector: Vec<SearchResult>,
    lexical: Vec<SearchResult>,
    limit: usize,
) -> Vec<SearchResult> {
    let seen: HashSet<DocumentId> = vector.iter().map(|hit| hit.id).collect();
    let mut merged = vector;
    merged.reserve(lexical.len());

    for mut hit in lexical {
        if seen.contains(&hit.id) {
            continue;
        }
        hit.score *= LEXICAL_WEIGHT;
        merged.push(hit);
    }

    merged.sort_by(|a, b| b.score.total_cmp(&a.score));
    merged.truncate(limit);
    merged
}

/// Keep only hits whose source is in `sources`. Hits without a source are dropped.
pub fn retain_sources(results: &mut Vec<SearchResult>, sources: &[String]) {
    results.retain(|hit| {
        hit.source
            .as_ref()
            .is_some_and(|source| sources.iter().any(|allowed| allowed == source))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: DocumentId, score: f32, source: &str) -> SearchResult {
        SearchResult {
            id,
            content: format!("doc {id}"),
            score,
            metadata: None,
            source: Some(source.to_string()),
        }
    }

    #[test]
    fn test_vector_score_wins_on_overlap() {
        let shared = DocumentId::new();
        let merged = merge_hybrid(
            vec![hit(shared, 0.42, "a")],
            vec![hit(shared, 1.0, "a")],
            10,
        );
        assert_eq!(merged.len(), 1);
        assert!((merged[0].score - 0.42).abs() < f32::EPSILON);
    }

    #[test]
    fn test_lexical_only_hits_are_deweighted() {
        let (v, l) = (DocumentId::new(), DocumentId::new());
        let merged = merge_hybrid(vec![hit(v, 0.9, "a")], vec![hit(l, 1.0, "a")], 10);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].id, v);
        assert_eq!(merged[1].id, l);
        assert!((merged[1].score - LEXICAL_WEIGHT).abs() < f32::EPSILON);
    }

    #[test]
    fn test_merge_resorts_and_truncates() {
        let ids: Vec<DocumentId> = (0..4).map(|_| DocumentId::new()).collect();
        let merged = merge_hybrid(
            vec![hit(ids[0], 0.95, "a"), hit(ids[1], 0.5, "a")],
            vec![hit(ids[2], 1.0, "a"), hit(ids[3], 1.0, "a")],
            3,
        );

        let order: Vec<DocumentId> = merged.iter().map(|h| h.id).collect();
        assert_eq!(order, vec![ids[0], ids[2], ids[3]]);
        assert!(merged.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_tie_keeps_vector_first() {
        let (v, l) = (DocumentId::new(), DocumentId::new());
        let merged = merge_hybrid(vec![hit(v, LEXICAL_WEIGHT, "a")], vec![hit(l, 1.0, "a")], 10);
        assert_eq!(merged[0].id, v);
    }

    #[test]
    fn test_retain_sources() {
        let mut results = vec![
            hit(DocumentId::new(), 0.9, "a.md"),
            hit(DocumentId::new(), 0.8, "b.md"),
            SearchResult {
                source: None,
                ..hit(DocumentId::new(), 0.7, "c.md")
            },
        ];
        retain_sources(&mut results, &["b.md".to_string()]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source.as_deref(), Some("b.md"));
    }
}
