//! Scoring a query against a collection's weighted matrix.
//!
//! Rows are L2-normalized, so the dot product of the normalized query
//! vector with a matrix row is the cosine similarity. The scan is dense
//! and exhaustive; there is no inverted index.
//!
//! Retrieval deliberately never returns nothing: out-of-vocabulary
//! queries fall back to substring matching against the vocabulary, and a
//! query that still produces a zero vector returns randomly sampled
//! chunks at a fixed floor relevance of 0.01. Callers can treat that
//! score as the marker for low-confidence padding.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{store::CollectionIndex, tokenizer::Tokenizer};

/// Relevance assigned to randomly sampled fallback results.
const FALLBACK_RELEVANCE: f32 = 0.01;

/// Maximum number of vocabulary terms matched by the substring fallback.
const PARTIAL_MATCH_LIMIT: usize = 5;

/// Results below this count get padded with random chunks.
const MIN_RESULTS: usize = 3;

/// One ranked chunk returned from a search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub filename: String,
    pub chunk_index: usize,
    pub text: String,
    pub relevance: f32,
    pub distance: f32,
}

/// Rank a collection's chunks against a query and return the top `top_k`.
pub fn search(
    index: &CollectionIndex,
    tokenizer: &Tokenizer,
    query: &str,
    top_k: usize,
) -> Vec<SearchHit> {
    if index.chunks.is_empty() || top_k == 0 {
        return Vec::new();
    }

    let mut query_tokens = tokenizer.tokenize(query);
    if query_tokens.is_empty() {
        // Everything was stripped as stop words or punctuation; fall back
        // to a plain split so the query still has a chance to match.
        query_tokens = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
    }

    let mut query_vec = build_query_vector(index, &query_tokens);

    let norm = query_vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        warn!("query vector is zero after fallbacks, sampling randomly");
        return random_hits(index, top_k, &[]);
    }
    for value in &mut query_vec {
        *value /= norm;
    }

    let mut candidates: Vec<(usize, f32)> = (0..index.matrix.rows)
        .filter_map(|row| {
            let relevance = dot(&query_vec, index.matrix.row(row));
            (relevance > 0.0).then_some((row, relevance))
        })
        .collect();

    // Partial selection of the top_k before the full ordering pass.
    if candidates.len() > top_k {
        candidates.select_nth_unstable_by(top_k - 1, compare_candidates);
        candidates.truncate(top_k);
    }
    candidates.sort_by(compare_candidates);

    let mut results: Vec<SearchHit> = candidates
        .iter()
        .map(|&(row, relevance)| hit_from_chunk(index, row, relevance))
        .collect();

    info!(
        results = results.len(),
        "ranked chunks for query: {:.50}", query
    );

    // Pad sparse result lists so callers always get some grounding
    // context, at a relevance that marks the padding as low-confidence.
    if results.len() < MIN_RESULTS && index.chunks.len() > results.len() {
        let used: Vec<usize> = candidates.iter().map(|&(row, _)| row).collect();
        let wanted = MIN_RESULTS - results.len();
        let padding = random_hits(index, wanted, &used);
        debug!(padded = padding.len(), "padded sparse result list");
        results.extend(padding);
    }

    results
}

fn build_query_vector(index: &CollectionIndex, tokens: &[String]) -> Vec<f32> {
    let mut query_vec = vec![0.0f32; index.vocabulary.len()];
    let total = tokens.len() as f32;

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_default() += 1;
    }

    let mut found = 0;
    for (token, count) in &counts {
        if let Some(id) = index.vocabulary.id(token) {
            query_vec[id] = (*count as f32 / total) * index.idf[id];
            found += 1;
        }
    }
    debug!(
        found,
        unique = counts.len(),
        "query terms resolved against vocabulary"
    );

    if found == 0 {
        // No exact vocabulary hits; substring matches at reduced weight
        // trade precision for recall on out-of-vocabulary queries.
        // Vocabulary terms are visited in id order (most frequent first)
        // so the fallback is deterministic.
        let mut terms: Vec<(&str, usize)> = index.vocabulary.iter().collect();
        terms.sort_by_key(|&(_, id)| id);

        'outer: for token in tokens {
            for &(term, id) in &terms {
                if token.contains(term) || term.contains(token) {
                    query_vec[id] = index.idf[id] * 0.5;
                    found += 1;
                    if found >= PARTIAL_MATCH_LIMIT {
                        break 'outer;
                    }
                    break;
                }
            }
        }
        if found > 0 {
            info!(found, "matched query via partial vocabulary terms");
        }
    }

    query_vec
}

fn compare_candidates(a: &(usize, f32), b: &(usize, f32)) -> std::cmp::Ordering {
    b.1.partial_cmp(&a.1)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then(a.0.cmp(&b.0))
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn hit_from_chunk(
    index: &CollectionIndex,
    row: usize,
    relevance: f32,
) -> SearchHit {
    let chunk = &index.chunks[row];
    SearchHit {
        filename: chunk.filename.clone(),
        chunk_index: chunk.chunk_index,
        text: chunk.text.clone(),
        relevance,
        distance: 1.0 - relevance,
    }
}

/// Sample up to `count` chunks not present in `exclude`, at the fixed
/// fallback relevance.
fn random_hits(
    index: &CollectionIndex,
    count: usize,
    exclude: &[usize],
) -> Vec<SearchHit> {
    let available: Vec<usize> = (0..index.chunks.len())
        .filter(|row| !exclude.contains(row))
        .collect();

    let mut rng = rand::thread_rng();
    available
        .choose_multiple(&mut rng, count.min(available.len()))
        .map(|&row| hit_from_chunk(index, row, FALLBACK_RELEVANCE))
        .collect()
}

/// Format results for human-readable terminal output.
pub fn format_human(results: &[SearchHit]) {
    if results.is_empty() {
        println!("No results found.");
        return;
    }

    for (i, r) in results.iter().enumerate() {
        println!(
            "{:>3}. [{:.3}] {}#{}",
            i + 1,
            r.relevance,
            r.filename,
            r.chunk_index
        );
        let preview: String = r.text.chars().take(120).collect();
        println!("     {}", preview.replace('\n', " "));
    }
    println!("\n{} result(s)", results.len());
}

/// Format results as a JSON array on stdout.
pub fn format_json(results: &[SearchHit]) -> crate::error::Result<()> {
    println!("{}", serde_json::to_string(results)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chunking::ChunkRecord,
        matrix,
        store::{INDEX_TYPE, IndexMetadata},
        vocabulary::Vocabulary,
    };

    fn build_index(texts: &[(&str, &str)]) -> CollectionIndex {
        let tokenizer = Tokenizer::default();
        let chunks: Vec<ChunkRecord> = texts
            .iter()
            .map(|(filename, text)| ChunkRecord {
                filename: filename.to_string(),
                chunk_index: 0,
                text: text.to_string(),
                tokens: tokenizer.tokenize(text),
            })
            .collect();

        let token_lists: Vec<Vec<String>> =
            chunks.iter().map(|c| c.tokens.clone()).collect();
        let vocabulary = Vocabulary::build(&token_lists);
        let tf = matrix::build_tf(&token_lists, &vocabulary);
        let (weighted, idf) = matrix::build_tfidf(&tf);

        let metadata = IndexMetadata {
            total_chunks: chunks.len(),
            index_type: INDEX_TYPE.to_string(),
            total_unique_words: vocabulary.len(),
            matrix_shape: weighted.shape(),
            ..Default::default()
        };

        CollectionIndex {
            vocabulary,
            idf,
            matrix: weighted,
            chunks,
            metadata,
        }
    }

    fn ranking_corpus() -> CollectionIndex {
        build_index(&[
            (
                "d.txt",
                "kernel kernel kernel kernel kernel scheduling threads \
                 processes preemption quantum",
            ),
            (
                "e.txt",
                "kernel documentation covers filesystems drivers memory \
                 interrupts modules loading",
            ),
            (
                "f.txt",
                "gardening tips watering sunlight compost pruning soil \
                 seasonal flowers vegetables",
            ),
        ])
    }

    #[test]
    fn ranks_by_term_frequency() {
        let index = ranking_corpus();
        let tokenizer = Tokenizer::default();
        let results = search(&index, &tokenizer, "kernel", 3);

        assert_eq!(results[0].filename, "d.txt");
        assert_eq!(results[1].filename, "e.txt");
        assert!(results[0].relevance > results[1].relevance);
        assert!(results[1].relevance > 0.0);
        // f.txt can only appear as padding at the floor relevance.
        if let Some(f) = results.iter().find(|r| r.filename == "f.txt") {
            assert!((f.relevance - FALLBACK_RELEVANCE).abs() < 1e-6);
        }
    }

    #[test]
    fn distance_complements_relevance() {
        let index = ranking_corpus();
        let tokenizer = Tokenizer::default();
        let results = search(&index, &tokenizer, "kernel scheduling", 3);

        for r in &results {
            assert!((r.distance - (1.0 - r.relevance)).abs() < 1e-6);
        }
    }

    #[test]
    fn respects_top_k() {
        let index = build_index(&[
            ("a.txt", "storage engine compaction levels"),
            ("b.txt", "storage tiering policies archive"),
            ("c.txt", "storage quotas accounting usage"),
            ("d.txt", "scheduler runqueue latency nodes"),
        ]);
        let tokenizer = Tokenizer::default();
        let results = search(&index, &tokenizer, "storage", 2);

        // Up to MIN_RESULTS after padding, but the positive-relevance
        // portion honors top_k.
        let positive = results
            .iter()
            .filter(|r| r.relevance > FALLBACK_RELEVANCE)
            .count();
        assert!(positive <= 2);
    }

    #[test]
    fn out_of_vocabulary_query_still_returns_results() {
        let index = ranking_corpus();
        let tokenizer = Tokenizer::default();
        let results =
            search(&index, &tokenizer, "zzqq_unknown_terms_entirely", 3);

        assert!(!results.is_empty());
    }

    #[test]
    fn partial_match_prefers_containing_terms() {
        let index = ranking_corpus();
        let tokenizer = Tokenizer::default();
        // "kernels" is not in the vocabulary but contains "kernel".
        let results = search(&index, &tokenizer, "kernels", 3);

        assert!(!results.is_empty());
        assert_eq!(results[0].filename, "d.txt");
        assert!(results[0].relevance > FALLBACK_RELEVANCE);
    }

    #[test]
    fn sparse_results_are_padded_to_minimum() {
        let index = ranking_corpus();
        let tokenizer = Tokenizer::default();
        // Matches only d.txt and e.txt positively; padding fills to 3.
        let results = search(&index, &tokenizer, "kernel", 5);

        assert_eq!(results.len(), 3);
        let padded = results
            .iter()
            .filter(|r| (r.relevance - FALLBACK_RELEVANCE).abs() < 1e-6)
            .count();
        assert_eq!(padded, 1);
    }

    #[test]
    fn empty_index_returns_empty() {
        let index = build_index(&[]);
        let tokenizer = Tokenizer::default();
        assert!(search(&index, &tokenizer, "anything", 5).is_empty());
    }

    #[test]
    fn deterministic_order_for_equal_scores() {
        let index = build_index(&[
            ("a.txt", "cache eviction alpha"),
            ("b.txt", "cache eviction beta"),
            ("c.txt", "unrelated gardening words"),
        ]);
        let tokenizer = Tokenizer::default();

        let first = search(&index, &tokenizer, "cache eviction", 3);
        let second = search(&index, &tokenizer, "cache eviction", 3);

        let names =
            |hits: &[SearchHit]| -> Vec<String> {
                hits.iter().map(|h| h.filename.clone()).collect()
            };
        assert_eq!(names(&first), names(&second));
        assert_eq!(first[0].filename, "a.txt");
    }
}
