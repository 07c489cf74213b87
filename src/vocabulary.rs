use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Term → dense id mapping for one collection index.
///
/// Ids are assigned in descending global-frequency order, with ties
/// broken by first-seen order so identical input always produces the
/// same layout. The ordering only affects array layout, never scoring.
///
/// A vocabulary is rebuilt from scratch on every index operation, over
/// the union of retained and newly indexed chunks, because term ids must
/// stay consistent across all rows of one weighted matrix.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vocabulary {
    terms: HashMap<String, usize>,
}

impl Vocabulary {
    /// Build a vocabulary from every chunk's token list.
    pub fn build(chunk_tokens: &[Vec<String>]) -> Self {
        let mut counts: HashMap<&str, (usize, usize)> = HashMap::new(); // term -> (freq, first_seen)
        let mut next_seen = 0;

        for tokens in chunk_tokens {
            for token in tokens {
                let entry = counts.entry(token.as_str()).or_insert_with(|| {
                    let seen = next_seen;
                    next_seen += 1;
                    (0, seen)
                });
                entry.0 += 1;
            }
        }

        let mut ordered: Vec<(&str, usize, usize)> = counts
            .into_iter()
            .map(|(term, (freq, seen))| (term, freq, seen))
            .collect();
        ordered.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

        let terms = ordered
            .into_iter()
            .enumerate()
            .map(|(id, (term, _, _))| (term.to_string(), id))
            .collect();

        Self { terms }
    }

    pub fn id(&self, term: &str) -> Option<usize> {
        self.terms.get(term).copied()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Iterate over `(term, id)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.terms.iter().map(|(t, &id)| (t.as_str(), id))
    }
}
