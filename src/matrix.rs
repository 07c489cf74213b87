//! Dense term-weight matrices.
//!
//! A [`Matrix`] is a row-major `chunks × terms` array of f32. The TF
//! builder fills raw term frequencies; the TF-IDF builder derives the
//! smoothed IDF vector, applies it, and L2-normalizes each row so that
//! ranking reduces to dot products.
//!
//! Dense layout is deliberate: the engine targets small-to-medium
//! collections (chunk counts in the low thousands), where a dense scan
//! beats the bookkeeping of an inverted index.

use std::collections::HashMap;

use crate::vocabulary::Vocabulary;

/// Row-major dense f32 matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    /// Flat values: `data[row * cols + col]`.
    pub data: Vec<f32>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn row(&self, row: usize) -> &[f32] {
        let start = row * self.cols;
        &self.data[start..start + self.cols]
    }

    fn row_mut(&mut self, row: usize) -> &mut [f32] {
        let start = row * self.cols;
        &mut self.data[start..start + self.cols]
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.rows, self.cols]
    }
}

/// Build the raw term-frequency matrix: entry `(chunk, term)` is
/// `count(term in chunk) / total_tokens(chunk)`. Chunks with no tokens
/// yield an all-zero row.
pub fn build_tf(chunk_tokens: &[Vec<String>], vocab: &Vocabulary) -> Matrix {
    let mut matrix = Matrix::zeros(chunk_tokens.len(), vocab.len());

    for (row_idx, tokens) in chunk_tokens.iter().enumerate() {
        if tokens.is_empty() {
            continue;
        }
        let total = tokens.len() as f32;

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for token in tokens {
            *counts.entry(token.as_str()).or_default() += 1;
        }

        let row = matrix.row_mut(row_idx);
        for (term, count) in counts {
            if let Some(id) = vocab.id(term) {
                row[id] = count as f32 / total;
            }
        }
    }

    matrix
}

/// Derive the TF-IDF weighted matrix and IDF vector from a TF matrix.
///
/// `idf[t] = ln((N + 1) / (1 + df[t]))` where `df[t]` counts chunks with
/// a non-zero TF entry for `t`. The `+1` smoothing keeps the weight
/// finite for unseen terms and non-negative for ubiquitous ones. Each
/// weighted row is L2-normalized; rows with zero norm stay all-zero.
pub fn build_tfidf(tf: &Matrix) -> (Matrix, Vec<f32>) {
    let n = tf.rows as f32;

    let mut df = vec![0usize; tf.cols];
    for row_idx in 0..tf.rows {
        for (col, &value) in tf.row(row_idx).iter().enumerate() {
            if value > 0.0 {
                df[col] += 1;
            }
        }
    }

    let idf: Vec<f32> = df
        .iter()
        .map(|&d| ((n + 1.0) / (1.0 + d as f32)).ln())
        .collect();

    let mut weighted = tf.clone();
    for row_idx in 0..weighted.rows {
        let row = weighted.row_mut(row_idx);
        for (col, value) in row.iter_mut().enumerate() {
            *value *= idf[col];
        }

        let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in row.iter_mut() {
                *value /= norm;
            }
        }
    }

    (weighted, idf)
}
