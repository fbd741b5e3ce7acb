//! BM25 lexical ranking
//!
//! Raw BM25 scores are unbounded, so they are squashed into 0..1 with
//! `score / (score + 1)` before leaving the index.

use std::collections::HashMap;

/// BM25 tuning parameters
#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    /// Term frequency saturation
    pub k1: f32,
    /// Length normalization strength
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// Lowercased alphanumeric terms longer than two characters
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(|w| w.to_lowercase())
        .collect()
}

/// Term frequencies of one chunk
pub(crate) fn term_frequencies(tokens: &[String]) -> HashMap<String, usize> {
    let mut frequencies = HashMap::new();
    for token in tokens {
        *frequencies.entry(token.clone()).or_insert(0) += 1;
    }
    frequencies
}

/// Corpus-level numbers needed for scoring
pub(crate) struct CorpusStats<'a> {
    pub chunk_count: usize,
    pub avg_len: f32,
    pub doc_freq: &'a HashMap<String, usize>,
}

impl Bm25Params {
    /// Score one chunk against a set of distinct query terms
    pub(crate) fn score(
        &self,
        terms: &[String],
        frequencies: &HashMap<String, usize>,
        chunk_len: usize,
        corpus: &CorpusStats<'_>,
    ) -> f32 {
        let n = corpus.chunk_count as f32;
        let avg_len = corpus.avg_len.max(1.0);

        terms
            .iter()
            .filter_map(|term| {
                let tf = *frequencies.get(term)? as f32;
                let df = *corpus.doc_freq.get(term).unwrap_or(&0) as f32;

                let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
                let norm = 1.0 - self.b + self.b * chunk_len as f32 / avg_len;

                Some(idf * tf * (self.k1 + 1.0) / (tf + self.k1 * norm))
            })
            .sum()
    }
}

/// Map a raw score into 0..1
pub(crate) fn normalize(score: f32) -> f32 {
    score / (score + 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_drops_short_words() {
        assert_eq!(
            tokenize("An AI model: Revenue grew 12%!"),
            vec!["model", "revenue", "grew"]
        );
    }

    #[test]
    fn test_rarer_terms_score_higher() {
        let params = Bm25Params::default();
        let mut doc_freq = HashMap::new();
        doc_freq.insert("common".to_string(), 9);
        doc_freq.insert("rare".to_string(), 1);
        let corpus = CorpusStats {
            chunk_count: 10,
            avg_len: 10.0,
            doc_freq: &doc_freq,
        };

        let tokens = vec!["common".to_string(), "rare".to_string()];
        let frequencies = term_frequencies(&tokens);

        let common = params.score(&["common".to_string()], &frequencies, 10, &corpus);
        let rare = params.score(&["rare".to_string()], &frequencies, 10, &corpus);
        assert!(rare > common);
        assert!(common > 0.0);
    }

    #[test]
    fn test_normalize_range() {
        assert_eq!(normalize(0.0), 0.0);
        assert!(normalize(100.0) < 1.0);
        assert!(normalize(1.0) > normalize(0.5));
    }
}
