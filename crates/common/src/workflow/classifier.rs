//! Query Classifier - Deterministic keyword routing
//!
//! Scores the query against four keyword sets and resolves the route with a
//! fixed precedence. Financial terms always win so that ticker questions go
//! to the tabular source.

use super::state::RouteType;
use crate::collaborators::calculator::extract_expressions;
use serde::Serialize;

const DOCUMENT_KEYWORDS: &[&str] = &["document", "pdf", "file", "text", "content", "search", "find"];

const NUMERIC_KEYWORDS: &[&str] = &[
    "calculate",
    "compute",
    "math",
    "statistics",
    "average",
    "sum",
    "percentage",
];

const TABULAR_KEYWORDS: &[&str] = &["database", "table", "sql", "query", "select", "data", "records"];

const DOMAIN_KEYWORDS: &[&str] = &[
    "stock", "price", "market", "ticker", "aapl", "googl", "msft", "current", "latest",
];

/// Per-category hit counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassifierScores {
    pub document: usize,
    pub numeric: usize,
    pub tabular: usize,
    pub domain: usize,
}

impl ClassifierScores {
    /// Resolve the route; the order of these checks is the precedence
    pub fn route(&self) -> RouteType {
        if self.domain > 0 {
            RouteType::Tabular
        } else if self.document > 0 && (self.numeric > 0 || self.tabular > 0) {
            RouteType::Mixed
        } else if self.document > 0 {
            RouteType::Document
        } else if self.numeric > 0 {
            RouteType::Numeric
        } else if self.tabular > 0 {
            RouteType::Tabular
        } else {
            RouteType::General
        }
    }
}

/// Keyword classifier
#[derive(Debug, Clone, Default)]
pub struct Classifier;

impl Classifier {
    pub fn new() -> Self {
        Self
    }

    /// Count distinct keyword hits per category
    pub fn score(&self, query: &str) -> ClassifierScores {
        let lower = query.to_lowercase();

        let mut numeric = hits(&lower, NUMERIC_KEYWORDS);
        // Bare arithmetic counts as a numeric hit
        if !extract_expressions(query).is_empty() {
            numeric += 1;
        }

        ClassifierScores {
            document: hits(&lower, DOCUMENT_KEYWORDS),
            numeric,
            tabular: hits(&lower, TABULAR_KEYWORDS),
            domain: hits(&lower, DOMAIN_KEYWORDS),
        }
    }

    pub fn classify(&self, query: &str) -> RouteType {
        self.score(query).route()
    }
}

fn hits(lower: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|k| lower.contains(*k)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_keywords_is_general() {
        let classifier = Classifier::new();
        assert_eq!(classifier.classify("Hello, how are you?"), RouteType::General);
        assert_eq!(classifier.classify(""), RouteType::General);
        assert_eq!(classifier.classify("Tell me a joke"), RouteType::General);
    }

    #[test]
    fn test_domain_keyword_dominates() {
        let classifier = Classifier::new();
        assert_eq!(classifier.classify("Show me stock data for AAPL"), RouteType::Tabular);
        assert_eq!(
            classifier.classify("Search the pdf and calculate the average price"),
            RouteType::Tabular
        );
        assert_eq!(classifier.classify("MSFT"), RouteType::Tabular);
    }

    #[test]
    fn test_mixed_and_single_routes() {
        let classifier = Classifier::new();
        assert_eq!(classifier.classify("Find the sum in this document"), RouteType::Mixed);
        assert_eq!(classifier.classify("Read the uploaded pdf"), RouteType::Document);
        assert_eq!(classifier.classify("Compute the percentage"), RouteType::Numeric);
        assert_eq!(classifier.classify("List all database records"), RouteType::Tabular);
    }

    #[test]
    fn test_inline_arithmetic_routes_numeric() {
        let classifier = Classifier::new();
        let scores = classifier.score("What is 25 * 4 + 10?");
        assert_eq!(scores.numeric, 1);
        assert_eq!(scores.route(), RouteType::Numeric);
    }

    #[test]
    fn test_hits_are_distinct_keywords() {
        let scores = Classifier::new().score("pdf pdf pdf document");
        assert_eq!(scores.document, 2);
    }
}
