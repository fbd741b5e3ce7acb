//! Stage handlers for the data stages
//!
//! Each handler reads the query and a read-only view of the state, calls its
//! collaborator through `call_with_timeout`, and returns a `PartialResult`.

use super::state::{NumericValue, PartialResult, Query, TabularValue, WorkflowState};
use crate::collaborators::calculator::{clean_expression, extract_expressions};
use crate::collaborators::{call_with_timeout, DatasetInfo, Services};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use regex_lite::Regex;
use std::time::Duration;

/// One unit of work in the workflow graph
#[async_trait]
pub trait StageHandler: Send + Sync {
    async fn run(&self, query: &Query, state: &WorkflowState) -> Result<PartialResult>;
}

/// Document retrieval stage
pub struct RetrieveStage {
    services: Services,
    top_k: usize,
    min_score: f32,
    timeout: Duration,
}

impl RetrieveStage {
    pub fn new(services: Services, top_k: usize, min_score: f32, timeout: Duration) -> Self {
        Self {
            services,
            top_k,
            min_score,
            timeout,
        }
    }
}

#[async_trait]
impl StageHandler for RetrieveStage {
    async fn run(&self, query: &Query, _state: &WorkflowState) -> Result<PartialResult> {
        let retriever = self.services.retriever()?;

        let documents = call_with_timeout(
            "retrieval",
            self.timeout,
            retriever.search(&query.text, self.top_k),
        )
        .await?;

        let documents: Vec<_> = documents
            .into_iter()
            .filter(|d| d.score >= self.min_score)
            .take(self.top_k)
            .collect();

        tracing::debug!(count = documents.len(), "Documents retrieved");

        Ok(PartialResult::new().with_documents(documents))
    }
}

/// Arithmetic stage
pub struct NumericStage {
    services: Services,
    timeout: Duration,
}

const STATISTICS_WORDS: &[&str] = &["average", "mean", "median", "statistics"];

impl NumericStage {
    pub fn new(services: Services, timeout: Duration) -> Self {
        Self { services, timeout }
    }

    /// Inline expressions first, then the tails of command phrases
    fn candidates(text: &str) -> Result<Vec<String>> {
        let command = Regex::new(r"(?i)\b(?:calculate|compute|what\s+is)\s+(.+)").map_err(|e| {
            AppError::Internal {
                message: format!("numeric pattern: {}", e),
            }
        })?;

        let mut candidates = extract_expressions(text);

        for captures in command.captures_iter(text) {
            if let Some(tail) = captures.get(1) {
                let tail = clean_expression(tail.as_str());
                if !tail.is_empty() && !candidates.iter().any(|c| c == tail) {
                    candidates.push(tail.to_string());
                }
            }
        }

        Ok(candidates)
    }
}

#[async_trait]
impl StageHandler for NumericStage {
    async fn run(&self, query: &Query, _state: &WorkflowState) -> Result<PartialResult> {
        let calculator = self.services.calculator()?;
        let mut partial = PartialResult::new();

        for expression in Self::candidates(&query.text)? {
            match call_with_timeout("numeric", self.timeout, calculator.evaluate(&expression)).await {
                Ok(value) => {
                    partial = partial.with_numeric(expression, NumericValue::Number(value));
                }
                Err(e) if e.is_collaborator_error() => return Err(e),
                Err(e) => {
                    tracing::debug!(expression = %expression, error = %e, "Skipping candidate");
                }
            }
        }

        let lower = query.text.to_lowercase();
        if STATISTICS_WORDS.iter().any(|w| lower.contains(w)) {
            partial = partial.with_numeric(
                "statistical_analysis",
                NumericValue::Note("Statistical analysis requested".to_string()),
            );
        }

        Ok(partial)
    }
}

/// Dataset lookup stage
pub struct TabularStage {
    services: Services,
    moving_average_window: usize,
    timeout: Duration,
}

impl TabularStage {
    pub fn new(services: Services, moving_average_window: usize, timeout: Duration) -> Self {
        Self {
            services,
            moving_average_window,
            timeout,
        }
    }

    /// First dataset, in listing order, named as a whole word in the query
    pub fn match_dataset<'a>(query: &str, datasets: &'a [DatasetInfo]) -> Result<Option<&'a str>> {
        for dataset in datasets {
            let pattern = format!(r"(?i)\b{}\b", regex_lite::escape(&dataset.name));
            let matcher = Regex::new(&pattern).map_err(|e| AppError::Internal {
                message: format!("dataset pattern for {}: {}", dataset.name, e),
            })?;
            if matcher.is_match(query) {
                return Ok(Some(dataset.name.as_str()));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl StageHandler for TabularStage {
    async fn run(&self, query: &Query, _state: &WorkflowState) -> Result<PartialResult> {
        let source = self.services.tabular()?;

        let datasets = call_with_timeout("tabular", self.timeout, source.list_datasets()).await?;
        let Some(first) = datasets.first() else {
            return Err(AppError::NotFound {
                resource_type: "dataset".to_string(),
                id: "any".to_string(),
            });
        };

        let names: Vec<String> = datasets.iter().map(|d| d.name.clone()).collect();
        let mut partial = PartialResult::new().with_tabular("available_datasets", TabularValue::Names(names));
        let mut notes: Vec<String> = Vec::new();

        let name = match Self::match_dataset(&query.text, &datasets)? {
            Some(name) => {
                match call_with_timeout("tabular", self.timeout, source.latest_row(name)).await {
                    Ok(Some(row)) => {
                        partial = partial.with_tabular(format!("{}_current", name), TabularValue::Current(row));
                    }
                    Ok(None) => notes.push(format!("No rows available for {}", name)),
                    Err(e) => notes.push(format!("Latest row for {} failed: {}", name, e)),
                }

                if query.text.to_lowercase().contains("moving average") {
                    let window = self.moving_average_window;
                    match call_with_timeout("tabular", self.timeout, source.moving_average(name, window)).await {
                        Ok(series) => {
                            partial = partial
                                .with_tabular(format!("{}_moving_average", name), TabularValue::Series(series));
                        }
                        Err(e) => notes.push(format!("Moving average for {} failed: {}", name, e)),
                    }
                }

                name
            }
            None => {
                let fallback = first.name.as_str();
                notes.push(format!("No dataset named in the query; using {}", fallback));
                partial = partial.with_context(format!(
                    "The query did not name a dataset, so statistics for {} are shown.",
                    fallback
                ));
                fallback
            }
        };

        match call_with_timeout("tabular", self.timeout, source.statistics(name)).await {
            Ok(stats) => {
                partial = partial.with_tabular(format!("{}_statistics", name), TabularValue::Statistics(stats));
            }
            Err(e) => notes.push(format!("Statistics for {} failed: {}", name, e)),
        }

        if !notes.is_empty() {
            tracing::warn!(notes = ?notes, "Tabular stage completed with notes");
            partial = partial.with_error(notes.join("; "));
        }

        Ok(partial)
    }
}
