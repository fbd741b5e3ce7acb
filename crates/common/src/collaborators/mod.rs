//! Collaborator contracts
//!
//! The workflow engine never talks to a concrete backend. It receives
//! explicitly constructed service handles for:
//! - Document retrieval (ranked text chunks)
//! - Numeric evaluation (arithmetic expressions)
//! - Tabular data (datasets, latest rows, statistics)
//! - Text generation (persona prompts)

pub mod calculator;
pub mod generation;

use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use calculator::ExpressionEvaluator;
pub use generation::ChatGenerator;

/// Ranked chunk returned by the retrieval backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Dataset listing entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    /// Dataset identifier, e.g. a ticker symbol
    pub name: String,
    pub rows: usize,
    pub columns: Vec<String>,
}

/// One daily price row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: u64,
}

/// Summary of one numeric column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeStats {
    pub total: u64,
    pub mean: f64,
    pub min: u64,
    pub max: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Summary statistics for one dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetStatistics {
    pub symbol: String,
    pub total_days: usize,
    pub open: ColumnStats,
    pub close: ColumnStats,
    pub high: ColumnStats,
    pub low: ColumnStats,
    pub volume: VolumeStats,
    pub date_range: DateRange,
    /// Close-to-close change over the whole range, in percent
    pub period_change_pct: Option<f64>,
}

/// Document similarity search
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return up to `top_k` chunks ranked by relevance
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Document>>;
}

/// Arithmetic evaluation
#[async_trait]
pub trait Calculator: Send + Sync {
    async fn evaluate(&self, expression: &str) -> Result<f64>;
}

/// Tabular data lookup
#[async_trait]
pub trait TabularSource: Send + Sync {
    /// Datasets in a stable order; the tabular stage matches them in this order
    async fn list_datasets(&self) -> Result<Vec<DatasetInfo>>;

    /// Most recent row of a dataset, `None` if it has no rows
    async fn latest_row(&self, name: &str) -> Result<Option<PriceRow>>;

    async fn statistics(&self, name: &str) -> Result<DatasetStatistics>;

    /// Moving average of closing prices, oldest first
    async fn moving_average(&self, name: &str, window: usize) -> Result<Vec<f64>>;
}

/// Free-text generation
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// Service handles injected into the workflow engine
///
/// A missing handle surfaces as `CollaboratorUnavailable` in the stage that
/// needs it; the rest of the workflow still runs.
#[derive(Clone, Default)]
pub struct Services {
    pub retriever: Option<Arc<dyn Retriever>>,
    pub calculator: Option<Arc<dyn Calculator>>,
    pub tabular: Option<Arc<dyn TabularSource>>,
    pub generator: Option<Arc<dyn Generator>>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_calculator(mut self, calculator: Arc<dyn Calculator>) -> Self {
        self.calculator = Some(calculator);
        self
    }

    pub fn with_tabular(mut self, tabular: Arc<dyn TabularSource>) -> Self {
        self.tabular = Some(tabular);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn retriever(&self) -> Result<Arc<dyn Retriever>> {
        self.retriever.clone().ok_or_else(|| unavailable("retrieval"))
    }

    pub fn calculator(&self) -> Result<Arc<dyn Calculator>> {
        self.calculator.clone().ok_or_else(|| unavailable("numeric"))
    }

    pub fn tabular(&self) -> Result<Arc<dyn TabularSource>> {
        self.tabular.clone().ok_or_else(|| unavailable("tabular"))
    }

    pub fn generator(&self) -> Result<Arc<dyn Generator>> {
        self.generator.clone().ok_or_else(|| unavailable("generation"))
    }
}

fn unavailable(collaborator: &str) -> AppError {
    AppError::CollaboratorUnavailable {
        collaborator: collaborator.to_string(),
    }
}

/// Run one collaborator call with an upper time bound
pub async fn call_with_timeout<T, F>(collaborator: &str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let start = Instant::now();

    let outcome = match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(AppError::CollaboratorTimeout {
            collaborator: collaborator.to_string(),
            timeout_ms: limit.as_millis() as u64,
        }),
    };

    metrics::record_collaborator(collaborator, start.elapsed().as_secs_f64(), outcome.is_ok());

    if let Err(e) = &outcome {
        tracing::debug!(collaborator, error = %e, "Collaborator call failed");
    }

    outcome
}
