//! End-to-end tests for the workflow engine with stub collaborators

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use switchyard_common::collaborators::{
    ColumnStats, DatasetInfo, DatasetStatistics, DateRange, ExpressionEvaluator, PriceRow,
    VolumeStats,
};
use switchyard_common::workflow::{
    NumericValue, PartialResult, StageHandler, StageKind, TabularValue, WorkflowState, APOLOGY,
};
use switchyard_common::{
    AppConfig, AppError, Document, Generator, Persona, Query, Result, Retriever, RouteType,
    Services, TabularSource, WorkflowEngine,
};

#[derive(Default)]
struct StubRetriever {
    calls: AtomicUsize,
    fail: bool,
    hang: bool,
}

#[async_trait]
impl Retriever for StubRetriever {
    async fn search(&self, _query: &str, top_k: usize) -> Result<Vec<Document>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        if self.fail {
            return Err(AppError::Upstream {
                collaborator: "retrieval".to_string(),
                message: "index offline".to_string(),
            });
        }
        Ok((0..top_k.min(3))
            .map(|i| Document {
                id: format!("doc_{}", i),
                content: format!("Quarterly report section {}", i),
                score: 1.0 - i as f32 * 0.1,
                metadata: BTreeMap::new(),
            })
            .collect())
    }
}

struct StubTabular {
    calls: AtomicUsize,
}

impl StubTabular {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn row() -> PriceRow {
        PriceRow {
            date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            open: 165.0,
            close: 163.0,
            high: 167.0,
            low: 162.0,
            volume: 1_150_000,
        }
    }
}

#[async_trait]
impl TabularSource for StubTabular {
    async fn list_datasets(&self) -> Result<Vec<DatasetInfo>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(["AAPL", "GOOGL", "MSFT"]
            .iter()
            .map(|name| DatasetInfo {
                name: name.to_string(),
                rows: 5,
                columns: vec!["date".to_string(), "close".to_string()],
            })
            .collect())
    }

    async fn latest_row(&self, _name: &str) -> Result<Option<PriceRow>> {
        Ok(Some(Self::row()))
    }

    async fn statistics(&self, name: &str) -> Result<DatasetStatistics> {
        let column = ColumnStats {
            min: 155.0,
            max: 165.0,
            mean: 160.2,
            std: 3.96,
        };
        Ok(DatasetStatistics {
            symbol: name.to_string(),
            total_days: 5,
            open: column,
            close: column,
            high: column,
            low: column,
            volume: VolumeStats {
                total: 5_750_000,
                mean: 1_150_000.0,
                min: 1_000_000,
                max: 1_300_000,
            },
            date_range: DateRange {
                start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            },
            period_change_pct: Some(5.16),
        })
    }

    async fn moving_average(&self, _name: &str, _window: usize) -> Result<Vec<f64>> {
        Ok(vec![157.67, 161.0, 162.0])
    }
}

#[derive(Default)]
struct CountingGenerator {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl Generator for CountingGenerator {
    async fn generate(&self, _system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::Upstream {
                collaborator: "generation".to_string(),
                message: "rate limited".to_string(),
            });
        }
        Ok(format!("Generated answer ({} chars of prompt)", user_prompt.len()))
    }
}

struct Harness {
    retriever: Arc<StubRetriever>,
    tabular: Arc<StubTabular>,
    generator: Arc<CountingGenerator>,
    engine: WorkflowEngine,
}

fn harness_with(retriever: StubRetriever, generator: CountingGenerator, config: AppConfig) -> Harness {
    let retriever = Arc::new(retriever);
    let tabular = Arc::new(StubTabular::new());
    let generator = Arc::new(generator);

    let services = Services::new()
        .with_retriever(retriever.clone())
        .with_calculator(Arc::new(ExpressionEvaluator::new()))
        .with_tabular(tabular.clone())
        .with_generator(generator.clone());

    Harness {
        retriever,
        tabular,
        generator,
        engine: WorkflowEngine::new(services, &config),
    }
}

fn harness() -> Harness {
    harness_with(StubRetriever::default(), CountingGenerator::default(), AppConfig::default())
}

#[tokio::test]
async fn test_arithmetic_query_routes_numeric() {
    let h = harness();
    let state = h
        .engine
        .execute(&Query::new("What is 25 * 4 + 10?", Persona::General))
        .await
        .unwrap();

    assert_eq!(state.route(), RouteType::Numeric);
    assert_eq!(
        state.numeric_results().get("25 * 4 + 10"),
        Some(&NumericValue::Number(110.0))
    );
    assert_eq!(h.retriever.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.tabular.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stock_query_uses_structured_answer() {
    let h = harness();
    let state = h
        .engine
        .execute(&Query::new("Show me stock data for AAPL", Persona::Financial))
        .await
        .unwrap();

    assert_eq!(state.route(), RouteType::Tabular);
    assert!(matches!(
        state.tabular_results().get("AAPL_current"),
        Some(TabularValue::Current(_))
    ));
    assert!(state.tabular_results().contains_key("AAPL_statistics"));

    let response = state.final_response().unwrap();
    assert!(response.contains("AAPL"));
    assert!(response.contains("$163.00"));
    // Template path bypasses generation
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_general_query_skips_data_stages() {
    let h = harness();
    let state = h
        .engine
        .execute(&Query::new("Hello, how are you?", Persona::General))
        .await
        .unwrap();

    assert_eq!(state.route(), RouteType::General);
    assert_eq!(
        state.completed(),
        &[
            StageKind::Classify,
            StageKind::Synthesize,
            StageKind::Suggest,
            StageKind::Done
        ]
    );
    assert_eq!(h.retriever.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.tabular.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(state.suggestions().len(), 3);
}

#[tokio::test]
async fn test_retrieval_failure_is_recovered() {
    let h = harness_with(
        StubRetriever {
            fail: true,
            ..Default::default()
        },
        CountingGenerator::default(),
        AppConfig::default(),
    );

    let result = h
        .engine
        .process_query("Search the document for revenue", Persona::General)
        .await;

    assert!(result.success);
    assert!(result.documents.is_empty());
    assert!(result.error.as_deref().unwrap().contains("retrieve stage failed"));
    assert!(result.response.starts_with("Generated answer"));
    assert_eq!(result.route, Some(RouteType::Document));
    assert!(!result.suggested_queries.is_empty());
}

#[tokio::test]
async fn test_hung_collaborator_is_bounded() {
    let mut config = AppConfig::default();
    config.workflow.collaborator_timeout_secs = 1;

    let h = harness_with(
        StubRetriever {
            hang: true,
            ..Default::default()
        },
        CountingGenerator::default(),
        config,
    );

    let state = h
        .engine
        .execute(&Query::new("find the pdf", Persona::General))
        .await
        .unwrap();

    assert!(state.documents().is_empty());
    assert!(state.error().unwrap().contains("timed out"));
    assert!(state.has_completed(StageKind::Done));
}

#[tokio::test]
async fn test_mixed_route_runs_stages_in_order() {
    let h = harness();
    let state = h
        .engine
        .execute(&Query::new("Find the sum 2 + 3 in this document", Persona::General))
        .await
        .unwrap();

    assert_eq!(state.route(), RouteType::Mixed);
    assert_eq!(
        state.completed(),
        &[
            StageKind::Classify,
            StageKind::Retrieve,
            StageKind::Numeric,
            StageKind::Tabular,
            StageKind::Synthesize,
            StageKind::Suggest,
            StageKind::Done
        ]
    );
    assert_eq!(state.documents().len(), 3);
    assert_eq!(state.numeric_results().get("2 + 3"), Some(&NumericValue::Number(5.0)));
    // No dataset named: fallback statistics plus a note
    assert!(state.tabular_results().contains_key("AAPL_statistics"));
    assert!(!state.tabular_results().contains_key("AAPL_current"));
    assert!(state.error().unwrap().contains("No dataset named"));
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_moving_average_requested() {
    let h = harness();
    let state = h
        .engine
        .execute(&Query::new("MSFT moving average", Persona::General))
        .await
        .unwrap();

    assert!(matches!(
        state.tabular_results().get("MSFT_moving_average"),
        Some(TabularValue::Series(series)) if series.len() == 3
    ));
}

#[tokio::test]
async fn test_generation_failure_returns_apology() {
    let h = harness_with(
        StubRetriever::default(),
        CountingGenerator {
            fail: true,
            ..Default::default()
        },
        AppConfig::default(),
    );

    let result = h.engine.process_query("Tell me a joke", Persona::Legal).await;

    assert!(result.success);
    assert_eq!(result.response, APOLOGY);
    assert!(result.error.unwrap().contains("Response generation failed"));
}

#[tokio::test]
async fn test_missing_collaborators_degrade_gracefully() {
    let engine = WorkflowEngine::new(Services::new(), &AppConfig::default());
    let result = engine.process_query("Show me AAPL stock", Persona::Financial).await;

    assert!(result.success);
    assert_eq!(result.response, APOLOGY);
    let error = result.error.unwrap();
    assert!(error.contains("tabular"));
    assert!(error.contains("generation"));
}

#[tokio::test]
async fn test_blank_query_routes_general() {
    let h = harness();

    for text in ["   ", ""] {
        let result = h.engine.process_query(text, Persona::General).await;
        assert!(result.success);
        assert_eq!(result.route, Some(RouteType::General));
        assert!(result.response.starts_with("Generated answer"));
        assert_eq!(result.suggested_queries.len(), 3);
    }
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_long_query_is_processed_in_full() {
    let h = harness();
    let text = format!("What is 25 * 4 + 10? {}", "please ".repeat(300));
    assert!(text.chars().count() > 2000);

    let result = h.engine.process_query(&text, Persona::General).await;

    assert!(result.success);
    assert_eq!(result.route, Some(RouteType::Numeric));
    assert_eq!(
        result.numeric_results.get("25 * 4 + 10"),
        Some(&NumericValue::Number(110.0))
    );
}

/// Tabular source whose listing rejects a malformed dataset name
struct RejectingTabular;

#[async_trait]
impl TabularSource for RejectingTabular {
    async fn list_datasets(&self) -> Result<Vec<DatasetInfo>> {
        Err(AppError::Validation {
            message: "Invalid dataset name 'BRK B'".to_string(),
            field: Some("name".to_string()),
        })
    }

    async fn latest_row(&self, _name: &str) -> Result<Option<PriceRow>> {
        Ok(None)
    }

    async fn statistics(&self, name: &str) -> Result<DatasetStatistics> {
        Err(AppError::NotFound {
            resource_type: "dataset".to_string(),
            id: name.to_string(),
        })
    }

    async fn moving_average(&self, _name: &str, _window: usize) -> Result<Vec<f64>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_collaborator_validation_error_is_a_stage_failure() {
    let generator = Arc::new(CountingGenerator::default());
    let services = Services::new()
        .with_tabular(Arc::new(RejectingTabular))
        .with_generator(generator.clone());
    let engine = WorkflowEngine::new(services, &AppConfig::default());

    let result = engine
        .process_query("Show me stock data for AAPL", Persona::Financial)
        .await;

    assert!(result.success);
    assert_eq!(result.route, Some(RouteType::Tabular));
    assert!(result.tabular_results.is_empty());
    assert!(result.response.starts_with("Generated answer"));
    let error = result.error.unwrap();
    assert!(error.contains("tabular stage failed"));
    assert!(error.contains("Invalid dataset name 'BRK B'"));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
}

/// Handler that tries to replace documents written by retrieval
struct OverwritingHandler;

#[async_trait]
impl StageHandler for OverwritingHandler {
    async fn run(&self, _query: &Query, state: &WorkflowState) -> Result<PartialResult> {
        let mut documents = state.documents().to_vec();
        documents.reverse();
        Ok(PartialResult::new().with_documents(documents))
    }
}

#[tokio::test]
async fn test_overwriting_stage_is_rejected() {
    let h = harness();
    let engine = h
        .engine
        .with_handler(StageKind::Synthesize, Arc::new(OverwritingHandler));

    let result = engine
        .process_query("find the pdf content", Persona::General)
        .await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("invariant"));
}

#[tokio::test]
async fn test_missing_handler_is_fatal() {
    let h = harness();
    let engine = h.engine.without_handler(StageKind::Numeric);

    let result = engine.process_query("calculate 6 * 7", Persona::General).await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("no handler registered"));
}

#[tokio::test]
async fn test_stages_never_overwrite_earlier_fields() {
    let h = harness();
    let query = Query::new("Find the average in this document table", Persona::General)
        .with_context("caller context");

    let state = h.engine.execute(&query).await.unwrap();

    assert_eq!(state.query(), query.text);
    assert!(state.context().starts_with("caller context"));
    assert_eq!(state.documents().len(), 3);
    assert!(state.numeric_results().contains_key("statistical_analysis"));
    assert!(state.final_response().is_some());
}

#[tokio::test]
async fn test_concurrent_queries_are_independent() {
    let h = Arc::new(harness());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let h = h.clone();
            tokio::spawn(async move {
                h.engine
                    .process_query(&format!("What is {} + {}?", i, i), Persona::General)
                    .await
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.await.unwrap();
        let key = format!("{} + {}", i, i);
        assert_eq!(
            result.numeric_results.get(&key),
            Some(&NumericValue::Number((i * 2) as f64))
        );
    }
}
