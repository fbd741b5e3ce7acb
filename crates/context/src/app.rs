//! Collaborator wiring for the command line

use anyhow::Context;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use switchyard_common::collaborators::{ChatGenerator, DatasetInfo, ExpressionEvaluator};
use switchyard_common::persona::PersonaInfo;
use switchyard_common::{AppConfig, Persona, Query, QueryResult, Services, TabularSource, WorkflowEngine};
use switchyard_search::{DocumentIndex, IngestSummary};
use switchyard_tabular::CsvDatasetStore;
use tracing::info;

/// Engine plus the concrete collaborators behind it
pub struct App {
    index: Arc<DocumentIndex>,
    datasets: Arc<CsvDatasetStore>,
    engine: WorkflowEngine,
}

impl App {
    pub async fn build(config: &AppConfig) -> anyhow::Result<Self> {
        let index = Arc::new(DocumentIndex::new(&config.retrieval));
        let datasets = Arc::new(
            CsvDatasetStore::open(&config.tabular)
                .await
                .context("Failed to open dataset directory")?,
        );
        let generator = Arc::new(ChatGenerator::new(config.generation.clone())?);

        if !config.generation.is_online() {
            info!("No generation API key configured, answers will be offline placeholders");
        }

        let services = Services::new()
            .with_retriever(index.clone())
            .with_calculator(Arc::new(ExpressionEvaluator::new()))
            .with_tabular(datasets.clone())
            .with_generator(generator);

        Ok(Self {
            index,
            datasets,
            engine: WorkflowEngine::new(services, config),
        })
    }

    /// Index plain text files
    pub async fn ingest_files(&self, files: &[PathBuf]) -> anyhow::Result<Vec<IngestSummary>> {
        let mut summaries = Vec::with_capacity(files.len());

        for path in files {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;

            let mut metadata = BTreeMap::new();
            metadata.insert("source".to_string(), json!(path.display().to_string()));
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                metadata.insert("filename".to_string(), json!(name));
            }

            summaries.push(self.index.add_document(&text, metadata).await?);
        }

        if !summaries.is_empty() {
            let stats = self.index.stats().await;
            info!(documents = stats.documents, chunks = stats.chunks, "Index ready");
        }

        Ok(summaries)
    }

    pub async fn ask(&self, text: &str, persona: &str, context: Option<String>) -> QueryResult {
        let query = Query {
            text: text.to_string(),
            persona: Persona::parse_or_default(persona),
            context,
        };
        self.engine.process(query).await
    }

    pub async fn datasets(&self) -> anyhow::Result<Vec<DatasetInfo>> {
        Ok(self.datasets.list_datasets().await?)
    }
}

pub fn personas() -> Vec<PersonaInfo> {
    Persona::all().iter().map(Persona::info).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_common::RouteType;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.tabular.data_dir = dir.path().join("stocks").to_string_lossy().into_owned();
        config.generation.api_key = String::new();
        config
    }

    #[tokio::test]
    async fn test_stock_question_end_to_end() {
        let dir = TempDir::new().unwrap();
        let app = App::build(&config(&dir)).await.unwrap();

        let result = app.ask("Show me stock data for AAPL", "financial", None).await;

        assert!(result.success);
        assert_eq!(result.route, Some(RouteType::Tabular));
        assert!(result.response.contains("AAPL closed at $163.00"));
        assert_eq!(result.suggested_queries.len(), 3);
    }

    #[tokio::test]
    async fn test_stray_dataset_file_does_not_break_stock_questions() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let app = App::build(&config).await.unwrap();

        let stray = std::path::Path::new(&config.tabular.data_dir).join("BRK B.csv");
        tokio::fs::write(&stray, "date,open,close,high,low,volume\n")
            .await
            .unwrap();

        let result = app.ask("Show me stock data for AAPL", "financial", None).await;

        assert!(result.success);
        assert!(result.response.contains("AAPL closed at $163.00"));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_ingested_file_is_retrieved() {
        let dir = TempDir::new().unwrap();
        let app = App::build(&config(&dir)).await.unwrap();

        let path = dir.path().join("report.txt");
        tokio::fs::write(&path, "The annual report shows revenue of 42 million.")
            .await
            .unwrap();

        let summaries = app.ingest_files(&[path]).await.unwrap();
        assert_eq!(summaries.len(), 1);

        let result = app.ask("Search the document for revenue", "general", None).await;

        assert_eq!(result.route, Some(RouteType::Document));
        assert_eq!(result.documents.len(), 1);
        assert_eq!(result.documents[0].metadata["filename"], "report.txt");
        assert!(result.response.contains("Offline response"));
    }

    #[tokio::test]
    async fn test_unknown_persona_defaults_to_general() {
        let dir = TempDir::new().unwrap();
        let app = App::build(&config(&dir)).await.unwrap();

        let result = app.ask("What is 6 * 7?", "pirate", None).await;
        assert!(result.success);
        assert_eq!(result.numeric_results["6 * 7"].as_f64(), Some(42.0));
    }

    #[test]
    fn test_personas_listing() {
        let listed = personas();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].name, "Financial Advisor");
    }
}
