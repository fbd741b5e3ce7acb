//! CSV-backed dataset store
//!
//! One `{NAME}.csv` file per dataset in the data directory. Files are read on
//! every call, so edits on disk are picked up without a restart.

use crate::csv::{header, parse_rows, write_rows};
use crate::sample::sample_datasets;
use crate::stats::summarize;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use switchyard_common::collaborators::calculator::moving_average;
use switchyard_common::collaborators::{DatasetInfo, DatasetStatistics, PriceRow, TabularSource};
use switchyard_common::config::TabularConfig;
use switchyard_common::errors::{AppError, Result};
use tracing::{debug, info, warn};

const EXTENSION: &str = "csv";

/// Tabular collaborator over a directory of CSV files
#[derive(Debug, Clone)]
pub struct CsvDatasetStore {
    data_dir: PathBuf,
}

impl CsvDatasetStore {
    /// Open the data directory, creating it and seeding samples when configured
    pub async fn open(config: &TabularConfig) -> Result<Self> {
        let store = Self {
            data_dir: PathBuf::from(&config.data_dir),
        };

        tokio::fs::create_dir_all(&store.data_dir).await?;

        if config.seed_sample_data && store.dataset_files().await?.is_empty() {
            store.seed_samples().await?;
        }

        Ok(store)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Write the sample datasets
    pub async fn seed_samples(&self) -> Result<()> {
        for (symbol, rows) in sample_datasets() {
            self.write_dataset(symbol, &rows).await?;
        }
        info!(dir = %self.data_dir.display(), "Seeded sample datasets");
        Ok(())
    }

    /// Create or replace one dataset
    pub async fn write_dataset(&self, name: &str, rows: &[PriceRow]) -> Result<()> {
        let path = self.path_for(name)?;
        tokio::fs::write(&path, write_rows(rows)).await?;
        debug!(dataset = name, rows = rows.len(), "Dataset written");
        Ok(())
    }

    /// All rows of a dataset, oldest first
    pub async fn rows(&self, name: &str) -> Result<Vec<PriceRow>> {
        let path = self.path_for(name)?;

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::NotFound {
                    resource_type: "dataset".to_string(),
                    id: name.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        parse_rows(&text)
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        if !is_valid_name(name) {
            return Err(AppError::Validation {
                message: format!("Invalid dataset name '{}'", name),
                field: Some("name".to_string()),
            });
        }

        Ok(self.data_dir.join(format!("{}.{}", name, EXTENSION)))
    }

    /// Addressable dataset file stems in file name order
    async fn dataset_files(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.data_dir).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) if is_valid_name(stem) => names.push(stem.to_string()),
                _ => warn!(file = %path.display(), "Skipping dataset file with unusable name"),
            }
        }

        names.sort();
        Ok(names)
    }
}

/// Names that map onto a single file inside the data directory
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[async_trait]
impl TabularSource for CsvDatasetStore {
    async fn list_datasets(&self) -> Result<Vec<DatasetInfo>> {
        let mut datasets = Vec::new();

        for name in self.dataset_files().await? {
            let path = self.path_for(&name)?;

            // Unreadable or malformed files are listed empty rather than hidden
            let parsed = match tokio::fs::read_to_string(&path).await {
                Ok(text) => parse_rows(&text).map(|rows| (header(&text), rows.len())),
                Err(e) => Err(e.into()),
            };

            let info = match parsed {
                Ok((columns, rows)) => DatasetInfo { name, rows, columns },
                Err(e) => {
                    warn!(dataset = %name, error = %e, "Dataset file could not be read");
                    DatasetInfo {
                        name,
                        rows: 0,
                        columns: Vec::new(),
                    }
                }
            };
            datasets.push(info);
        }

        Ok(datasets)
    }

    async fn latest_row(&self, name: &str) -> Result<Option<PriceRow>> {
        Ok(self.rows(name).await?.pop())
    }

    async fn statistics(&self, name: &str) -> Result<DatasetStatistics> {
        let rows = self.rows(name).await?;
        summarize(name, &rows)
    }

    async fn moving_average(&self, name: &str, window: usize) -> Result<Vec<f64>> {
        let closes: Vec<f64> = self.rows(name).await?.iter().map(|r| r.close).collect();
        moving_average(&closes, window)
    }
}
