//! Response Synthesizer - Builds the final answer
//!
//! Provides:
//! - Templated answers when a current dataset row is available
//! - Context assembly from documents, numeric and tabular results
//! - Persona-prompted generation with a fixed apology on failure

use super::handlers::StageHandler;
use super::state::{PartialResult, Query, TabularValue, WorkflowState, APOLOGY};
use crate::collaborators::{call_with_timeout, DatasetStatistics, PriceRow, Services};
use crate::errors::Result;
use crate::persona::Persona;
use async_trait::async_trait;
use std::time::Duration;

const CURRENT_SUFFIX: &str = "_current";

const FINANCIAL_DISCLAIMER: &str = "Please note that this is historical data and current market \
prices may differ. For real-time stock prices, please check a financial website or your trading \
platform.";

/// Synthesis options
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    /// Documents included in the generation context
    pub max_context_documents: usize,

    /// Character budget per document snippet
    pub snippet_chars: usize,

    /// Upper bound for the generation call
    pub timeout: Duration,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            max_context_documents: 2,
            snippet_chars: 500,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Synthesize stage
pub struct ResponseSynthesizer {
    services: Services,
    options: SynthesisOptions,
}

impl ResponseSynthesizer {
    pub fn new(services: Services, options: SynthesisOptions) -> Self {
        Self { services, options }
    }

    /// Templated answer for the first `*_current` tabular entry, if any
    pub fn structured_answer(state: &WorkflowState) -> Option<String> {
        let (symbol, row) = state.tabular_results().iter().find_map(|(key, value)| {
            match (key.strip_suffix(CURRENT_SUFFIX), value) {
                (Some(symbol), TabularValue::Current(row)) => Some((symbol, row)),
                _ => None,
            }
        })?;

        let stats = match state.tabular_results().get(&format!("{}_statistics", symbol)) {
            Some(TabularValue::Statistics(stats)) => Some(stats),
            _ => None,
        };

        Some(match state.persona() {
            Persona::Financial => financial_answer(symbol, row, stats),
            Persona::Legal | Persona::General => neutral_answer(symbol, row, stats),
        })
    }

    /// Generation context in fixed order: documents, numeric, tabular, narrative
    pub fn build_context(&self, state: &WorkflowState) -> Result<String> {
        let mut parts = Vec::new();

        let snippets: Vec<String> = state
            .documents()
            .iter()
            .take(self.options.max_context_documents)
            .map(|doc| format!("Document: {}...", truncate_chars(&doc.content, self.options.snippet_chars)))
            .collect();
        if !snippets.is_empty() {
            parts.push(format!("Document Context:\n{}", snippets.join("\n\n")));
        }

        if !state.numeric_results().is_empty() {
            parts.push(format!(
                "Math Results: {}",
                serde_json::to_string_pretty(state.numeric_results())?
            ));
        }

        if !state.tabular_results().is_empty() {
            parts.push(format!(
                "Data Results: {}",
                serde_json::to_string_pretty(state.tabular_results())?
            ));
        }

        if !state.context().is_empty() {
            parts.push(format!("Additional Context: {}", state.context()));
        }

        Ok(parts.join("\n\n"))
    }

    async fn generate(&self, query: &Query, context: &str) -> Result<String> {
        let generator = self.services.generator()?;

        let user_prompt = if context.is_empty() {
            format!("Query: {}", query.text)
        } else {
            format!("Context: {}\n\nQuery: {}", context, query.text)
        };

        call_with_timeout(
            "generation",
            self.options.timeout,
            generator.generate(query.persona.system_prompt(), &user_prompt),
        )
        .await
    }
}

#[async_trait]
impl StageHandler for ResponseSynthesizer {
    async fn run(&self, query: &Query, state: &WorkflowState) -> Result<PartialResult> {
        if let Some(answer) = Self::structured_answer(state) {
            tracing::debug!("Using structured tabular answer");
            return Ok(PartialResult::new().with_response(answer));
        }

        let context = self.build_context(state)?;

        match self.generate(query, &context).await {
            Ok(text) => Ok(PartialResult::new().with_response(text)),
            Err(e) => {
                tracing::warn!(error = %e, "Response generation failed");
                Ok(PartialResult::new()
                    .with_response(APOLOGY)
                    .with_error(format!("Response generation failed: {}", e)))
            }
        }
    }
}

fn financial_answer(symbol: &str, row: &PriceRow, stats: Option<&DatasetStatistics>) -> String {
    let mut answer = format!(
        "Based on the latest available data, {} closed at ${:.2} on {}. ",
        symbol, row.close, row.date
    );

    if let Some(stats) = stats {
        answer.push_str(&format!(
            "Over the available period, {} has ranged from ${:.2} to ${:.2} with an average closing price of ${:.2}. ",
            symbol, stats.close.min, stats.close.max, stats.close.mean
        ));
    }

    answer.push_str(FINANCIAL_DISCLAIMER);
    answer
}

fn neutral_answer(symbol: &str, row: &PriceRow, stats: Option<&DatasetStatistics>) -> String {
    let mut answer = format!(
        "The most recent record for {} is dated {}: open {:.2}, high {:.2}, low {:.2}, close {:.2}, volume {}.",
        symbol, row.date, row.open, row.high, row.low, row.close, row.volume
    );

    if let Some(stats) = stats {
        answer.push_str(&format!(
            " Across {} trading days the closing price averaged {:.2}.",
            stats.total_days, stats.close.mean
        ));
    }

    answer
}

/// Prefix of at most `max` characters
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
