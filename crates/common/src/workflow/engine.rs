//! Workflow Engine - Executes the route plan for one query
//!
//! Classifies the query, then walks the transition table stage by stage.
//! Any error a stage handler returns is recorded in the state and the walk
//! continues; only the engine's own bookkeeping (merge, stage trace, query
//! immutability, transitions) can abort the query.

use super::classifier::Classifier;
use super::handlers::{NumericStage, RetrieveStage, StageHandler, TabularStage};
use super::state::{PartialResult, Query, QueryResult, StageKind, WorkflowState};
use super::suggestions::SuggestionGenerator;
use super::synthesizer::{ResponseSynthesizer, SynthesisOptions};
use crate::collaborators::Services;
use crate::config::{AppConfig, WorkflowConfig};
use crate::errors::{AppError, Result};
use crate::metrics::{self, QueryMetrics};
use crate::persona::Persona;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Route label used in metrics when a query fails before classification
const UNROUTED: &str = "unrouted";

/// Engine for routing queries through the stage graph
pub struct WorkflowEngine {
    classifier: Classifier,
    handlers: HashMap<StageKind, Arc<dyn StageHandler>>,
}

impl WorkflowEngine {
    /// Create an engine with the default handler for every stage
    pub fn new(services: Services, config: &AppConfig) -> Self {
        let workflow: &WorkflowConfig = &config.workflow;
        let timeout = workflow.collaborator_timeout();

        let mut handlers: HashMap<StageKind, Arc<dyn StageHandler>> = HashMap::new();
        handlers.insert(
            StageKind::Retrieve,
            Arc::new(RetrieveStage::new(
                services.clone(),
                config.retrieval.top_k,
                config.retrieval.min_score,
                timeout,
            )),
        );
        handlers.insert(
            StageKind::Numeric,
            Arc::new(NumericStage::new(services.clone(), timeout)),
        );
        handlers.insert(
            StageKind::Tabular,
            Arc::new(TabularStage::new(
                services.clone(),
                config.tabular.moving_average_window,
                timeout,
            )),
        );
        handlers.insert(
            StageKind::Synthesize,
            Arc::new(ResponseSynthesizer::new(
                services.clone(),
                SynthesisOptions {
                    max_context_documents: workflow.max_context_documents,
                    snippet_chars: workflow.snippet_chars,
                    timeout,
                },
            )),
        );
        handlers.insert(
            StageKind::Suggest,
            Arc::new(SuggestionGenerator::new(services, workflow.smart_suggestions, timeout)),
        );

        Self {
            classifier: Classifier::new(),
            handlers,
        }
    }

    /// Replace the handler for one stage
    pub fn with_handler(mut self, stage: StageKind, handler: Arc<dyn StageHandler>) -> Self {
        self.handlers.insert(stage, handler);
        self
    }

    /// Remove the handler for one stage; running it becomes an invariant violation
    pub fn without_handler(mut self, stage: StageKind) -> Self {
        self.handlers.remove(&stage);
        self
    }

    /// Run the full workflow and return the final state
    pub async fn execute(&self, query: &Query) -> Result<WorkflowState> {
        let mut state = WorkflowState::new(query);

        let scores = self.classifier.score(&query.text);
        let route = scores.route();
        state.set_route(route)?;
        state.mark_completed(StageKind::Classify)?;

        tracing::debug!(
            workflow_id = %state.id(),
            route = %route,
            document = scores.document,
            numeric = scores.numeric,
            tabular = scores.tabular,
            domain = scores.domain,
            "Query classified"
        );

        let mut stage = StageKind::Classify.next(route)?;
        while stage != StageKind::Done {
            state.ensure_query(&query.text)?;
            self.run_stage(stage, query, &mut state).await?;
            state.ensure_query(&query.text)?;
            stage = stage.next(route)?;
        }
        state.mark_completed(StageKind::Done)?;

        Ok(state)
    }

    async fn run_stage(&self, stage: StageKind, query: &Query, state: &mut WorkflowState) -> Result<()> {
        let handler = self
            .handlers
            .get(&stage)
            .ok_or_else(|| AppError::InvariantViolation {
                message: format!("no handler registered for stage {}", stage),
            })?;

        let start = Instant::now();
        let outcome = handler.run(query, state).await;
        let elapsed = start.elapsed();

        let success = outcome.is_ok();
        let partial = match outcome {
            Ok(partial) => partial,
            Err(e) => {
                tracing::warn!(
                    workflow_id = %state.id(),
                    stage = %stage,
                    error = %e,
                    "Stage failed, continuing"
                );
                PartialResult::failure(stage, &e)
            }
        };

        state.merge(partial)?;
        state.mark_completed(stage)?;

        metrics::record_stage(stage.as_str(), elapsed.as_secs_f64(), success);
        tracing::debug!(
            workflow_id = %state.id(),
            stage = %stage,
            duration_ms = elapsed.as_millis() as u64,
            success,
            "Stage completed"
        );

        Ok(())
    }

    /// Run a query and always produce a well-formed result
    pub async fn process(&self, query: Query) -> QueryResult {
        let timer = QueryMetrics::start();

        match self.execute(&query).await {
            Ok(state) => {
                let route = state.route();
                let elapsed_ms = timer.finish(route.as_str(), true);

                tracing::info!(
                    workflow_id = %state.id(),
                    route = %route,
                    persona = %query.persona,
                    stages = state.completed().len(),
                    degraded = state.error().is_some(),
                    duration_ms = elapsed_ms,
                    "Query processed"
                );

                QueryResult::from_state(state, elapsed_ms)
            }
            Err(e) => {
                let elapsed_ms = timer.finish(UNROUTED, false);
                tracing::error!(
                    error = %e,
                    code = e.code().as_code(),
                    duration_ms = elapsed_ms,
                    "Query failed"
                );
                QueryResult::failure(&e, elapsed_ms)
            }
        }
    }

    /// Convenience entry point for plain text and a persona
    pub async fn process_query(&self, text: &str, persona: Persona) -> QueryResult {
        self.process(Query::new(text, persona)).await
    }
}
