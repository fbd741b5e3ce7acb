//! Workflow state and the values that flow through it
//!
//! `WorkflowState` is created fresh per query and threaded through every
//! stage. Stages never write it directly: they return a `PartialResult` and
//! the engine merges it under the set-once / append-only rules below.

use crate::collaborators::{DatasetStatistics, Document, PriceRow};
use crate::errors::{AppError, Result};
use crate::persona::Persona;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Fixed reply used when a query cannot be answered
pub const APOLOGY: &str = "Sorry, I encountered an error while processing your request.";

/// Category assigned to a query by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RouteType {
    Document,
    Numeric,
    Tabular,
    General,
    Mixed,
}

impl RouteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteType::Document => "document",
            RouteType::Numeric => "numeric",
            RouteType::Tabular => "tabular",
            RouteType::General => "general",
            RouteType::Mixed => "mixed",
        }
    }

    /// Data stages run for this route, in execution order
    pub fn data_stages(&self) -> &'static [StageKind] {
        match self {
            RouteType::Document => &[StageKind::Retrieve],
            RouteType::Numeric => &[StageKind::Numeric],
            RouteType::Tabular => &[StageKind::Tabular],
            RouteType::Mixed => &[StageKind::Retrieve, StageKind::Numeric, StageKind::Tabular],
            RouteType::General => &[],
        }
    }

    /// Every stage after classification, ending with `Done`
    pub fn plan(&self) -> Result<Vec<StageKind>> {
        let mut stages = Vec::new();
        let mut stage = StageKind::Classify.next(*self)?;
        while stage != StageKind::Done {
            stages.push(stage);
            stage = stage.next(*self)?;
        }
        stages.push(StageKind::Done);
        Ok(stages)
    }
}

impl fmt::Display for RouteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node of the workflow graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Classify,
    Retrieve,
    Numeric,
    Tabular,
    Synthesize,
    Suggest,
    Done,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Classify => "classify",
            StageKind::Retrieve => "retrieve",
            StageKind::Numeric => "numeric",
            StageKind::Tabular => "tabular",
            StageKind::Synthesize => "synthesize",
            StageKind::Suggest => "suggest",
            StageKind::Done => "done",
        }
    }

    /// Transition table: the stage that follows `self` for a given route
    pub fn next(self, route: RouteType) -> Result<StageKind> {
        let data = route.data_stages();

        match self {
            StageKind::Classify => Ok(data.first().copied().unwrap_or(StageKind::Synthesize)),
            StageKind::Retrieve | StageKind::Numeric | StageKind::Tabular => {
                let position = data.iter().position(|s| *s == self).ok_or_else(|| {
                    AppError::InvariantViolation {
                        message: format!("stage {} is not part of the {} route", self, route),
                    }
                })?;
                Ok(data.get(position + 1).copied().unwrap_or(StageKind::Synthesize))
            }
            StageKind::Synthesize => Ok(StageKind::Suggest),
            StageKind::Suggest => Ok(StageKind::Done),
            StageKind::Done => Err(AppError::InvariantViolation {
                message: "no transition out of done".to_string(),
            }),
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable input for one workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    /// Raw query text, any length; blank text routes to GENERAL
    pub text: String,

    /// Requested persona
    #[serde(default)]
    pub persona: Persona,

    /// Optional caller-supplied context
    #[serde(default)]
    pub context: Option<String>,
}

impl Query {
    pub fn new(text: impl Into<String>, persona: Persona) -> Self {
        Self {
            text: text.into(),
            persona,
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Value stored in `numeric_results`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericValue {
    Number(f64),
    Note(String),
}

impl NumericValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NumericValue::Number(value) => Some(*value),
            NumericValue::Note(_) => None,
        }
    }
}

/// Value stored in `tabular_results`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TabularValue {
    Current(PriceRow),
    Statistics(DatasetStatistics),
    Series(Vec<f64>),
    Names(Vec<String>),
}

/// Output of one stage, merged into the state by the engine
#[derive(Debug, Clone, Default)]
pub struct PartialResult {
    pub documents: Option<Vec<Document>>,
    pub context: Option<String>,
    pub numeric_results: BTreeMap<String, NumericValue>,
    pub tabular_results: BTreeMap<String, TabularValue>,
    pub final_response: Option<String>,
    pub suggestions: Option<Vec<String>>,
    pub error: Option<String>,
}

impl PartialResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(mut self, documents: Vec<Document>) -> Self {
        self.documents = Some(documents);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_numeric(mut self, key: impl Into<String>, value: NumericValue) -> Self {
        self.numeric_results.insert(key.into(), value);
        self
    }

    pub fn with_tabular(mut self, key: impl Into<String>, value: TabularValue) -> Self {
        self.tabular_results.insert(key.into(), value);
        self
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.final_response = Some(response.into());
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = Some(suggestions);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Neutral output for a stage that failed
    pub(crate) fn failure(stage: StageKind, error: &AppError) -> Self {
        let message = AppError::StageFailure {
            stage: stage.to_string(),
            message: error.to_string(),
        }
        .to_string();

        let partial = PartialResult::new().with_error(message);
        match stage {
            StageKind::Retrieve => partial.with_documents(Vec::new()),
            StageKind::Synthesize => partial.with_response(APOLOGY),
            StageKind::Suggest => partial.with_suggestions(Vec::new()),
            _ => partial,
        }
    }
}

/// Record threaded through all stages for one query
#[derive(Debug, Clone)]
pub struct WorkflowState {
    id: Uuid,
    query: String,
    persona: Persona,
    route: Option<RouteType>,
    context: String,
    documents: Option<Vec<Document>>,
    numeric_results: BTreeMap<String, NumericValue>,
    tabular_results: BTreeMap<String, TabularValue>,
    final_response: Option<String>,
    suggestions: Option<Vec<String>>,
    error: Option<String>,
    completed: Vec<StageKind>,
}

impl WorkflowState {
    pub fn new(query: &Query) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.text.clone(),
            persona: query.persona,
            route: None,
            context: query.context.clone().unwrap_or_default(),
            documents: None,
            numeric_results: BTreeMap::new(),
            tabular_results: BTreeMap::new(),
            final_response: None,
            suggestions: None,
            error: None,
            completed: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn persona(&self) -> Persona {
        self.persona
    }

    /// Route, `General` until classification has run
    pub fn route(&self) -> RouteType {
        self.route.unwrap_or(RouteType::General)
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn documents(&self) -> &[Document] {
        self.documents.as_deref().unwrap_or(&[])
    }

    pub fn numeric_results(&self) -> &BTreeMap<String, NumericValue> {
        &self.numeric_results
    }

    pub fn tabular_results(&self) -> &BTreeMap<String, TabularValue> {
        &self.tabular_results
    }

    pub fn final_response(&self) -> Option<&str> {
        self.final_response.as_deref()
    }

    pub fn suggestions(&self) -> &[String] {
        self.suggestions.as_deref().unwrap_or(&[])
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Stages that have run, in order
    pub fn completed(&self) -> &[StageKind] {
        &self.completed
    }

    pub fn has_completed(&self, stage: StageKind) -> bool {
        self.completed.contains(&stage)
    }

    /// Fail loudly if the query text drifted from what the caller sent
    pub fn ensure_query(&self, expected: &str) -> Result<()> {
        if self.query != expected {
            return Err(AppError::InvariantViolation {
                message: format!("query mutated during workflow {}", self.id),
            });
        }
        Ok(())
    }

    pub(crate) fn set_route(&mut self, route: RouteType) -> Result<()> {
        match self.route {
            Some(existing) if existing != route => Err(AppError::InvariantViolation {
                message: format!("route already set to {}, refusing {}", existing, route),
            }),
            _ => {
                self.route = Some(route);
                Ok(())
            }
        }
    }

    pub(crate) fn mark_completed(&mut self, stage: StageKind) -> Result<()> {
        if self.has_completed(stage) {
            return Err(AppError::InvariantViolation {
                message: format!("stage {} executed twice", stage),
            });
        }
        self.completed.push(stage);
        Ok(())
    }

    /// Merge one stage's output
    ///
    /// Set-once fields and map entries may be written again only with an
    /// identical value; context and error only grow.
    pub(crate) fn merge(&mut self, partial: PartialResult) -> Result<()> {
        set_once("documents", &mut self.documents, partial.documents)?;
        set_once("final_response", &mut self.final_response, partial.final_response)?;
        set_once("suggestions", &mut self.suggestions, partial.suggestions)?;

        insert_absent("numeric_results", &mut self.numeric_results, partial.numeric_results)?;
        insert_absent("tabular_results", &mut self.tabular_results, partial.tabular_results)?;

        if let Some(context) = partial.context.filter(|c| !c.is_empty()) {
            append(&mut self.context, &context, "\n\n");
        }

        if let Some(error) = partial.error.filter(|e| !e.is_empty()) {
            let mut current = self.error.take().unwrap_or_default();
            append(&mut current, &error, "; ");
            self.error = Some(current);
        }

        Ok(())
    }
}

fn set_once<T: PartialEq>(field: &str, slot: &mut Option<T>, value: Option<T>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };

    match slot {
        Some(existing) if *existing != value => Err(AppError::InvariantViolation {
            message: format!("{} already written", field),
        }),
        Some(_) => Ok(()),
        None => {
            *slot = Some(value);
            Ok(())
        }
    }
}

fn insert_absent<V: PartialEq>(
    field: &str,
    map: &mut BTreeMap<String, V>,
    entries: BTreeMap<String, V>,
) -> Result<()> {
    for (key, value) in entries {
        match map.get(&key) {
            Some(existing) if *existing != value => {
                return Err(AppError::InvariantViolation {
                    message: format!("{} entry '{}' already written", field, key),
                });
            }
            Some(_) => {}
            None => {
                map.insert(key, value);
            }
        }
    }
    Ok(())
}

fn append(target: &mut String, text: &str, separator: &str) {
    if !target.is_empty() {
        target.push_str(separator);
    }
    target.push_str(text);
}

/// Result object returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub success: bool,
    pub response: String,
    pub suggested_queries: Vec<String>,
    pub documents: Vec<Document>,
    pub numeric_results: BTreeMap<String, NumericValue>,
    pub tabular_results: BTreeMap<String, TabularValue>,
    pub error: Option<String>,
    pub route: Option<RouteType>,
    pub processing_time_ms: u64,
}

impl QueryResult {
    pub fn from_state(state: WorkflowState, processing_time_ms: u64) -> Self {
        Self {
            success: true,
            response: state.final_response.unwrap_or_else(|| APOLOGY.to_string()),
            suggested_queries: state.suggestions.unwrap_or_default(),
            documents: state.documents.unwrap_or_default(),
            numeric_results: state.numeric_results,
            tabular_results: state.tabular_results,
            error: state.error,
            route: state.route,
            processing_time_ms,
        }
    }

    pub fn failure(error: &AppError, processing_time_ms: u64) -> Self {
        Self {
            success: false,
            response: APOLOGY.to_string(),
            suggested_queries: Vec::new(),
            documents: Vec::new(),
            numeric_results: BTreeMap::new(),
            tabular_results: BTreeMap::new(),
            error: Some(error.to_string()),
            route: None,
            processing_time_ms,
        }
    }
}
