//! Query routing and the multi-stage workflow
//!
//! - Keyword classification into a route
//! - A fixed transition table over stages
//! - Typed state with set-once / append-only merge rules
//! - Response synthesis and follow-up suggestions

mod classifier;
mod engine;
mod handlers;
mod state;
mod suggestions;
mod synthesizer;

pub use classifier::{Classifier, ClassifierScores};
pub use engine::WorkflowEngine;
pub use handlers::{NumericStage, RetrieveStage, StageHandler, TabularStage};
pub use state::{
    NumericValue, PartialResult, Query, QueryResult, RouteType, StageKind, TabularValue,
    WorkflowState, APOLOGY,
};
pub use suggestions::{suggest, SuggestionGenerator, MAX_SUGGESTIONS};
pub use synthesizer::{truncate_chars, ResponseSynthesizer, SynthesisOptions};
