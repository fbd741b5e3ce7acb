//! Switchyard Common Library
//!
//! Shared code for the Switchyard crates including:
//! - Query classification and the workflow engine
//! - Collaborator contracts and reference clients
//! - Error types and handling
//! - Configuration management
//! - Persona catalogue
//! - Metrics and observability

pub mod collaborators;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod persona;
pub mod workflow;

// Re-export commonly used types
pub use collaborators::{
    Calculator, Document, Generator, Retriever, Services, TabularSource,
};
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use persona::Persona;
pub use workflow::{Query, QueryResult, RouteType, WorkflowEngine};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
