//! Error types for code generation

use thiserror::Error;

use flowport_core::ToolId;

/// Result type for codegen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during conversion
#[derive(Error, Debug)]
pub enum Error {
    /// Parsing, configuration or I/O failure in the core library
    #[error(transparent)]
    Core(#[from] flowport_core::Error),

    /// Generation was requested for a workflow whose verdict forbids it
    #[error("workflow '{workflow}' is BLOCKED by tools {tools:?}; no pipeline generated")]
    Blocked {
        /// Workflow name
        workflow: String,
        /// Blocking tool ids
        tools: Vec<ToolId>,
    },

    /// The workflow graph has a cycle and the cycle policy is `fail`
    #[error("workflow '{workflow}' contains a cycle through tools {tools:?}")]
    CycleDetected {
        /// Workflow name
        workflow: String,
        /// Tools left unordered by the topological sort
        tools: Vec<ToolId>,
    },

    /// Failed to render the pipeline template
    #[error("invalid template: {0}")]
    InvalidTemplate(#[from] minijinja::Error),

    /// Failed to serialize the externalized configuration
    #[error("failed to write configuration: {0}")]
    ConfigSerialize(#[from] serde_yaml::Error),

    /// Failed to serialize the conversion report
    #[error("failed to write report: {0}")]
    ReportSerialize(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
