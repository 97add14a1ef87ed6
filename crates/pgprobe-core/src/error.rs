//! Error types for pgprobe

use thiserror::Error;

/// Core error type for pgprobe operations
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The EXPLAIN input has no `Plan` object or a node lacks `Node Type`
    #[error("Malformed plan input: {0}")]
    MalformedPlanInput(String),

    /// A required database extension or capability is not available
    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Connection error: {0}")]
    ConnectionFailure(String),

    /// The database rejected or failed a statement; the message is passed through verbatim
    #[error("Query error: {0}")]
    QueryExecution(String),

    /// A predicate could not be rewritten into partitioned query variants
    #[error("Partition generation error: {0}")]
    PartitionGeneration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProbeError {
    /// Stable, machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedPlanInput(_) => "MalformedPlanInput",
            Self::DependencyUnavailable(_) => "DependencyUnavailable",
            Self::ConnectionFailure(_) => "ConnectionFailure",
            Self::QueryExecution(_) => "QueryExecutionError",
            Self::PartitionGeneration(_) => "PartitionGenerationError",
            Self::Configuration(_) => "ConfigurationError",
            Self::Validation(_) | Self::Serialization(_) => "ValidationError",
        }
    }
}

/// Result type alias for pgprobe operations
pub type Result<T> = std::result::Result<T, ProbeError>;
