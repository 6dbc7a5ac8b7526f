/// Top-level Skald error type.
///
/// All fallible operations in `skald-core` return [`Result<T, SkaldError>`](Result).
/// Each variant wraps a domain-specific error enum, allowing callers to
/// match on the error source without losing type information.
///
/// Traversal itself never surfaces these: read, parse and oracle failures are
/// contained at the node that produced them.
#[derive(thiserror::Error, Debug)]
pub enum SkaldError {
    /// Error from a content source (local filesystem or remote API).
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Error from the code-unit extractor (tree-sitter parsing).
    #[error("Extraction error: {0}")]
    Units(#[from] skald_units::UnitError),

    /// Error in configuration parsing or validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error communicating with an LLM provider.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Error writing or reading exported trees and documents.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

/// Errors from content sources.
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    /// The requested path does not exist in the source.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote API returned a non-success HTTP status.
    #[error("GitHub API {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// Network-level failure or undecodable response.
    #[error("Network error: {0}")]
    Network(String),

    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors in Skald configuration parsing and validation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist at the expected path.
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// Configuration values are present but semantically invalid.
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// Configuration file syntax could not be parsed (TOML error).
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Errors from LLM provider interactions.
#[derive(thiserror::Error, Debug)]
pub enum LlmError {
    /// Network-level failure connecting to the LLM provider.
    #[error("Network error: {0}")]
    Network(String),

    /// LLM API returned a non-success HTTP status.
    #[error("API error (HTTP {status}): {body}")]
    ApiError {
        /// HTTP status code from the provider.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// LLM response could not be parsed into the expected format.
    #[error("Response parse error: {0}")]
    Parse(String),

    /// LLM configuration is missing or invalid (API key, model, etc.).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The provider did not answer within the configured timeout.
    #[error("Timed out after {0}s")]
    Timeout(u64),

    /// Cumulative LLM cost has exceeded the configured budget.
    #[error("Cost budget exceeded: {0}")]
    BudgetExceeded(String),
}

/// Errors from writing or loading export artifacts.
#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    /// Filesystem I/O error.
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias for `Result<T, SkaldError>`.
pub type Result<T> = std::result::Result<T, SkaldError>;
