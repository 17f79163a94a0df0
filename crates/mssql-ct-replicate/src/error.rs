//! Error types for the replication library.

use thiserror::Error;

/// Main error type for replication operations.
#[derive(Error, Debug)]
pub enum ReplicateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// SQL Server connection or query error
    #[error("SQL Server error: {0}")]
    Sql(#[from] tiberius::error::Error),

    /// Failed to open a connection to an endpoint
    #[error("Connection to {endpoint} failed: {message}")]
    Connection { endpoint: String, message: String },

    /// Table/key discovery failed on the source (aborts the replication set)
    #[error("Metadata discovery on {source_table} failed: {message}")]
    Metadata {
        source_table: String,
        message: String,
    },

    /// Destination version probe or bootstrap failed (skips the destination)
    #[error("Version lookup on {destination} failed: {message}")]
    Version {
        destination: String,
        message: String,
    },

    /// A destination group's baseline has aged past the source retention window
    #[error(
        "Change tracking retention exceeded for {table}: minimum valid version {min_version} \
         is newer than baseline {baseline} (destinations affected: {destinations})"
    )]
    Retention {
        table: String,
        min_version: i64,
        baseline: i64,
        destinations: String,
    },

    /// Change extraction failed on the source (skips the destination group)
    #[error("Change extraction for {table} failed: {message}")]
    Extract { table: String, message: String },

    /// Any failure inside a destination apply transaction (rolled back)
    #[error("Apply on {destination} failed: {message}")]
    Apply {
        destination: String,
        message: String,
    },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReplicateError {
    /// Create a Connection error.
    pub fn connection(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        ReplicateError::Connection {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a Metadata error.
    pub fn metadata(source: impl Into<String>, message: impl Into<String>) -> Self {
        ReplicateError::Metadata {
            source_table: source.into(),
            message: message.into(),
        }
    }

    /// Create a Version error.
    pub fn version(destination: impl Into<String>, message: impl Into<String>) -> Self {
        ReplicateError::Version {
            destination: destination.into(),
            message: message.into(),
        }
    }

    /// Create an Extract error.
    pub fn extract(table: impl Into<String>, message: impl Into<String>) -> Self {
        ReplicateError::Extract {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create an Apply error.
    pub fn apply(destination: impl Into<String>, message: impl Into<String>) -> Self {
        ReplicateError::Apply {
            destination: destination.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            ReplicateError::Config(_) | ReplicateError::Yaml(_) => 1,
            ReplicateError::Io(_) => 7,
            _ => 2,
        }
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for replication operations.
pub type Result<T> = std::result::Result<T, ReplicateError>;
