use std::path::PathBuf;

use thiserror::Error;

use crate::world::ActorId;

/// Result type for duelist operations
pub type Result<T> = std::result::Result<T, DuelistError>;

/// Main error type for the duelist crate
#[derive(Debug, Error)]
pub enum DuelistError {
    /// Invalid dimensions for vectors or weight matrices
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: String,
        actual: String,
    },

    /// Invalid parameter value
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        name: String,
        reason: String,
    },

    /// Invalid action index
    #[error("Invalid action {action}: must be less than {max_actions}")]
    InvalidAction {
        action: usize,
        max_actions: usize,
    },

    /// An actor failed to join or was rejected by the world
    #[error("Actor '{name}' could not connect: {reason}")]
    Connection {
        name: String,
        reason: String,
    },

    /// A command referenced an actor the world does not know
    #[error("Unknown actor {0}")]
    UnknownActor(ActorId),

    /// The checkpoint directory could not be created
    #[error("Storage unavailable at {}: {source}", path.display())]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A checkpoint was readable but does not describe a usable agent
    #[error("Invalid checkpoint: {0}")]
    InvalidCheckpoint(String),

    /// IO errors (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON checkpoint encoding errors
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary network encoding errors
    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Configuration file parse errors
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),
}

// Helper functions for common error patterns
impl DuelistError {
    pub fn dimension_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        DuelistError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_parameter<S: Into<String>>(name: S, reason: S) -> Self {
        DuelistError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn connection<S: Into<String>>(name: S, reason: S) -> Self {
        DuelistError::Connection {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
