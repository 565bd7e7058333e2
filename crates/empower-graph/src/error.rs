//! Build errors.

use empower_core::ModelError;

/// Errors that abort a graph build. No partial graph is ever returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigBuildError {
    #[error("Duplicate thing id: {0}")]
    DuplicateThing(String),

    #[error("Duplicate channel id: {0}")]
    DuplicateChannel(String),

    #[error("{record} references missing {target}")]
    UnresolvedReference { record: String, target: String },

    #[error("Invalid {record}: {reason}")]
    InvalidRecord { record: String, reason: String },

    #[error("{} device channels were never populated: {}", .0.len(), .0.join(", "))]
    UnpopulatedChannels(Vec<String>),
}

impl ConfigBuildError {
    pub fn unresolved(record: impl Into<String>, target: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            record: record.into(),
            target: target.into(),
        }
    }

    pub fn invalid(record: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            record: record.into(),
            reason: reason.into(),
        }
    }
}

impl From<ModelError> for ConfigBuildError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::DuplicateThing(id) => ConfigBuildError::DuplicateThing(id),
            ModelError::DuplicateChannel(id) => ConfigBuildError::DuplicateChannel(id),
        }
    }
}
