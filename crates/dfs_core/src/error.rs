use thiserror::Error;

use crate::models::{Platform, Sport};

/// Errors that stop an operation before it starts.
///
/// Infeasible constraints, numerical degradation and deadlines are not
/// errors; they are reported as fields of the operation's outcome.
#[derive(Error, Debug)]
pub enum DfsError {
    #[error("No slot template for {sport:?} on {platform:?}")]
    UnknownSlotTemplate { sport: Sport, platform: Platform },

    #[error("Player pool is empty")]
    EmptyPlayerPool,

    #[error("Duplicate player id in pool: {0}")]
    DuplicatePlayer(String),

    #[error("Unknown player id: {0}")]
    UnknownPlayer(String),

    #[error("Salary cap must be positive, got {0}")]
    InvalidSalaryCap(u32),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DfsError {
    /// True for errors caused by the caller's inputs rather than the environment.
    pub fn is_configuration(&self) -> bool {
        match self {
            DfsError::UnknownSlotTemplate { .. }
            | DfsError::EmptyPlayerPool
            | DfsError::DuplicatePlayer(_)
            | DfsError::UnknownPlayer(_)
            | DfsError::InvalidSalaryCap(_)
            | DfsError::InvalidParameter(_)
            | DfsError::InvalidConfig(_) => true,
            DfsError::Serialization(err) => err.is_data() || err.is_syntax(),
            DfsError::Yaml(_) => true,
            DfsError::ThreadPool(_) | DfsError::Io(_) => false,
        }
    }
}

impl From<validator::ValidationErrors> for DfsError {
    fn from(err: validator::ValidationErrors) -> Self {
        DfsError::InvalidConfig(err.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for DfsError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        DfsError::ThreadPool(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_classification() {
        let unknown = DfsError::UnknownSlotTemplate { sport: Sport::Pga, platform: Platform::Yahoo };
        assert!(unknown.is_configuration());
        assert!(DfsError::EmptyPlayerPool.is_configuration());
        assert!(!DfsError::ThreadPool("boom".to_string()).is_configuration());
    }

    #[test]
    fn test_display_names_the_pair() {
        let err = DfsError::UnknownSlotTemplate { sport: Sport::Mlb, platform: Platform::Yahoo };
        let msg = err.to_string();
        assert!(msg.contains("Mlb"));
        assert!(msg.contains("Yahoo"));
    }
}
