//! Error types for the planner.

use thiserror::Error;

/// Planner error type
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid plan input: {0}")]
    InvalidInput(String),

    #[error("Trajectory error: {0}")]
    Trajectory(String),

    #[error("Optimization failed: {0}")]
    Optimization(String),
}

impl From<toml::de::Error> for PlannerError {
    fn from(e: toml::de::Error) -> Self {
        PlannerError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlannerError>;
