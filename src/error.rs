//! Error types for the timefold crate

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, TimefoldError>;

#[derive(Error, Debug)]
pub enum TimefoldError {
    /// A split or subset is too small to fit or score a model
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// An instance's timestamp could not be derived
    #[error("Timestamp extraction failed: {0}")]
    TimestampExtraction(String),

    /// The builder factory exposes no configurations to try
    #[error("Search space is empty")]
    EmptySearchSpace,

    /// No trial produced a usable loss
    #[error("Optimization failed: {0}")]
    OptimizationFailed(String),

    /// Invalid input or configuration
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A model was asked to predict before being fitted
    #[error("Model has not been fitted")]
    ModelNotFitted,

    /// Dimension mismatch between related inputs
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
