//! Timefold - Time-aware hyperparameter optimization for predictive models
//!
//! This crate tunes binary classifiers the way they will be used in
//! production: models are validated on chronological holdouts drawn from the
//! most recent data, scored with a weighted AUC loss, and their builder
//! factories are searched with a deterministic coordinate-descent optimizer.
//!
//! # Modules
//!
//! - [`data`] - Instances, labels, attribute maps, timestamp extraction
//! - [`loss`] - Loss functions over scored predictions (weighted AUC)
//! - [`crossval`] - Out-of-time cross-validation
//! - [`model`] - Model and factory traits, random forest, decorator factories
//! - [`optimizer`] - Search spaces and the predictive model optimizer
//! - [`error`] - Crate-wide error type

// Core error handling
pub mod error;

// Data model
pub mod data;

// Validation
pub mod crossval;
pub mod loss;

// Models and factories
pub mod model;

// Hyperparameter search
pub mod optimizer;

pub use error::{Result, TimefoldError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, TimefoldError};

    // Data model
    pub use crate::data::{AttributeValue, AttributesMap, Instance, Label};
    pub use crate::data::{
        ComposedFieldExtractor, DateTimeExtractor, ParsedFieldExtractor, StoredTimestampExtractor,
    };

    // Loss functions
    pub use crate::loss::{LossFunction, PredictionRecord, WeightedAucLoss};

    // Cross-validation
    pub use crate::crossval::{CrossValidator, FoldAggregation, OutOfTimeCrossValidator};

    // Models and factories
    pub use crate::model::{
        DownsamplingFactory, ModelBuilderFactory, PavCalibratedFactory, PavCalibrator,
        PredictiveModel, RandomForestFactory, UpdatableFactory, UpdatablePredictiveModel,
    };

    // Optimization
    pub use crate::optimizer::{
        Configuration, Optimum, OptimizerConfig, ParamDomain, ParamValue, Parameter,
        PredictiveModelOptimizer, SearchSpace,
    };
}
