//! Predictive model and builder-factory contracts
//!
//! The optimizer and cross-validator interact with models exclusively
//! through [`ModelBuilderFactory`] and [`PredictiveModel`]. Variant
//! behaviors (downsampling, calibration, online updates) are composed as
//! decorator factories around a base factory; nothing upstream ever
//! special-cases which wrapper is active.

pub mod calibrated;
pub mod downsampling;
pub mod forest;
pub mod updatable;

pub use calibrated::{PavCalibratedFactory, PavCalibrator};
pub use downsampling::DownsamplingFactory;
pub use forest::{AttributeForest, Featurizer, RandomForestFactory};
pub use updatable::{UpdatableFactory, UpdatableModel};

use crate::data::{AttributesMap, Instance};
use crate::error::Result;
use crate::optimizer::{Configuration, SearchSpace};

/// A fitted model. Scores an attribute map; higher scores mean the positive
/// outcome is considered more likely.
pub trait PredictiveModel: Send + Sync {
    fn predict(&self, attributes: &AttributesMap) -> Result<f64>;
}

/// Builds fitted models from a configuration and a training set, and
/// describes the configuration space it understands.
pub trait ModelBuilderFactory: Send + Sync {
    /// Identity used in reports and error messages.
    fn name(&self) -> &str;

    /// The searchable parameter space of this factory.
    fn parameter_space(&self) -> SearchSpace;

    /// Fit a fresh model. Must not mutate `instances`.
    fn build(
        &self,
        configuration: &Configuration,
        instances: &[Instance],
    ) -> Result<Box<dyn PredictiveModel>>;
}

/// A model that can absorb new instances after its initial fit.
pub trait UpdatablePredictiveModel: PredictiveModel {
    fn update(&mut self, instances: &[Instance]) -> Result<()>;
}
